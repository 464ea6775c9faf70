//! Persistence contracts consumed by the match engine.
//!
//! The engine never touches storage directly; it loads and saves whole
//! records through these traits. Implementations must persist a match
//! update atomically so concurrent readers see either the old or the new
//! snapshot.

use async_trait::async_trait;

use crate::{Match, MatchError, MatchId, NewMatch, Player, PlayerId};

/// Record store for players and their win/loss/draw counters.
#[async_trait]
pub trait PlayerStore: Send + Sync {
    /// Inserts a player with zeroed counters.
    async fn create(&self, name: &str) -> Result<Player, MatchError>;

    /// Loads a player by identity.
    async fn find_by_id(&self, id: PlayerId) -> Result<Option<Player>, MatchError>;

    /// Loads a player by display name.
    async fn find_by_name(&self, name: &str) -> Result<Option<Player>, MatchError>;

    /// Lists all players in creation order.
    async fn find_all(&self) -> Result<Vec<Player>, MatchError>;

    /// Adds one to the player's win counter.
    async fn increment_wins(&self, id: PlayerId) -> Result<(), MatchError>;

    /// Adds one to the player's loss counter.
    async fn increment_losses(&self, id: PlayerId) -> Result<(), MatchError>;
}

/// Document store for whole match records.
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Persists a new match and returns it with its assigned identity.
    async fn create(&self, initial: NewMatch) -> Result<Match, MatchError>;

    /// Loads a match by identity.
    async fn find_by_id(&self, id: MatchId) -> Result<Option<Match>, MatchError>;

    /// Finds a non-finished match between the unordered pair `a`, `b`.
    async fn find_active_between(
        &self,
        a: PlayerId,
        b: PlayerId,
    ) -> Result<Option<Match>, MatchError>;

    /// Replaces the stored record with `state`. Returns `None` if no record
    /// with `id` exists.
    async fn update(&self, id: MatchId, state: &Match) -> Result<Option<Match>, MatchError>;

    /// Lists matches in which the player is either side.
    async fn find_by_player(&self, id: PlayerId) -> Result<Vec<Match>, MatchError>;

    /// Lists every match.
    async fn find_all(&self) -> Result<Vec<Match>, MatchError>;
}
