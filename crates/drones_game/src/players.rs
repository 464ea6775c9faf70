//! Player registration and statistics.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::{MatchError, Player, PlayerId, PlayerStore};

/// Service layer for player records.
///
/// Counters are only ever changed by [`crate::MatchService`] when a match
/// finishes; this service registers and reads players.
#[derive(Clone)]
pub struct PlayerService {
    store: Arc<dyn PlayerStore>,
}

impl std::fmt::Debug for PlayerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerService").finish_non_exhaustive()
    }
}

impl PlayerService {
    /// Creates a player service backed by the given store.
    #[instrument(skip(store))]
    pub fn new(store: Arc<dyn PlayerStore>) -> Self {
        info!("Creating PlayerService");
        Self { store }
    }

    /// Registers a new player under a unique display name.
    ///
    /// Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// - [`MatchError::InvalidArgument`] if the name is blank.
    /// - [`MatchError::Conflict`] if the name is already taken.
    #[instrument(skip(self))]
    pub async fn register(&self, name: &str) -> Result<Player, MatchError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(MatchError::invalid_argument("Player name is required"));
        }

        if self.store.find_by_name(name).await?.is_some() {
            warn!(name, "Name already registered");
            return Err(MatchError::conflict(format!(
                "Player name '{}' is already registered",
                name
            )));
        }

        let player = self.store.create(name).await?;
        info!(player_id = player.id(), name, "Player registered");
        Ok(player)
    }

    /// Lists all players.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Player>, MatchError> {
        let players = self.store.find_all().await?;
        debug!(count = players.len(), "Listed players");
        Ok(players)
    }

    /// Returns a player's record, including win/loss/draw counters.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::NotFound`] if no player has this id.
    #[instrument(skip(self))]
    pub async fn stats(&self, id: PlayerId) -> Result<Player, MatchError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| MatchError::not_found("Player not found"))
    }
}
