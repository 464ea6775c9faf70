//! Engine store traits over the SQLite repository.

use async_trait::async_trait;
use drones_game::{Match, MatchError, MatchId, MatchStore, NewMatch, Player, PlayerId, PlayerStore};
use tracing::{instrument, warn};

use crate::db::{ArenaRepository, DbError};

/// [`PlayerStore`] and [`MatchStore`] backed by SQLite.
///
/// Diesel calls block, so each one runs on tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct DbStore {
    repo: ArenaRepository,
}

impl DbStore {
    /// Wraps a repository whose schema is already migrated.
    pub fn new(repo: ArenaRepository) -> Self {
        Self { repo }
    }

    /// The underlying repository.
    pub fn repository(&self) -> &ArenaRepository {
        &self.repo
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, MatchError>
    where
        T: Send + 'static,
        F: FnOnce(&ArenaRepository) -> Result<T, DbError> + Send + 'static,
    {
        let repo = self.repo.clone();
        tokio::task::spawn_blocking(move || op(&repo))
            .await
            .map_err(|e| MatchError::internal(format!("Database task failed: {}", e)))?
            .map_err(MatchError::from)
    }
}

#[async_trait]
impl PlayerStore for DbStore {
    #[instrument(skip(self))]
    async fn create(&self, name: &str) -> Result<Player, MatchError> {
        let name = name.to_string();
        self.blocking(move |repo| repo.create_player(&name)).await
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: PlayerId) -> Result<Option<Player>, MatchError> {
        self.blocking(move |repo| repo.player_by_id(id)).await
    }

    #[instrument(skip(self))]
    async fn find_by_name(&self, name: &str) -> Result<Option<Player>, MatchError> {
        let name = name.to_string();
        self.blocking(move |repo| repo.player_by_name(&name)).await
    }

    #[instrument(skip(self))]
    async fn find_all(&self) -> Result<Vec<Player>, MatchError> {
        self.blocking(|repo| repo.list_players()).await
    }

    #[instrument(skip(self))]
    async fn increment_wins(&self, id: PlayerId) -> Result<(), MatchError> {
        if !self.blocking(move |repo| repo.increment_wins(id)).await? {
            warn!(player_id = id, "Win for unknown player");
            return Err(MatchError::not_found(format!("Player {} not found", id)));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn increment_losses(&self, id: PlayerId) -> Result<(), MatchError> {
        if !self.blocking(move |repo| repo.increment_losses(id)).await? {
            warn!(player_id = id, "Loss for unknown player");
            return Err(MatchError::not_found(format!("Player {} not found", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl MatchStore for DbStore {
    #[instrument(skip(self))]
    async fn create(&self, initial: NewMatch) -> Result<Match, MatchError> {
        self.blocking(move |repo| repo.create_match(&initial)).await
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: MatchId) -> Result<Option<Match>, MatchError> {
        self.blocking(move |repo| repo.match_by_id(id)).await
    }

    #[instrument(skip(self))]
    async fn find_active_between(
        &self,
        a: PlayerId,
        b: PlayerId,
    ) -> Result<Option<Match>, MatchError> {
        self.blocking(move |repo| repo.active_match_between(a, b)).await
    }

    #[instrument(skip(self, state))]
    async fn update(&self, id: MatchId, state: &Match) -> Result<Option<Match>, MatchError> {
        let state = state.clone();
        self.blocking(move |repo| repo.update_match(id, &state)).await
    }

    #[instrument(skip(self))]
    async fn find_by_player(&self, id: PlayerId) -> Result<Vec<Match>, MatchError> {
        self.blocking(move |repo| repo.matches_for_player(id)).await
    }

    #[instrument(skip(self))]
    async fn find_all(&self) -> Result<Vec<Match>, MatchError> {
        self.blocking(|repo| repo.list_matches()).await
    }
}
