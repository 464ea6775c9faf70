//! In-memory store implementations.
//!
//! Used by tests and by callers embedding the engine without a database.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, instrument};

use crate::{Match, MatchError, MatchId, MatchStore, NewMatch, Player, PlayerId, PlayerStore};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, MatchError> {
    mutex
        .lock()
        .map_err(|_| MatchError::internal("In-memory store lock poisoned"))
}

#[derive(Debug, Default)]
struct PlayerTable {
    next_id: PlayerId,
    rows: BTreeMap<PlayerId, Player>,
}

/// Player store backed by a map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPlayerStore {
    table: Arc<Mutex<PlayerTable>>,
}

impl InMemoryPlayerStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn bump<F>(&self, id: PlayerId, apply: F) -> Result<(), MatchError>
    where
        F: FnOnce(&Player) -> Player,
    {
        let mut table = lock(&self.table)?;
        let current = table
            .rows
            .get(&id)
            .ok_or_else(|| MatchError::not_found(format!("Player {} not found", id)))?;
        let next = apply(current);
        table.rows.insert(id, next);
        Ok(())
    }
}

#[async_trait]
impl PlayerStore for InMemoryPlayerStore {
    #[instrument(skip(self))]
    async fn create(&self, name: &str) -> Result<Player, MatchError> {
        let mut table = lock(&self.table)?;
        if table.rows.values().any(|p| p.name() == name) {
            return Err(MatchError::conflict(format!(
                "Player name '{}' is already registered",
                name
            )));
        }
        table.next_id += 1;
        let player = Player::new(table.next_id, name.to_string(), 0, 0, 0, Utc::now());
        table.rows.insert(*player.id(), player.clone());
        info!(player_id = player.id(), "Player stored");
        Ok(player)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: PlayerId) -> Result<Option<Player>, MatchError> {
        Ok(lock(&self.table)?.rows.get(&id).cloned())
    }

    #[instrument(skip(self))]
    async fn find_by_name(&self, name: &str) -> Result<Option<Player>, MatchError> {
        Ok(lock(&self.table)?
            .rows
            .values()
            .find(|p| p.name() == name)
            .cloned())
    }

    #[instrument(skip(self))]
    async fn find_all(&self) -> Result<Vec<Player>, MatchError> {
        Ok(lock(&self.table)?.rows.values().cloned().collect())
    }

    #[instrument(skip(self))]
    async fn increment_wins(&self, id: PlayerId) -> Result<(), MatchError> {
        self.bump(id, |p| {
            Player::new(
                *p.id(),
                p.name().clone(),
                p.wins() + 1,
                *p.losses(),
                *p.draws(),
                *p.created_at(),
            )
        })
    }

    #[instrument(skip(self))]
    async fn increment_losses(&self, id: PlayerId) -> Result<(), MatchError> {
        self.bump(id, |p| {
            Player::new(
                *p.id(),
                p.name().clone(),
                *p.wins(),
                p.losses() + 1,
                *p.draws(),
                *p.created_at(),
            )
        })
    }
}

#[derive(Debug, Default)]
struct MatchTable {
    next_id: MatchId,
    rows: BTreeMap<MatchId, Match>,
}

/// Match store backed by a map. Each update swaps the whole record.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMatchStore {
    table: Arc<Mutex<MatchTable>>,
}

impl InMemoryMatchStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a record verbatim, bypassing creation rules.
    ///
    /// Intended for seeding fixtures, including malformed ones.
    pub fn insert(&self, record: Match) -> Result<(), MatchError> {
        let mut table = lock(&self.table)?;
        table.next_id = table.next_id.max(*record.id());
        table.rows.insert(*record.id(), record);
        Ok(())
    }
}

#[async_trait]
impl MatchStore for InMemoryMatchStore {
    #[instrument(skip(self))]
    async fn create(&self, initial: NewMatch) -> Result<Match, MatchError> {
        let mut table = lock(&self.table)?;
        table.next_id += 1;
        let record = Match::from_new(table.next_id, &initial, Utc::now());
        table.rows.insert(*record.id(), record.clone());
        info!(match_id = record.id(), "Match stored");
        Ok(record)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: MatchId) -> Result<Option<Match>, MatchError> {
        Ok(lock(&self.table)?.rows.get(&id).cloned())
    }

    #[instrument(skip(self))]
    async fn find_active_between(
        &self,
        a: PlayerId,
        b: PlayerId,
    ) -> Result<Option<Match>, MatchError> {
        Ok(lock(&self.table)?
            .rows
            .values()
            .find(|m| m.is_active() && m.is_between(a, b))
            .cloned())
    }

    #[instrument(skip(self, state))]
    async fn update(&self, id: MatchId, state: &Match) -> Result<Option<Match>, MatchError> {
        let mut table = lock(&self.table)?;
        let Some(slot) = table.rows.get_mut(&id) else {
            debug!(match_id = id, "Update target missing");
            return Ok(None);
        };
        let mut next = state.clone();
        next.set_updated_at(Utc::now());
        *slot = next.clone();
        Ok(Some(next))
    }

    #[instrument(skip(self))]
    async fn find_by_player(&self, id: PlayerId) -> Result<Vec<Match>, MatchError> {
        Ok(lock(&self.table)?
            .rows
            .values()
            .filter(|m| m.involves(id))
            .cloned()
            .collect())
    }

    #[instrument(skip(self))]
    async fn find_all(&self) -> Result<Vec<Match>, MatchError> {
        Ok(lock(&self.table)?.rows.values().cloned().collect())
    }
}
