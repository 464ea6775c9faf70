//! Shared fixtures for match engine tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use drones_game::{
    EventPublisher, InMemoryMatchStore, InMemoryPlayerStore, MatchError, MatchEvent, MatchId,
    MatchService, Player, PlayerId, PlayerService, PlayerStore, PublishError,
};

/// Publisher that keeps every event for inspection.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<(MatchId, MatchEvent)>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<(MatchId, MatchEvent)> {
        self.events.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(|(_, e)| e.name()).collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, match_id: MatchId, event: MatchEvent) -> Result<(), PublishError> {
        self.events.lock().unwrap().push((match_id, event));
        Ok(())
    }
}

/// Publisher whose transport is always down.
#[derive(Debug, Default)]
pub struct FailingPublisher;

impl EventPublisher for FailingPublisher {
    fn publish(&self, match_id: MatchId, _event: MatchEvent) -> Result<(), PublishError> {
        Err(PublishError::new(match_id, "transport offline"))
    }
}

/// Player store whose win/loss counters can never be written.
#[derive(Debug)]
pub struct FrozenCounters(pub Arc<InMemoryPlayerStore>);

#[async_trait]
impl PlayerStore for FrozenCounters {
    async fn create(&self, name: &str) -> Result<Player, MatchError> {
        self.0.create(name).await
    }

    async fn find_by_id(&self, id: PlayerId) -> Result<Option<Player>, MatchError> {
        self.0.find_by_id(id).await
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Player>, MatchError> {
        self.0.find_by_name(name).await
    }

    async fn find_all(&self) -> Result<Vec<Player>, MatchError> {
        self.0.find_all().await
    }

    async fn increment_wins(&self, _id: PlayerId) -> Result<(), MatchError> {
        Err(MatchError::internal("counter table locked"))
    }

    async fn increment_losses(&self, _id: PlayerId) -> Result<(), MatchError> {
        Err(MatchError::internal("counter table locked"))
    }
}

pub struct Arena {
    pub players: Arc<InMemoryPlayerStore>,
    pub matches: Arc<InMemoryMatchStore>,
    pub publisher: Arc<RecordingPublisher>,
    pub registry: PlayerService,
    pub service: MatchService,
    pub alice: Player,
    pub bob: Player,
}

/// Builds in-memory stores with Alice and Bob registered.
pub async fn arena() -> Arena {
    let players = Arc::new(InMemoryPlayerStore::new());
    let matches = Arc::new(InMemoryMatchStore::new());
    let publisher = Arc::new(RecordingPublisher::default());
    let registry = PlayerService::new(players.clone());
    let alice = registry.register("Alice").await.expect("register Alice");
    let bob = registry.register("Bob").await.expect("register Bob");
    let service = MatchService::new(matches.clone(), players.clone())
        .with_publisher(publisher.clone())
        .with_seed(7);
    Arena {
        players,
        matches,
        publisher,
        registry,
        service,
        alice,
        bob,
    }
}
