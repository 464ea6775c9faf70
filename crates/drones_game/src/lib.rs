//! Drone Duel match engine.
//!
//! Best-of-five rock-paper-scissors between two registered players.
//!
//! # Architecture
//!
//! - **Resolver**: [`resolve`] maps two moves to an [`Outcome`]
//! - **Transition**: [`apply_move`] computes the next [`Match`] state
//! - **Locks**: [`MatchLocks`] serializes submissions per match
//! - **Services**: [`MatchService`] and [`PlayerService`] tie stores,
//!   locks and the [`EventPublisher`] together
//!
//! Storage and transport are injected through [`MatchStore`],
//! [`PlayerStore`] and [`EventPublisher`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use drones_game::{InMemoryMatchStore, InMemoryPlayerStore, MatchService, Move, PlayerService};
//!
//! # async fn example() -> Result<(), drones_game::MatchError> {
//! let players = Arc::new(InMemoryPlayerStore::new());
//! let registry = PlayerService::new(players.clone());
//! let alice = registry.register("Alice").await?;
//! let bob = registry.register("Bob").await?;
//!
//! let service = MatchService::new(Arc::new(InMemoryMatchStore::new()), players);
//! let created = service.create_match(*alice.id(), *bob.id()).await?;
//! let starter = created.current_turn().expect("new matches have a turn");
//! service.submit_move(*created.id(), starter, Move::Rock).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod events;
mod invariants;
mod locks;
mod memory;
mod model;
mod moves;
mod players;
mod service;
mod store;
mod transition;

pub use error::MatchError;
pub use events::{
    EventPublisher, MatchEnd, MatchEvent, MatchUpdate, MoveSummary, NoopPublisher, PublishError,
    RoundResult,
};
pub use invariants::{
    ContiguousRounds, DistinctPlayers, Invariant, InvariantSet, InvariantViolation,
    MatchInvariants, OneMovePerPlayer, ScoreMatchesRounds, TerminalConsistency,
};
pub use locks::{DEFAULT_LOCK_TIMEOUT, MatchLocks, SectionGuard, SectionKey};
pub use memory::{InMemoryMatchStore, InMemoryPlayerStore};
pub use model::{
    Match, MatchId, MatchStatus, NewMatch, PlayedMove, Player, PlayerId, Round, Score,
    WIN_THRESHOLD,
};
pub use moves::{Move, Outcome, resolve};
pub use players::PlayerService;
pub use service::MatchService;
pub use store::{MatchStore, PlayerStore};
pub use transition::{Finish, Transition, apply_move};
