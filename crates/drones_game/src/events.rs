//! Real-time events announced on a match's channel.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::{instrument, trace};

use crate::{Match, MatchId, Move, PlayerId, Round, Score};

/// A move as announced in a round result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveSummary {
    /// Who played it.
    pub player_id: PlayerId,
    /// What was played.
    #[serde(rename = "move")]
    pub played: Move,
}

/// Payload of a `roundResult` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResult {
    /// Sequence number of the resolved round.
    pub round_number: u32,
    /// Round winner, `None` for a draw.
    pub winner: Option<PlayerId>,
    /// Both moves with their players.
    pub moves: Vec<MoveSummary>,
}

impl From<&Round> for RoundResult {
    fn from(round: &Round) -> Self {
        Self {
            round_number: *round.round_number(),
            winner: *round.winner(),
            moves: round
                .moves()
                .iter()
                .map(|m| MoveSummary {
                    player_id: *m.player_id(),
                    played: *m.played(),
                })
                .collect(),
        }
    }
}

/// Payload of a `matchEnd` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEnd {
    /// The player who reached the win threshold.
    pub winner: PlayerId,
    /// Final score.
    pub score: Score,
}

/// Payload of a `matchUpdate` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchUpdate {
    /// Whole persisted snapshot.
    #[serde(rename = "match")]
    pub snapshot: Match,
}

/// Event published to the subscribers of one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum MatchEvent {
    /// A round received its second move and was resolved.
    RoundResult(RoundResult),
    /// A side reached the win threshold.
    MatchEnd(MatchEnd),
    /// The match record changed.
    MatchUpdate(MatchUpdate),
}

impl MatchEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RoundResult(_) => "roundResult",
            Self::MatchEnd(_) => "matchEnd",
            Self::MatchUpdate(_) => "matchUpdate",
        }
    }
}

/// Failure to hand an event to the transport.
#[derive(Debug, Clone, Display, Error)]
#[display("Publish error on match {}: {}", match_id, message)]
pub struct PublishError {
    /// Channel the event was meant for.
    pub match_id: MatchId,
    /// What went wrong.
    pub message: String,
}

impl PublishError {
    /// Creates a new publish error.
    pub fn new(match_id: MatchId, message: impl Into<String>) -> Self {
        Self {
            match_id,
            message: message.into(),
        }
    }
}

/// Fan-out of events to every subscriber of a match channel.
///
/// Publishing is fire-and-forget: implementations must not block on
/// subscriber delivery. A returned error is logged by the caller and never
/// affects the already-persisted match.
pub trait EventPublisher: Send + Sync {
    /// Broadcasts `event` on the channel of `match_id`.
    fn publish(&self, match_id: MatchId, event: MatchEvent) -> Result<(), PublishError>;
}

/// Publisher that discards every event.
///
/// Used when no transport is wired; the engine behaves identically
/// apart from the missing notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    #[instrument(skip(self, event), fields(event = event.name()))]
    fn publish(&self, match_id: MatchId, event: MatchEvent) -> Result<(), PublishError> {
        trace!(match_id, "Event discarded");
        Ok(())
    }
}
