//! Core domain types: players, matches, rounds.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::Move;

/// Unique identifier for a player.
pub type PlayerId = i32;

/// Unique identifier for a match.
pub type MatchId = i32;

/// Number of round wins that ends a match.
pub const WIN_THRESHOLD: u32 = 3;

/// A registered player and their cumulative record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    id: PlayerId,
    name: String,
    wins: i32,
    losses: i32,
    draws: i32,
    created_at: DateTime<Utc>,
}

/// Lifecycle status of a match.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    /// Created but not yet started. Never produced by this engine.
    Waiting,
    /// Accepting moves.
    Ongoing,
    /// Terminal; a winner is set.
    Finished,
}

/// One player's contribution to a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
#[serde(rename_all = "camelCase")]
pub struct PlayedMove {
    player_id: PlayerId,
    #[serde(rename = "move")]
    played: Move,
    timestamp: DateTime<Utc>,
}

/// One exchange of up to two moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    round_number: u32,
    moves: Vec<PlayedMove>,
    winner: Option<PlayerId>,
}

impl Round {
    /// Starts an empty round with the given sequence number.
    pub fn open(round_number: u32) -> Self {
        Self::new(round_number, Vec::new(), None)
    }

    /// Returns the move recorded by `player`, if any.
    pub fn move_of(&self, player: PlayerId) -> Option<&PlayedMove> {
        self.moves.iter().find(|m| m.player_id == player)
    }

    /// Both moves are in.
    pub fn is_complete(&self) -> bool {
        self.moves.len() >= 2
    }

    pub(crate) fn push(&mut self, played: PlayedMove) {
        self.moves.push(played);
    }

    pub(crate) fn set_winner(&mut self, winner: Option<PlayerId>) {
        self.winner = winner;
    }
}

/// Round wins per side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, new)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    /// Rounds won by player A.
    pub player_a: u32,
    /// Rounds won by player B.
    pub player_b: u32,
}

impl Score {
    /// Sum of decisive rounds.
    pub fn total(&self) -> u32 {
        self.player_a + self.player_b
    }
}

/// Initial state handed to the match store on creation.
#[derive(Debug, Clone, PartialEq, Eq, Getters, new)]
pub struct NewMatch {
    player_a: PlayerId,
    player_b: PlayerId,
    current_turn: PlayerId,
}

/// A best-of-N session between two players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, new)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    id: MatchId,
    player_a: PlayerId,
    player_b: PlayerId,
    rounds: Vec<Round>,
    score: Score,
    status: MatchStatus,
    current_turn: Option<PlayerId>,
    winner: Option<PlayerId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Match {
    /// Builds the persisted form of a freshly created match.
    pub fn from_new(id: MatchId, initial: &NewMatch, at: DateTime<Utc>) -> Self {
        Self::new(
            id,
            initial.player_a,
            initial.player_b,
            Vec::new(),
            Score::default(),
            MatchStatus::Ongoing,
            Some(initial.current_turn),
            None,
            at,
            at,
        )
    }

    /// The player takes part in this match.
    pub fn involves(&self, player: PlayerId) -> bool {
        self.player_a == player || self.player_b == player
    }

    /// Returns the other side, or `None` if `player` is not in the match.
    pub fn opponent_of(&self, player: PlayerId) -> Option<PlayerId> {
        if player == self.player_a {
            Some(self.player_b)
        } else if player == self.player_b {
            Some(self.player_a)
        } else {
            None
        }
    }

    /// Not yet finished.
    pub fn is_active(&self) -> bool {
        self.status != MatchStatus::Finished
    }

    /// Number of completed rounds that ended without a winner.
    pub fn draw_count(&self) -> usize {
        self.rounds
            .iter()
            .filter(|r| r.is_complete() && r.winner.is_none())
            .count()
    }

    /// The same unordered pair of players.
    pub fn is_between(&self, a: PlayerId, b: PlayerId) -> bool {
        (self.player_a == a && self.player_b == b) || (self.player_a == b && self.player_b == a)
    }

    pub(crate) fn rounds_mut(&mut self) -> &mut Vec<Round> {
        &mut self.rounds
    }

    pub(crate) fn score_mut(&mut self) -> &mut Score {
        &mut self.score
    }

    pub(crate) fn set_current_turn(&mut self, turn: Option<PlayerId>) {
        self.current_turn = turn;
    }

    pub(crate) fn finish(&mut self, winner: PlayerId) {
        self.status = MatchStatus::Finished;
        self.winner = Some(winner);
        self.current_turn = None;
    }

    pub(crate) fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}
