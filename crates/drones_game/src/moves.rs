//! Moves and round outcome resolution.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use tracing::instrument;

use crate::MatchError;

/// One of the three symbolic moves.
///
/// Dominance is cyclic: paper covers rock, rock crushes scissors,
/// scissors cut paper.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Move {
    /// Beats scissors.
    Rock,
    /// Beats rock.
    Paper,
    /// Beats paper.
    Scissors,
}

impl Move {
    /// Returns the move this one defeats.
    pub fn beats(self) -> Move {
        match self {
            Move::Rock => Move::Scissors,
            Move::Paper => Move::Rock,
            Move::Scissors => Move::Paper,
        }
    }

    /// Parses a caller-supplied literal (`ROCK`, `PAPER` or `SCISSORS`).
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::InvalidArgument`] for any other literal.
    #[instrument]
    pub fn parse(literal: &str) -> Result<Move, MatchError> {
        Move::from_str(literal).map_err(|_| {
            MatchError::invalid_argument(format!(
                "Invalid move '{}': must be ROCK, PAPER or SCISSORS",
                literal
            ))
        })
    }
}

/// Result of resolving one round from side A's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// Both sides played the same move.
    Draw,
    /// Side A's move dominates.
    AWins,
    /// Side B's move dominates.
    BWins,
}

/// Resolves side A's move against side B's move.
#[instrument]
pub fn resolve(move_a: Move, move_b: Move) -> Outcome {
    if move_a == move_b {
        Outcome::Draw
    } else if move_a.beats() == move_b {
        Outcome::AWins
    } else {
        Outcome::BWins
    }
}
