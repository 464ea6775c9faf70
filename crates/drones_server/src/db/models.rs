//! Database rows and their mapping to engine types.

use std::str::FromStr;

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use diesel::prelude::*;
use drones_game::{Match, MatchStatus, NewMatch, Player, Round, Score};
use tracing::instrument;

use crate::db::{DbError, DbErrorKind, schema};

/// Player row.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::players)]
pub struct PlayerRow {
    id: i32,
    name: String,
    wins: i32,
    losses: i32,
    draws: i32,
    created_at: NaiveDateTime,
}

impl From<PlayerRow> for Player {
    fn from(row: PlayerRow) -> Self {
        Player::new(
            row.id,
            row.name,
            row.wins,
            row.losses,
            row.draws,
            row.created_at.and_utc(),
        )
    }
}

/// Insertable player; counters and timestamp take column defaults.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::players)]
pub struct NewPlayerRow {
    name: String,
}

/// Match row. Rounds are stored as a JSON array.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::matches)]
pub struct MatchRow {
    id: i32,
    player_a: i32,
    player_b: i32,
    status: String,
    current_turn: Option<i32>,
    winner: Option<i32>,
    score_a: i32,
    score_b: i32,
    rounds: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl MatchRow {
    /// Rebuilds the engine's view of this match.
    ///
    /// # Errors
    ///
    /// Returns [`DbErrorKind::CorruptRow`] if the status, score or rounds
    /// column holds something the engine cannot represent.
    #[instrument(skip(self), fields(match_id = self.id))]
    pub fn into_match(self) -> Result<Match, DbError> {
        let status = MatchStatus::from_str(&self.status).map_err(|_| {
            DbError::new(
                DbErrorKind::CorruptRow,
                format!("Match {} has unknown status '{}'", self.id, self.status),
            )
        })?;
        let rounds: Vec<Round> = serde_json::from_str(&self.rounds).map_err(|e| {
            DbError::new(
                DbErrorKind::CorruptRow,
                format!("Match {} has unreadable rounds: {}", self.id, e),
            )
        })?;
        let score = Score::new(
            column_to_count(self.id, self.score_a)?,
            column_to_count(self.id, self.score_b)?,
        );

        Ok(Match::new(
            self.id,
            self.player_a,
            self.player_b,
            rounds,
            score,
            status,
            self.current_turn,
            self.winner,
            self.created_at.and_utc(),
            self.updated_at.and_utc(),
        ))
    }
}

fn column_to_count(match_id: i32, value: i32) -> Result<u32, DbError> {
    u32::try_from(value).map_err(|_| {
        DbError::new(
            DbErrorKind::CorruptRow,
            format!("Match {} has negative score {}", match_id, value),
        )
    })
}

fn count_to_column(value: u32) -> Result<i32, DbError> {
    i32::try_from(value).map_err(|_| {
        DbError::new(DbErrorKind::CorruptRow, format!("Score {} out of range", value))
    })
}

/// Insertable match in its initial ONGOING state.
#[derive(Debug, Clone, Insertable, Getters)]
#[diesel(table_name = schema::matches)]
pub struct NewMatchRow {
    player_a: i32,
    player_b: i32,
    status: String,
    current_turn: Option<i32>,
    rounds: String,
}

impl From<&NewMatch> for NewMatchRow {
    fn from(initial: &NewMatch) -> Self {
        Self {
            player_a: *initial.player_a(),
            player_b: *initial.player_b(),
            status: MatchStatus::Ongoing.to_string(),
            current_turn: Some(*initial.current_turn()),
            rounds: "[]".to_string(),
        }
    }
}

/// Full replacement of a match's mutable columns.
///
/// `None` clears a column, so a finished match loses its turn.
#[derive(Debug, Clone, AsChangeset, Getters)]
#[diesel(table_name = schema::matches, treat_none_as_null = true)]
pub struct MatchChangeset {
    status: String,
    current_turn: Option<i32>,
    winner: Option<i32>,
    score_a: i32,
    score_b: i32,
    rounds: String,
    updated_at: NaiveDateTime,
}

impl MatchChangeset {
    /// Captures `state` for writing, stamped at `at`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the rounds cannot be encoded.
    #[instrument(skip(state), fields(match_id = state.id()))]
    pub fn capture(state: &Match, at: NaiveDateTime) -> Result<Self, DbError> {
        let rounds = serde_json::to_string(state.rounds()).map_err(|e| {
            DbError::new(
                DbErrorKind::CorruptRow,
                format!("Cannot encode rounds of match {}: {}", state.id(), e),
            )
        })?;
        Ok(Self {
            status: state.status().to_string(),
            current_turn: *state.current_turn(),
            winner: *state.winner(),
            score_a: count_to_column(state.score().player_a)?,
            score_b: count_to_column(state.score().player_b)?,
            rounds,
            updated_at: at,
        })
    }
}
