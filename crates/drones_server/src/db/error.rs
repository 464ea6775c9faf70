//! Database error types.

use derive_more::{Display, Error};
use diesel::result::DatabaseErrorKind;
use drones_game::MatchError;
use tracing::instrument;

/// Broad class of a database failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DbErrorKind {
    /// Could not open the database file.
    Connection,
    /// Applying embedded migrations failed.
    Migration,
    /// A UNIQUE constraint rejected the write.
    UniqueViolation,
    /// A stored row could not be mapped back to a domain value.
    CorruptRow,
    /// Any other query failure.
    Query,
}

/// Database error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Database error ({}): {} at {}:{}", kind, message, file, line)]
pub struct DbError {
    /// Failure class.
    pub kind: DbErrorKind,
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl DbError {
    /// Creates a new database error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(kind: DbErrorKind, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

impl From<diesel::result::Error> for DbError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        let kind = match &err {
            diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                DbErrorKind::UniqueViolation
            }
            _ => DbErrorKind::Query,
        };
        Self::new(kind, format!("Diesel error: {}", err))
    }
}

impl From<diesel::ConnectionError> for DbError {
    #[track_caller]
    fn from(err: diesel::ConnectionError) -> Self {
        Self::new(DbErrorKind::Connection, format!("Connection error: {}", err))
    }
}

impl From<DbError> for MatchError {
    #[track_caller]
    fn from(err: DbError) -> Self {
        match err.kind {
            DbErrorKind::UniqueViolation => MatchError::conflict(err.message),
            _ => MatchError::internal(err.to_string()),
        }
    }
}
