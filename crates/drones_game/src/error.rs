//! Error taxonomy for match operations.

use derive_more::{Display, Error};
use tracing::warn;

/// Classified failure of a match or player operation.
///
/// Every variant carries a message suitable for showing to the caller.
/// None of these are retried by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum MatchError {
    /// Malformed or self-referential input.
    #[display("Invalid argument: {}", _0)]
    InvalidArgument(#[error(not(source))] String),

    /// Unknown player or match.
    #[display("Not found: {}", _0)]
    NotFound(#[error(not(source))] String),

    /// Request conflicts with the current match state.
    #[display("Conflict: {}", _0)]
    Conflict(#[error(not(source))] String),

    /// The match is being modified by another request and the
    /// section could not be obtained in time.
    #[display("Busy: {}", _0)]
    Busy(#[error(not(source))] String),

    /// Corrupted state or persistence failure.
    #[display("Internal error: {}", _0)]
    Internal(#[error(not(source))] String),
}

impl MatchError {
    /// Creates an [`MatchError::InvalidArgument`].
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Creates a [`MatchError::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Creates a [`MatchError::Conflict`].
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Creates a [`MatchError::Busy`].
    pub fn busy(message: impl Into<String>) -> Self {
        Self::Busy(message.into())
    }

    /// Creates a [`MatchError::Internal`] and logs where it was raised.
    #[track_caller]
    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        let loc = std::panic::Location::caller();
        warn!(file = loc.file(), line = loc.line(), message = %message, "Internal error raised");
        Self::Internal(message)
    }

    /// Returns the caller-facing message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::InvalidArgument(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::Busy(m)
            | Self::Internal(m) => m,
        }
    }
}
