//! SQLite persistence for players and matches.

mod error;
mod models;
mod repository;
mod schema;
mod store;

pub use error::{DbError, DbErrorKind};
pub use models::{MatchChangeset, MatchRow, NewMatchRow, NewPlayerRow, PlayerRow};
pub use repository::{ArenaRepository, MIGRATIONS};
pub use store::DbStore;
