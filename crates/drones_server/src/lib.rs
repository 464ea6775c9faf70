//! Drone Duel server.
//!
//! Hosts the [`drones_game`] engine behind a REST API, pushes match events
//! over WebSockets and persists players and matches in SQLite.
//!
//! # Architecture
//!
//! - **Database**: [`ArenaRepository`] (diesel) wrapped by [`DbStore`]
//! - **Hub**: [`EventHub`] fans events out to subscribed sockets
//! - **API**: [`router`] builds the axum routes over an [`AppState`]
//! - **Config**: [`ServerConfig`] layered from file, env and flags
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use drones_game::MatchLocks;
//! use drones_server::{AppState, ArenaRepository, DbStore, EventHub, router};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let repo = ArenaRepository::new("drones.db");
//! repo.run_migrations()?;
//! let state = AppState::assemble(Arc::new(DbStore::new(repo)), MatchLocks::default(), EventHub::new());
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:4000").await?;
//! axum::serve(listener, router(state)).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod api;
mod cli;
mod config;
mod db;
mod hub;

pub use api::{ApiError, AppState, PLAYER_ID_HEADER, router};
pub use cli::{Cli, Command, ServeArgs};
pub use config::{ConfigError, ConfigOverrides, ServerConfig};
pub use db::{
    ArenaRepository, DbError, DbErrorKind, DbStore, MIGRATIONS, MatchChangeset, MatchRow,
    NewMatchRow, NewPlayerRow, PlayerRow,
};
pub use hub::{EventHub, encode_frame, serve_socket};
