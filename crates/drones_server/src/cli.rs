//! Command-line interface for drones_server.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::ConfigOverrides;

/// Drone Duel - best-of-five rock-paper-scissors server
#[derive(Parser, Debug)]
#[command(name = "drones_server")]
#[command(about = "REST and WebSocket server for Drone Duel matches", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP + WebSocket server
    Serve(ServeArgs),

    /// Apply pending database migrations and exit
    Migrate {
        /// Path to the SQLite database (created if it doesn't exist)
        #[arg(long)]
        database_url: Option<String>,

        /// TOML file with server settings
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Flags for `serve`. Each one overrides the config file and environment.
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to the SQLite database
    #[arg(long)]
    pub database_url: Option<String>,

    /// Milliseconds to wait for a busy match before answering 503
    #[arg(long)]
    pub lock_timeout_ms: Option<u64>,

    /// TOML file with server settings
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl From<&ServeArgs> for ConfigOverrides {
    fn from(args: &ServeArgs) -> Self {
        ConfigOverrides::new(
            args.host.clone(),
            args.port,
            args.database_url.clone(),
            args.lock_timeout_ms,
        )
    }
}
