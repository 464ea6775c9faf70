//! Drone Duel server binary.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use drones_game::MatchLocks;
use drones_server::{
    AppState, ArenaRepository, Cli, Command, ConfigOverrides, DbStore, EventHub, ServeArgs,
    ServerConfig, router,
};
use tracing::{info, instrument, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,drones_game=debug,drones_server=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve(args) => run_server(args).await,
        Command::Migrate {
            database_url,
            config,
        } => {
            let overrides = ConfigOverrides::new(None, None, database_url, None);
            let config = ServerConfig::resolve(config.as_deref(), &overrides)?;
            migrate(ArenaRepository::new(config.database_url().clone())).await?;
            Ok(())
        }
    }
}

/// Applies pending migrations on the blocking pool.
#[instrument(skip(repo), fields(db = %repo.db_path()))]
async fn migrate(repo: ArenaRepository) -> Result<ArenaRepository> {
    let repo = tokio::task::spawn_blocking(move || repo.run_migrations().map(|_| repo))
        .await
        .context("Migration task panicked")??;
    info!("Database ready");
    Ok(repo)
}

/// Run the HTTP + WebSocket server until Ctrl-C.
async fn run_server(args: ServeArgs) -> Result<()> {
    let config = ServerConfig::resolve(args.config.as_deref(), &ConfigOverrides::from(&args))?;

    let repo = migrate(ArenaRepository::new(config.database_url().clone())).await?;
    let state = AppState::assemble(
        Arc::new(DbStore::new(repo)),
        MatchLocks::new(config.lock_timeout()),
        EventHub::new(),
    );

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "Drone Duel listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
