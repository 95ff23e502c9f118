//! Waypoint coordinator daemon
//!
//! Headless server for shared trip-planning rooms. Opens the database,
//! binds the TCP coordinator, and runs until interrupted.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use waypoint_core::Database;
use waypoint_net::Server;

mod config;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting waypointd");

    if let Err(e) = run().await {
        tracing::error!("Fatal: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::Config::load()?;

    let db_path = config.database_path()?;
    tracing::info!(path = %db_path.display(), "Opening database");
    let db = Arc::new(Mutex::new(Database::open(&db_path)?));

    let server = Server::start(config.port, db, config.room_config()).await?;
    tracing::info!(addr = %server.addr(), "Coordinator ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupt received, shutting down");
    server.shutdown();

    Ok(())
}
