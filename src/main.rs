//! pingwatch - continuous network latency monitor.
//!
//! Periodically pings a configurable set of addresses, stores the results
//! in SQLite, and serves them over HTTP for visualization.

mod config;
mod db;
mod probe;
mod registry;
mod scheduler;
mod web;

use std::sync::Arc;

use config::{ConfigManager, Settings};
use db::Store;
use scheduler::Scheduler;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use web::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pingwatch=info".parse()?),
        )
        .init();

    let settings = Settings::load();
    tracing::info!("starting pingwatch");
    tracing::info!("config file: {}", settings.config_path.display());
    tracing::info!("database: {}", settings.db_path);

    let config = Arc::new(ConfigManager::new(&settings.config_path));
    config.load()?;

    let cfg = config.get();
    tracing::info!(
        "ping interval: {}s, {} attempts per probe, web port {}",
        cfg.ping_interval,
        cfg.ping_count,
        cfg.web_port
    );

    let store = Arc::new(Store::new(&settings.db_path)?);

    let scheduler = Arc::new(Scheduler::new(store.clone(), config.clone()));
    scheduler.clone().start().await?;

    let server = Server::new(config, store, scheduler);
    server.start().await?;

    Ok(())
}
