//! Web server module.

mod handlers;

pub use handlers::*;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::config::ConfigManager;
use crate::db::Store;
use crate::scheduler::Scheduler;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConfigManager>,
    pub store: Arc<Store>,
    pub scheduler: Arc<Scheduler>,
}

/// Web server for pingwatch.
pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(config: Arc<ConfigManager>, store: Arc<Store>, scheduler: Arc<Scheduler>) -> Self {
        Self {
            state: AppState {
                config,
                store,
                scheduler,
            },
        }
    }

    fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            .route("/", get(handlers::handle_dashboard))
            .route("/api/targets", get(handlers::handle_targets))
            .route("/api/ping-data", get(handlers::handle_ping_data))
            .route("/api/config", get(handlers::handle_config))
            .route("/api/status", get(handlers::handle_status))
            .layer(cors)
            .with_state(self.state.clone())
    }

    /// Serve on the configured port, for the process lifetime.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // Validation clamps the port into u16 range at load time.
        let port = self.state.config.get().web_port as u16;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let router = self.routes();

        tracing::info!("web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
