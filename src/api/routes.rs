//! Router assembly and server lifecycle.

use std::sync::Arc;

use axum::{extract::State, response::Json, routing::get, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::error::ApiError;
use super::tasks as tasks_api;
use crate::config::Config;
use crate::store::SharedTaskStore;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Task store, opened once at startup and closed on shutdown
    pub store: SharedTaskStore,
}

impl AppState {
    pub fn new(config: Config, store: SharedTaskStore) -> Self {
        Self { config, store }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Number of stored tasks
    pub tasks: usize,
}

/// Build the application router.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .nest("/api/tasks", tasks_api::routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the store, start the HTTP server and close the store on shutdown.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let store: SharedTaskStore = Arc::new(config.database.open()?);
    let state = Arc::new(AppState::new(config.clone(), Arc::clone(&store)));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        sort = %config.default_sort,
        "Server listening on {}",
        addr
    );

    // Setup graceful shutdown on SIGTERM/SIGINT
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = store.close().await {
        tracing::warn!("Failed to close task store cleanly: {}", e);
    }

    Ok(())
}

/// GET /api/health - Liveness plus a task count.
async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, ApiError> {
    let tasks = state
        .store
        .count()
        .await
        .map_err(|e| ApiError::from_store(e, "Task store unavailable"))?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        tasks,
    }))
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections...");
}
