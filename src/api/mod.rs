//! HTTP API
//!
//! Every resource module exposes a `router()` nested under `/api`. Handlers
//! hand the synchronous command functions to the blocking pool, so a slow
//! SQLite write never stalls the async runtime.

mod companies;
mod extract;
mod inventory;
mod orders;
mod payments;
mod products;
mod shifts;
mod tables;

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::db::Database;
use crate::error::{PosError, PosResult};

pub use extract::{USER_ID_HEADER, USER_ROLE_HEADER};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        AppState { db: Arc::new(db) }
    }
}

/// Runs a command on the blocking pool against the shared database.
pub(crate) async fn run_blocking<T, F>(state: &AppState, f: F) -> PosResult<T>
where
    F: FnOnce(&Database) -> PosResult<T> + Send + 'static,
    T: Send + 'static,
{
    let db = Arc::clone(&state.db);
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| PosError::Internal(format!("blocking task failed: {}", e)))?
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(products::router())
        .merge(tables::router())
        .merge(companies::router())
        .merge(orders::router())
        .merge(payments::router())
        .merge(shifts::router())
        .merge(inventory::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the API until Ctrl-C.
pub async fn serve(state: AppState, addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
}
