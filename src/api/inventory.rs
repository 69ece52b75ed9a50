//! Inventory (kardex) API

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use super::{run_blocking, AppState};
use crate::commands::inventory;
use crate::error::PosResult;
use crate::models::{AdjustInventory, InventoryMovement, StockReconciliation};

pub fn router() -> Router<AppState> {
    Router::new().nest("/api/inventory", routes())
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/movements", post(record_movement))
        .route("/products/{id}/movements", get(movements))
        .route("/products/{id}/reconcile", get(reconcile))
}

/// POST /api/inventory/movements
async fn record_movement(
    State(state): State<AppState>,
    Json(payload): Json<AdjustInventory>,
) -> PosResult<(StatusCode, Json<InventoryMovement>)> {
    let movement = run_blocking(&state, move |db| inventory::adjust_inventory(db, payload)).await?;
    Ok((StatusCode::CREATED, Json(movement)))
}

/// GET /api/inventory/products/{id}/movements
async fn movements(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> PosResult<Json<Vec<InventoryMovement>>> {
    let movements = run_blocking(&state, move |db| inventory::get_movements(db, id)).await?;
    Ok(Json(movements))
}

/// GET /api/inventory/products/{id}/reconcile
async fn reconcile(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> PosResult<Json<StockReconciliation>> {
    let result = run_blocking(&state, move |db| inventory::reconcile_stock(db, id)).await?;
    Ok(Json(result))
}
