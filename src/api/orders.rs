//! Order API

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use super::{run_blocking, AppState};
use crate::commands::{orders, payments};
use crate::error::PosResult;
use crate::models::{CancelOrder, Caller, CreateOrder, OrderWithLines, Payment};

pub fn router() -> Router<AppState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create))
        .route("/open", get(list_open))
        .route("/{id}", get(get_by_id))
        .route("/{id}/cancel", post(cancel))
        .route("/{id}/payments", get(list_payments))
}

/// POST /api/orders
async fn create(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<CreateOrder>,
) -> PosResult<(StatusCode, Json<OrderWithLines>)> {
    let order = run_blocking(&state, move |db| orders::create_order(db, &caller, payload)).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/orders/open
async fn list_open(State(state): State<AppState>) -> PosResult<Json<Vec<OrderWithLines>>> {
    let orders = run_blocking(&state, orders::get_open_orders).await?;
    Ok(Json(orders))
}

/// GET /api/orders/{id}
async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> PosResult<Json<OrderWithLines>> {
    let order = run_blocking(&state, move |db| orders::get_order(db, id)).await?;
    Ok(Json(order))
}

/// POST /api/orders/{id}/cancel - the `{ "reason": ... }` body is optional
async fn cancel(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<i64>,
    payload: Option<Json<CancelOrder>>,
) -> PosResult<Json<OrderWithLines>> {
    let reason = payload.and_then(|Json(body)| body.reason);
    let order = run_blocking(&state, move |db| {
        orders::cancel_order(db, &caller, id, reason)
    })
    .await?;
    Ok(Json(order))
}

/// GET /api/orders/{id}/payments
async fn list_payments(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> PosResult<Json<Vec<Payment>>> {
    let payments = run_blocking(&state, move |db| payments::get_order_payments(db, id)).await?;
    Ok(Json(payments))
}
