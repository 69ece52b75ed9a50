//! Cash shift API

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use super::{run_blocking, AppState};
use crate::commands::shifts;
use crate::error::PosResult;
use crate::models::{Caller, CashShift, CloseShift, OpenShift, ShiftSummary};

pub fn router() -> Router<AppState> {
    Router::new().nest("/api/shifts", routes())
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/open", post(open))
        .route("/close", post(close))
        .route("/current", get(current))
        .route("/{id}/summary", get(summary))
}

/// POST /api/shifts/open
async fn open(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<OpenShift>,
) -> PosResult<(StatusCode, Json<CashShift>)> {
    let shift = run_blocking(&state, move |db| {
        shifts::open_shift(db, &caller, payload.opening_float)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(shift)))
}

/// POST /api/shifts/close
async fn close(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<CloseShift>,
) -> PosResult<Json<CashShift>> {
    let shift = run_blocking(&state, move |db| shifts::close_shift(db, &caller, payload)).await?;
    Ok(Json(shift))
}

/// GET /api/shifts/current - `null` when the caller has no open shift
async fn current(
    State(state): State<AppState>,
    caller: Caller,
) -> PosResult<Json<Option<CashShift>>> {
    let shift = run_blocking(&state, move |db| shifts::get_open_shift(db, &caller)).await?;
    Ok(Json(shift))
}

/// GET /api/shifts/{id}/summary
async fn summary(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> PosResult<Json<ShiftSummary>> {
    let summary = run_blocking(&state, move |db| shifts::get_shift_summary(db, id)).await?;
    Ok(Json(summary))
}
