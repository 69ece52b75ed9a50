//! Dining table API

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};

use super::{run_blocking, AppState};
use crate::commands::tables;
use crate::error::PosResult;
use crate::models::{CreateTable, DiningTable};

pub fn router() -> Router<AppState> {
    Router::new().nest("/api/tables", Router::new().route("/", get(list).post(create)))
}

/// GET /api/tables
async fn list(State(state): State<AppState>) -> PosResult<Json<Vec<DiningTable>>> {
    let tables = run_blocking(&state, tables::get_tables).await?;
    Ok(Json(tables))
}

/// POST /api/tables
async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateTable>,
) -> PosResult<(StatusCode, Json<DiningTable>)> {
    let table = run_blocking(&state, move |db| tables::create_table(db, payload)).await?;
    Ok((StatusCode::CREATED, Json(table)))
}
