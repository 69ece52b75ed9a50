//! Company and credit line API

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};

use super::{run_blocking, AppState};
use crate::commands::companies;
use crate::error::PosResult;
use crate::models::{Company, CreateCompany, ReleaseCredit, UpdateCreditLine};

pub fn router() -> Router<AppState> {
    Router::new().nest("/api/companies", routes())
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_by_id))
        .route("/{id}/credit", put(update_credit_line))
        .route("/{id}/release", post(release_credit))
}

/// GET /api/companies
async fn list(State(state): State<AppState>) -> PosResult<Json<Vec<Company>>> {
    let companies = run_blocking(&state, companies::get_companies).await?;
    Ok(Json(companies))
}

/// GET /api/companies/{id}
async fn get_by_id(State(state): State<AppState>, Path(id): Path<i64>) -> PosResult<Json<Company>> {
    let company = run_blocking(&state, move |db| companies::get_company(db, id)).await?;
    Ok(Json(company))
}

/// POST /api/companies
async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateCompany>,
) -> PosResult<(StatusCode, Json<Company>)> {
    let company = run_blocking(&state, move |db| companies::create_company(db, payload)).await?;
    Ok((StatusCode::CREATED, Json(company)))
}

/// PUT /api/companies/{id}/credit
async fn update_credit_line(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCreditLine>,
) -> PosResult<Json<Company>> {
    let company =
        run_blocking(&state, move |db| companies::update_credit_line(db, id, payload)).await?;
    Ok(Json(company))
}

/// POST /api/companies/{id}/release - repayment against used credit
async fn release_credit(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<ReleaseCredit>,
) -> PosResult<Json<Company>> {
    let company =
        run_blocking(&state, move |db| companies::release_credit(db, id, payload.amount)).await?;
    Ok(Json(company))
}
