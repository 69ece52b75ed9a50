//! Product API

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use super::{run_blocking, AppState};
use crate::commands::products;
use crate::error::PosResult;
use crate::models::{CreateProduct, Product, UpdateProduct};

pub fn router() -> Router<AppState> {
    Router::new().nest("/api/products", routes())
}

fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(get_by_id).put(update))
        .route("/{id}/availability", post(toggle_availability))
}

/// GET /api/products
async fn list(State(state): State<AppState>) -> PosResult<Json<Vec<Product>>> {
    let products = run_blocking(&state, products::get_products).await?;
    Ok(Json(products))
}

/// GET /api/products/{id}
async fn get_by_id(State(state): State<AppState>, Path(id): Path<i64>) -> PosResult<Json<Product>> {
    let product = run_blocking(&state, move |db| products::get_product(db, id)).await?;
    Ok(Json(product))
}

/// POST /api/products
async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateProduct>,
) -> PosResult<(StatusCode, Json<Product>)> {
    let product = run_blocking(&state, move |db| products::create_product(db, payload)).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /api/products/{id}
async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateProduct>,
) -> PosResult<Json<Product>> {
    let product = run_blocking(&state, move |db| products::update_product(db, id, payload)).await?;
    Ok(Json(product))
}

/// POST /api/products/{id}/availability - flips the available flag
async fn toggle_availability(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> PosResult<Json<Product>> {
    let product = run_blocking(&state, move |db| products::toggle_availability(db, id)).await?;
    Ok(Json(product))
}
