//! Payment API

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};

use super::{run_blocking, AppState};
use crate::commands::payments;
use crate::error::PosResult;
use crate::models::{Caller, Payment, PaymentInput};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/payments", post(record))
}

/// POST /api/payments
async fn record(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<PaymentInput>,
) -> PosResult<(StatusCode, Json<Payment>)> {
    let payment =
        run_blocking(&state, move |db| payments::record_payment(db, &caller, payload)).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}
