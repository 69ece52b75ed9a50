//! Error taxonomy for the order pipeline.
//!
//! | Category | Variants | HTTP |
//! |----------|----------|------|
//! | Identity | `Unauthorized` | 401 |
//! | Validation | `InvalidInput` | 400 |
//! | Not found | `*NotFound` | 404 |
//! | Conflict | `TableOccupied`, `OrderAlreadyClosed`, duplicates, ... | 409 |
//! | Business rule | stock, credit, over-payment, shift | 422 |
//! | System | `Database`, `Internal` | 500 |
//!
//! Every operation is all-or-nothing, so an error always means no state
//! changed.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::money::Money;

pub type PosResult<T> = Result<T, PosError>;

#[derive(Debug, thiserror::Error)]
pub enum PosError {
    // ========== Validation ==========
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // ========== Not found ==========
    #[error("Table {0} not found")]
    TableNotFound(i64),

    #[error("Product {0} not found")]
    ProductNotFound(i64),

    #[error("Company {0} not found")]
    CompanyNotFound(i64),

    #[error("Order {0} not found")]
    OrderNotFound(i64),

    #[error("Shift {0} not found")]
    ShiftNotFound(i64),

    // ========== Conflicts ==========
    #[error("Table {label} is already occupied")]
    TableOccupied { table_id: i64, label: String },

    #[error("Table label {0} already exists")]
    DuplicateTable(String),

    #[error("A company with tax id {0} already exists")]
    DuplicateTaxId(String),

    #[error("Order {0} is already closed")]
    OrderAlreadyClosed(i64),

    #[error("Order {0} is cancelled")]
    OrderCancelled(i64),

    #[error("Order {order_id} already has payments totalling {paid}")]
    OrderHasPayments { order_id: i64, paid: Money },

    #[error("Cashier {cashier_id} already has open shift {shift_id}")]
    ShiftAlreadyOpen { cashier_id: i64, shift_id: i64 },

    // ========== Business rules ==========
    #[error("Product {name} is not available")]
    ProductUnavailable { product_id: i64, name: String },

    #[error("Insufficient stock for {name}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: i64,
        name: String,
        requested: i64,
        available: i64,
    },

    #[error("Company {company_id} has no active credit line")]
    CreditDisabled { company_id: i64 },

    #[error("Insufficient credit for company {company_id}: available {available}, requested {requested}")]
    CreditExceeded {
        company_id: i64,
        available: Money,
        requested: Money,
    },

    #[error("Payment of {attempted} exceeds outstanding balance {outstanding} on order {order_id}")]
    OverPayment {
        order_id: i64,
        outstanding: Money,
        attempted: Money,
    },

    #[error("Cashier {0} has no open shift")]
    NoOpenShift(i64),

    // ========== System ==========
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PosError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        PosError::InvalidInput(msg.into())
    }

    /// Stable machine-readable kind, used in response bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PosError::InvalidInput(_) => "INVALID_INPUT",
            PosError::Unauthorized(_) => "UNAUTHORIZED",
            PosError::TableNotFound(_) => "TABLE_NOT_FOUND",
            PosError::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            PosError::CompanyNotFound(_) => "COMPANY_NOT_FOUND",
            PosError::OrderNotFound(_) => "ORDER_NOT_FOUND",
            PosError::ShiftNotFound(_) => "SHIFT_NOT_FOUND",
            PosError::TableOccupied { .. } => "TABLE_OCCUPIED",
            PosError::DuplicateTable(_) => "DUPLICATE_TABLE",
            PosError::DuplicateTaxId(_) => "DUPLICATE_TAX_ID",
            PosError::OrderAlreadyClosed(_) => "ORDER_ALREADY_CLOSED",
            PosError::OrderCancelled(_) => "ORDER_CANCELLED",
            PosError::OrderHasPayments { .. } => "ORDER_HAS_PAYMENTS",
            PosError::ShiftAlreadyOpen { .. } => "SHIFT_ALREADY_OPEN",
            PosError::ProductUnavailable { .. } => "PRODUCT_UNAVAILABLE",
            PosError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            PosError::CreditDisabled { .. } => "CREDIT_DISABLED",
            PosError::CreditExceeded { .. } => "CREDIT_EXCEEDED",
            PosError::OverPayment { .. } => "OVER_PAYMENT",
            PosError::NoOpenShift(_) => "NO_OPEN_SHIFT",
            PosError::Database(_) => "DATABASE",
            PosError::Internal(_) => "INTERNAL",
        }
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            PosError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "E0001"),
            PosError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "E0002"),

            PosError::TableNotFound(_)
            | PosError::ProductNotFound(_)
            | PosError::CompanyNotFound(_)
            | PosError::OrderNotFound(_)
            | PosError::ShiftNotFound(_) => (StatusCode::NOT_FOUND, "E0003"),

            PosError::TableOccupied { .. }
            | PosError::DuplicateTable(_)
            | PosError::DuplicateTaxId(_)
            | PosError::OrderAlreadyClosed(_)
            | PosError::OrderCancelled(_)
            | PosError::OrderHasPayments { .. }
            | PosError::ShiftAlreadyOpen { .. } => (StatusCode::CONFLICT, "E0004"),

            PosError::ProductUnavailable { .. }
            | PosError::InsufficientStock { .. }
            | PosError::CreditDisabled { .. }
            | PosError::CreditExceeded { .. }
            | PosError::OverPayment { .. }
            | PosError::NoOpenShift(_) => (StatusCode::UNPROCESSABLE_ENTITY, "E0005"),

            PosError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "E9002"),
            PosError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "E9001"),
        }
    }
}

/// Response body for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub kind: &'static str,
    pub message: String,
}

impl IntoResponse for PosError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match &self {
            PosError::Database(e) => {
                error!(target: "database", error = %e, "Database error occurred");
                "Database error".to_string()
            }
            PosError::Internal(msg) => {
                error!(target: "internal", error = %msg, "Internal error occurred");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            code,
            kind: self.kind(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
