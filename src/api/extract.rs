//! Caller identity extractor
//!
//! Authentication happens upstream; the gateway forwards the verified user
//! id and role as headers.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::PosError;
use crate::models::Caller;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

const DEFAULT_ROLE: &str = "cashier";

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = PosError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| PosError::Unauthorized(format!("missing {} header", USER_ID_HEADER)))?;

        let user_id = raw
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .ok_or_else(|| PosError::Unauthorized(format!("malformed {} header", USER_ID_HEADER)))?;

        let role = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_ROLE);

        Ok(Caller::new(user_id, role))
    }
}
