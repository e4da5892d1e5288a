//! Caller identity.
//!
//! Authentication happens in front of this service; the verified user id arrives in
//! the `x-user-id` header.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::handlers::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller. Rejects the request with 401 when the header is
/// missing or blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerId(pub String);

impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| CallerId(v.to_string()))
            .ok_or_else(|| ApiError::Unauthenticated(format!("{USER_ID_HEADER} header is required")))
    }
}
