use axum::{
    extract::FromRequestParts,
    http::{StatusCode, header, request::Parts},
};

use crate::handlers::AppState;

/// Extractor for the shared bearer token
///
/// Rejects with 401 when no bearer token is sent and 403 when it does not
/// match the configured one.
#[derive(Debug, Clone, Copy)]
pub struct RequireToken;

/// Bearer token from the Authorization header
pub fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

impl FromRequestParts<AppState> for RequireToken {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match bearer_token(parts) {
            None => Err((StatusCode::UNAUTHORIZED, "Authentication required")),
            Some(token) if token == state.token.as_ref() => Ok(RequireToken),
            Some(_) => {
                tracing::warn!("Rejected request with invalid token");
                Err((StatusCode::FORBIDDEN, "Invalid token"))
            }
        }
    }
}
