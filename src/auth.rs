// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Harbor Systems

//! Bearer-token authentication for the `/v1` API surface.
//!
//! When `API_TOKEN` is configured, every request must carry
//! `Authorization: Bearer <token>`. Tokens are compared constant-time over
//! SHA-256 digests. With no token configured the middleware is a pass-through
//! (development mode).

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.config.api_token.as_deref() else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer);

    match provided {
        Some(token) if token_matches(&token, expected) => next.run(request).await,
        Some(_) => {
            tracing::warn!("request with invalid bearer token rejected");
            ApiError::new(StatusCode::FORBIDDEN, "Forbidden").into_response()
        }
        None => {
            tracing::warn!("request without bearer token rejected");
            ApiError::new(StatusCode::FORBIDDEN, "Forbidden").into_response()
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
fn parse_bearer(header: &str) -> Option<String> {
    let mut fields = header.split_whitespace();
    if !fields.next()?.eq_ignore_ascii_case("bearer") {
        return None;
    }
    fields.next().map(|token| token.to_string())
}

/// Constant-time comparison over digests, so the comparison cost does not
/// depend on how much of the token matched.
fn token_matches(provided: &str, expected: &str) -> bool {
    let provided_hash = Sha256::digest(provided.as_bytes());
    let expected_hash = Sha256::digest(expected.as_bytes());
    ring::constant_time::verify_slices_are_equal(&provided_hash, &expected_hash).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bearer_extracts_tokens() {
        assert_eq!(parse_bearer("Bearer abc123"), Some("abc123".to_string()));
        assert_eq!(parse_bearer("bearer abc123"), Some("abc123".to_string()));
        assert_eq!(parse_bearer("Basic dXNlcg=="), None);
        assert_eq!(parse_bearer("Bearer"), None);
        assert_eq!(parse_bearer(""), None);
    }

    #[test]
    fn token_matches_is_exact() {
        assert!(token_matches("secret", "secret"));
        assert!(!token_matches("secret", "Secret"));
        assert!(!token_matches("secre", "secret"));
        assert!(!token_matches("", "secret"));
    }
}
