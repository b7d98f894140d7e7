// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Operator API key middleware for `/admin/*` routes.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Header carrying the operator key.
pub const OPERATOR_KEY_HEADER: &str = "x-operator-key";

/// Constant-time comparison of two secrets.
pub fn keys_match(presented: &str, expected: &str) -> bool {
    !expected.is_empty() && bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
}

/// Require the configured operator key.
pub async fn require_operator(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let presented = request
        .headers()
        .get(OPERATOR_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    if !keys_match(presented, &state.config.operator_api_key) {
        tracing::warn!(path = %request.uri().path(), "Rejected admin request: bad operator key");
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_match() {
        assert!(keys_match("s3cret", "s3cret"));
        assert!(!keys_match("s3cre", "s3cret"));
        assert!(!keys_match("", "s3cret"));
    }

    #[test]
    fn test_empty_expected_key_never_matches() {
        assert!(!keys_match("", ""));
    }
}
