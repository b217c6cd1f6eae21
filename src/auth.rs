//! Control-surface authentication: a single bearer API key configured at
//! startup (`Config::api_key`). The scripting bridge, peer-facing JWTs, and
//! per-role tokens the teacher's gateway issued to publishers/subscribers
//! are all session-lifecycle concerns this crate doesn't own (SPEC_FULL.md
//! §1), so only the gate the teacher put in front of its admin routes
//! survives here.

use crate::error::ApiError;

/// Validate the `Authorization: Bearer <key>` header against the
/// configured API key.
pub fn require_api_key(headers: &axum::http::HeaderMap, expected: &str) -> Result<(), ApiError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(ApiError::auth_header_missing)?;

    let token = auth
        .strip_prefix("Bearer ")
        .ok_or_else(ApiError::auth_header_missing)?;

    if token == expected {
        Ok(())
    } else {
        Err(ApiError::api_key_invalid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_matching_bearer_token() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert("authorization", "Bearer secret123".parse().unwrap());
        assert!(require_api_key(&headers, "secret123").is_ok());
    }

    #[test]
    fn rejects_missing_header() {
        let headers = axum::http::HeaderMap::new();
        assert!(require_api_key(&headers, "secret123").is_err());
    }

    #[test]
    fn rejects_wrong_key() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert("authorization", "Bearer wrong".parse().unwrap());
        assert!(require_api_key(&headers, "secret123").is_err());
    }

    #[test]
    fn rejects_non_bearer_scheme() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert("authorization", "Basic secret123".parse().unwrap());
        assert!(require_api_key(&headers, "secret123").is_err());
    }
}
