use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::fmt;

// ─── PlaybackError ──────────────────────────────────────────────────────────

/// Internal failure modes of the parser, continuity engine, and scheduler.
///
/// Never crosses the control-surface boundary directly — `start_playing`
/// collapses it into a [`crate::control::ReturnCode`]; the demo HTTP
/// surface further maps that into an [`ApiError`] envelope.
#[derive(Debug)]
pub enum PlaybackError {
    /// The container could not be read at all (open/seek/read failure).
    Io(std::io::Error),
    /// A record tag was neither a legacy/modern header nor an `ME` frame.
    UnknownTag,
    /// The modern JSON info header was present but missing or malformed
    /// required fields (`t`, `c`, `s`, `u`).
    MalformedInfoHeader(String),
    /// Pass 2 produced zero RTP frame descriptors.
    EmptyIndex,
}

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error while parsing recording: {e}"),
            Self::UnknownTag => write!(f, "unrecognized record tag in container"),
            Self::MalformedInfoHeader(field) => {
                write!(f, "modern header JSON missing or malformed field '{field}'")
            }
            Self::EmptyIndex => write!(f, "recording produced no RTP frames"),
        }
    }
}

impl std::error::Error for PlaybackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PlaybackError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

// ─── JSON envelope (host HTTP surface) ─────────────────────────────────────

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    status: u16,
}

/// Structured API error that serializes to JSON.
///
/// ```json
/// {
///   "error": {
///     "code": "session_not_found",
///     "message": "Session 'abc123' does not exist.",
///     "status": 404
///   }
/// }
/// ```
pub struct ApiError {
    pub code: &'static str,
    pub message: String,
    pub status: StatusCode,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(
                code = self.code,
                status = self.status.as_u16(),
                "{}",
                self.message
            );
        } else if self.status.is_client_error() {
            tracing::warn!(
                code = self.code,
                status = self.status.as_u16(),
                "{}",
                self.message
            );
        }

        let envelope = ErrorEnvelope {
            error: ErrorBody {
                code: self.code,
                message: self.message,
                status: self.status.as_u16(),
            },
        };

        (self.status, Json(envelope)).into_response()
    }
}

impl From<StatusCode> for ApiError {
    fn from(status: StatusCode) -> Self {
        let code: &'static str = match status {
            StatusCode::BAD_REQUEST => "bad_request",
            StatusCode::UNAUTHORIZED => "unauthorized",
            StatusCode::NOT_FOUND => "not_found",
            StatusCode::CONFLICT => "conflict",
            StatusCode::INTERNAL_SERVER_ERROR => "internal_server_error",
            _ => "unknown_error",
        };

        let message = status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string();

        Self {
            code,
            message,
            status,
        }
    }
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self {
            code: "unauthorized",
            message: msg.into(),
            status: StatusCode::UNAUTHORIZED,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            code: "bad_request",
            message: msg.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            code: "internal_server_error",
            message: msg.into(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 401 — the `Authorization` header is missing or malformed.
    pub fn auth_header_missing() -> Self {
        Self {
            code: "auth_header_missing",
            message: "Authorization header is missing or malformed.".into(),
            status: StatusCode::UNAUTHORIZED,
        }
    }

    /// 401 — the API key is not recognized.
    pub fn api_key_invalid() -> Self {
        Self {
            code: "api_key_invalid",
            message: "The provided API key is not valid.".into(),
            status: StatusCode::UNAUTHORIZED,
        }
    }

    /// 404 — the requested playback session does not exist.
    pub fn session_not_found(session_id: &str) -> Self {
        Self {
            code: "session_not_found",
            message: format!("Session '{session_id}' does not exist."),
            status: StatusCode::NOT_FOUND,
        }
    }

    /// 422 — neither requested recording track could be parsed.
    pub fn invalid_recording(session_id: &str) -> Self {
        Self {
            code: "invalid_recording",
            message: format!("No playable track found for session '{session_id}'."),
            status: StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// 500 — the playout worker thread could not be spawned.
    pub fn thread_start_failed() -> Self {
        Self {
            code: "thread_start_failed",
            message: "Failed to spawn the playout worker thread.".into(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Map a [`crate::control::ReturnCode`] to an [`ApiError`] for the demo
    /// HTTP surface. `OK` has no error representation and is handled by the
    /// caller before reaching here.
    pub fn from_return_code(code: crate::control::ReturnCode, session_id: &str) -> Self {
        use crate::control::ReturnCode;
        match code {
            ReturnCode::Ok => Self::internal("from_return_code called with OK"),
            ReturnCode::WrongArgs => Self::bad_request(
                "provide either an audio path or both audio and video paths",
            ),
            ReturnCode::SessionNotFound => Self::session_not_found(session_id),
            ReturnCode::InvalidRecording => Self::invalid_recording(session_id),
            ReturnCode::ThreadStart => Self::thread_start_failed(),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_string(err: ApiError) -> String {
        let response = err.into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn json_structure() {
        let json = body_string(ApiError::session_not_found("abc123")).await;
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["error"]["code"], "session_not_found");
        assert_eq!(value["error"]["message"], "Session 'abc123' does not exist.");
        assert_eq!(value["error"]["status"], 404);
    }

    #[tokio::test]
    async fn status_code_is_set() {
        let response = ApiError::unauthorized("nope").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn playback_error_display() {
        let e = PlaybackError::MalformedInfoHeader("t".into());
        assert!(e.to_string().contains("'t'"));
    }

    #[test]
    fn return_code_mapping() {
        use crate::control::ReturnCode;
        let err = ApiError::from_return_code(ReturnCode::InvalidRecording, "sess-1");
        assert_eq!(err.code, "invalid_recording");
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
