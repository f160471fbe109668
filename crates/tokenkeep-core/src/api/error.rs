use std::fmt;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Status classification of a service failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Unauthorized,
    Forbidden,
    NotFound,
    RateLimited,
    Server,
    Network,
    InvalidResponse,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Unauthorized => "unauthorized",
            FailureKind::Forbidden => "forbidden",
            FailureKind::NotFound => "not-found",
            FailureKind::RateLimited => "rate-limited",
            FailureKind::Server => "server-error",
            FailureKind::Network => "network-error",
            FailureKind::InvalidResponse => "invalid-response",
        };
        f.write_str(name)
    }
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error payload shape used by the service: `{"error", "code", "message"}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Prefer the server's human-readable message over the raw body.
    fn describe_body(body: &str) -> String {
        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message.or(b.error))
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| Self::truncate_body(body))
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = Self::describe_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized(message),
            403 => ApiError::AccessDenied(message),
            404 => ApiError::NotFound(message),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(message),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, message)),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ApiError::Unauthorized(_) => FailureKind::Unauthorized,
            ApiError::AccessDenied(_) => FailureKind::Forbidden,
            ApiError::NotFound(_) => FailureKind::NotFound,
            ApiError::RateLimited => FailureKind::RateLimited,
            ApiError::ServerError(_) => FailureKind::Server,
            ApiError::NetworkError(_) => FailureKind::Network,
            ApiError::InvalidResponse(_) => FailureKind::InvalidResponse,
        }
    }

    /// Human-readable text suitable for showing to the user.
    pub fn message(&self) -> &str {
        match self {
            ApiError::Unauthorized(m)
            | ApiError::AccessDenied(m)
            | ApiError::NotFound(m)
            | ApiError::ServerError(m)
            | ApiError::NetworkError(m)
            | ApiError::InvalidResponse(m) => m,
            ApiError::RateLimited => "Too many requests",
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else {
            ApiError::NetworkError(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_classification() {
        assert_eq!(ApiError::from_status(StatusCode::UNAUTHORIZED, "").kind(), FailureKind::Unauthorized);
        assert_eq!(ApiError::from_status(StatusCode::FORBIDDEN, "").kind(), FailureKind::Forbidden);
        assert_eq!(ApiError::from_status(StatusCode::NOT_FOUND, "").kind(), FailureKind::NotFound);
        assert_eq!(ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, "").kind(), FailureKind::RateLimited);
        assert_eq!(ApiError::from_status(StatusCode::BAD_GATEWAY, "").kind(), FailureKind::Server);
        assert_eq!(ApiError::from_status(StatusCode::CONFLICT, "").kind(), FailureKind::InvalidResponse);
    }

    #[test]
    fn test_from_status_prefers_server_message() {
        let body = r#"{"error": "Invalid email or password", "code": "INVALID_CREDENTIALS", "message": "Check your login details"}"#;
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, body);
        assert_eq!(err.message(), "Check your login details");
    }

    #[test]
    fn test_from_status_falls_back_to_error_field() {
        let body = r#"{"error": "Account disabled"}"#;
        let err = ApiError::from_status(StatusCode::FORBIDDEN, body);
        assert_eq!(err, ApiError::AccessDenied("Account disabled".to_string()));
    }

    #[test]
    fn test_from_status_truncates_raw_body() {
        let body = "x".repeat(MAX_ERROR_BODY_LENGTH + 20);
        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, &body);
        assert!(err.message().contains("truncated"));
        assert!(err.message().len() < body.len() + 40);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let body = "é".repeat(MAX_ERROR_BODY_LENGTH);
        let truncated = ApiError::truncate_body(&body);
        assert!(truncated.contains("truncated"));
    }
}
