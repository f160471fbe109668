use thiserror::Error;

use crate::api::{ApiError, FailureKind};

/// Failures surfaced by session operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Not authenticated - no session credentials available")]
    Unauthenticated,

    #[error(transparent)]
    Service(#[from] ApiError),

    #[error("Token storage failed: {0}")]
    Storage(String),
}

impl AuthError {
    /// Status class of a service failure, `None` for local failures.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            AuthError::Service(e) => Some(e.kind()),
            AuthError::Unauthenticated | AuthError::Storage(_) => None,
        }
    }

    /// Text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Service(e) => e.message().to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind() {
        let err = AuthError::from(ApiError::NetworkError("connection refused".to_string()));
        assert_eq!(err.failure_kind(), Some(FailureKind::Network));
        assert_eq!(AuthError::Unauthenticated.failure_kind(), None);
    }

    #[test]
    fn test_user_message_uses_server_text() {
        let err = AuthError::from(ApiError::Unauthorized("Check your login details".to_string()));
        assert_eq!(err.user_message(), "Check your login details");
        assert!(AuthError::Storage("disk full".to_string())
            .user_message()
            .contains("disk full"));
    }
}
