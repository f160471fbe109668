use std::fmt;

use serde::{Deserialize, Serialize};

use crate::auth::{AccessToken, RefreshToken};

use super::User;

/// Credentials for `POST auth/login`. The account email is the identifier.
#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Profile for `POST auth/register`.
#[derive(Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Token pair plus identity, as returned by login, register and refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthGrant {
    pub token: AccessToken,
    pub refresh_token: RefreshToken,
    pub user: User,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_debug_hides_password() {
        let login = LoginRequest::new("a@b.com", "pw123456");
        let debug = format!("{:?}", login);
        assert!(debug.contains("a@b.com"));
        assert!(!debug.contains("pw123456"));

        let register = RegisterRequest::new("alice", "a@b.com", "pw123456");
        assert!(!format!("{:?}", register).contains("pw123456"));
    }

    #[test]
    fn test_login_request_wire_shape() {
        let login = LoginRequest::new("a@b.com", "pw123456");
        let json = serde_json::to_value(&login).unwrap();
        assert_eq!(json, serde_json::json!({"email": "a@b.com", "password": "pw123456"}));
    }

    #[test]
    fn test_parse_auth_grant() {
        let json = r#"{"token": "T1", "refresh_token": "R1", "user": {"id": "u1",
            "username": "alice", "email": "a@b.com", "role": "user",
            "created_at": "2024-05-01T10:00:00Z", "updated_at": "2024-05-01T10:00:00Z"}}"#;
        let grant: AuthGrant = serde_json::from_str(json).unwrap();
        assert_eq!(grant.token.as_str(), "T1");
        assert_eq!(grant.refresh_token.as_str(), "R1");
        assert_eq!(grant.user.id, "u1");
    }
}
