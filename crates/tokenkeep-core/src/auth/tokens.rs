//! Opaque credential newtypes.
//!
//! Both token types hide their value in `Debug` output so they can be
//! carried through `tracing` fields and error messages without leaking.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Short-lived credential sent as a bearer token on authenticated requests.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token value, for authorization headers and persistence only.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccessToken").field(&"[REDACTED]").finish()
    }
}

/// Longer-lived credential used only to mint a new access token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefreshToken(String);

impl RefreshToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token value, for refresh requests and persistence only.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RefreshToken").field(&"[REDACTED]").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_hides_value_in_debug() {
        let token = AccessToken::new("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("eyJ"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_refresh_token_hides_value_in_debug() {
        let token = RefreshToken::new("refresh_value");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("refresh_value"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_tokens_serialize_as_plain_strings() {
        let json = serde_json::to_string(&AccessToken::new("T1")).unwrap();
        assert_eq!(json, "\"T1\"");
        let parsed: RefreshToken = serde_json::from_str("\"R1\"").unwrap();
        assert_eq!(parsed.as_str(), "R1");
    }
}
