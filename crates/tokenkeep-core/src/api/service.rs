use async_trait::async_trait;

use crate::auth::{AccessToken, RefreshToken};
use crate::models::{AuthGrant, LoginRequest, RegisterRequest, User};

use super::ApiError;

/// The remote credential-issuing service.
///
/// The session state machine only cares whether a call failed; the
/// `ApiError` classification is carried through for callers that want to
/// show something more specific.
#[async_trait]
pub trait CredentialService: Send + Sync {
    /// Exchange an email/password pair for a token grant.
    async fn login(&self, request: &LoginRequest) -> Result<AuthGrant, ApiError>;

    /// Create an account. A successful registration also grants tokens.
    async fn register(&self, request: &RegisterRequest) -> Result<AuthGrant, ApiError>;

    /// Fetch the identity owning `token`. Fails when the token is expired or invalid.
    async fn fetch_profile(&self, token: &AccessToken) -> Result<User, ApiError>;

    /// Mint a new grant from a refresh token. The returned refresh token may differ.
    async fn refresh(&self, token: &RefreshToken) -> Result<AuthGrant, ApiError>;

    async fn change_password(
        &self,
        token: &AccessToken,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), ApiError>;
}
