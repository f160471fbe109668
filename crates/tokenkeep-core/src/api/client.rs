//! HTTP client for the credential service.
//!
//! This module provides `ApiClient`, the `reqwest` implementation of
//! [`CredentialService`]. Endpoints are resolved against the configured
//! base URL (e.g. `http://localhost:8080/api`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::{AccessToken, RefreshToken};
use crate::config::Config;
use crate::models::{AuthGrant, LoginRequest, RegisterRequest, User};

use super::{ApiError, CredentialService};

// ============================================================================
// Constants
// ============================================================================

const LOGIN_PATH: &str = "auth/login";
const REGISTER_PATH: &str = "auth/register";
const PROFILE_PATH: &str = "auth/profile";
const REFRESH_PATH: &str = "auth/refresh";
const CHANGE_PASSWORD_PATH: &str = "auth/change-password";

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Serialize)]
struct RefreshBody<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Serialize)]
struct ChangePasswordBody<'a> {
    old_password: &'a str,
    new_password: &'a str,
}

/// API client for the credential service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::new(config.api_base_url.clone(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: Response) -> Result<Option<Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send a request, retrying with exponential backoff while rate limited.
    async fn execute<F>(&self, url: &str, build: F) -> Result<Response, ApiError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build().send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    /// Decode a success body. The service may wrap payloads as
    /// `{"success": true, "message": ..., "data": payload}`.
    async fn parse<T: DeserializeOwned>(response: Response, url: &str) -> Result<T, ApiError> {
        let text = response.text().await?;
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("{} from {}", e, url)))?;

        serde_json::from_value(unwrap_envelope(value))
            .map_err(|e| ApiError::InvalidResponse(format!("{} from {}", e, url)))
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
        token: Option<&AccessToken>,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path);
        debug!(url = %url, "POST");
        let response = self
            .execute(&url, || self.authorize(self.client.post(&url), token).json(body))
            .await?;
        Self::parse(response, &url).await
    }

    fn authorize(&self, request: RequestBuilder, token: Option<&AccessToken>) -> RequestBuilder {
        match token {
            Some(token) => request.bearer_auth(token.as_str()),
            None => request,
        }
    }
}

fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("success") && map.contains_key("data") => {
            map.remove("data").unwrap_or_default()
        }
        other => other,
    }
}

#[async_trait]
impl CredentialService for ApiClient {
    async fn login(&self, request: &LoginRequest) -> Result<AuthGrant, ApiError> {
        self.post(LOGIN_PATH, request, None).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthGrant, ApiError> {
        self.post(REGISTER_PATH, request, None).await
    }

    async fn fetch_profile(&self, token: &AccessToken) -> Result<User, ApiError> {
        let url = self.endpoint(PROFILE_PATH);
        debug!(url = %url, "GET");
        let response = self
            .execute(&url, || self.client.get(&url).bearer_auth(token.as_str()))
            .await?;
        Self::parse(response, &url).await
    }

    async fn refresh(&self, token: &RefreshToken) -> Result<AuthGrant, ApiError> {
        let body = RefreshBody {
            refresh_token: token.as_str(),
        };
        self.post(REFRESH_PATH, &body, None).await
    }

    async fn change_password(
        &self,
        token: &AccessToken,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        let url = self.endpoint(CHANGE_PASSWORD_PATH);
        let body = ChangePasswordBody {
            old_password,
            new_password,
        };
        debug!(url = %url, "POST");
        // Only the status matters; the body is a bare acknowledgement.
        self.execute(&url, || self.client.post(&url).bearer_auth(token.as_str()).json(&body))
            .await?;
        Ok(())
    }
}
