//! tokenkeep core library.
//!
//! Client-side session management for token-based authentication: a
//! session state machine that acquires, persists, validates, refreshes and
//! invalidates an access/refresh token pair together with the user identity.
//!
//! - `api`: the credential service contract and its HTTP client
//! - `auth`: the session state machine and token stores
//! - `models`: identity and request shapes
//! - `config`: service location and store selection

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, CredentialService, FailureKind};
pub use auth::{
    AccessDecision, AccessRequirement, AccessToken, AuthError, FileTokenStore, KeyringTokenStore,
    MemoryTokenStore, RefreshToken, Session, SessionManager, SessionPhase, StorageKey, TokenStore,
};
pub use config::{Config, StoreBackend};
pub use models::{AuthGrant, LoginRequest, ProfileUpdate, RegisterRequest, Role, User};
