//! Authentication module for managing sessions and persisted credentials.
//!
//! This module provides:
//! - `SessionManager`: the session state machine (hydration, login, refresh, logout)
//! - `TokenStore`: persistence contract for the token pair, with memory,
//!   file and OS keychain backends
//! - `AccessToken` / `RefreshToken`: opaque token types that never print their value

pub mod credentials;
pub mod error;
pub mod session;
pub mod store;
pub mod tokens;

pub use credentials::KeyringTokenStore;
pub use error::AuthError;
pub use session::{
    AccessDecision, AccessRequirement, Authenticated, Session, SessionManager, SessionPhase,
};
pub use store::{FileTokenStore, MemoryTokenStore, StorageKey, TokenStore};
pub use tokens::{AccessToken, RefreshToken};
