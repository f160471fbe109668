//! Data models exchanged with the credential service.
//!
//! - `User`, `Role`: the identity record attached to a session
//! - `ProfileUpdate`: partial identity fields for local edits
//! - `LoginRequest`, `RegisterRequest`, `AuthGrant`: request and grant shapes

pub mod auth;
pub mod user;

pub use auth::{AuthGrant, LoginRequest, RegisterRequest};
pub use user::{ProfileUpdate, Role, User};
