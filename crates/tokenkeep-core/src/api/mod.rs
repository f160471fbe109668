//! Credential service client module.
//!
//! `CredentialService` is the contract the session state machine consumes;
//! `ApiClient` implements it over HTTP with bearer token authentication.
//! Failures are reported as `ApiError`, a closed set of status classes
//! each carrying a human-readable message.

pub mod client;
pub mod error;
pub mod service;

pub use client::ApiClient;
pub use error::{ApiError, FailureKind};
pub use service::CredentialService;
