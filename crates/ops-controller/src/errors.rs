//! Operations Controller error types.
//!
//! No error here is fatal to the process: every failure is scoped to the one
//! requesting connection. Authorization failures (acting outside the bound
//! tenant) are not errors at all — handlers drop those on an explicit ignore
//! branch and nothing reaches the client.

use thiserror::Error;

use crate::store::StoreError;

/// Operations Controller error type.
#[derive(Debug, Error)]
pub enum OcError {
    /// Tenant credential rejected. Unknown operation and wrong password both
    /// land here so the reply cannot be used to enumerate operation ids.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Provisioning key rejected.
    #[error("unauthorized")]
    Unauthorized,

    /// Duplicate row (operation id already provisioned).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Tenant store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error (actor channel failures and the like).
    #[error("internal error: {0}")]
    Internal(String),
}

impl OcError {
    /// Client-safe message. Internal detail stays in the server logs.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            OcError::InvalidCredentials => "Invalid credentials".to_string(),
            OcError::Unauthorized => "Unauthorized".to_string(),
            OcError::Conflict(msg) => msg.clone(),
            OcError::NotFound(msg) => msg.clone(),
            OcError::Store(_) | OcError::Config(_) | OcError::Internal(_) => {
                "An internal error occurred".to_string()
            }
        }
    }
}
