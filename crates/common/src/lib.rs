//! Shared foundation for Operations Controller components.
//!
//! - [`secret`] - wrappers for sensitive values (provisioning key, admin
//!   passwords, database URLs) that redact on Debug and zeroize on drop
//! - [`types`] - strongly-typed identifiers used across the session relay

pub mod secret;
pub mod types;
