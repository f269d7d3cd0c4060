//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports from the [`secrecy`] crate. Any struct holding one of these
//! gets safe `Debug` output for free — the wrapped value renders as
//! `[REDACTED]` — and the memory is zeroized on drop.
//!
//! Use `SecretString` for:
//! - the provisioning master key
//! - admin passwords in flight (they are bcrypt-hashed at rest)
//! - database connection URLs (they embed credentials)
//!
//! To read the actual value, call `expose_secret()` explicitly at the single
//! point of use; never store the exposed reference.

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
