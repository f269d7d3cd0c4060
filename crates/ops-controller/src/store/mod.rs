//! Tenant store — the durable record of operations, channels, invite tokens,
//! and unit last-known-state.
//!
//! The coordinator talks to the store only through [`TenantStore`], which
//! expresses the exact query contract the relay needs (lookup-by-id, insert,
//! update, upsert, delete-by-match). Two implementations ship:
//!
//! - [`MemoryStore`] - in-process, used by tests and single-process
//!   deployments without a database
//! - [`PgStore`] - Postgres via sqlx, schema in `migrations/`
//!
//! Multi-step sequences (check-then-insert) are NOT transactional across
//! calls; a concurrent create race for the same operation id surfaces as
//! [`StoreError::Conflict`] from the insert, never as a crash.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::types::{ConnectionId, OperationId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Tenant store failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Uniqueness violated (duplicate operation id, duplicate channel name).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backing store could not be reached or rejected the query.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// One operation (tenant) row.
///
/// `admin_password` holds the bcrypt hash of the admin credential.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub id: OperationId,
    pub admin_password: String,
}

/// Unit lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    /// Registered, no location fix yet.
    WaitingForGps,
    /// Reporting locations.
    Active,
    /// Bound connection went away.
    Offline,
}

impl UnitStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::WaitingForGps => "WAITING_FOR_GPS",
            UnitStatus::Active => "ACTIVE",
            UnitStatus::Offline => "OFFLINE",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "WAITING_FOR_GPS" => Some(UnitStatus::WaitingForGps),
            "ACTIVE" => Some(UnitStatus::Active),
            "OFFLINE" => Some(UnitStatus::Offline),
            _ => None,
        }
    }
}

/// One unit row, keyed by the stable unit id (never by connection).
///
/// At most one non-offline connection binding exists per unit; a new
/// connection for the same unit supersedes the prior binding via upsert.
#[derive(Debug, Clone)]
pub struct UnitRecord {
    pub id: UserId,
    pub op_id: OperationId,
    pub call_sign: String,
    pub connection_id: Option<ConnectionId>,
    pub lat: f64,
    pub lng: f64,
    pub status: UnitStatus,
    pub last_seen: DateTime<Utc>,
}

/// Query contract between the coordinator and the tenant store.
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Look up one operation by id.
    async fn get_operation(&self, id: &OperationId)
        -> Result<Option<OperationRecord>, StoreError>;

    /// Insert a new operation. Duplicate id is a [`StoreError::Conflict`].
    async fn insert_operation(&self, operation: OperationRecord) -> Result<(), StoreError>;

    /// All provisioned operations.
    async fn list_operations(&self) -> Result<Vec<OperationRecord>, StoreError>;

    /// Channel names of an operation, in creation order.
    async fn channels(&self, op_id: &OperationId) -> Result<Vec<String>, StoreError>;

    /// Add a channel. Duplicate `(op, name)` is a [`StoreError::Conflict`].
    async fn insert_channel(&self, op_id: &OperationId, name: &str) -> Result<(), StoreError>;

    /// Remove a channel by match; removing an absent channel is a no-op.
    async fn delete_channel(&self, op_id: &OperationId, name: &str) -> Result<(), StoreError>;

    /// Record a new invite token for an operation.
    async fn insert_token(&self, token: &str, op_id: &OperationId) -> Result<(), StoreError>;

    /// Which operation a token was minted for, if any.
    async fn token_operation(&self, token: &str) -> Result<Option<OperationId>, StoreError>;

    /// Create-or-replace a unit row (last write wins).
    async fn upsert_unit(&self, unit: UnitRecord) -> Result<(), StoreError>;

    /// Look up one unit by its stable id.
    async fn get_unit(&self, id: &UserId) -> Result<Option<UnitRecord>, StoreError>;

    /// All units of an operation.
    async fn units_for_operation(&self, op_id: &OperationId)
        -> Result<Vec<UnitRecord>, StoreError>;

    /// Transition a unit to OFFLINE and clear its binding — but only if it is
    /// still bound to `connection_id`, so a stale connection's teardown never
    /// clobbers a fresh binding. Returns the updated row, or `None` if the
    /// guard did not match.
    async fn mark_unit_offline(
        &self,
        id: &UserId,
        connection_id: ConnectionId,
    ) -> Result<Option<UnitRecord>, StoreError>;
}
