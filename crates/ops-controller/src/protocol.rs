//! Wire protocol for the WebSocket transport.
//!
//! One JSON text frame per event, enveloped as `{"event": ..., "data": ...}`.
//! Event names are kebab-case, payload fields camelCase — the catalog the
//! admin console and field clients already speak. Serde's adjacent tagging
//! produces the envelope directly from the two enums below.
//!
//! Negotiation payloads (`offer`/`answer`/`candidate`) are opaque: the relay
//! never inspects them, so they stay as raw [`serde_json::Value`].

use common::types::{ConnectionId, OperationId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::store::{UnitRecord, UnitStatus};

/// Events a client sends to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    /// Authenticate as an operation admin.
    LoginAdmin { op_id: OperationId, password: String },

    /// Provision a new operation (gated by the provisioning key).
    CreateTenant {
        key: String,
        op_id: OperationId,
        password: String,
    },

    /// List all operations (gated by the provisioning key).
    ListTenants { key: String },

    /// Generate an invite token for an operation (admin only).
    GenerateInvite { op_id: OperationId },

    /// Add a channel to the admin's bound operation.
    AddChannel { channel_name: String },

    /// Remove a channel from the admin's bound operation.
    RemoveChannel { channel_name: String },

    /// Join an operation as a field unit.
    JoinOperation {
        op_id: OperationId,
        token: String,
        user_id: UserId,
        call_sign: String,
    },

    /// Tune in to a channel of the operation this connection is bound to.
    JoinChannel {
        op_id: OperationId,
        channel_name: String,
    },

    /// Register a field unit (durable record, keyed by stable id).
    RegisterUnit { id: UserId, call_sign: String },

    /// Report a location fix for a field unit.
    UpdateLocation {
        id: UserId,
        lat: f64,
        lng: f64,
        call_sign: String,
    },

    /// Relay a connection-negotiation offer to one target connection.
    Offer { target: ConnectionId, payload: Value },

    /// Relay a connection-negotiation answer to one target connection.
    Answer { target: ConnectionId, payload: Value },

    /// Relay a connection-negotiation candidate to one target connection.
    Candidate { target: ConnectionId, payload: Value },
}

/// Events the server sends to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// First event on every connection: tells the client its connection id
    /// (used as the `target` of negotiation messages).
    Ready { connection_id: ConnectionId },

    /// Admin login succeeded.
    AdminAuthenticated {
        success: bool,
        op_id: OperationId,
        channels: Vec<String>,
    },

    /// Admin login failed. Missing operation and wrong password are reported
    /// identically so operation ids cannot be enumerated.
    AdminAuthError(String),

    /// Outcome of a create-tenant request.
    TenantCreated {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        msg: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        op_id: Option<OperationId>,
    },

    /// All provisioned operations.
    TenantsList(Vec<TenantInfo>),

    /// A freshly minted invite token.
    InviteGenerated {
        token: String,
        op_id: OperationId,
    },

    /// The channel list of an operation changed (sent to its admins).
    ChannelsUpdated(Vec<String>),

    /// Current operation configuration (sent to all operation members).
    OperationConfig {
        op_id: OperationId,
        channels: Vec<String>,
    },

    /// A join-operation request was rejected.
    JoinError(String),

    /// Full per-unit snapshot for an operation, keyed by connection id.
    ActiveUnitsList(HashMap<ConnectionId, UnitSnapshot>),

    /// Incremental: a unit registered (or re-registered).
    RegisterUnit(UnitSnapshot),

    /// Incremental: a unit reported a location fix.
    UpdateLocation(UnitSnapshot),

    /// A peer connection joined a channel this connection is tuned to.
    UserConnected(ConnectionId),

    /// A unit's connection went away.
    UserDisconnected(ConnectionId),

    /// Relayed negotiation offer, annotated with the sender's connection id.
    Offer { payload: Value, caller: ConnectionId },

    /// Relayed negotiation answer.
    Answer { payload: Value, caller: ConnectionId },

    /// Relayed negotiation candidate.
    Candidate { payload: Value, caller: ConnectionId },
}

/// One row of the tenants list.
///
/// `password` carries the credential column as stored — a bcrypt hash, not
/// clear text (see DESIGN.md on credential storage).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantInfo {
    pub id: OperationId,
    pub password: String,
}

/// Normalized telemetry view of one unit.
///
/// The same shape backs the full snapshot and both incremental events, so an
/// admin-side consumer can merge all three into one per-unit view keyed by
/// connection id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitSnapshot {
    pub id: UserId,
    pub call_sign: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<ConnectionId>,
    pub status: UnitStatus,
    pub lat: f64,
    pub lng: f64,
    pub last_seen: chrono::DateTime<chrono::Utc>,
}

impl From<&UnitRecord> for UnitSnapshot {
    fn from(unit: &UnitRecord) -> Self {
        Self {
            id: unit.id.clone(),
            call_sign: unit.call_sign.clone(),
            connection_id: unit.connection_id,
            status: unit.status,
            lat: unit.lat,
            lng: unit.lng,
            last_seen: unit.last_seen,
        }
    }
}
