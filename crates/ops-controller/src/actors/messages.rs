//! Message types for coordinator communication.
//!
//! The transport layer talks to the coordinator exclusively through these
//! messages over `tokio::sync::mpsc`; request-reply uses `tokio::sync::oneshot`.

use common::types::{ConnectionId, OperationId, UserId};
use tokio::sync::{mpsc, oneshot};

use crate::protocol::{ClientEvent, ServerEvent};
use crate::rooms::GroupKey;
use crate::session::Role;

/// Messages sent to the `CoordinatorActor`.
#[derive(Debug)]
pub enum CoordinatorMessage {
    /// A transport connection was accepted.
    Connect {
        connection_id: ConnectionId,
        /// Outbound event channel for this connection.
        outbound: mpsc::Sender<ServerEvent>,
    },

    /// A transport connection was torn down. The only path that can take a
    /// unit offline.
    Disconnect { connection_id: ConnectionId },

    /// A decoded client event arrived on a connection.
    Event {
        connection_id: ConnectionId,
        event: ClientEvent,
    },

    /// Snapshot one connection's session state (tests, debugging).
    Inspect {
        connection_id: ConnectionId,
        respond_to: oneshot::Sender<Option<SessionSnapshot>>,
    },
}

/// Point-in-time view of one connection's binding and memberships.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub role: Role,
    pub operation: Option<OperationId>,
    pub user_id: Option<UserId>,
    pub groups: Vec<GroupKey>,
}
