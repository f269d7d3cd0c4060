//! Per-connection session state.
//!
//! A connection starts unbound and is bound exactly once, by a successful
//! admin login or unit join. The binding is held in the coordinator's keyed
//! registry — never attached ad hoc to the transport object — and its
//! tenant/role shape does not change for the life of the connection.

use common::types::{ConnectionId, OperationId, UserId};

/// Role a connection holds after authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    /// Connected but not yet authenticated.
    #[default]
    None,
    /// Operation admin (receives telemetry fan-out).
    Admin,
    /// Field unit (produces telemetry, joins channels).
    Unit,
}

/// What the coordinator knows about one live connection.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub connection_id: ConnectionId,
    pub role: Role,
    pub operation: Option<OperationId>,
    pub user_id: Option<UserId>,
}

impl SessionContext {
    /// A fresh, unbound session for a newly accepted connection.
    #[must_use]
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            role: Role::None,
            operation: None,
            user_id: None,
        }
    }

    /// Bind this connection as an admin of `operation`.
    ///
    /// Returns false (and leaves the session untouched) if the connection is
    /// already bound — a session authenticates once.
    pub fn bind_admin(&mut self, operation: OperationId) -> bool {
        if self.role != Role::None {
            return false;
        }
        self.role = Role::Admin;
        self.operation = Some(operation);
        true
    }

    /// Bind this connection as a field unit of `operation`.
    pub fn bind_unit(&mut self, operation: OperationId, user_id: UserId) -> bool {
        if self.role != Role::None {
            return false;
        }
        self.role = Role::Unit;
        self.operation = Some(operation);
        self.user_id = Some(user_id);
        true
    }

    /// Whether this connection authenticated into `operation`.
    ///
    /// The sole cross-tenant isolation check at the channel layer: a request
    /// naming any other operation must be silently ignored.
    #[must_use]
    pub fn is_bound_to(&self, operation: &OperationId) -> bool {
        self.operation.as_ref() == Some(operation)
    }
}
