//! Tenant provisioning: create/list operations, mint invite tokens.
//!
//! Creation and listing are gated by the process-wide provisioning key from
//! configuration — independent of any operation's own admin credential.
//! Invite generation is an admin-scoped operation instead.

use common::secret::ExposeSecret;
use common::types::{ConnectionId, OperationId};
use rand::RngCore;
use tracing::{debug, warn};

use crate::errors::OcError;
use crate::protocol::{ServerEvent, TenantInfo};
use crate::store::{OperationRecord, StoreError};

use super::coordinator::CoordinatorActor;

impl CoordinatorActor {
    /// Create an operation plus its default channels.
    pub(super) async fn handle_create_tenant(
        &mut self,
        connection_id: ConnectionId,
        key: &str,
        op_id: OperationId,
        password: &str,
    ) {
        if !self.provisioning_key_matches(key) {
            self.send_to(
                connection_id,
                ServerEvent::TenantCreated {
                    success: false,
                    msg: Some(OcError::Unauthorized.client_message()),
                    op_id: None,
                },
            );
            return;
        }

        // Stored hashed; the clear-text credential never touches the store.
        let hashed = match bcrypt::hash(password, self.settings.bcrypt_cost) {
            Ok(hashed) => hashed,
            Err(e) => {
                warn!(target: "oc.actor.provisioning", error = %e, "Password hashing failed");
                self.send_to(
                    connection_id,
                    ServerEvent::TenantCreated {
                        success: false,
                        msg: Some("An internal error occurred".to_string()),
                        op_id: None,
                    },
                );
                return;
            }
        };

        let record = OperationRecord {
            id: op_id.clone(),
            admin_password: hashed,
        };
        match self.store.insert_operation(record).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                self.send_to(
                    connection_id,
                    ServerEvent::TenantCreated {
                        success: false,
                        msg: Some("Operation already exists".to_string()),
                        op_id: Some(op_id),
                    },
                );
                return;
            }
            Err(e) => {
                warn!(target: "oc.actor.provisioning", error = %e, "Operation insert failed");
                self.send_to(
                    connection_id,
                    ServerEvent::TenantCreated {
                        success: false,
                        msg: Some(OcError::Store(e).client_message()),
                        op_id: None,
                    },
                );
                return;
            }
        }

        for name in self.settings.default_channels.clone() {
            if let Err(e) = self.store.insert_channel(&op_id, &name).await {
                warn!(target: "oc.actor.provisioning", error = %e, "Default channel insert failed");
            }
        }

        self.send_to(
            connection_id,
            ServerEvent::TenantCreated {
                success: true,
                msg: None,
                op_id: Some(op_id),
            },
        );
    }

    /// List every operation, with the credential column as stored (a bcrypt
    /// hash — see DESIGN.md on the deviation from clear-text listing).
    pub(super) async fn handle_list_tenants(&mut self, connection_id: ConnectionId, key: &str) {
        if !self.provisioning_key_matches(key) {
            // Wrong key on a read: dropped, not reported.
            warn!(
                target: "oc.actor.provisioning",
                connection_id = %connection_id,
                "list-tenants with bad provisioning key ignored"
            );
            return;
        }

        let operations = match self.store.list_operations().await {
            Ok(operations) => operations,
            Err(e) => {
                warn!(target: "oc.actor.provisioning", error = %e, "Operation list failed");
                return;
            }
        };

        let tenants = operations
            .into_iter()
            .map(|op| TenantInfo {
                id: op.id,
                password: op.admin_password,
            })
            .collect();
        self.send_to(connection_id, ServerEvent::TenantsList(tenants));
    }

    /// Mint an invite token for the calling admin's operation.
    ///
    /// Tokens have no expiry and single use is not enforced; they are
    /// capability tokens in the loosest sense (see DESIGN.md).
    pub(super) async fn handle_generate_invite(
        &mut self,
        connection_id: ConnectionId,
        op_id: OperationId,
    ) {
        match self.admin_operation(connection_id) {
            Some(bound) if bound == op_id => {}
            _ => {
                debug!(
                    target: "oc.actor.provisioning",
                    connection_id = %connection_id,
                    "generate-invite outside bound operation ignored"
                );
                return;
            }
        }

        let token = new_invite_token();
        if let Err(e) = self.store.insert_token(&token, &op_id).await {
            warn!(target: "oc.actor.provisioning", error = %e, "Token insert failed");
            return;
        }

        self.send_to(connection_id, ServerEvent::InviteGenerated { token, op_id });
    }

    fn provisioning_key_matches(&self, key: &str) -> bool {
        self.settings.provisioning_key.expose_secret() == key
    }
}

/// 128 bits of randomness, hex-encoded.
fn new_invite_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
