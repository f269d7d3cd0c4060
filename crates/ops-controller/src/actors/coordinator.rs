//! `CoordinatorActor` - owns all live-connection state.
//!
//! One entry per active transport connection: its session context, its group
//! memberships, and its outbound event channel. Every inbound client event is
//! dispatched here; every server event leaves through [`send_to`] or
//! [`broadcast`], both fire-and-forget (a slow or gone receiver loses the
//! message, it is never queued or retried).
//!
//! [`send_to`]: CoordinatorActor::send_to
//! [`broadcast`]: CoordinatorActor::broadcast

use common::secret::SecretString;
use common::types::{ConnectionId, OperationId, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::errors::OcError;
use crate::protocol::{ClientEvent, ServerEvent, UnitSnapshot};
use crate::rooms::{GroupKey, Rooms};
use crate::session::{Role, SessionContext};
use crate::store::TenantStore;

use super::messages::{CoordinatorMessage, SessionSnapshot};
use super::relay::NegotiationKind;

/// Channel buffer size for the coordinator mailbox.
const COORDINATOR_CHANNEL_BUFFER: usize = 500;

/// Tunables the coordinator needs from configuration.
#[derive(Clone)]
pub struct CoordinatorSettings {
    /// Shared secret gating tenant provisioning.
    pub provisioning_key: SecretString,
    /// bcrypt cost for admin password hashing.
    pub bcrypt_cost: u32,
    /// Channels created for every new operation.
    pub default_channels: Vec<String>,
}

impl From<&Config> for CoordinatorSettings {
    fn from(config: &Config) -> Self {
        Self {
            provisioning_key: config.provisioning_key.clone(),
            bcrypt_cost: config.bcrypt_cost,
            default_channels: config.default_channels.clone(),
        }
    }
}

/// Handle to the `CoordinatorActor`.
#[derive(Clone)]
pub struct CoordinatorHandle {
    sender: mpsc::Sender<CoordinatorMessage>,
    cancel_token: CancellationToken,
}

impl CoordinatorHandle {
    /// Register an accepted transport connection and its outbound channel.
    pub async fn connect(
        &self,
        connection_id: ConnectionId,
        outbound: mpsc::Sender<ServerEvent>,
    ) -> Result<(), OcError> {
        self.sender
            .send(CoordinatorMessage::Connect {
                connection_id,
                outbound,
            })
            .await
            .map_err(|e| OcError::Internal(format!("channel send failed: {e}")))
    }

    /// Notify of transport teardown for a connection.
    pub async fn disconnect(&self, connection_id: ConnectionId) -> Result<(), OcError> {
        self.sender
            .send(CoordinatorMessage::Disconnect { connection_id })
            .await
            .map_err(|e| OcError::Internal(format!("channel send failed: {e}")))
    }

    /// Dispatch a decoded client event.
    pub async fn event(
        &self,
        connection_id: ConnectionId,
        event: ClientEvent,
    ) -> Result<(), OcError> {
        self.sender
            .send(CoordinatorMessage::Event {
                connection_id,
                event,
            })
            .await
            .map_err(|e| OcError::Internal(format!("channel send failed: {e}")))
    }

    /// Snapshot one connection's session state.
    ///
    /// Also serves as a barrier in tests: the reply proves every previously
    /// sent message has been processed.
    pub async fn inspect(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Option<SessionSnapshot>, OcError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.sender
            .send(CoordinatorMessage::Inspect {
                connection_id,
                respond_to: tx,
            })
            .await
            .map_err(|e| OcError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| OcError::Internal(format!("response receive failed: {e}")))
    }

    /// Cancel the coordinator actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Get a child token for connection tasks.
    #[must_use]
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }
}

/// The `CoordinatorActor` implementation.
pub struct CoordinatorActor {
    /// Message receiver.
    receiver: mpsc::Receiver<CoordinatorMessage>,
    /// Cancellation token.
    cancel_token: CancellationToken,
    /// Durable tenant store.
    pub(super) store: Arc<dyn TenantStore>,
    /// Coordinator tunables.
    pub(super) settings: CoordinatorSettings,
    /// Session context per live connection.
    pub(super) sessions: HashMap<ConnectionId, SessionContext>,
    /// Outbound event channel per live connection.
    pub(super) outbound: HashMap<ConnectionId, mpsc::Sender<ServerEvent>>,
    /// Group membership index.
    pub(super) rooms: Rooms,
}

impl CoordinatorActor {
    /// Spawn the coordinator actor.
    ///
    /// Returns a handle and the task join handle.
    pub fn spawn(
        store: Arc<dyn TenantStore>,
        settings: CoordinatorSettings,
        cancel_token: CancellationToken,
    ) -> (CoordinatorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(COORDINATOR_CHANNEL_BUFFER);

        let actor = Self {
            receiver,
            cancel_token: cancel_token.clone(),
            store,
            settings,
            sessions: HashMap::new(),
            outbound: HashMap::new(),
            rooms: Rooms::new(),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = CoordinatorHandle {
            sender,
            cancel_token,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "oc.actor.coordinator")]
    async fn run(mut self) {
        info!(target: "oc.actor.coordinator", "CoordinatorActor started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "oc.actor.coordinator",
                        connections = self.sessions.len(),
                        "CoordinatorActor received cancellation signal"
                    );
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => self.handle_message(message).await,
                        None => {
                            info!(
                                target: "oc.actor.coordinator",
                                "CoordinatorActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(target: "oc.actor.coordinator", "CoordinatorActor stopped");
    }

    /// Handle a single message.
    async fn handle_message(&mut self, message: CoordinatorMessage) {
        match message {
            CoordinatorMessage::Connect {
                connection_id,
                outbound,
            } => {
                self.handle_connect(connection_id, outbound);
            }

            CoordinatorMessage::Disconnect { connection_id } => {
                self.handle_disconnect(connection_id).await;
            }

            CoordinatorMessage::Event {
                connection_id,
                event,
            } => {
                self.dispatch(connection_id, event).await;
            }

            CoordinatorMessage::Inspect {
                connection_id,
                respond_to,
            } => {
                let snapshot = self.sessions.get(&connection_id).map(|session| {
                    SessionSnapshot {
                        role: session.role,
                        operation: session.operation.clone(),
                        user_id: session.user_id.clone(),
                        groups: self.rooms.groups_of(connection_id),
                    }
                });
                let _ = respond_to.send(snapshot);
            }
        }
    }

    /// Route one client event to its handler.
    async fn dispatch(&mut self, connection_id: ConnectionId, event: ClientEvent) {
        match event {
            ClientEvent::LoginAdmin { op_id, password } => {
                self.handle_login_admin(connection_id, op_id, password).await;
            }
            ClientEvent::CreateTenant {
                key,
                op_id,
                password,
            } => {
                self.handle_create_tenant(connection_id, &key, op_id, &password)
                    .await;
            }
            ClientEvent::ListTenants { key } => {
                self.handle_list_tenants(connection_id, &key).await;
            }
            ClientEvent::GenerateInvite { op_id } => {
                self.handle_generate_invite(connection_id, op_id).await;
            }
            ClientEvent::AddChannel { channel_name } => {
                self.handle_add_channel(connection_id, &channel_name).await;
            }
            ClientEvent::RemoveChannel { channel_name } => {
                self.handle_remove_channel(connection_id, &channel_name).await;
            }
            ClientEvent::JoinOperation {
                op_id,
                token,
                user_id,
                call_sign,
            } => {
                self.handle_join_operation(connection_id, op_id, &token, user_id, call_sign)
                    .await;
            }
            ClientEvent::JoinChannel {
                op_id,
                channel_name,
            } => {
                self.handle_join_channel(connection_id, &op_id, channel_name);
            }
            ClientEvent::RegisterUnit { id, call_sign } => {
                self.handle_register_unit(connection_id, id, call_sign).await;
            }
            ClientEvent::UpdateLocation {
                id,
                lat,
                lng,
                call_sign,
            } => {
                self.handle_update_location(connection_id, id, lat, lng, call_sign)
                    .await;
            }
            ClientEvent::Offer { target, payload } => {
                self.handle_negotiation(connection_id, NegotiationKind::Offer, target, payload);
            }
            ClientEvent::Answer { target, payload } => {
                self.handle_negotiation(connection_id, NegotiationKind::Answer, target, payload);
            }
            ClientEvent::Candidate { target, payload } => {
                self.handle_negotiation(connection_id, NegotiationKind::Candidate, target, payload);
            }
        }
    }

    /// Register a new connection and tell the client its id.
    fn handle_connect(
        &mut self,
        connection_id: ConnectionId,
        outbound: mpsc::Sender<ServerEvent>,
    ) {
        debug!(
            target: "oc.actor.coordinator",
            connection_id = %connection_id,
            "Connection accepted"
        );

        self.sessions
            .insert(connection_id, SessionContext::new(connection_id));
        self.outbound.insert(connection_id, outbound);
        self.send_to(connection_id, ServerEvent::Ready { connection_id });
    }

    /// Transport teardown: the only path that takes a unit offline.
    async fn handle_disconnect(&mut self, connection_id: ConnectionId) {
        let Some(session) = self.sessions.remove(&connection_id) else {
            return;
        };

        if session.role == Role::Unit {
            self.handle_unit_offline(&session).await;
        }

        self.rooms.leave_all(connection_id);
        self.outbound.remove(&connection_id);

        info!(
            target: "oc.actor.coordinator",
            connection_id = %connection_id,
            role = ?session.role,
            "Connection closed"
        );
    }

    /// Authenticate a connection as an operation admin.
    #[instrument(skip_all, fields(connection_id = %connection_id, op_id = %op_id))]
    async fn handle_login_admin(
        &mut self,
        connection_id: ConnectionId,
        op_id: OperationId,
        password: String,
    ) {
        let operation = match self.store.get_operation(&op_id).await {
            Ok(operation) => operation,
            Err(e) => {
                warn!(target: "oc.actor.coordinator", error = %e, "Store lookup failed during admin login");
                let msg = OcError::Store(e).client_message();
                self.send_to(connection_id, ServerEvent::AdminAuthError(msg));
                return;
            }
        };

        // Unknown operation and wrong password take the same reply so the
        // login endpoint cannot be used to enumerate operation ids.
        let verified = operation
            .as_ref()
            .is_some_and(|op| bcrypt::verify(&password, &op.admin_password).unwrap_or(false));
        if !verified {
            self.send_to(
                connection_id,
                ServerEvent::AdminAuthError(OcError::InvalidCredentials.client_message()),
            );
            return;
        }

        let Some(session) = self.sessions.get_mut(&connection_id) else {
            return;
        };
        if !session.bind_admin(op_id.clone())
            && !(session.role == Role::Admin && session.is_bound_to(&op_id))
        {
            // Already bound to something else; re-auth across tenants on one
            // connection is not a thing.
            debug!(target: "oc.actor.coordinator", "Login on an already-bound connection ignored");
            return;
        }

        self.rooms
            .join(connection_id, GroupKey::Admins(op_id.clone()));

        let channels = match self.store.channels(&op_id).await {
            Ok(channels) => channels,
            Err(e) => {
                warn!(target: "oc.actor.coordinator", error = %e, "Channel list lookup failed");
                Vec::new()
            }
        };

        self.send_to(
            connection_id,
            ServerEvent::AdminAuthenticated {
                success: true,
                op_id: op_id.clone(),
                channels,
            },
        );

        // Full unit snapshot so the admin console can seed its per-unit view.
        match self.store.units_for_operation(&op_id).await {
            Ok(units) => {
                let list: HashMap<ConnectionId, UnitSnapshot> = units
                    .iter()
                    .filter_map(|unit| {
                        unit.connection_id
                            .map(|conn| (conn, UnitSnapshot::from(unit)))
                    })
                    .collect();
                self.send_to(connection_id, ServerEvent::ActiveUnitsList(list));
            }
            Err(e) => {
                warn!(target: "oc.actor.coordinator", error = %e, "Unit snapshot lookup failed");
            }
        }

        info!(target: "oc.actor.coordinator", "Admin authenticated");
    }

    /// Join a connection to an operation as a field unit.
    #[instrument(skip_all, fields(connection_id = %connection_id, op_id = %op_id))]
    async fn handle_join_operation(
        &mut self,
        connection_id: ConnectionId,
        op_id: OperationId,
        token: &str,
        user_id: UserId,
        call_sign: String,
    ) {
        match self.store.get_operation(&op_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                self.send_to(
                    connection_id,
                    ServerEvent::JoinError("Operation not found".to_string()),
                );
                return;
            }
            Err(e) => {
                warn!(target: "oc.actor.coordinator", error = %e, "Store lookup failed during join");
                let msg = OcError::Store(e).client_message();
                self.send_to(connection_id, ServerEvent::JoinError(msg));
                return;
            }
        }

        // Token ownership is looked up but deliberately not enforced: turning
        // this into a rejection needs product sign-off (see DESIGN.md).
        match self.store.token_operation(token).await {
            Ok(Some(owner)) if owner == op_id => {}
            Ok(_) => {
                warn!(
                    target: "oc.actor.coordinator",
                    "Invite token not bound to the requested operation; accepting anyway"
                );
            }
            Err(e) => {
                warn!(target: "oc.actor.coordinator", error = %e, "Token lookup failed; accepting anyway");
            }
        }

        let Some(session) = self.sessions.get_mut(&connection_id) else {
            return;
        };
        if !session.bind_unit(op_id.clone(), user_id.clone())
            && !(session.role == Role::Unit && session.is_bound_to(&op_id))
        {
            debug!(target: "oc.actor.coordinator", "Join on an already-bound connection ignored");
            return;
        }

        self.rooms
            .join(connection_id, GroupKey::Operation(op_id.clone()));

        // Seed the durable unit record and tell the operation's admins.
        self.register_unit_record(connection_id, &op_id, user_id, call_sign)
            .await;

        let channels = match self.store.channels(&op_id).await {
            Ok(channels) => channels,
            Err(e) => {
                warn!(target: "oc.actor.coordinator", error = %e, "Channel list lookup failed");
                Vec::new()
            }
        };

        self.send_to(
            connection_id,
            ServerEvent::OperationConfig { op_id, channels },
        );
    }

    /// Tune a connection in to a channel of its own operation.
    ///
    /// The tenant-match check below is the sole cross-tenant isolation gate at
    /// the channel layer: a mismatch is ignored outright, with no reply.
    fn handle_join_channel(
        &mut self,
        connection_id: ConnectionId,
        op_id: &OperationId,
        channel_name: String,
    ) {
        let Some(session) = self.sessions.get(&connection_id) else {
            return;
        };
        if !session.is_bound_to(op_id) {
            debug!(
                target: "oc.actor.coordinator",
                connection_id = %connection_id,
                requested = %op_id,
                "join-channel outside bound operation ignored"
            );
            return;
        }

        let group = GroupKey::Channel(op_id.clone(), channel_name);
        self.rooms.join(connection_id, group.clone());

        // Existing members learn about the new peer so they can start
        // connection negotiation with it.
        self.broadcast(
            &group,
            &ServerEvent::UserConnected(connection_id),
            Some(connection_id),
        );
    }

    /// Add a channel to the calling admin's operation.
    async fn handle_add_channel(&mut self, connection_id: ConnectionId, channel_name: &str) {
        let Some(op_id) = self.admin_operation(connection_id) else {
            // Not an admin: dropped, not reported.
            return;
        };

        match self.store.insert_channel(&op_id, channel_name).await {
            Ok(()) => {}
            Err(crate::store::StoreError::Conflict(_)) => {
                debug!(target: "oc.actor.coordinator", "Duplicate channel add ignored");
                return;
            }
            Err(e) => {
                warn!(target: "oc.actor.coordinator", error = %e, "Channel insert failed");
                return;
            }
        }

        self.broadcast_channel_config(&op_id).await;
    }

    /// Remove a channel from the calling admin's operation.
    async fn handle_remove_channel(&mut self, connection_id: ConnectionId, channel_name: &str) {
        let Some(op_id) = self.admin_operation(connection_id) else {
            return;
        };

        if let Err(e) = self.store.delete_channel(&op_id, channel_name).await {
            warn!(target: "oc.actor.coordinator", error = %e, "Channel delete failed");
            return;
        }

        self.broadcast_channel_config(&op_id).await;
    }

    /// The operation this connection administers, if it is a bound admin.
    pub(super) fn admin_operation(&self, connection_id: ConnectionId) -> Option<OperationId> {
        self.sessions
            .get(&connection_id)
            .filter(|session| session.role == Role::Admin)
            .and_then(|session| session.operation.clone())
    }

    /// Push the refreshed channel list to admins and operation members.
    async fn broadcast_channel_config(&self, op_id: &OperationId) {
        let channels = match self.store.channels(op_id).await {
            Ok(channels) => channels,
            Err(e) => {
                warn!(target: "oc.actor.coordinator", error = %e, "Channel list lookup failed");
                return;
            }
        };

        self.broadcast(
            &GroupKey::Admins(op_id.clone()),
            &ServerEvent::ChannelsUpdated(channels.clone()),
            None,
        );
        self.broadcast(
            &GroupKey::Operation(op_id.clone()),
            &ServerEvent::OperationConfig {
                op_id: op_id.clone(),
                channels,
            },
            None,
        );
    }

    /// Deliver one event to one connection, fire-and-forget.
    pub(super) fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) {
        let Some(outbound) = self.outbound.get(&connection_id) else {
            return;
        };
        if let Err(e) = outbound.try_send(event) {
            debug!(
                target: "oc.actor.coordinator",
                connection_id = %connection_id,
                error = %e,
                "Outbound event dropped"
            );
        }
    }

    /// Deliver one event to every current member of a group, at most once
    /// each, optionally excluding the sender.
    pub(super) fn broadcast(
        &self,
        group: &GroupKey,
        event: &ServerEvent,
        exclude: Option<ConnectionId>,
    ) {
        for member in self.rooms.members(group) {
            if Some(member) == exclude {
                continue;
            }
            self.send_to(member, event.clone());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::super::harness::{
        create_operation, join_operation, login_admin, spawn_coordinator, TestClient,
    };
    use crate::protocol::{ClientEvent, ServerEvent};
    use crate::rooms::GroupKey;
    use crate::session::Role;
    use common::types::{OperationId, UserId};

    fn mentions(group: &GroupKey, op: &OperationId) -> bool {
        match group {
            GroupKey::Operation(id) | GroupKey::Admins(id) | GroupKey::Channel(id, _) => id == op,
        }
    }

    #[tokio::test]
    async fn fresh_connection_is_unbound() {
        let (handle, _store) = spawn_coordinator();
        let client = TestClient::attach(&handle).await;

        let snapshot = handle.inspect(client.id).await.unwrap().expect("session exists");
        assert_eq!(snapshot.role, Role::None);
        assert!(snapshot.operation.is_none());
        assert!(snapshot.groups.is_empty());
    }

    #[tokio::test]
    async fn admin_login_returns_channel_list() {
        let (handle, _store) = spawn_coordinator();
        let mut provisioner = TestClient::attach(&handle).await;
        create_operation(&mut provisioner, "ALPHA", "p1").await;

        let mut admin = TestClient::attach(&handle).await;
        let channels = login_admin(&mut admin, "ALPHA", "p1").await;
        assert_eq!(channels, vec!["CHANNEL 1", "LOGISTICS"]);

        let snapshot = handle.inspect(admin.id).await.unwrap().expect("session exists");
        assert_eq!(snapshot.role, Role::Admin);
        assert!(snapshot
            .groups
            .contains(&GroupKey::Admins(OperationId::from("ALPHA"))));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_operation_report_identically() {
        let (handle, _store) = spawn_coordinator();
        let mut provisioner = TestClient::attach(&handle).await;
        create_operation(&mut provisioner, "ALPHA", "p1").await;

        let mut wrong_password = TestClient::attach(&handle).await;
        wrong_password
            .send(ClientEvent::LoginAdmin {
                op_id: OperationId::from("ALPHA"),
                password: "p2".to_string(),
            })
            .await;
        let first = match wrong_password.recv().await {
            ServerEvent::AdminAuthError(msg) => msg,
            other => panic!("expected admin-auth-error, got {other:?}"),
        };

        let mut unknown_op = TestClient::attach(&handle).await;
        unknown_op
            .send(ClientEvent::LoginAdmin {
                op_id: OperationId::from("OMEGA"),
                password: "p1".to_string(),
            })
            .await;
        let second = match unknown_op.recv().await {
            ServerEvent::AdminAuthError(msg) => msg,
            other => panic!("expected admin-auth-error, got {other:?}"),
        };

        assert_eq!(first, "Invalid credentials");
        assert_eq!(first, second, "replies must not reveal which check failed");
    }

    #[tokio::test]
    async fn join_unknown_operation_reports_join_error() {
        let (handle, _store) = spawn_coordinator();
        let mut unit = TestClient::attach(&handle).await;

        unit.send(ClientEvent::JoinOperation {
            op_id: OperationId::from("OMEGA"),
            token: "whatever".to_string(),
            user_id: UserId::from("u1"),
            call_sign: "VIPER".to_string(),
        })
        .await;

        match unit.recv().await {
            ServerEvent::JoinError(msg) => assert_eq!(msg, "Operation not found"),
            other => panic!("expected join-error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cross_tenant_join_channel_is_a_noop() {
        let (handle, _store) = spawn_coordinator();
        let mut provisioner = TestClient::attach(&handle).await;
        create_operation(&mut provisioner, "ALPHA", "p1").await;
        create_operation(&mut provisioner, "BRAVO", "p2").await;

        let mut unit = TestClient::attach(&handle).await;
        join_operation(&mut unit, "ALPHA", "u1", "VIPER").await;

        // Naming another tenant's channel is ignored outright: no groups
        // joined, no reply of any kind.
        unit.send(ClientEvent::JoinChannel {
            op_id: OperationId::from("BRAVO"),
            channel_name: "CHANNEL 1".to_string(),
        })
        .await;

        let snapshot = handle.inspect(unit.id).await.unwrap().expect("session exists");
        assert!(
            !snapshot
                .groups
                .iter()
                .any(|g| mentions(g, &OperationId::from("BRAVO"))),
            "connection must stay out of every BRAVO-scoped group"
        );
        unit.expect_silence().await;

        // The same request inside the bound tenant works.
        unit.send(ClientEvent::JoinChannel {
            op_id: OperationId::from("ALPHA"),
            channel_name: "CHANNEL 1".to_string(),
        })
        .await;
        let snapshot = handle.inspect(unit.id).await.unwrap().expect("session exists");
        assert!(snapshot.groups.contains(&GroupKey::Channel(
            OperationId::from("ALPHA"),
            "CHANNEL 1".to_string()
        )));
    }

    #[tokio::test]
    async fn join_channel_notifies_existing_members_only() {
        let (handle, _store) = spawn_coordinator();
        let mut provisioner = TestClient::attach(&handle).await;
        create_operation(&mut provisioner, "ALPHA", "p1").await;

        let mut first = TestClient::attach(&handle).await;
        join_operation(&mut first, "ALPHA", "u1", "VIPER").await;
        first
            .send(ClientEvent::JoinChannel {
                op_id: OperationId::from("ALPHA"),
                channel_name: "CHANNEL 1".to_string(),
            })
            .await;

        let mut second = TestClient::attach(&handle).await;
        join_operation(&mut second, "ALPHA", "u2", "COBRA").await;
        second
            .send(ClientEvent::JoinChannel {
                op_id: OperationId::from("ALPHA"),
                channel_name: "CHANNEL 1".to_string(),
            })
            .await;

        match first.recv().await {
            ServerEvent::UserConnected(conn) => assert_eq!(conn, second.id),
            other => panic!("expected user-connected, got {other:?}"),
        }
        // The joiner itself is excluded from the notification.
        second.expect_silence().await;
    }

    #[tokio::test]
    async fn channel_mutations_fan_out_to_admins_and_members() {
        let (handle, _store) = spawn_coordinator();
        let mut provisioner = TestClient::attach(&handle).await;
        create_operation(&mut provisioner, "ALPHA", "p1").await;

        let mut admin = TestClient::attach(&handle).await;
        login_admin(&mut admin, "ALPHA", "p1").await;

        let mut unit = TestClient::attach(&handle).await;
        join_operation(&mut unit, "ALPHA", "u1", "VIPER").await;
        assert!(matches!(admin.recv().await, ServerEvent::RegisterUnit(_)));

        admin
            .send(ClientEvent::AddChannel {
                channel_name: "MEDICAL".to_string(),
            })
            .await;

        match admin.recv().await {
            ServerEvent::ChannelsUpdated(channels) => {
                assert_eq!(channels, vec!["CHANNEL 1", "LOGISTICS", "MEDICAL"]);
            }
            other => panic!("expected channels-updated, got {other:?}"),
        }
        match unit.recv().await {
            ServerEvent::OperationConfig { channels, .. } => {
                assert_eq!(channels, vec!["CHANNEL 1", "LOGISTICS", "MEDICAL"]);
            }
            other => panic!("expected operation-config, got {other:?}"),
        }

        admin
            .send(ClientEvent::RemoveChannel {
                channel_name: "LOGISTICS".to_string(),
            })
            .await;
        match admin.recv().await {
            ServerEvent::ChannelsUpdated(channels) => {
                assert_eq!(channels, vec!["CHANNEL 1", "MEDICAL"]);
            }
            other => panic!("expected channels-updated, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn channel_mutations_from_non_admins_are_dropped() {
        let (handle, store) = spawn_coordinator();
        let mut provisioner = TestClient::attach(&handle).await;
        create_operation(&mut provisioner, "ALPHA", "p1").await;

        let mut unit = TestClient::attach(&handle).await;
        join_operation(&mut unit, "ALPHA", "u1", "VIPER").await;

        unit.send(ClientEvent::AddChannel {
            channel_name: "ROGUE".to_string(),
        })
        .await;
        unit.barrier().await;

        use crate::store::TenantStore;
        assert_eq!(
            store.channels(&OperationId::from("ALPHA")).await.unwrap(),
            vec!["CHANNEL 1", "LOGISTICS"]
        );
        unit.expect_silence().await;
    }

    #[tokio::test]
    async fn admin_disconnect_touches_no_durable_state() {
        let (handle, store) = spawn_coordinator();
        let mut provisioner = TestClient::attach(&handle).await;
        create_operation(&mut provisioner, "ALPHA", "p1").await;

        let mut admin = TestClient::attach(&handle).await;
        login_admin(&mut admin, "ALPHA", "p1").await;

        handle.disconnect(admin.id).await.unwrap();

        assert!(handle.inspect(admin.id).await.unwrap().is_none());
        use crate::store::TenantStore;
        assert!(store
            .units_for_operation(&OperationId::from("ALPHA"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn admin_login_snapshot_contains_connected_units() {
        let (handle, _store) = spawn_coordinator();
        let mut provisioner = TestClient::attach(&handle).await;
        create_operation(&mut provisioner, "ALPHA", "p1").await;

        let mut unit = TestClient::attach(&handle).await;
        join_operation(&mut unit, "ALPHA", "u1", "VIPER").await;
        unit.send(ClientEvent::UpdateLocation {
            id: UserId::from("u1"),
            lat: 10.0,
            lng: 20.0,
            call_sign: "VIPER".to_string(),
        })
        .await;
        unit.barrier().await;

        let mut admin = TestClient::attach(&handle).await;
        admin
            .send(ClientEvent::LoginAdmin {
                op_id: OperationId::from("ALPHA"),
                password: "p1".to_string(),
            })
            .await;
        assert!(matches!(
            admin.recv().await,
            ServerEvent::AdminAuthenticated { success: true, .. }
        ));
        match admin.recv().await {
            ServerEvent::ActiveUnitsList(units) => {
                let snapshot = units.get(&unit.id).expect("keyed by connection id");
                assert_eq!(snapshot.id, UserId::from("u1"));
                assert_eq!(snapshot.lat, 10.0);
                assert_eq!(snapshot.lng, 20.0);
            }
            other => panic!("expected active-units-list, got {other:?}"),
        }
    }
}
