//! Telemetry propagation: unit registration and location fan-out.
//!
//! Every event updates the durable unit row first, then republishes a
//! normalized [`UnitSnapshot`] to the owning operation's admin group. Location
//! writes are last-write-wins — no smoothing, no filtering, no rate limiting.

use common::types::{ConnectionId, OperationId, UserId};
use tracing::{debug, warn};

use crate::protocol::{ServerEvent, UnitSnapshot};
use crate::rooms::GroupKey;
use crate::session::{Role, SessionContext};
use crate::store::{UnitRecord, UnitStatus};

use super::coordinator::CoordinatorActor;

impl CoordinatorActor {
    /// Handle a `register-unit` event from a bound unit connection.
    pub(super) async fn handle_register_unit(
        &mut self,
        connection_id: ConnectionId,
        user_id: UserId,
        call_sign: String,
    ) {
        let Some(op_id) = self.unit_operation(connection_id) else {
            // Unbound connection: dropped, not reported.
            return;
        };
        self.register_unit_record(connection_id, &op_id, user_id, call_sign)
            .await;
    }

    /// Upsert a unit row in WAITING_FOR_GPS and notify the admin group.
    ///
    /// Also runs as part of join-operation. Coordinates reset to zero until
    /// the first fix arrives; the registration broadcast mirrors that.
    pub(super) async fn register_unit_record(
        &mut self,
        connection_id: ConnectionId,
        op_id: &OperationId,
        user_id: UserId,
        call_sign: String,
    ) {
        let unit = UnitRecord {
            id: user_id,
            op_id: op_id.clone(),
            call_sign,
            connection_id: Some(connection_id),
            lat: 0.0,
            lng: 0.0,
            status: UnitStatus::WaitingForGps,
            last_seen: chrono::Utc::now(),
        };
        let snapshot = UnitSnapshot::from(&unit);

        if let Err(e) = self.store.upsert_unit(unit).await {
            warn!(target: "oc.actor.telemetry", error = %e, "Unit upsert failed");
            return;
        }

        self.broadcast(
            &GroupKey::Admins(op_id.clone()),
            &ServerEvent::RegisterUnit(snapshot),
            None,
        );
    }

    /// Handle an `update-location` event from a bound unit connection.
    ///
    /// Any numeric coordinates are accepted and propagated unchanged. The
    /// connection id is rebound on every write, so a reconnecting unit's new
    /// connection supersedes the old binding (upsert, last write wins).
    pub(super) async fn handle_update_location(
        &mut self,
        connection_id: ConnectionId,
        user_id: UserId,
        lat: f64,
        lng: f64,
        call_sign: String,
    ) {
        let Some(op_id) = self.unit_operation(connection_id) else {
            debug!(
                target: "oc.actor.telemetry",
                connection_id = %connection_id,
                "update-location from unbound connection ignored"
            );
            return;
        };

        let unit = UnitRecord {
            id: user_id,
            op_id: op_id.clone(),
            call_sign,
            connection_id: Some(connection_id),
            lat,
            lng,
            status: UnitStatus::Active,
            last_seen: chrono::Utc::now(),
        };
        let snapshot = UnitSnapshot::from(&unit);

        if let Err(e) = self.store.upsert_unit(unit).await {
            warn!(target: "oc.actor.telemetry", error = %e, "Unit upsert failed");
            return;
        }

        self.broadcast(
            &GroupKey::Admins(op_id),
            &ServerEvent::UpdateLocation(snapshot),
            None,
        );
    }

    /// Transport teardown of a unit connection: mark its unit OFFLINE, clear
    /// the binding, and notify the admin group — once.
    ///
    /// The store-side guard only matches if the unit is still bound to this
    /// connection, so the teardown of a superseded (stale) connection does
    /// not produce a spurious offline transition.
    pub(super) async fn handle_unit_offline(&mut self, session: &SessionContext) {
        let (Some(op_id), Some(user_id)) = (&session.operation, &session.user_id) else {
            return;
        };

        match self
            .store
            .mark_unit_offline(user_id, session.connection_id)
            .await
        {
            Ok(Some(_)) => {
                self.broadcast(
                    &GroupKey::Admins(op_id.clone()),
                    &ServerEvent::UserDisconnected(session.connection_id),
                    None,
                );
            }
            Ok(None) => {
                debug!(
                    target: "oc.actor.telemetry",
                    connection_id = %session.connection_id,
                    "Stale connection teardown; unit already rebound"
                );
            }
            Err(e) => {
                warn!(target: "oc.actor.telemetry", error = %e, "Offline transition failed");
            }
        }
    }

    /// The operation this connection is bound to as a unit.
    fn unit_operation(&self, connection_id: ConnectionId) -> Option<OperationId> {
        self.sessions
            .get(&connection_id)
            .filter(|session| session.role == Role::Unit)
            .and_then(|session| session.operation.clone())
    }
}
