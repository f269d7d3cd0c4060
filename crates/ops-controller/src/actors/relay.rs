//! Directed negotiation relay.
//!
//! Forwards the three opaque negotiation kinds to one explicitly named target
//! connection, annotated with the sender's id. A target that is not live
//! means the message is dropped with no reply to the sender — peers discover
//! dead targets through their own negotiation timeouts.

use common::types::ConnectionId;
use serde_json::Value;
use tracing::debug;

use crate::protocol::ServerEvent;

use super::coordinator::CoordinatorActor;

/// The three negotiation message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum NegotiationKind {
    Offer,
    Answer,
    Candidate,
}

impl NegotiationKind {
    fn name(self) -> &'static str {
        match self {
            NegotiationKind::Offer => "offer",
            NegotiationKind::Answer => "answer",
            NegotiationKind::Candidate => "candidate",
        }
    }

    /// The mirrored server event carrying the payload and the caller id.
    fn server_event(self, payload: Value, caller: ConnectionId) -> ServerEvent {
        match self {
            NegotiationKind::Offer => ServerEvent::Offer { payload, caller },
            NegotiationKind::Answer => ServerEvent::Answer { payload, caller },
            NegotiationKind::Candidate => ServerEvent::Candidate { payload, caller },
        }
    }
}

impl CoordinatorActor {
    /// Relay one negotiation message to its target, if the target is live.
    pub(super) fn handle_negotiation(
        &self,
        caller: ConnectionId,
        kind: NegotiationKind,
        target: ConnectionId,
        payload: Value,
    ) {
        if !self.outbound.contains_key(&target) {
            debug!(
                target: "oc.actor.relay",
                kind = kind.name(),
                caller = %caller,
                target = %target,
                "Negotiation target not live, dropping"
            );
            return;
        }

        self.send_to(target, kind.server_event(payload, caller));
    }
}
