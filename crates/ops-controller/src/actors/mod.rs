//! Coordinator actor — all live-connection state lives here.
//!
//! One `CoordinatorActor` per process owns the session table, the group
//! index, and the per-connection outbound senders. The transport layer
//! funnels every decoded client event into it via [`CoordinatorHandle`];
//! responses and fan-out flow back through the per-connection channels.
//!
//! Handlers are grouped by concern:
//! - `coordinator` - session lifecycle, admin login, operation/channel joins
//! - `telemetry` - unit registration and location propagation
//! - `relay` - directed negotiation message forwarding
//! - `provisioning` - tenant creation, listing, invite tokens

mod coordinator;
mod messages;
mod provisioning;
mod relay;
mod telemetry;

pub use coordinator::{CoordinatorActor, CoordinatorHandle, CoordinatorSettings};
pub use messages::{CoordinatorMessage, SessionSnapshot};
