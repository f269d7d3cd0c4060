//! Operations Controller Library
//!
//! Server-side session relay and multi-tenant coordination for real-time
//! peer-to-peer audio operations:
//!
//! - Admin and field-unit authentication against the tenant store
//! - Group fan-out (operation-wide, admin-only, per-channel)
//! - Directed relay of opaque connection-negotiation messages
//! - Location telemetry propagation to per-operation admin observers
//! - Key-gated tenant provisioning with invite tokens
//!
//! # Architecture
//!
//! A single `CoordinatorActor` owns every piece of live-connection state:
//!
//! ```text
//! WebSocket task (one per connection)
//!   ├── decodes ClientEvent frames -> CoordinatorHandle::event
//!   └── drains its outbound channel  <- coordinator send_to / broadcast
//! CoordinatorActor (singleton)
//!   ├── sessions: connection -> SessionContext
//!   ├── rooms: GroupKey -> members
//!   └── store: Arc<dyn TenantStore> (memory or Postgres)
//! ```
//!
//! Audio itself never transits this server: peers exchange negotiation
//! payloads through the relay and stream directly to each other.
//!
//! # Modules
//!
//! - [`actors`] - coordinator actor and its handlers
//! - [`protocol`] - the client/server event catalog
//! - [`rooms`] - typed group membership index
//! - [`session`] - per-connection binding state
//! - [`store`] - tenant store trait and implementations
//! - [`server`] - WebSocket transport
//! - [`config`] - service configuration from environment
//! - [`errors`] - error types with client-safe messages
//! - [`observability`] - health probes

pub mod actors;
pub mod config;
pub mod errors;
pub mod observability;
pub mod protocol;
pub mod rooms;
pub mod server;
pub mod session;
pub mod store;
