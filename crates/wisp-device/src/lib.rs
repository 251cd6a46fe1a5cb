//! Protocol boundary between the wisp enforcement core and remote devices.
//!
//! A *device* here is a remote network element (a RouterOS-style router)
//! exposing a management API over which bandwidth queues and firewall
//! address lists are configured. This crate defines the seam the core is
//! written against:
//!
//! - **[`DeviceConnector`]** — opens an authenticated session against one
//!   device. Implemented by an external protocol client; the core never
//!   speaks the wire format itself.
//! - **[`DeviceSession`]** — a live, exclusively-owned session offering
//!   `query` / `create` / `update` / `delete` against resource paths such
//!   as [`resource::SIMPLE_QUEUE`]. All calls are synchronous and blocking;
//!   callers are expected to dispatch them to a worker thread.
//! - **[`DeviceError`]** — the transport-level error taxonomy.
//!
//! Rows travel as flat string field maps ([`Fields`]), matching the
//! key/value shape of the underlying management protocol.

pub mod connector;
pub mod error;
pub mod resource;
pub mod session;

pub use connector::{ConnectParams, DeviceConnector};
pub use error::DeviceError;
pub use session::{DeviceSession, Fields};
