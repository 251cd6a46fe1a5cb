//! Device-connection and billing-enforcement core.
//!
//! This crate keeps a fleet of independently-owned routers in line with the
//! operator's billing records: subscribers who stop paying get their
//! bandwidth clamped or their address disabled, paying subscribers get
//! restored, and every device is continuously watched for reachability.
//!
//! - **[`ConnectionPool`]** — at most one live management session per
//!   device, each behind its own lock; failed sessions are invalidated and
//!   rebuilt on the next lease.
//! - **[`DeviceSyncer`]** — idempotently reconciles one subscriber's queue
//!   and address-list entries on a device, with bounded retry.
//! - **[`StatusCache`]** / **[`StatusPoller`]** — background liveness
//!   probing with last-known status and edge-triggered up/down events.
//! - **[`EnforcementScheduler`]** — the daily billing pass computing
//!   suspend/reactivate decisions and driving the syncer; also runnable on
//!   demand.
//! - **[`Supervisor`]** — the explicitly-owned façade that wires the above
//!   together, supervises the long-running tasks, and exposes the
//!   on-demand surface consumed by outer layers.
//!
//! Persistence and policy settings arrive through the [`BillingStore`]
//! trait; the device protocol arrives through `wisp_device`. Both are
//! injected at construction — the core holds no global state.

pub mod config;
pub mod error;
pub mod model;
pub mod monitor;
pub mod pool;
pub mod scheduler;
pub mod store;
pub mod supervisor;
pub mod syncer;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{PolicySettings, SuspensionMethod};
pub use error::CoreError;
pub use model::{
    DeviceDescriptor, DeviceId, DeviceStatus, StatusSummary, Subscriber, SubscriberId,
    SubscriberStatus,
};
pub use monitor::{
    DeviceHealth, QueueTraffic, StatusCache, StatusEvent, StatusEventKind, StatusPoller,
};
pub use pool::{ConnectionPool, DeviceLease};
pub use scheduler::{EnforcementReport, EnforcementScheduler};
pub use store::{BillingStore, StoreError};
pub use supervisor::{Supervisor, SupervisorConfig};
pub use syncer::DeviceSyncer;
