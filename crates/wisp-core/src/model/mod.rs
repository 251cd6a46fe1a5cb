// ── Domain model ──
//
// Canonical types shared across the core. Device and subscriber records are
// owned by the persistence collaborator and read-only here (except the
// subscriber status field, which the scheduler writes back). Status types
// are owned by this core.

pub mod device;
pub mod status;
pub mod subscriber;

pub use device::{DeviceDescriptor, DeviceId};
pub use status::{DeviceStatus, StatusSummary};
pub use subscriber::{Subscriber, SubscriberId, SubscriberStatus};
