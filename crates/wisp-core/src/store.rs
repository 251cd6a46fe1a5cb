// ── Persistence collaborator seam ──
//
// The core is a pure client of whatever stores device, subscriber, payment
// and settings records. The trait is dyn-compatible so outer layers can
// inject a database-backed implementation; tests inject in-memory fakes.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{DeviceDescriptor, DeviceId, Subscriber, SubscriberId, SubscriberStatus};

/// Failure inside the persistence collaborator.
///
/// Deliberately opaque: the core only decides whether to abort the current
/// cycle, never inspects the cause.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct StoreError(pub String);

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Read/write access to billing records and policy settings.
///
/// Reads supply the per-cycle snapshot; the only write this core performs
/// is the subscriber status transition. Payment markers are presence-only:
/// a marker existing for `(subscriber, period)` means that period is paid.
#[async_trait]
pub trait BillingStore: Send + Sync {
    /// All devices flagged active, for polling and enforcement.
    async fn active_devices(&self) -> Result<Vec<DeviceDescriptor>, StoreError>;

    /// Look up one device by id.
    async fn device(&self, id: DeviceId) -> Result<Option<DeviceDescriptor>, StoreError>;

    /// All subscribers, regardless of status.
    async fn subscribers(&self) -> Result<Vec<Subscriber>, StoreError>;

    /// Whether a payment marker exists for the given billing period.
    /// Period labels are `"%Y-%m"` of the reference date.
    async fn has_payment(&self, id: SubscriberId, period: &str) -> Result<bool, StoreError>;

    /// Raw key/value settings table; resolved via
    /// [`PolicySettings::from_raw`](crate::config::PolicySettings::from_raw).
    async fn raw_settings(&self) -> Result<HashMap<String, String>, StoreError>;

    /// Persist a subscriber status transition.
    async fn set_subscriber_status(
        &self,
        id: SubscriberId,
        status: SubscriberStatus,
    ) -> Result<(), StoreError>;
}
