// ── Subscriber records ──

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::device::DeviceId;

/// Opaque subscriber identifier, assigned by the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriberId(pub i64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Billing state of a subscriber. Only the scheduler transitions this.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, Default,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriberStatus {
    #[default]
    Active,
    Suspended,
}

/// Desired network state for one subscriber, as recorded by billing.
#[derive(Debug, Clone)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub name: String,
    /// The subscriber's network address, target of queue and list entries.
    pub address: String,
    /// Contracted upload rate, device syntax (e.g. `"5M"`).
    pub upload_limit: String,
    /// Contracted download rate, device syntax (e.g. `"10M"`).
    pub download_limit: String,
    /// Day of month the billing period starts (1–31).
    pub billing_day: u8,
    pub status: SubscriberStatus,
    /// Device responsible for this subscriber, when one is assigned.
    pub device_id: Option<DeviceId>,
}

impl Subscriber {
    /// Contracted rate limit pair in device syntax (`"up/down"`).
    pub fn rate_limit(&self) -> String {
        format!("{}/{}", self.upload_limit, self.download_limit)
    }
}
