// ── Device liveness status ──

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::device::DeviceId;

/// Last-known reachability of one device.
///
/// One entry per device id, overwritten on each probe (last-write-wins).
/// No history is retained.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceStatus {
    pub device_id: DeviceId,
    pub name: String,
    pub address: String,
    pub online: bool,
    pub last_check: DateTime<Utc>,
    /// Probe failure text, when offline.
    pub error: Option<String>,
}

impl DeviceStatus {
    pub fn online(device_id: DeviceId, name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            device_id,
            name: name.into(),
            address: address.into(),
            online: true,
            last_check: Utc::now(),
            error: None,
        }
    }

    pub fn offline(
        device_id: DeviceId,
        name: impl Into<String>,
        address: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            device_id,
            name: name.into(),
            address: address.into(),
            online: false,
            last_check: Utc::now(),
            error: Some(error.into()),
        }
    }
}

/// Aggregated fleet view served to dashboards and the alert bot.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
    /// Full status records of every offline device.
    pub offline_list: Vec<DeviceStatus>,
    /// False until the first poll cycle has populated the cache.
    pub initialized: bool,
}
