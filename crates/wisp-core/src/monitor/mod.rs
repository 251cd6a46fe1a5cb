// ── Fleet reachability monitoring ──
//
// Last-known device status, kept fresh by a background poller and read
// instantly by dashboards. Status transitions (and only transitions) are
// broadcast as events for the external alert notifier.

pub mod poller;
pub mod stats;

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::model::{DeviceId, DeviceStatus, StatusSummary};

pub use poller::StatusPoller;
pub use stats::{DeviceHealth, QueueTraffic};

// ── Status events ────────────────────────────────────────────────────

/// Direction of a reachability transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusEventKind {
    /// online → offline
    Down,
    /// offline → online
    Up,
}

/// Edge-triggered reachability event, broadcast to the alert sink.
///
/// Emitted only when a device's online flag flips relative to its prior
/// cache entry; the very first observation of a device never produces one.
#[derive(Debug, Clone, Serialize)]
pub struct StatusEvent {
    pub kind: StatusEventKind,
    pub device_id: DeviceId,
    pub name: String,
    pub address: String,
    /// Probe failure text, for down events.
    pub error: Option<String>,
}

// ── Status cache ─────────────────────────────────────────────────────

/// In-memory last-known status per device, last-write-wins.
///
/// Reads hand out clones, never live references, so concurrent poll writes
/// can't produce torn reads.
#[derive(Default)]
pub struct StatusCache {
    statuses: DashMap<DeviceId, DeviceStatus>,
    initialized: AtomicBool,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a device's status, returning the prior entry.
    ///
    /// The prior entry is what edge detection compares against; callers
    /// must read it from the return value, not from a separate `get`, so
    /// the read-compare-overwrite is a single cache operation.
    pub fn update(&self, status: DeviceStatus) -> Option<DeviceStatus> {
        self.initialized.store(true, Ordering::Relaxed);
        self.statuses.insert(status.device_id, status)
    }

    /// Last-known status of one device, if it has ever been probed.
    pub fn get(&self, id: DeviceId) -> Option<DeviceStatus> {
        self.statuses.get(&id).map(|entry| entry.value().clone())
    }

    /// Drop a device from the cache (when the operator deletes it).
    pub fn remove(&self, id: DeviceId) {
        self.statuses.remove(&id);
    }

    /// Whether at least one poll cycle has populated the cache.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Relaxed)
    }

    /// Aggregated fleet view.
    pub fn summary(&self) -> StatusSummary {
        let statuses: Vec<DeviceStatus> = self
            .statuses
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        let online = statuses.iter().filter(|s| s.online).count();
        let offline_list: Vec<DeviceStatus> =
            statuses.iter().filter(|s| !s.online).cloned().collect();

        StatusSummary {
            total: statuses.len(),
            online,
            offline: offline_list.len(),
            offline_list,
            initialized: self.is_initialized(),
        }
    }
}
