// ── Background status poller ──
//
// Probes every active device concurrently, applies results to the cache
// sequentially, and emits edge-triggered up/down events. A probe is the
// cheapest possible round-trip (reading the device identity) through the
// connection pool, so it exercises the same session enforcement uses.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use wisp_device::resource;

use crate::error::CoreError;
use crate::model::{DeviceDescriptor, DeviceStatus};
use crate::monitor::{StatusCache, StatusEvent, StatusEventKind};
use crate::pool::ConnectionPool;
use crate::store::BillingStore;

/// Default wait between poll cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Shortened wait after a failed cycle (e.g. the store was unavailable).
const RECOVERY_INTERVAL: Duration = Duration::from_secs(10);

/// Periodic fleet liveness prober.
pub struct StatusPoller {
    store: Arc<dyn BillingStore>,
    pool: Arc<ConnectionPool>,
    cache: Arc<StatusCache>,
    events: broadcast::Sender<StatusEvent>,
}

impl StatusPoller {
    pub fn new(
        store: Arc<dyn BillingStore>,
        pool: Arc<ConnectionPool>,
        cache: Arc<StatusCache>,
        events: broadcast::Sender<StatusEvent>,
    ) -> Self {
        Self {
            store,
            pool,
            cache,
            events,
        }
    }

    /// Poll until cancelled.
    ///
    /// A failed cycle is logged and retried after the short recovery
    /// interval instead of the normal one; the loop itself never dies.
    pub async fn run(&self, interval: Duration, cancel: CancellationToken) {
        info!(interval_secs = interval.as_secs(), "status poller started");
        loop {
            let delay = match self.poll_once().await {
                Ok(()) => interval,
                Err(e) => {
                    error!(error = %e, "status poll cycle failed");
                    RECOVERY_INTERVAL
                }
            };

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }
        debug!("status poller stopped");
    }

    /// One full poll cycle: list active devices, probe them all in
    /// parallel, then fold the results into the cache one by one.
    ///
    /// Individual probe failures become offline statuses and never abort
    /// the batch; only a store failure aborts the cycle.
    pub async fn poll_once(&self) -> Result<(), CoreError> {
        let devices = self.store.active_devices().await?;
        if devices.is_empty() {
            return Ok(());
        }

        let probes = devices.iter().map(|device| self.probe(device));
        let results = join_all(probes).await;

        let total = results.len();
        let mut online = 0usize;
        for status in results {
            if status.online {
                online += 1;
            }
            self.apply(status);
        }

        debug!(online, total, "status poll cycle complete");
        Ok(())
    }

    /// Probe one device through the pool. Any failure marks it offline and
    /// invalidates its connection so the next probe reconnects cleanly.
    async fn probe(&self, device: &DeviceDescriptor) -> DeviceStatus {
        let outcome = match self.pool.lease(device).await {
            Ok(lease) => {
                lease
                    .run(|session| session.query(resource::SYSTEM_IDENTITY, &[]).map(|_| ()))
                    .await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => DeviceStatus::online(device.id, &device.name, &device.address),
            Err(e) => {
                debug!(device = %device.name, error = %e, "device probe failed");
                self.pool.invalidate(device.id).await;
                DeviceStatus::offline(device.id, &device.name, &device.address, e.to_string())
            }
        }
    }

    /// Overwrite the cache entry and emit a transition event when the
    /// online flag flipped. No prior entry (first observation) emits
    /// nothing.
    fn apply(&self, status: DeviceStatus) {
        let event = {
            let prior = self.cache.update(status.clone());
            match prior {
                Some(p) if p.online != status.online => Some(StatusEvent {
                    kind: if status.online {
                        StatusEventKind::Up
                    } else {
                        StatusEventKind::Down
                    },
                    device_id: status.device_id,
                    name: status.name.clone(),
                    address: status.address.clone(),
                    error: status.error.clone(),
                }),
                _ => None,
            }
        };

        if let Some(event) = event {
            info!(
                device = %event.name,
                kind = ?event.kind,
                "device status transition"
            );
            // Fire-and-forget; a send only fails when nobody listens.
            let _ = self.events.send(event);
        }
    }
}
