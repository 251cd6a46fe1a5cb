// ── Supervisor ──
//
// Explicitly-owned composition root for the enforcement core. Wires the
// store, connector, pool, cache, syncer and scheduler together, supervises
// the two long-running tasks under one cancellation token, and exposes the
// on-demand surface the outer (HTTP/bot) layers call into. No global
// state: construct one, pass clones around.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wisp_device::DeviceConnector;

use crate::config::PolicySettings;
use crate::error::CoreError;
use crate::model::{DeviceId, DeviceStatus, StatusSummary, Subscriber, SubscriberStatus};
use crate::monitor::poller::DEFAULT_POLL_INTERVAL;
use crate::monitor::{stats, DeviceHealth, QueueTraffic, StatusCache, StatusEvent, StatusPoller};
use crate::pool::ConnectionPool;
use crate::scheduler::{EnforcementReport, EnforcementScheduler};
use crate::store::BillingStore;
use crate::syncer::DeviceSyncer;

const EVENT_CHANNEL_SIZE: usize = 256;

/// Tuning knobs for the background tasks.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Wait between status poll cycles.
    pub poll_interval: Duration,
    /// Whether to run the daily enforcement scheduler. Disabled in
    /// one-shot tools that only want manual passes.
    pub scheduler_enabled: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            scheduler_enabled: true,
        }
    }
}

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc`; all clones share the same pool, cache and
/// background tasks.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<SupervisorInner>,
}

struct SupervisorInner {
    config: SupervisorConfig,
    store: Arc<dyn BillingStore>,
    pool: Arc<ConnectionPool>,
    cache: Arc<StatusCache>,
    syncer: DeviceSyncer,
    scheduler: EnforcementScheduler,
    poller: StatusPoller,
    event_tx: broadcast::Sender<StatusEvent>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Supervisor {
    /// Wire up the core around the injected collaborators. Does NOT spawn
    /// anything — call [`start()`](Self::start) for the background tasks.
    pub fn new(
        store: Arc<dyn BillingStore>,
        connector: Arc<dyn DeviceConnector>,
        config: SupervisorConfig,
    ) -> Self {
        let pool = Arc::new(ConnectionPool::new(connector));
        let cache = Arc::new(StatusCache::new());
        let syncer = DeviceSyncer::new(Arc::clone(&pool));
        let scheduler = EnforcementScheduler::new(Arc::clone(&store), syncer.clone());
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let poller = StatusPoller::new(
            Arc::clone(&store),
            Arc::clone(&pool),
            Arc::clone(&cache),
            event_tx.clone(),
        );

        Self {
            inner: Arc::new(SupervisorInner {
                config,
                store,
                pool,
                cache,
                syncer,
                scheduler,
                poller,
                event_tx,
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the status poller and (unless disabled) the daily
    /// enforcement scheduler. Idempotent only across distinct instances;
    /// call once per supervisor.
    pub async fn start(&self) {
        let mut handles = self.inner.task_handles.lock().await;

        let this = self.clone();
        let interval = self.inner.config.poll_interval;
        let cancel = self.inner.cancel.clone();
        handles.push(tokio::spawn(async move {
            this.inner.poller.run(interval, cancel).await;
        }));

        if self.inner.config.scheduler_enabled {
            let this = self.clone();
            let cancel = self.inner.cancel.clone();
            handles.push(tokio::spawn(async move {
                this.inner.scheduler.run_daily(cancel).await;
            }));
        }

        info!("supervisor started");
    }

    /// Cancel the background tasks, wait for them, and close every pooled
    /// device connection.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task join failed");
            }
        }

        self.inner.pool.shutdown_all().await;
        debug!("supervisor shut down");
    }

    // ── On-demand operations ─────────────────────────────────────────

    /// Run one enforcement pass now, with the same decision logic as the
    /// daily schedule.
    pub async fn run_enforcement(&self) -> Result<EnforcementReport, CoreError> {
        self.inner.scheduler.run_once().await
    }

    /// Run one status poll cycle now.
    pub async fn poll_now(&self) -> Result<(), CoreError> {
        self.inner.poller.poll_once().await
    }

    /// Reconcile one subscriber's device state right now, using their
    /// current billing status (used by the CRUD layer after edits).
    pub async fn sync_subscriber(&self, subscriber: &Subscriber) -> Result<(), CoreError> {
        let Some(device_id) = subscriber.device_id else {
            warn!(subscriber = %subscriber.name, "no device assigned, nothing to sync");
            return Ok(());
        };
        let device = self
            .inner
            .store
            .device(device_id)
            .await?
            .ok_or(CoreError::DeviceNotFound(device_id))?;
        let settings = self.policy_settings().await?;
        let suspend = subscriber.status == SubscriberStatus::Suspended;
        self.inner
            .syncer
            .sync(subscriber, suspend, &settings, &device)
            .await;
        Ok(())
    }

    /// Delete a (former) subscriber's queue and address-list entries.
    pub async fn remove_subscriber(
        &self,
        name: &str,
        address: &str,
        device_id: DeviceId,
    ) -> Result<(), CoreError> {
        let device = self
            .inner
            .store
            .device(device_id)
            .await?
            .ok_or(CoreError::DeviceNotFound(device_id))?;
        let settings = self.policy_settings().await?;
        self.inner
            .syncer
            .remove(name, address, &settings, &device)
            .await;
        Ok(())
    }

    /// Read a device's system resource counters.
    pub async fn device_health(&self, device_id: DeviceId) -> Result<DeviceHealth, CoreError> {
        let device = self
            .inner
            .store
            .device(device_id)
            .await?
            .ok_or(CoreError::DeviceNotFound(device_id))?;
        stats::device_health(&self.inner.pool, &device).await
    }

    /// Read a device's per-queue traffic counters, keyed by target.
    pub async fn queue_traffic(
        &self,
        device_id: DeviceId,
    ) -> Result<BTreeMap<String, QueueTraffic>, CoreError> {
        let device = self
            .inner
            .store
            .device(device_id)
            .await?
            .ok_or(CoreError::DeviceNotFound(device_id))?;
        stats::queue_traffic(&self.inner.pool, &device).await
    }

    /// Drop everything we hold about a deleted device: its cached status
    /// and its pooled connection, slot included.
    pub async fn forget_device(&self, device_id: DeviceId) {
        self.inner.cache.remove(device_id);
        self.inner.pool.remove(device_id).await;
    }

    // ── State observation ────────────────────────────────────────────

    /// Subscribe to edge-triggered device up/down events. The external
    /// alert notifier consumes these; delivery is best-effort.
    pub fn events(&self) -> broadcast::Receiver<StatusEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Aggregated fleet status from the cache.
    pub fn status_summary(&self) -> StatusSummary {
        self.inner.cache.summary()
    }

    /// Last-known status of one device.
    pub fn device_status(&self, device_id: DeviceId) -> Option<DeviceStatus> {
        self.inner.cache.get(device_id)
    }

    // ── Helpers ──────────────────────────────────────────────────────

    async fn policy_settings(&self) -> Result<PolicySettings, CoreError> {
        Ok(PolicySettings::from_raw(
            &self.inner.store.raw_settings().await?,
        ))
    }
}
