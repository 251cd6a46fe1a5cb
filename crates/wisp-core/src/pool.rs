// ── Device connection pool ──
//
// At most one live session per device id. The registry is a concurrent map
// touched only for structural changes; each slot carries its own async
// mutex guarding the session for the full duration of a lease. Building a
// connection holds only that device's slot lock, so one unreachable device
// can never stall operations against any other device.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};
use wisp_device::{DeviceConnector, DeviceError, DeviceSession};

use crate::error::CoreError;
use crate::model::{DeviceDescriptor, DeviceId};

type Slot = Option<Box<dyn DeviceSession>>;

/// Registry of live device sessions, keyed by device id.
pub struct ConnectionPool {
    connector: Arc<dyn DeviceConnector>,
    slots: DashMap<DeviceId, Arc<Mutex<Slot>>>,
}

impl ConnectionPool {
    pub fn new(connector: Arc<dyn DeviceConnector>) -> Self {
        Self {
            connector,
            slots: DashMap::new(),
        }
    }

    /// Acquire exclusive use of the device's session, connecting first if
    /// no session is cached.
    ///
    /// Concurrent callers serialize on the device's slot lock, so at most
    /// one connection is ever built per device: whoever wins the lock
    /// connects, everyone queued behind finds the installed session. A
    /// connect failure propagates to the caller and caches nothing.
    pub async fn lease(&self, device: &DeviceDescriptor) -> Result<DeviceLease, CoreError> {
        let slot = self.slot(device.id);
        let mut guard = slot.lock_owned().await;

        if guard.is_none() {
            debug!(device = %device.id, address = %device.address, "opening device session");
            let connector = Arc::clone(&self.connector);
            let params = device.connect_params();
            let session = tokio::task::spawn_blocking(move || connector.connect(&params))
                .await
                .map_err(|e| CoreError::Internal(format!("connect task failed: {e}")))??;
            *guard = Some(session);
        }

        Ok(DeviceLease { guard })
    }

    /// Close and drop the device's cached session, if any.
    ///
    /// Waits for the slot lock, so an in-flight lease finishes first. The
    /// next lease rebuilds the connection from scratch.
    pub async fn invalidate(&self, id: DeviceId) {
        let Some(slot) = self.slots.get(&id).map(|entry| Arc::clone(entry.value())) else {
            return;
        };
        let mut guard = slot.lock_owned().await;
        if let Some(session) = guard.take() {
            debug!(device = %id, "invalidating device session");
            close_session(session).await;
        }
    }

    /// Close the device's session and unregister its slot.
    ///
    /// For devices deleted by the operator: unlike
    /// [`invalidate`](Self::invalidate) the registry entry is dropped too,
    /// so device churn never grows the map. Waits for an in-flight lease
    /// on the slot before closing.
    pub async fn remove(&self, id: DeviceId) {
        let Some((_, slot)) = self.slots.remove(&id) else {
            return;
        };
        let mut guard = slot.lock_owned().await;
        if let Some(session) = guard.take() {
            debug!(device = %id, "removing device session");
            close_session(session).await;
        }
    }

    /// Close every cached session and clear the registry.
    pub async fn shutdown_all(&self) {
        let slots: Vec<_> = self
            .slots
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for slot in slots {
            let mut guard = slot.lock_owned().await;
            if let Some(session) = guard.take() {
                close_session(session).await;
            }
        }
        self.slots.clear();
    }

    /// The slot (and its lock) for a device, created on first use.
    ///
    /// Slots persist across invalidation so queued waiters keep sharing
    /// one lock per device id.
    fn slot(&self, id: DeviceId) -> Arc<Mutex<Slot>> {
        Arc::clone(
            self.slots
                .entry(id)
                .or_insert_with(|| Arc::new(Mutex::new(None)))
                .value(),
        )
    }
}

async fn close_session(mut session: Box<dyn DeviceSession>) {
    let closed = tokio::task::spawn_blocking(move || session.close()).await;
    match closed {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "device session close failed"),
        Err(e) => warn!(error = %e, "device session close task failed"),
    }
}

/// Exclusive use of one device's session for one batch of protocol calls.
///
/// The slot lock is held for the lease's whole lifetime and released
/// unconditionally when [`run`](Self::run) returns, success or error.
pub struct DeviceLease {
    guard: OwnedMutexGuard<Slot>,
}

impl DeviceLease {
    /// Run a batch of blocking protocol calls against the leased session
    /// on a worker thread.
    ///
    /// The closure gets the session exclusively; the cooperative scheduler
    /// is never blocked. Consumes the lease — one batch per lease keeps
    /// lock scopes honest.
    pub async fn run<T, F>(self, op: F) -> Result<T, CoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn DeviceSession) -> Result<T, DeviceError> + Send + 'static,
    {
        let mut guard = self.guard;
        let result = tokio::task::spawn_blocking(move || {
            let outcome = match guard.as_mut() {
                Some(session) => op(session.as_mut()),
                None => Err(DeviceError::Closed),
            };
            // Guard dropped here, on the worker thread, after the batch.
            drop(guard);
            outcome
        })
        .await
        .map_err(|e| CoreError::Internal(format!("device task failed: {e}")))?;

        result.map_err(CoreError::from)
    }
}
