// Shared fakes for the integration tests: an in-memory device behind the
// capability traits, and an in-memory billing store.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::SecretString;
use wisp_core::model::{
    DeviceDescriptor, DeviceId, Subscriber, SubscriberId, SubscriberStatus,
};
use wisp_core::store::{BillingStore, StoreError};
use wisp_device::{ConnectParams, DeviceConnector, DeviceError, DeviceSession, Fields};

// ── Fake device ──────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
pub struct OpCounters {
    pub queries: usize,
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
    pub closes: usize,
}

#[derive(Default)]
struct DeviceState {
    /// Resource path -> rows, each row a flat field map with an `id`.
    rows: HashMap<String, Vec<Fields>>,
    next_id: u64,
    /// When set, every session operation fails.
    fail_ops: bool,
    counters: OpCounters,
}

/// One fake device shared by connector and sessions. Connections are
/// counted so tests can assert the pool's at-most-one-connect property
/// and the syncer's invalidate-and-reconnect retries.
pub struct FakeConnector {
    state: Arc<Mutex<DeviceState>>,
    connects: AtomicUsize,
    fail_connect: AtomicBool,
    /// Addresses whose connections are refused, regardless of `fail_connect`.
    dead_addresses: Mutex<HashSet<String>>,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Arc::new(Mutex::new(DeviceState::default())),
            connects: AtomicUsize::new(0),
            fail_connect: AtomicBool::new(false),
            dead_addresses: Mutex::new(HashSet::new()),
        })
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn counters(&self) -> OpCounters {
        lock(&self.state).counters
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn kill_address(&self, address: &str) {
        lock(&self.dead_addresses).insert(address.to_owned());
    }

    pub fn set_fail_ops(&self, fail: bool) {
        lock(&self.state).fail_ops = fail;
    }

    /// Current rows of a resource path.
    pub fn rows(&self, path: &str) -> Vec<Fields> {
        lock(&self.state).rows.get(path).cloned().unwrap_or_default()
    }

    /// Pre-seed a row (an `id` is assigned automatically).
    pub fn seed_row(&self, path: &str, fields: &[(&str, &str)]) {
        let mut state = lock(&self.state);
        let id = format!("*{}", state.next_id);
        state.next_id += 1;
        let mut row: Fields = fields
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        row.insert("id".into(), id);
        state.rows.entry(path.to_owned()).or_default().push(row);
    }
}

impl DeviceConnector for FakeConnector {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn DeviceSession>, DeviceError> {
        if self.fail_connect.load(Ordering::SeqCst)
            || lock(&self.dead_addresses).contains(&params.address)
        {
            return Err(DeviceError::Connection {
                address: params.address.clone(),
                reason: "connection refused".into(),
            });
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeSession {
    state: Arc<Mutex<DeviceState>>,
}

impl FakeSession {
    fn check_failure(state: &DeviceState) -> Result<(), DeviceError> {
        if state.fail_ops {
            Err(DeviceError::protocol("simulated device failure"))
        } else {
            Ok(())
        }
    }
}

impl DeviceSession for FakeSession {
    fn query(&mut self, path: &str, filter: &[(&str, &str)]) -> Result<Vec<Fields>, DeviceError> {
        let mut state = lock(&self.state);
        Self::check_failure(&state)?;
        state.counters.queries += 1;
        let rows = state.rows.get(path).cloned().unwrap_or_default();
        Ok(rows
            .into_iter()
            .filter(|row| {
                filter
                    .iter()
                    .all(|(k, v)| row.get(*k).map(String::as_str) == Some(*v))
            })
            .collect())
    }

    fn create(&mut self, path: &str, fields: &[(&str, &str)]) -> Result<(), DeviceError> {
        let mut state = lock(&self.state);
        Self::check_failure(&state)?;
        state.counters.creates += 1;
        let id = format!("*{}", state.next_id);
        state.next_id += 1;
        let mut row: Fields = fields
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        row.insert("id".into(), id);
        state.rows.entry(path.to_owned()).or_default().push(row);
        Ok(())
    }

    fn update(
        &mut self,
        path: &str,
        id: &str,
        fields: &[(&str, &str)],
    ) -> Result<(), DeviceError> {
        let mut state = lock(&self.state);
        Self::check_failure(&state)?;
        state.counters.updates += 1;
        let row = state
            .rows
            .get_mut(path)
            .and_then(|rows| {
                rows.iter_mut()
                    .find(|row| row.get("id").map(String::as_str) == Some(id))
            })
            .ok_or_else(|| DeviceError::protocol(format!("no such entry: {id}")))?;
        for (k, v) in fields {
            row.insert((*k).to_owned(), (*v).to_owned());
        }
        Ok(())
    }

    fn delete(&mut self, path: &str, id: &str) -> Result<(), DeviceError> {
        let mut state = lock(&self.state);
        Self::check_failure(&state)?;
        state.counters.deletes += 1;
        let rows = state
            .rows
            .get_mut(path)
            .ok_or_else(|| DeviceError::protocol(format!("no such entry: {id}")))?;
        let before = rows.len();
        rows.retain(|row| row.get("id").map(String::as_str) != Some(id));
        if rows.len() == before {
            return Err(DeviceError::protocol(format!("no such entry: {id}")));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        let mut state = lock(&self.state);
        state.counters.closes += 1;
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

// ── In-memory billing store ──────────────────────────────────────────

#[derive(Default)]
pub struct MemStore {
    pub devices: Mutex<Vec<DeviceDescriptor>>,
    pub subscribers: Mutex<Vec<Subscriber>>,
    /// Presence-only payment markers: (subscriber id, period label).
    pub payments: Mutex<HashSet<(i64, String)>>,
    pub settings: Mutex<HashMap<String, String>>,
    /// Every status write, in order, for assertions.
    pub status_writes: Mutex<Vec<(SubscriberId, SubscriberStatus)>>,
    pub fail_reads: AtomicBool,
}

impl MemStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_device(&self, device: DeviceDescriptor) {
        lock(&self.devices).push(device);
    }

    pub fn add_subscriber(&self, subscriber: Subscriber) {
        lock(&self.subscribers).push(subscriber);
    }

    pub fn add_payment(&self, id: SubscriberId, period: &str) {
        lock(&self.payments).insert((id.0, period.to_owned()));
    }

    pub fn set_setting(&self, key: &str, value: &str) {
        lock(&self.settings).insert(key.to_owned(), value.to_owned());
    }

    pub fn status_of(&self, id: SubscriberId) -> Option<SubscriberStatus> {
        lock(&self.subscribers)
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.status)
    }

    pub fn status_writes(&self) -> Vec<(SubscriberId, SubscriberStatus)> {
        lock(&self.status_writes).clone()
    }

    fn check_failure(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(StoreError::new("database unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BillingStore for MemStore {
    async fn active_devices(&self) -> Result<Vec<DeviceDescriptor>, StoreError> {
        self.check_failure()?;
        Ok(lock(&self.devices)
            .iter()
            .filter(|d| d.active)
            .cloned()
            .collect())
    }

    async fn device(&self, id: DeviceId) -> Result<Option<DeviceDescriptor>, StoreError> {
        self.check_failure()?;
        Ok(lock(&self.devices).iter().find(|d| d.id == id).cloned())
    }

    async fn subscribers(&self) -> Result<Vec<Subscriber>, StoreError> {
        self.check_failure()?;
        Ok(lock(&self.subscribers).clone())
    }

    async fn has_payment(&self, id: SubscriberId, period: &str) -> Result<bool, StoreError> {
        self.check_failure()?;
        Ok(lock(&self.payments).contains(&(id.0, period.to_owned())))
    }

    async fn raw_settings(&self) -> Result<HashMap<String, String>, StoreError> {
        self.check_failure()?;
        Ok(lock(&self.settings).clone())
    }

    async fn set_subscriber_status(
        &self,
        id: SubscriberId,
        status: SubscriberStatus,
    ) -> Result<(), StoreError> {
        lock(&self.status_writes).push((id, status));
        if let Some(subscriber) = lock(&self.subscribers).iter_mut().find(|s| s.id == id) {
            subscriber.status = status;
        }
        Ok(())
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────

pub fn descriptor(id: i64) -> DeviceDescriptor {
    DeviceDescriptor {
        id: DeviceId(id),
        name: format!("router-{id}"),
        address: format!("10.0.{id}.1"),
        username: "admin".into(),
        password: SecretString::from("hunter2".to_owned()),
        port: 8728,
        secure: false,
        monitor_interface: None,
        active: true,
    }
}

pub fn subscriber(id: i64, device: Option<DeviceId>) -> Subscriber {
    Subscriber {
        id: SubscriberId(id),
        name: format!("sub-{id}"),
        address: format!("10.1.0.{id}"),
        upload_limit: "5M".into(),
        download_limit: "10M".into(),
        billing_day: 5,
        status: SubscriberStatus::Active,
        device_id: device,
    }
}
