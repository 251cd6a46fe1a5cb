// ── Device session trait ──
//
// One exclusively-owned management session against one device. Every call
// blocks the calling thread until the device answers; the core wraps each
// batch of calls in `spawn_blocking` under the device's pool lock.

use std::collections::BTreeMap;

use crate::error::DeviceError;

/// One row of a device resource, as flat string key/value pairs.
///
/// Keys follow the device's own naming (`"max-limit"`, `"target"`,
/// `"disabled"`); the [`resource::ID`](crate::resource::ID) key carries the
/// entry identifier used by `update`/`delete`.
pub type Fields = BTreeMap<String, String>;

/// A live management session against a single device.
///
/// Sessions are `Send` so they can be parked inside the connection pool and
/// moved onto worker threads, but they are never shared: the pool guarantees
/// at most one caller uses a session at a time.
pub trait DeviceSession: Send {
    /// List entries of a resource, keeping only rows on which every
    /// `(key, value)` filter pair matches exactly. An empty filter returns
    /// the full ordered listing.
    fn query(&mut self, path: &str, filter: &[(&str, &str)]) -> Result<Vec<Fields>, DeviceError>;

    /// Create a new entry.
    fn create(&mut self, path: &str, fields: &[(&str, &str)]) -> Result<(), DeviceError>;

    /// Update fields of the entry with the given id.
    fn update(&mut self, path: &str, id: &str, fields: &[(&str, &str)])
    -> Result<(), DeviceError>;

    /// Delete the entry with the given id.
    fn delete(&mut self, path: &str, id: &str) -> Result<(), DeviceError>;

    /// Tear down the underlying transport. Errors are advisory; the
    /// session must not be used afterwards.
    fn close(&mut self) -> Result<(), DeviceError>;
}
