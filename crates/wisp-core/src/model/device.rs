// ── Device records ──

use std::fmt;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use wisp_device::ConnectParams;

/// Opaque device identifier, assigned by the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub i64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Connection and identity record for one managed device.
///
/// Owned by the persistence collaborator; the core only reads it.
#[derive(Debug, Clone)]
pub struct DeviceDescriptor {
    pub id: DeviceId,
    pub name: String,
    /// Management address (IP or hostname).
    pub address: String,
    pub username: String,
    pub password: SecretString,
    pub port: u16,
    /// Use the TLS variant of the management transport.
    pub secure: bool,
    /// WAN interface to monitor, when the operator has designated one.
    pub monitor_interface: Option<String>,
    /// Inactive devices are skipped by the poller.
    pub active: bool,
}

impl DeviceDescriptor {
    /// Connection parameters for the device capability layer.
    pub fn connect_params(&self) -> ConnectParams {
        ConnectParams {
            address: self.address.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            port: self.port,
            secure: self.secure,
        }
    }
}
