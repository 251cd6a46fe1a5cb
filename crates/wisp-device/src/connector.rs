// ── Device connector trait ──

use secrecy::SecretString;

use crate::error::DeviceError;
use crate::session::DeviceSession;

/// Everything needed to open a session against one device.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    /// Device management address (IP or hostname).
    pub address: String,
    pub username: String,
    pub password: SecretString,
    pub port: u16,
    /// Use the TLS variant of the management transport.
    pub secure: bool,
}

/// Factory for device sessions.
///
/// `connect` is synchronous and may block for the full transport timeout;
/// the connection pool always invokes it from a worker thread. Auth and
/// network failures surface as [`DeviceError::Auth`] /
/// [`DeviceError::Connection`] and must leave no half-open state behind.
pub trait DeviceConnector: Send + Sync {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn DeviceSession>, DeviceError>;
}
