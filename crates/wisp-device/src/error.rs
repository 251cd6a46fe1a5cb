// ── Device protocol error types ──
//
// Transport-level failures as seen at the capability boundary. The core
// translates these into its own error type; consumers of wisp-core never
// see raw protocol failures.

use thiserror::Error;

/// Errors surfaced by a device protocol client.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device is unreachable (refused, timed out, routing failure).
    #[error("cannot connect to device at {address}: {reason}")]
    Connection { address: String, reason: String },

    /// The device rejected the supplied credentials.
    #[error("authentication rejected by {address}: {message}")]
    Auth { address: String, message: String },

    /// The device answered, but the exchange failed mid-flight
    /// (malformed reply, rejected command, dropped socket).
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// The session has already been closed.
    #[error("session closed")]
    Closed,
}

impl DeviceError {
    /// Shorthand for a [`DeviceError::Protocol`] with a formatted message.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}
