// ── Core error types ──
//
// User-facing errors from wisp-core. Device protocol failures are
// translated into domain variants here; consumers never handle raw
// transport errors. Errors scoped to one device or subscriber are
// contained and logged at the call site — only snapshot failures from the
// persistence collaborator abort a whole cycle.

use thiserror::Error;
use wisp_device::DeviceError;

use crate::store::StoreError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Device unreachable or credentials rejected. Always accompanied by
    /// invalidation of the cached connection.
    #[error("cannot reach device {device}: {reason}")]
    Connection { device: String, reason: String },

    /// A device write failed after the retry budget was exhausted. The
    /// billing state already committed stands; the device is reconciled
    /// again on the next cycle.
    #[error("device sync for {subscriber} failed after {attempts} attempts: {reason}")]
    SyncExhausted {
        subscriber: String,
        attempts: u32,
        reason: String,
    },

    /// The persistence collaborator failed; aborts the current cycle only.
    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("device {0} not found")]
    DeviceNotFound(crate::model::DeviceId),

    /// A worker-thread dispatch failed (panicked or was aborted).
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DeviceError> for CoreError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::Connection { address, reason } => Self::Connection {
                device: address,
                reason,
            },
            DeviceError::Auth { address, message } => Self::Connection {
                device: address,
                reason: format!("authentication rejected: {message}"),
            },
            DeviceError::Protocol { message } => Self::Connection {
                device: "<session>".into(),
                reason: message,
            },
            DeviceError::Closed => Self::Connection {
                device: "<session>".into(),
                reason: "session closed".into(),
            },
        }
    }
}
