//! Transport Error Types

use thiserror::Error;

/// Errors that can occur on the wireless link
#[derive(Debug, Error)]
pub enum TransportError {
    /// No Bluetooth radio on this device; permanent for the process lifetime
    #[error("no Bluetooth adapter available")]
    Unavailable,

    /// Link-layer connection failure; retryable
    #[error("connect to {peer} failed: {reason}")]
    ConnectFailed { peer: String, reason: String },

    /// Write attempted without a connected peer
    #[error("no connected peer")]
    NotConnected,

    /// Command longer than the negotiated write size
    #[error("payload of {len} bytes exceeds write MTU of {max}")]
    PayloadTooLarge { len: usize, max: usize },

    /// Transient write failure
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// Scan could not be started or polled
    #[error("discovery failed: {0}")]
    Discovery(String),
}
