//! Protocol Error Types

use obd_transport::TransportError;
use thiserror::Error;

/// Errors that can occur while bringing the adapter to a query-ready state.
///
/// Initialization is all-or-nothing: any failure tears the session back to
/// unconnected; there is no partial-success state.
#[derive(Debug, Error)]
pub enum InitError {
    /// A configuration command went unanswered
    #[error("no response to {command:?} within {timeout_ms} ms")]
    Timeout { command: String, timeout_ms: u64 },

    /// The inbound frame channel closed mid-sequence
    #[error("response channel closed during initialization")]
    ChannelClosed,

    #[error(transparent)]
    Transport(#[from] TransportError),
}
