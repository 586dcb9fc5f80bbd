//! Session Error Types

use obd_protocol::InitError;
use obd_transport::TransportError;
use thiserror::Error;

/// Errors surfaced by `connect`.
///
/// Everything downstream of a successful ready transition degrades
/// gracefully instead of erroring: malformed responses are dropped and a
/// lone write failure only logs.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The adapter never became query-ready; retryable by reconnecting
    #[error("adapter initialization failed: {0}")]
    AdapterInit(#[from] InitError),
}
