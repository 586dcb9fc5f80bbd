//! Byte-Stream Transport Contract

use crate::error::TransportError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A duplex byte stream to an OBD-II adapter.
///
/// Commands go out through [`write`](Transport::write); inbound bytes arrive
/// on the channel returned by [`connect`](Transport::connect), one message
/// per received chunk. Chunks carry no framing — a single chunk may hold a
/// fragment of a response, a whole response, or several; reassembly is the
/// frame assembler's job.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Connect to a previously discovered peer and return the inbound
    /// notification channel. Any already-active connection is torn down
    /// first.
    async fn connect(&self, peer_id: &str) -> Result<mpsc::Receiver<Vec<u8>>, TransportError>;

    /// Send raw command bytes to the connected peer.
    async fn write(&self, payload: &[u8]) -> Result<(), TransportError>;

    /// Drop the connection. Idempotent; always succeeds locally even if the
    /// peer is unreachable.
    async fn disconnect(&self);
}
