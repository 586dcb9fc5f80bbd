//! In-Memory Transport for Tests
//!
//! No radio required. Writes are recorded for inspection; inbound chunks are
//! injected by the test (or produced by an optional canned auto-reply).

use crate::error::TransportError;
use crate::link::Transport;
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

struct MockState {
    connected: bool,
    fail_writes: bool,
    writes: Vec<Vec<u8>>,
    inbound_tx: Option<mpsc::Sender<Vec<u8>>>,
    auto_reply: Option<Vec<u8>>,
}

/// Scriptable [`Transport`] used by unit tests and the simulator.
pub struct MockLink {
    state: Mutex<MockState>,
}

impl MockLink {
    pub fn new() -> Self {
        Self::with_reply(None)
    }

    /// Answer every write with the same canned chunk, the way a dongle
    /// answers each command with an `OK` and a prompt.
    pub fn with_auto_reply(reply: &[u8]) -> Self {
        Self::with_reply(Some(reply.to_vec()))
    }

    fn with_reply(auto_reply: Option<Vec<u8>>) -> Self {
        Self {
            state: Mutex::new(MockState {
                connected: false,
                fail_writes: false,
                writes: Vec::new(),
                inbound_tx: None,
                auto_reply,
            }),
        }
    }

    /// Push an inbound chunk, as if the peer had notified it.
    pub async fn inject(&self, chunk: &[u8]) {
        let state = self.state.lock().await;
        if let Some(tx) = &state.inbound_tx {
            let _ = tx.send(chunk.to_vec()).await;
        }
    }

    /// Make subsequent writes fail with [`TransportError::WriteFailed`].
    pub async fn fail_writes(&self, fail: bool) {
        self.state.lock().await.fail_writes = fail;
    }

    /// Everything written so far, oldest first.
    pub async fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().await.writes.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.connected
    }
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockLink {
    async fn connect(&self, _peer_id: &str) -> Result<mpsc::Receiver<Vec<u8>>, TransportError> {
        let (tx, rx) = mpsc::channel(64);
        let mut state = self.state.lock().await;
        state.connected = true;
        state.inbound_tx = Some(tx);
        Ok(rx)
    }

    async fn write(&self, payload: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        if state.fail_writes {
            return Err(TransportError::WriteFailed("simulated failure".to_string()));
        }
        state.writes.push(payload.to_vec());

        if let Some(reply) = state.auto_reply.clone() {
            if let Some(tx) = &state.inbound_tx {
                let _ = tx.try_send(reply);
            }
        }
        Ok(())
    }

    async fn disconnect(&self) {
        let mut state = self.state.lock().await;
        state.connected = false;
        state.inbound_tx = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_requires_connection() {
        let link = MockLink::new();
        assert!(matches!(
            link.write(b"ATZ\r").await,
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_auto_reply_round_trip() {
        let link = MockLink::with_auto_reply(b"OK\r\r>");
        let mut rx = link.connect("mock").await.unwrap();
        link.write(b"ATZ\r").await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), b"OK\r\r>");
        assert_eq!(link.writes().await, vec![b"ATZ\r".to_vec()]);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let link = MockLink::new();
        let _rx = link.connect("mock").await.unwrap();
        link.disconnect().await;
        link.disconnect().await;
        assert!(!link.is_connected().await);
    }
}
