//! Session Lifecycle States

use serde::Serialize;

/// Lifecycle of one physical adapter connection.
///
/// `Unconnected → Connecting → Initializing → Ready → Disconnecting →
/// Unconnected`, or `Faulted` on an unrecoverable transport error. Faulted
/// sessions recover by disconnecting and reconnecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Unconnected,
    Connecting,
    Initializing,
    /// Query-ready and polling
    Ready,
    Disconnecting,
    Faulted,
}

impl SessionState {
    /// Whether the session holds resources that need tearing down.
    pub fn is_active(&self) -> bool {
        !matches!(self, SessionState::Unconnected)
    }
}
