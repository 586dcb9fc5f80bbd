//! Adapter Initialization
//!
//! Drives a freshly connected ELM327 through its configuration sequence:
//! reset, echo off, linefeeds off, spaces off, headers off, automatic
//! protocol selection. The exact tokens vary across adapter families, so
//! they live in [`AdapterProfile`] rather than in code.

use crate::error::InitError;
use crate::COMMAND_TERMINATOR;
use obd_transport::Transport;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info};

/// AT command set and timing for one adapter family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterProfile {
    pub reset: String,
    pub echo_off: String,
    pub linefeeds_off: String,
    pub spaces_off: String,
    pub headers_off: String,
    pub select_protocol: String,
    /// Settling time after the reset command
    pub reset_settle_ms: u64,
    /// How long to wait for each command's response frame
    pub command_timeout_ms: u64,
}

impl Default for AdapterProfile {
    fn default() -> Self {
        Self {
            reset: "ATZ".to_string(),
            echo_off: "ATE0".to_string(),
            linefeeds_off: "ATL0".to_string(),
            spaces_off: "ATS0".to_string(),
            headers_off: "ATH0".to_string(),
            select_protocol: "ATSP0".to_string(),
            reset_settle_ms: 1000,
            command_timeout_ms: 2000,
        }
    }
}

impl AdapterProfile {
    /// Commands in the order the adapter expects them.
    pub fn sequence(&self) -> [&str; 6] {
        [
            &self.reset,
            &self.echo_off,
            &self.linefeeds_off,
            &self.spaces_off,
            &self.headers_off,
            &self.select_protocol,
        ]
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn reset_settle(&self) -> Duration {
        Duration::from_millis(self.reset_settle_ms)
    }
}

/// Bring a freshly connected adapter into a query-ready state.
///
/// Each command is sent only after the previous one's response frame
/// arrived on `frames`; a command that goes unanswered within the profile
/// timeout fails the whole sequence — there is no partial-success state.
pub async fn initialize<T: Transport + ?Sized>(
    transport: &T,
    frames: &mut mpsc::Receiver<String>,
    profile: &AdapterProfile,
) -> Result<(), InitError> {
    for (index, command) in profile.sequence().into_iter().enumerate() {
        debug!("init: sending {}", command);
        let mut payload = command.as_bytes().to_vec();
        payload.extend_from_slice(COMMAND_TERMINATOR.as_bytes());
        transport.write(&payload).await?;

        match timeout(profile.command_timeout(), frames.recv()).await {
            Ok(Some(frame)) => debug!("init: {} answered {:?}", command, frame),
            Ok(None) => return Err(InitError::ChannelClosed),
            Err(_) => {
                return Err(InitError::Timeout {
                    command: command.to_string(),
                    timeout_ms: profile.command_timeout_ms,
                })
            }
        }

        // The reset reboots the adapter firmware; give it time to come back
        // before the next command.
        if index == 0 {
            tokio::time::sleep(profile.reset_settle()).await;
        }
    }

    info!("adapter initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FrameAssembler;
    use obd_transport::MockLink;

    fn fast_profile() -> AdapterProfile {
        AdapterProfile {
            reset_settle_ms: 0,
            command_timeout_ms: 100,
            ..AdapterProfile::default()
        }
    }

    /// Pump a link's raw chunks into a frame channel, like the session
    /// reader does.
    fn spawn_framer(
        mut chunks: mpsc::Receiver<Vec<u8>>,
    ) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            let mut assembler = FrameAssembler::new();
            while let Some(chunk) = chunks.recv().await {
                for frame in assembler.push_chunk(&chunk) {
                    if tx.send(frame).await.is_err() {
                        return;
                    }
                }
            }
        });
        rx
    }

    #[tokio::test]
    async fn test_full_sequence_in_order() {
        let link = MockLink::with_auto_reply(b"OK\r\r>");
        let chunks = link.connect("mock").await.unwrap();
        let mut frames = spawn_framer(chunks);

        initialize(&link, &mut frames, &fast_profile()).await.unwrap();

        let sent: Vec<Vec<u8>> = link.writes().await;
        let expected: Vec<Vec<u8>> = ["ATZ", "ATE0", "ATL0", "ATS0", "ATH0", "ATSP0"]
            .iter()
            .map(|c| format!("{c}\r").into_bytes())
            .collect();
        assert_eq!(sent, expected);
    }

    #[tokio::test]
    async fn test_unanswered_command_times_out() {
        let link = MockLink::new(); // never replies
        let chunks = link.connect("mock").await.unwrap();
        let mut frames = spawn_framer(chunks);

        let err = initialize(&link, &mut frames, &fast_profile())
            .await
            .unwrap_err();
        assert!(matches!(err, InitError::Timeout { ref command, .. } if command == "ATZ"));

        // Nothing past the failed command was sent.
        assert_eq!(link.writes().await.len(), 1);
    }

    #[tokio::test]
    async fn test_custom_token_set() {
        let link = MockLink::with_auto_reply(b"OK>");
        let chunks = link.connect("mock").await.unwrap();
        let mut frames = spawn_framer(chunks);

        let profile = AdapterProfile {
            select_protocol: "STP 33".to_string(),
            ..fast_profile()
        };
        initialize(&link, &mut frames, &profile).await.unwrap();
        assert_eq!(link.writes().await.last().unwrap(), b"STP 33\r");
    }
}
