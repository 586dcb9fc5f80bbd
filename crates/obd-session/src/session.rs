//! Session Implementation

use crate::error::SessionError;
use crate::state::SessionState;
use obd_protocol::{
    decode_response, initialize, AdapterProfile, FrameAssembler, VehicleSnapshot,
    COMMAND_TERMINATOR,
};
use obd_scheduler::{PollQueue, SchedulerConfig};
use obd_transport::Transport;
use std::sync::{Arc, Mutex};
use telemetry_hub::{Subscription, TelemetryHub};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Everything tunable about a session.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub adapter: AdapterProfile,
    pub scheduler: SchedulerConfig,
}

/// One adapter connection: lifecycle, polling, and telemetry distribution.
///
/// Owns three tasks while connected: a reader turning notification chunks
/// into frames, a decoder turning frames into snapshot updates, and a
/// scheduler issuing one query per tick. All three stop on `disconnect`.
pub struct ObdSession<T: Transport> {
    transport: Arc<T>,
    hub: Arc<TelemetryHub>,
    config: SessionConfig,
    state: Arc<Mutex<SessionState>>,
    tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl<T: Transport> ObdSession<T> {
    pub fn new(transport: Arc<T>, config: SessionConfig) -> Self {
        Self {
            transport,
            hub: Arc::new(TelemetryHub::new()),
            config,
            state: Arc::new(Mutex::new(SessionState::Unconnected)),
            tasks: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// Connect to a discovered peer and start polling.
    ///
    /// An already-active session is torn down first; on any failure the
    /// session lands back in [`SessionState::Unconnected`] with nothing
    /// half-started.
    pub async fn connect(&self, peer_id: &str, display_name: &str) -> Result<(), SessionError> {
        if self.state().is_active() {
            info!("tearing down previous session before reconnect");
            self.disconnect().await;
        }

        self.set_state(SessionState::Connecting);
        self.hub.reset();

        let mut chunks = match self.transport.connect(peer_id).await {
            Ok(rx) => rx,
            Err(e) => {
                self.set_state(SessionState::Unconnected);
                return Err(e.into());
            }
        };

        self.set_state(SessionState::Initializing);

        // Reader: notification chunks -> complete frames. Aborting it drops
        // the assembler and with it any half-received response.
        let (frames_tx, mut frames_rx) = mpsc::channel::<String>(64);
        let reader = tokio::spawn(async move {
            let mut assembler = FrameAssembler::new();
            while let Some(chunk) = chunks.recv().await {
                for frame in assembler.push_chunk(&chunk) {
                    if frames_tx.send(frame).await.is_err() {
                        return;
                    }
                }
            }
            debug!("notification channel closed");
        });

        if let Err(e) =
            initialize(self.transport.as_ref(), &mut frames_rx, &self.config.adapter).await
        {
            reader.abort();
            self.transport.disconnect().await;
            self.set_state(SessionState::Unconnected);
            return Err(SessionError::AdapterInit(e));
        }

        self.set_state(SessionState::Ready);
        self.hub.set_connection(true, display_name);
        info!("session ready, polling {}", display_name);

        let decoder = self.spawn_decoder(frames_rx);
        let scheduler = self.spawn_scheduler();

        let mut tasks = self.tasks.lock().await;
        tasks.extend([reader, decoder, scheduler]);
        Ok(())
    }

    /// Stop polling and drop the connection. Idempotent and infallible; a
    /// second call on an idle session does nothing.
    pub async fn disconnect(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if !state.is_active() {
                debug!("disconnect on idle session");
                return;
            }
            *state = SessionState::Disconnecting;
        }

        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
        self.transport.disconnect().await;
        self.hub.set_connection(false, "");
        self.set_state(SessionState::Unconnected);
        info!("session closed");
    }

    /// Register a snapshot observer; the current snapshot is delivered
    /// immediately.
    pub fn subscribe(
        &self,
        observer: impl Fn(&VehicleSnapshot) + Send + Sync + 'static,
    ) -> Subscription {
        self.hub.subscribe(observer)
    }

    /// Point-in-time copy of the current snapshot.
    pub fn snapshot(&self) -> VehicleSnapshot {
        self.hub.snapshot()
    }

    /// Whether the session is query-ready and polling.
    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, next: SessionState) {
        *self.state.lock().unwrap() = next;
    }

    /// Frames -> decoded values -> hub. Frames arriving after the session
    /// leaves the polling state are dropped unseen.
    fn spawn_decoder(&self, mut frames_rx: mpsc::Receiver<String>) -> JoinHandle<()> {
        let hub = Arc::clone(&self.hub);
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            while let Some(frame) = frames_rx.recv().await {
                if *state.lock().unwrap() != SessionState::Ready {
                    continue;
                }
                if let Some(decoded) = decode_response(&frame) {
                    hub.apply(&decoded);
                }
            }
        })
    }

    /// One query per tick, next PID from the poll queue. Fires whether or
    /// not the previous response has arrived; responses are routed by PID
    /// tag, not request correlation.
    fn spawn_scheduler(&self) -> JoinHandle<()> {
        let transport = Arc::clone(&self.transport);
        let hub = Arc::clone(&self.hub);
        let state = Arc::clone(&self.state);
        let config = self.config.scheduler.clone();
        tokio::spawn(async move {
            let mut queue = PollQueue::from_config(&config);
            let mut interval = tokio::time::interval(config.tick_interval());
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut failures: u32 = 0;

            loop {
                interval.tick().await;
                if *state.lock().unwrap() != SessionState::Ready {
                    break;
                }
                let Some(pid) = queue.next() else {
                    continue;
                };

                let mut payload = pid.request().into_bytes();
                payload.extend_from_slice(COMMAND_TERMINATOR.as_bytes());
                match transport.write(&payload).await {
                    Ok(()) => failures = 0,
                    Err(e) => {
                        failures += 1;
                        warn!("query {:?} failed ({} in a row): {}", pid, failures, e);
                        if failures >= config.max_write_failures {
                            warn!("write failure threshold reached, faulting session");
                            *state.lock().unwrap() = SessionState::Faulted;
                            hub.set_connection(false, "");
                            break;
                        }
                    }
                }
            }
            debug!("scheduler stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obd_transport::MockLink;
    use std::time::Duration;

    fn fast_config() -> SessionConfig {
        SessionConfig {
            adapter: AdapterProfile {
                reset_settle_ms: 0,
                command_timeout_ms: 200,
                ..AdapterProfile::default()
            },
            scheduler: SchedulerConfig {
                tick_interval_ms: 10,
                max_write_failures: 3,
                ..SchedulerConfig::default()
            },
        }
    }

    fn ready_link() -> Arc<MockLink> {
        Arc::new(MockLink::with_auto_reply(b"OK\r\r>"))
    }

    #[tokio::test]
    async fn test_connect_reaches_ready() {
        let link = ready_link();
        let session = ObdSession::new(Arc::clone(&link), fast_config());

        session.connect("mock-peer", "Mock OBDII").await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert!(session.is_ready());
        assert_eq!(session.snapshot().device_name, "Mock OBDII");

        session.disconnect().await;
        assert_eq!(session.state(), SessionState::Unconnected);
        assert!(!session.is_ready());
    }

    #[tokio::test]
    async fn test_init_runs_before_polling() {
        let link = ready_link();
        let session = ObdSession::new(Arc::clone(&link), fast_config());
        session.connect("mock-peer", "Mock OBDII").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        session.disconnect().await;

        let writes = link.writes().await;
        let as_text: Vec<String> = writes
            .iter()
            .map(|w| String::from_utf8_lossy(w).into_owned())
            .collect();
        assert_eq!(
            &as_text[..6],
            &["ATZ\r", "ATE0\r", "ATL0\r", "ATS0\r", "ATH0\r", "ATSP0\r"]
        );
        // Polling started after the init sequence; the first query is the
        // first priority PID.
        assert_eq!(as_text[6], "010C\r");
        assert!(as_text.len() > 8);
    }

    #[tokio::test]
    async fn test_responses_update_snapshot() {
        let link = ready_link();
        let session = ObdSession::new(Arc::clone(&link), fast_config());
        session.connect("mock-peer", "Mock OBDII").await.unwrap();

        link.inject(b"41 0C 1A F8\r\r>").await;
        link.inject(b"41 0D 55\r>41 05 7B\r>").await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let snapshot = session.snapshot();
        assert!((snapshot.rpm - 1726.0).abs() < 0.01);
        assert!((snapshot.speed_kmh - 85.0).abs() < 0.01);
        assert!((snapshot.coolant_temp_c - 83.0).abs() < 0.01);

        session.disconnect().await;
    }

    #[tokio::test]
    async fn test_noise_never_corrupts_snapshot() {
        let link = ready_link();
        let session = ObdSession::new(Arc::clone(&link), fast_config());
        session.connect("mock-peer", "Mock OBDII").await.unwrap();
        let before = session.snapshot();

        link.inject(b"NO DATA\r>").await;
        link.inject(b"010C\r>").await; // command echo
        link.inject(b"41 0C 1A\r>").await; // truncated
        tokio::time::sleep(Duration::from_millis(100)).await;

        let after = session.snapshot();
        assert_eq!(before.rpm, after.rpm);
        assert_eq!(after.rpm, 0.0);

        session.disconnect().await;
    }

    #[tokio::test]
    async fn test_init_timeout_tears_back_to_unconnected() {
        let link = Arc::new(MockLink::new()); // adapter never answers
        let session = ObdSession::new(Arc::clone(&link), fast_config());

        let err = session.connect("mock-peer", "Mock OBDII").await.unwrap_err();
        assert!(matches!(err, SessionError::AdapterInit(_)));
        assert_eq!(session.state(), SessionState::Unconnected);
        assert!(!session.is_ready());
        assert!(!link.is_connected().await);
    }

    #[tokio::test]
    async fn test_repeated_write_failures_fault_the_session() {
        let link = ready_link();
        let session = ObdSession::new(Arc::clone(&link), fast_config());
        session.connect("mock-peer", "Mock OBDII").await.unwrap();

        link.fail_writes(true).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(session.state(), SessionState::Faulted);
        assert!(!session.is_ready());
        assert!(!session.snapshot().connected);

        // A faulted session still tears down cleanly.
        session.disconnect().await;
        assert_eq!(session.state(), SessionState::Unconnected);
    }

    #[tokio::test]
    async fn test_disconnect_twice_is_a_no_op() {
        let link = ready_link();
        let session = ObdSession::new(Arc::clone(&link), fast_config());
        session.connect("mock-peer", "Mock OBDII").await.unwrap();

        session.disconnect().await;
        session.disconnect().await;
        assert_eq!(session.state(), SessionState::Unconnected);
    }

    #[tokio::test]
    async fn test_reconnect_tears_down_previous_session() {
        let link = ready_link();
        let session = ObdSession::new(Arc::clone(&link), fast_config());

        session.connect("mock-peer", "First").await.unwrap();
        session.connect("mock-peer", "Second").await.unwrap();

        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.snapshot().device_name, "Second");
        session.disconnect().await;
    }

    #[tokio::test]
    async fn test_reconnect_starts_from_a_fresh_snapshot() {
        let link = ready_link();
        let session = ObdSession::new(Arc::clone(&link), fast_config());
        session.connect("mock-peer", "Mock OBDII").await.unwrap();

        link.inject(b"41 0C 1A F8\r>").await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(session.snapshot().rpm > 0.0);

        session.disconnect().await;
        session.connect("mock-peer", "Mock OBDII").await.unwrap();
        assert_eq!(session.snapshot().rpm, 0.0);
        session.disconnect().await;
    }

    #[tokio::test]
    async fn test_subscriber_sees_updates() {
        let link = ready_link();
        let session = ObdSession::new(Arc::clone(&link), fast_config());
        session.connect("mock-peer", "Mock OBDII").await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let _sub = session.subscribe(move |snapshot| {
            seen_clone.lock().unwrap().push(snapshot.rpm);
        });

        link.inject(b"41 0C 1A F8\r>").await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.first(), Some(&0.0)); // immediate initial delivery
        assert!(seen.contains(&1726.0));

        drop(seen);
        session.disconnect().await;
    }
}
