//! Hub Implementation

use obd_protocol::{Decoded, VehicleSnapshot};
use std::sync::{Arc, Mutex, Weak};
use tracing::debug;

type Observer = Arc<dyn Fn(&VehicleSnapshot) + Send + Sync>;

struct HubInner {
    snapshot: VehicleSnapshot,
    subscribers: Vec<(u64, Observer)>,
    next_id: u64,
}

/// Latest-value store with synchronous publish.
///
/// Observers run on the publisher's task; the subscriber list is copied per
/// publish so an observer unsubscribing itself (or anyone else) mid-notify
/// neither crashes nor skips the remaining observers.
pub struct TelemetryHub {
    inner: Mutex<HubInner>,
}

impl TelemetryHub {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HubInner {
                snapshot: VehicleSnapshot::default(),
                subscribers: Vec::new(),
                next_id: 0,
            }),
        }
    }

    /// Register an observer and immediately deliver the current snapshot
    /// once, stale or not. The returned handle unsubscribes on drop or via
    /// [`Subscription::cancel`].
    pub fn subscribe(
        self: &Arc<Self>,
        observer: impl Fn(&VehicleSnapshot) + Send + Sync + 'static,
    ) -> Subscription {
        let observer: Observer = Arc::new(observer);
        let (id, snapshot) = {
            let mut inner = self.inner.lock().unwrap();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.push((id, Arc::clone(&observer)));
            (id, inner.snapshot.clone())
        };
        debug!("subscriber {} registered", id);

        // Initial delivery happens outside the lock so the observer may
        // subscribe or unsubscribe from within its own callback.
        observer(&snapshot);
        Subscription {
            hub: Arc::downgrade(self),
            id,
        }
    }

    /// Write one decoded value and notify every subscriber.
    pub fn apply(&self, decoded: &Decoded) {
        let (snapshot, subscribers) = {
            let mut inner = self.inner.lock().unwrap();
            inner.snapshot.apply(decoded);
            (inner.snapshot.clone(), inner.subscribers.clone())
        };
        Self::notify(&snapshot, &subscribers);
    }

    /// Flip the connection flag and device name, notifying subscribers.
    pub fn set_connection(&self, connected: bool, device_name: &str) {
        let (snapshot, subscribers) = {
            let mut inner = self.inner.lock().unwrap();
            inner.snapshot.connected = connected;
            inner.snapshot.device_name = device_name.to_string();
            (inner.snapshot.clone(), inner.subscribers.clone())
        };
        Self::notify(&snapshot, &subscribers);
    }

    /// Zero every field for a fresh session, notifying subscribers.
    pub fn reset(&self) {
        let (snapshot, subscribers) = {
            let mut inner = self.inner.lock().unwrap();
            inner.snapshot = VehicleSnapshot::default();
            (inner.snapshot.clone(), inner.subscribers.clone())
        };
        Self::notify(&snapshot, &subscribers);
    }

    /// Point-in-time copy of the current snapshot.
    pub fn snapshot(&self) -> VehicleSnapshot {
        self.inner.lock().unwrap().snapshot.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.lock().unwrap().snapshot.connected
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().unwrap().subscribers.len()
    }

    fn notify(snapshot: &VehicleSnapshot, subscribers: &[(u64, Observer)]) {
        for (_, observer) in subscribers {
            observer(snapshot);
        }
    }

    fn unsubscribe(&self, id: u64) {
        let mut inner = self.inner.lock().unwrap();
        inner.subscribers.retain(|(sub_id, _)| *sub_id != id);
        debug!("subscriber {} removed", id);
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Unsubscribe handle returned by [`TelemetryHub::subscribe`].
pub struct Subscription {
    hub: Weak<TelemetryHub>,
    id: u64,
}

impl Subscription {
    /// Explicit unsubscribe; equivalent to dropping the handle.
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obd_protocol::decode_response;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn rpm_update() -> Decoded {
        decode_response("41 0C 1A F8").unwrap()
    }

    #[test]
    fn test_subscribe_delivers_current_snapshot_immediately() {
        let hub = Arc::new(TelemetryHub::new());
        hub.apply(&rpm_update());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let _sub = hub.subscribe(move |snapshot| {
            seen_clone.lock().unwrap().push(snapshot.rpm);
        });

        assert_eq!(seen.lock().unwrap().as_slice(), &[1726.0]);
    }

    #[test]
    fn test_publish_fans_out_full_copies() {
        let hub = Arc::new(TelemetryHub::new());
        let count = Arc::new(AtomicUsize::new(0));

        let c1 = Arc::clone(&count);
        let _s1 = hub.subscribe(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        let c2 = Arc::clone(&count);
        let _s2 = hub.subscribe(move |_| {
            c2.fetch_add(1, Ordering::SeqCst);
        });

        count.store(0, Ordering::SeqCst); // ignore initial deliveries
        hub.apply(&rpm_update());
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(hub.snapshot().rpm, 1726.0);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let hub = Arc::new(TelemetryHub::new());
        let count = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&count);
        let sub = hub.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        sub.cancel();
        assert_eq!(hub.subscriber_count(), 0);

        count.store(0, Ordering::SeqCst);
        hub.apply(&rpm_update());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unsubscribe_inside_callback_spares_later_subscribers() {
        let hub = Arc::new(TelemetryHub::new());

        // First subscriber drops its own handle from inside the callback.
        let self_sub: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let self_sub_clone = Arc::clone(&self_sub);
        let sub = hub.subscribe(move |snapshot| {
            if snapshot.rpm > 0.0 {
                self_sub_clone.lock().unwrap().take();
            }
        });
        *self_sub.lock().unwrap() = Some(sub);

        let later_count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&later_count);
        let _later = hub.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        later_count.store(0, Ordering::SeqCst);
        hub.apply(&rpm_update());
        assert_eq!(later_count.load(Ordering::SeqCst), 1);
        assert_eq!(hub.subscriber_count(), 1);

        // The self-removed subscriber stays gone on the next publish.
        hub.apply(&rpm_update());
        assert_eq!(later_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_connection_flag_and_reset() {
        let hub = Arc::new(TelemetryHub::new());
        hub.set_connection(true, "OBDII");
        assert!(hub.is_ready());
        assert_eq!(hub.snapshot().device_name, "OBDII");

        hub.apply(&rpm_update());
        hub.reset();
        let snapshot = hub.snapshot();
        assert_eq!(snapshot.rpm, 0.0);
        assert!(!snapshot.connected);
    }

    #[test]
    fn test_snapshot_serializes_for_gauge_layer() {
        let hub = Arc::new(TelemetryHub::new());
        hub.apply(&rpm_update());
        let json = serde_json::to_string(&hub.snapshot()).unwrap();
        assert!(json.contains("\"rpm\":1726.0"));
    }
}
