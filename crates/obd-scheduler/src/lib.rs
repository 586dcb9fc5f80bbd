//! PID Polling Schedule
//!
//! Decides which single parameter to query on each tick, interleaving a
//! small high-rate set with a larger low-rate set so the fast gauges stay
//! responsive while every parameter still gets refreshed within a bounded
//! interval.

mod queue;

pub use queue::{PollQueue, SchedulerConfig, SECONDARY_STRIDE};
