//! Telemetry Store and Distribution
//!
//! Owns the one live [`VehicleSnapshot`] and fans out a full copy to every
//! subscriber whenever a field changes. Subscribers are independent gauge
//! views; none of them can see or hold a mutable reference to the live
//! snapshot.

mod hub;

pub use hub::{Subscription, TelemetryHub};
