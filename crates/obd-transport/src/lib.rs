//! Wireless Transport for OBD-II Adapters
//!
//! This crate provides the Bluetooth Low Energy link used to talk to
//! ELM327-compatible dongles: peer discovery with an adapter-vendor name
//! filter, and a byte-stream transport over one GATT write characteristic
//! and one notify characteristic.

mod ble;
mod discovery;
mod error;
mod link;
mod mock;

pub use ble::{BleLink, LinkConfig};
pub use discovery::{recommend_peer, DiscoveredPeer, DiscoveryFilter, LinkKind};
pub use error::TransportError;
pub use link::Transport;
pub use mock::MockLink;
