//! Peer Discovery Types

use serde::Serialize;

/// Name fragments advertised by common consumer OBD-II dongles.
///
/// Matching is advisory: it trims the scan results down to likely adapters
/// but callers may pass [`DiscoveryFilter::All`] to see every peer.
const VENDOR_HINTS: &[&str] = &["obd", "elm327", "vlink", "veepeak", "konnwei", "kiwi", "carista"];

/// Which radio profile a discovered peer advertises.
///
/// Dual-mode dongles often show up twice: once over the classic serial
/// profile and once over the low-energy GATT profile. Only the low-energy
/// profile is ever used for protocol traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LinkKind {
    /// Classic Bluetooth serial profile (listed for completeness, never spoken)
    Classic,
    /// Bluetooth Low Energy GATT profile
    LowEnergy,
}

/// A peer seen during a scan window.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredPeer {
    /// Platform peripheral id, stable for the life of the scan
    pub id: String,
    /// Advertised display name (falls back to the id when unnamed)
    pub name: String,
    pub link: LinkKind,
    pub rssi: Option<i16>,
}

/// Name filter applied to scan results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DiscoveryFilter {
    /// Keep peers whose name contains a known adapter-vendor substring
    #[default]
    KnownAdapters,
    /// Keep everything
    All,
}

impl DiscoveryFilter {
    /// Check an advertised name against the filter (case-insensitive).
    pub fn matches(&self, name: &str) -> bool {
        match self {
            DiscoveryFilter::All => true,
            DiscoveryFilter::KnownAdapters => {
                let lower = name.to_lowercase();
                VENDOR_HINTS.iter().any(|hint| lower.contains(hint))
            }
        }
    }
}

/// Pick the peer a device picker should preselect.
///
/// When the same physical dongle advertises both a classic entry and a
/// low-energy entry, the low-energy one is recommended; otherwise the first
/// peer wins.
pub fn recommend_peer(peers: &[DiscoveredPeer]) -> Option<&DiscoveredPeer> {
    peers
        .iter()
        .find(|p| p.link == LinkKind::LowEnergy)
        .or_else(|| peers.first())
}
