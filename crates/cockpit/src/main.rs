//! AeroDash Telemetry Monitor - Main Entry Point

use anyhow::{bail, Context};
use obd_session::{ObdSession, SessionConfig};
use obd_transport::{recommend_peer, BleLink, DiscoveryFilter};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// How long to scan for adapters before giving up
const SCAN_WINDOW: Duration = Duration::from_secs(10);

fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    info!("=== AeroDash cockpit v{} ===", env!("CARGO_PKG_VERSION"));

    let link = Arc::new(
        BleLink::open()
            .await
            .context("Bluetooth radio unavailable")?,
    );

    info!("Scanning for OBD-II adapters ({:?})...", SCAN_WINDOW);
    let mut found = link.discover(SCAN_WINDOW, DiscoveryFilter::default()).await?;
    let mut peers = Vec::new();
    while let Some(peer) = found.recv().await {
        info!("  {} ({}), RSSI {:?}", peer.name, peer.id, peer.rssi);
        peers.push(peer);
    }

    let Some(peer) = recommend_peer(&peers).cloned() else {
        bail!("no OBD-II adapter found");
    };

    info!("Connecting to {}...", peer.name);
    let session = ObdSession::new(Arc::clone(&link), SessionConfig::default());
    session.connect(&peer.id, &peer.name).await?;

    // Print a gauge line once a second until interrupted.
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let s = session.snapshot();
                info!(
                    "{:>5.0} rpm | {:>3.0} km/h | coolant {:>3.0} °C | load {:>3.0}% | boost {:>3.0} kPa | {:>4.1} V",
                    s.rpm, s.speed_kmh, s.coolant_temp_c, s.engine_load_pct, s.boost_kpa, s.battery_voltage
                );
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("Shutting down...");
    session.disconnect().await;
    Ok(())
}
