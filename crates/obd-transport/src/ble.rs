//! Bluetooth Low Energy Link
//!
//! The only transport the protocol layer speaks. One GATT service exposes a
//! write characteristic for commands and a notify characteristic for
//! responses; the UUIDs are configuration, not protocol logic.

use crate::discovery::{DiscoveredPeer, DiscoveryFilter, LinkKind};
use crate::error::TransportError;
use crate::link::Transport;
use async_trait::async_trait;
use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// How often the scan task polls the adapter for new peripherals
const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// GATT surface and sizing for the link.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Service advertised by the dongle
    pub service_uuid: uuid::Uuid,
    /// Characteristic commands are written to
    pub write_uuid: uuid::Uuid,
    /// Characteristic responses are notified on
    pub notify_uuid: uuid::Uuid,
    /// Largest command accepted in a single write
    pub write_mtu: usize,
    /// Capacity of the inbound notification channel
    pub channel_capacity: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        // The FFF0 service is what the common ELM327 BLE clones expose.
        Self {
            service_uuid: uuid::Uuid::from_u128(0x0000fff0_0000_1000_8000_00805f9b34fb),
            write_uuid: uuid::Uuid::from_u128(0x0000fff2_0000_1000_8000_00805f9b34fb),
            notify_uuid: uuid::Uuid::from_u128(0x0000fff1_0000_1000_8000_00805f9b34fb),
            write_mtu: 20,
            channel_capacity: 64,
        }
    }
}

/// An established connection: peripheral, its write characteristic, and the
/// task pumping notifications into the channel handed out by `connect`.
struct ActiveLink {
    peripheral: Peripheral,
    write_char: Characteristic,
    pump: JoinHandle<()>,
}

/// BLE transport backed by the platform Bluetooth stack.
pub struct BleLink {
    adapter: Adapter,
    config: LinkConfig,
    active: Mutex<Option<ActiveLink>>,
}

impl BleLink {
    /// Open the first available Bluetooth adapter with the default GATT
    /// surface.
    pub async fn open() -> Result<Self, TransportError> {
        Self::open_with(LinkConfig::default()).await
    }

    /// Open the first available Bluetooth adapter.
    ///
    /// Fails with [`TransportError::Unavailable`] when the device has no
    /// radio capability at all.
    pub async fn open_with(config: LinkConfig) -> Result<Self, TransportError> {
        let manager = Manager::new()
            .await
            .map_err(|_| TransportError::Unavailable)?;
        let adapters = manager
            .adapters()
            .await
            .map_err(|_| TransportError::Unavailable)?;
        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(TransportError::Unavailable)?;

        Ok(Self {
            adapter,
            config,
            active: Mutex::new(None),
        })
    }

    /// Scan for peers for `window`, streaming matches as they appear.
    ///
    /// The stream ends when the window elapses or the receiver is dropped.
    /// CoreBluetooth does not reliably match 128-bit service UUIDs in scan
    /// responses, so the scan is unfiltered and names are checked on this
    /// side.
    pub async fn discover(
        &self,
        window: Duration,
        filter: DiscoveryFilter,
    ) -> Result<mpsc::Receiver<DiscoveredPeer>, TransportError> {
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| TransportError::Discovery(e.to_string()))?;

        info!("BLE scan started ({:?} window, {:?})", window, filter);

        let (tx, rx) = mpsc::channel(16);
        let adapter = self.adapter.clone();
        tokio::spawn(async move {
            let deadline = Instant::now() + window;
            let mut seen = HashSet::new();

            'scan: while Instant::now() < deadline && !tx.is_closed() {
                tokio::time::sleep(SCAN_POLL_INTERVAL).await;

                let peripherals = match adapter.peripherals().await {
                    Ok(p) => p,
                    Err(e) => {
                        warn!("scan poll failed: {}", e);
                        break;
                    }
                };

                for peripheral in peripherals {
                    let id = peripheral.id().to_string();
                    if seen.contains(&id) {
                        continue;
                    }

                    let props = match peripheral.properties().await.ok().flatten() {
                        Some(p) => p,
                        None => continue,
                    };
                    let name = props.local_name.clone().unwrap_or_else(|| id.clone());
                    if !filter.matches(&name) {
                        continue;
                    }
                    seen.insert(id.clone());

                    debug!("discovered {} ({}), RSSI {:?}", name, id, props.rssi);
                    let peer = DiscoveredPeer {
                        id,
                        name,
                        link: LinkKind::LowEnergy,
                        rssi: props.rssi,
                    };
                    if tx.send(peer).await.is_err() {
                        break 'scan;
                    }
                }
            }

            let _ = adapter.stop_scan().await;
            debug!("BLE scan finished");
        });

        Ok(rx)
    }

    /// Locate a characteristic of the configured service by UUID.
    fn find_characteristic(&self, peripheral: &Peripheral, uuid: uuid::Uuid) -> Option<Characteristic> {
        peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.service_uuid == self.config.service_uuid && c.uuid == uuid)
    }

    fn connect_failed(peer: &str, reason: impl ToString) -> TransportError {
        TransportError::ConnectFailed {
            peer: peer.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl Transport for BleLink {
    async fn connect(&self, peer_id: &str) -> Result<mpsc::Receiver<Vec<u8>>, TransportError> {
        let mut active = self.active.lock().await;
        if let Some(old) = active.take() {
            old.pump.abort();
            let _ = old.peripheral.disconnect().await;
        }

        let peripherals = self
            .adapter
            .peripherals()
            .await
            .map_err(|e| Self::connect_failed(peer_id, e))?;
        let peripheral = peripherals
            .into_iter()
            .find(|p| p.id().to_string() == peer_id)
            .ok_or_else(|| Self::connect_failed(peer_id, "peer not in scan results"))?;

        peripheral
            .connect()
            .await
            .map_err(|e| Self::connect_failed(peer_id, e))?;
        peripheral
            .discover_services()
            .await
            .map_err(|e| Self::connect_failed(peer_id, e))?;

        let write_char = self
            .find_characteristic(&peripheral, self.config.write_uuid)
            .ok_or_else(|| Self::connect_failed(peer_id, "write characteristic not found"))?;
        let notify_char = self
            .find_characteristic(&peripheral, self.config.notify_uuid)
            .ok_or_else(|| Self::connect_failed(peer_id, "notify characteristic not found"))?;

        peripheral
            .subscribe(&notify_char)
            .await
            .map_err(|e| Self::connect_failed(peer_id, e))?;
        let mut notifications = peripheral
            .notifications()
            .await
            .map_err(|e| Self::connect_failed(peer_id, e))?;

        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let notify_uuid = self.config.notify_uuid;
        let pump = tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid != notify_uuid {
                    continue;
                }
                if tx.send(notification.value).await.is_err() {
                    break;
                }
            }
            debug!("notification stream closed");
        });

        info!("connected to {}", peer_id);
        *active = Some(ActiveLink {
            peripheral,
            write_char,
            pump,
        });
        Ok(rx)
    }

    async fn write(&self, payload: &[u8]) -> Result<(), TransportError> {
        let active = self.active.lock().await;
        let link = active.as_ref().ok_or(TransportError::NotConnected)?;

        if payload.len() > self.config.write_mtu {
            return Err(TransportError::PayloadTooLarge {
                len: payload.len(),
                max: self.config.write_mtu,
            });
        }

        link.peripheral
            .write(&link.write_char, payload, WriteType::WithoutResponse)
            .await
            .map_err(|e| TransportError::WriteFailed(e.to_string()))
    }

    async fn disconnect(&self) {
        let mut active = self.active.lock().await;
        if let Some(link) = active.take() {
            link.pump.abort();
            let _ = link.peripheral.disconnect().await;
            info!("disconnected");
        }
    }
}
