//! Connecting to beacons and reading or writing their configuration.

use tracing::{debug, info};

use crate::gatt::{GattBackend, GattRequestQueue};
use crate::protocol::{BeaconProtocol, ConfigProtocol, LockKey, ProtocolVersion};
use crate::uri::UriBeacon;
use crate::{DeviceId, Result};

/// Entry point for configuring URI beacons over GATT.
#[derive(Debug, Clone)]
pub struct BeaconConfigurator<B> {
    backend: B,
}

impl<B: GattBackend> BeaconConfigurator<B> {
    /// Creates a configurator that opens connections through `backend`.
    pub fn new(backend: B) -> Self {
        BeaconConfigurator { backend }
    }

    /// The underlying backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Connects to `device`, discovers its services and selects the configuration protocol.
    ///
    /// Fails with [`NotSupported`][crate::error::ErrorKind::NotSupported] if the device exposes neither
    /// configuration service, in which case the connection is closed again.
    pub async fn connect(&self, device: &DeviceId) -> Result<BeaconConnection> {
        let queue = GattRequestQueue::new();
        let mut link = self.backend.connect(device, queue.completions()).await?;

        let protocol = match link.discover_services().await.and_then(|services| BeaconProtocol::select(&services)) {
            Ok(protocol) => protocol,
            Err(err) => {
                debug!(%device, "closing connection: {err}");
                link.disconnect();
                return Err(err);
            }
        };

        info!(%device, version = ?protocol.version(), "connected to beacon");
        queue.attach(link);
        Ok(BeaconConnection {
            device: device.clone(),
            queue,
            protocol,
        })
    }

    /// Connects, reads the current configuration and disconnects.
    pub async fn connect_and_read_config(&self, device: &DeviceId) -> Result<UriBeacon> {
        let connection = self.connect(device).await?;
        connection.read_config().await
    }

    /// Connects, writes `beacon` and disconnects.
    pub async fn write_config(&self, device: &DeviceId, beacon: &UriBeacon) -> Result<()> {
        let connection = self.connect(device).await?;
        connection.write_config(beacon).await
    }
}

/// An open configuration session with one beacon.
///
/// Every operation goes through the connection's request queue, so operations issued concurrently still reach the
/// beacon one at a time. Dropping the connection disconnects.
#[derive(Debug)]
pub struct BeaconConnection {
    device: DeviceId,
    queue: GattRequestQueue,
    protocol: BeaconProtocol,
}

impl BeaconConnection {
    /// The connected beacon
    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    /// The configuration protocol selected at connect time
    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol.version()
    }

    /// Returns `true` until the connection is closed locally or by the beacon.
    pub fn is_connected(&self) -> bool {
        !self.queue.is_closed()
    }

    /// Reads the beacon's configuration.
    pub async fn read_config(&self) -> Result<UriBeacon> {
        self.protocol.read_config(&self.queue).await
    }

    /// Writes a new configuration.
    pub async fn write_config(&self, beacon: &UriBeacon) -> Result<()> {
        self.protocol.write_config(&self.queue, beacon).await
    }

    /// Reads the stored beacon data undecoded: the whole advertisement on version 1, the encoded URI on version 2.
    pub async fn read_raw(&self) -> Result<Vec<u8>> {
        self.protocol.read_raw(&self.queue).await
    }

    /// Writes beacon data as is.
    pub async fn write_raw(&self, data: &[u8]) -> Result<()> {
        self.protocol.write_raw(&self.queue, data).await
    }

    /// Returns `true` if the beacon is locked. Version 2 only.
    pub async fn lock_state(&self) -> Result<bool> {
        self.protocol.v2()?.lock_state(&self.queue).await
    }

    /// Locks the beacon. Version 2 only.
    pub async fn lock(&self, key: &LockKey) -> Result<()> {
        self.protocol.v2()?.lock(&self.queue, key).await
    }

    /// Unlocks the beacon. Version 2 only.
    pub async fn unlock(&self, key: &LockKey) -> Result<()> {
        self.protocol.v2()?.unlock(&self.queue, key).await
    }

    /// The advertising interval in milliseconds. Version 2 only.
    pub async fn beacon_period(&self) -> Result<u16> {
        self.protocol.v2()?.beacon_period(&self.queue).await
    }

    /// Sets the advertising interval in milliseconds. Version 2 only.
    pub async fn set_beacon_period(&self, period_ms: u16) -> Result<()> {
        self.protocol.v2()?.set_beacon_period(&self.queue, period_ms).await
    }

    /// Restores the factory configuration. Version 2 only.
    pub async fn reset(&self) -> Result<()> {
        self.protocol.v2()?.reset(&self.queue).await
    }

    /// Closes the connection. Operations still waiting fail with
    /// [`NotConnected`][crate::error::ErrorKind::NotConnected].
    pub fn disconnect(&self) {
        debug!(device = %self.device, "disconnecting");
        self.queue.close();
    }
}
