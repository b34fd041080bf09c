//! The two generations of the URI beacon configuration service.
//!
//! Version 1 stores the whole advertisement in two 20 byte characteristics plus a length. Version 2 exposes one
//! characteristic per field and adds locking, a configurable beacon period and a factory reset.

mod v1;
mod v2;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

pub use self::v1::{ProtocolV1, CHUNK_LEN};
pub use self::v2::{LockKey, ProtocolV2};
use crate::btuuid::services::{URI_BEACON_CONFIG_V1, URI_BEACON_CONFIG_V2};
use crate::error::ErrorKind;
use crate::gatt::GattRequestQueue;
use crate::uri::UriBeacon;
use crate::{Error, Result};

/// Which configuration service a beacon speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProtocolVersion {
    /// Chunked advertisement characteristics
    V1,
    /// Per-field characteristics
    V2,
}

/// Reads and writes a beacon's configuration over a [`GattRequestQueue`].
#[async_trait]
pub trait ConfigProtocol: Send + Sync {
    /// The protocol generation
    fn version(&self) -> ProtocolVersion;

    /// Reads the configuration the beacon currently advertises.
    async fn read_config(&self, queue: &GattRequestQueue) -> Result<UriBeacon>;

    /// Writes a new configuration.
    async fn write_config(&self, queue: &GattRequestQueue, beacon: &UriBeacon) -> Result<()>;

    /// Reads the stored beacon data without decoding it.
    async fn read_raw(&self, queue: &GattRequestQueue) -> Result<Vec<u8>>;

    /// Writes beacon data as is.
    async fn write_raw(&self, queue: &GattRequestQueue, data: &[u8]) -> Result<()>;
}

/// The protocol chosen for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BeaconProtocol {
    /// Version 1 configuration service
    V1(ProtocolV1),
    /// Version 2 configuration service
    V2(ProtocolV2),
}

impl BeaconProtocol {
    /// Picks the protocol from the services a beacon exposes, preferring version 2.
    pub fn select(services: &[Uuid]) -> Result<Self> {
        let protocol = if services.contains(&URI_BEACON_CONFIG_V2) {
            BeaconProtocol::V2(ProtocolV2)
        } else if services.contains(&URI_BEACON_CONFIG_V1) {
            BeaconProtocol::V1(ProtocolV1)
        } else {
            return Err(Error::new(
                ErrorKind::NotSupported,
                None,
                "no URI beacon configuration service",
            ));
        };
        debug!(version = ?protocol.version(), "selected configuration protocol");
        Ok(protocol)
    }

    /// The version 2 protocol, or [`ErrorKind::NotSupported`] on a version 1 beacon.
    pub fn v2(&self) -> Result<&ProtocolV2> {
        match self {
            BeaconProtocol::V2(v2) => Ok(v2),
            BeaconProtocol::V1(_) => Err(Error::new(
                ErrorKind::NotSupported,
                None,
                "requires the version 2 configuration service",
            )),
        }
    }

    fn inner(&self) -> &dyn ConfigProtocol {
        match self {
            BeaconProtocol::V1(v1) => v1,
            BeaconProtocol::V2(v2) => v2,
        }
    }
}

#[async_trait]
impl ConfigProtocol for BeaconProtocol {
    fn version(&self) -> ProtocolVersion {
        self.inner().version()
    }

    async fn read_config(&self, queue: &GattRequestQueue) -> Result<UriBeacon> {
        self.inner().read_config(queue).await
    }

    async fn write_config(&self, queue: &GattRequestQueue, beacon: &UriBeacon) -> Result<()> {
        self.inner().write_config(queue, beacon).await
    }

    async fn read_raw(&self, queue: &GattRequestQueue) -> Result<Vec<u8>> {
        self.inner().read_raw(queue).await
    }

    async fn write_raw(&self, queue: &GattRequestQueue, data: &[u8]) -> Result<()> {
        self.inner().write_raw(queue, data).await
    }
}

/// Extracts a single byte characteristic value.
fn single_byte(value: &[u8], what: &str) -> Result<u8> {
    match value {
        [byte] => Ok(*byte),
        _ => Err(Error::new(
            ErrorKind::DecodeFailure,
            None,
            format!("{what} is {} bytes long, expected 1", value.len()),
        )),
    }
}
