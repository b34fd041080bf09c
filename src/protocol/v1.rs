use async_trait::async_trait;
use tracing::debug;

use super::{single_byte, ConfigProtocol, ProtocolVersion};
use crate::advertisement::AdvertisementIndex;
use crate::btuuid::characteristics::{V1_DATA_LENGTH, V1_DATA_ONE, V1_DATA_TWO};
use crate::btuuid::services::URI_BEACON_CONFIG_V1;
use crate::error::ErrorKind;
use crate::gatt::{GattRequestQueue, GattTarget};
use crate::uri::UriBeacon;
use crate::{Error, Result};

/// Largest value a single data characteristic holds
pub const CHUNK_LEN: usize = 20;

const fn target(characteristic: uuid::Uuid) -> GattTarget {
    GattTarget::characteristic(URI_BEACON_CONFIG_V1, characteristic)
}

/// The version 1 configuration service.
///
/// The stored value is a complete advertisement split across two characteristics, with its total length kept in a
/// third, signed, single byte characteristic.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtocolV1;

#[async_trait]
impl ConfigProtocol for ProtocolV1 {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V1
    }

    async fn read_config(&self, queue: &GattRequestQueue) -> Result<UriBeacon> {
        let data = self.read_raw(queue).await?;
        UriBeacon::from_advertisement(&AdvertisementIndex::new_complete(&data)?)
    }

    async fn write_config(&self, queue: &GattRequestQueue, beacon: &UriBeacon) -> Result<()> {
        let data = beacon.to_advertisement()?;
        self.write_raw(queue, &data).await
    }

    async fn read_raw(&self, queue: &GattRequestQueue) -> Result<Vec<u8>> {
        let length = single_byte(&queue.read(target(V1_DATA_LENGTH)).await?, "data length")? as i8;
        let length = usize::try_from(length)
            .map_err(|_| Error::new(ErrorKind::DecodeFailure, None, format!("negative data length {length}")))?;

        let mut data = queue.read(target(V1_DATA_ONE)).await?;
        if length > CHUNK_LEN {
            data.extend(queue.read(target(V1_DATA_TWO)).await?);
        }

        if data.len() != length {
            return Err(Error::new(
                ErrorKind::DecodeFailure,
                None,
                format!("read {} bytes, beacon reports {length}", data.len()),
            ));
        }
        debug!(len = length, "read version 1 beacon data");
        Ok(data)
    }

    async fn write_raw(&self, queue: &GattRequestQueue, data: &[u8]) -> Result<()> {
        if data.len() > 2 * CHUNK_LEN {
            return Err(Error::new(
                ErrorKind::InvalidParameter,
                None,
                format!("{} bytes do not fit in two chunks", data.len()),
            ));
        }

        let (first, second) = data.split_at(data.len().min(CHUNK_LEN));
        queue.write(target(V1_DATA_ONE), first).await?;
        if !second.is_empty() {
            queue.write(target(V1_DATA_TWO), second).await?;
        }
        debug!(len = data.len(), "wrote version 1 beacon data");
        Ok(())
    }
}
