use async_trait::async_trait;
use tracing::{debug, info};

use super::{single_byte, ConfigProtocol, ProtocolVersion};
use crate::btuuid::characteristics::{
    V2_ADVERTISED_TX_POWER_LEVELS, V2_BEACON_PERIOD, V2_FLAGS, V2_LOCK, V2_LOCK_STATE, V2_RESET, V2_TX_POWER_MODE,
    V2_UNLOCK, V2_URI_DATA,
};
use crate::btuuid::services::URI_BEACON_CONFIG_V2;
use crate::error::ErrorKind;
use crate::gatt::{GattOp, GattOpKind, GattRequestQueue, GattTarget};
use crate::tlv::read_u16_le;
use crate::uri::{self, UriBeacon, MAX_ENCODED_URI_LEN};
use crate::{Error, Result};

/// The 128-bit key guarding a locked beacon
pub type LockKey = [u8; 16];

const fn target(characteristic: uuid::Uuid) -> GattTarget {
    GattTarget::characteristic(URI_BEACON_CONFIG_V2, characteristic)
}

fn read_op(characteristic: uuid::Uuid) -> GattOp {
    GattOp {
        kind: GattOpKind::Read,
        target: target(characteristic),
    }
}

fn tx_power_levels(value: &[u8]) -> Result<[i8; 4]> {
    match value {
        [a, b, c, d] => Ok([*a as i8, *b as i8, *c as i8, *d as i8]),
        _ => Err(Error::new(
            ErrorKind::DecodeFailure,
            None,
            format!("TX power levels are {} bytes long, expected 4", value.len()),
        )),
    }
}

fn tx_power_mode(value: &[u8]) -> Result<usize> {
    let mode = usize::from(single_byte(value, "TX power mode")?);
    if mode >= 4 {
        return Err(Error::new(
            ErrorKind::DecodeFailure,
            None,
            format!("TX power mode {mode} out of range"),
        ));
    }
    Ok(mode)
}

/// The version 2 configuration service.
///
/// Every field has its own characteristic. The advertised TX power is the entry of the advertised power level table
/// selected by the current TX power mode.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtocolV2;

impl ProtocolV2 {
    /// Returns `true` if the beacon is locked and rejects writes until unlocked.
    pub async fn lock_state(&self, queue: &GattRequestQueue) -> Result<bool> {
        let value = queue.read(target(V2_LOCK_STATE)).await?;
        Ok(single_byte(&value, "lock state")? != 0)
    }

    /// Locks the beacon with `key`.
    pub async fn lock(&self, queue: &GattRequestQueue, key: &LockKey) -> Result<()> {
        queue.write(target(V2_LOCK), key).await?;
        info!("beacon locked");
        Ok(())
    }

    /// Unlocks the beacon. A wrong key fails with an insufficient authorization status.
    pub async fn unlock(&self, queue: &GattRequestQueue, key: &LockKey) -> Result<()> {
        queue.write(target(V2_UNLOCK), key).await?;
        info!("beacon unlocked");
        Ok(())
    }

    /// The advertising interval in milliseconds
    pub async fn beacon_period(&self, queue: &GattRequestQueue) -> Result<u16> {
        let value = queue.read(target(V2_BEACON_PERIOD)).await?;
        read_u16_le(&value, 0).ok_or_else(|| Error::new(ErrorKind::DecodeFailure, None, "beacon period too short"))
    }

    /// Sets the advertising interval in milliseconds.
    pub async fn set_beacon_period(&self, queue: &GattRequestQueue, period_ms: u16) -> Result<()> {
        queue.write(target(V2_BEACON_PERIOD), &period_ms.to_le_bytes()).await
    }

    /// Restores the factory configuration.
    pub async fn reset(&self, queue: &GattRequestQueue) -> Result<()> {
        queue.write(target(V2_RESET), &[1]).await?;
        info!("beacon reset");
        Ok(())
    }
}

#[async_trait]
impl ConfigProtocol for ProtocolV2 {
    fn version(&self) -> ProtocolVersion {
        ProtocolVersion::V2
    }

    async fn read_config(&self, queue: &GattRequestQueue) -> Result<UriBeacon> {
        let uri_data = queue.enqueue(read_op(V2_URI_DATA))?;
        let flags = queue.enqueue(read_op(V2_FLAGS))?;
        let levels = queue.enqueue(read_op(V2_ADVERTISED_TX_POWER_LEVELS))?;
        let mode = queue.enqueue(read_op(V2_TX_POWER_MODE))?;

        let uri_data = GattRequestQueue::wait(uri_data).await?;
        let flags = single_byte(&GattRequestQueue::wait(flags).await?, "flags")?;
        let levels = tx_power_levels(&GattRequestQueue::wait(levels).await?)?;
        let mode = tx_power_mode(&GattRequestQueue::wait(mode).await?)?;

        if uri_data.len() > MAX_ENCODED_URI_LEN {
            return Err(Error::new(
                ErrorKind::DecodeFailure,
                None,
                format!("URI data is {} bytes long", uri_data.len()),
            ));
        }
        let uri = uri::decode(&uri_data)?;
        debug!(%uri, mode, "read version 2 beacon configuration");
        Ok(UriBeacon::from_decoded(uri, levels[mode], flags))
    }

    async fn write_config(&self, queue: &GattRequestQueue, beacon: &UriBeacon) -> Result<()> {
        let encoded = beacon.encoded_uri()?;

        let levels = queue.enqueue(read_op(V2_ADVERTISED_TX_POWER_LEVELS))?;
        let mode = queue.enqueue(read_op(V2_TX_POWER_MODE))?;
        let mut levels = tx_power_levels(&GattRequestQueue::wait(levels).await?)?;
        let mode = tx_power_mode(&GattRequestQueue::wait(mode).await?)?;
        levels[mode] = beacon.tx_power_level();
        let levels = levels.map(|level| level as u8);

        queue.write(target(V2_URI_DATA), &encoded).await?;
        queue.write(target(V2_FLAGS), &[beacon.flags()]).await?;
        queue.write(target(V2_ADVERTISED_TX_POWER_LEVELS), &levels).await?;
        debug!(uri = beacon.uri(), "wrote version 2 beacon configuration");
        Ok(())
    }

    async fn read_raw(&self, queue: &GattRequestQueue) -> Result<Vec<u8>> {
        queue.read(target(V2_URI_DATA)).await
    }

    async fn write_raw(&self, queue: &GattRequestQueue, data: &[u8]) -> Result<()> {
        if data.len() > MAX_ENCODED_URI_LEN {
            return Err(ErrorKind::UriTooLong(data.len()).into());
        }
        queue.write(target(V2_URI_DATA), data).await
    }
}
