//! Lazily parsed view over one advertisement record.

use std::cell::OnceCell;
use std::collections::HashMap;

use smallvec::SmallVec;
use tracing::trace;
use uuid::Uuid;

use crate::error::ErrorKind;
use crate::tlv::{TlvEntry, TlvReader};
use crate::{AdvertisementData, BluetoothUuidExt, Error, ManufacturerData, Result};

/// Advertising data type codes (Assigned Numbers §2.3)
pub mod ad_type {
    #![allow(missing_docs)]

    pub const FLAGS: u8 = 0x01;
    pub const INCOMPLETE_LIST_16_BIT_SERVICE_UUIDS: u8 = 0x02;
    pub const COMPLETE_LIST_16_BIT_SERVICE_UUIDS: u8 = 0x03;
    pub const INCOMPLETE_LIST_32_BIT_SERVICE_UUIDS: u8 = 0x04;
    pub const COMPLETE_LIST_32_BIT_SERVICE_UUIDS: u8 = 0x05;
    pub const INCOMPLETE_LIST_128_BIT_SERVICE_UUIDS: u8 = 0x06;
    pub const COMPLETE_LIST_128_BIT_SERVICE_UUIDS: u8 = 0x07;
    pub const SHORTENED_LOCAL_NAME: u8 = 0x08;
    pub const COMPLETE_LOCAL_NAME: u8 = 0x09;
    pub const TX_POWER_LEVEL: u8 = 0x0a;
    pub const SERVICE_DATA_16_BIT_UUID: u8 = 0x16;
    pub const SERVICE_DATA_32_BIT_UUID: u8 = 0x20;
    pub const SERVICE_DATA_128_BIT_UUID: u8 = 0x21;
    pub const MANUFACTURER_SPECIFIC_DATA: u8 = 0xff;
}

/// Width of the UUIDs carried by a service list or service data AD type
fn uuid_width(code: u8) -> Option<usize> {
    match code {
        ad_type::INCOMPLETE_LIST_16_BIT_SERVICE_UUIDS
        | ad_type::COMPLETE_LIST_16_BIT_SERVICE_UUIDS
        | ad_type::SERVICE_DATA_16_BIT_UUID => Some(2),
        ad_type::INCOMPLETE_LIST_32_BIT_SERVICE_UUIDS
        | ad_type::COMPLETE_LIST_32_BIT_SERVICE_UUIDS
        | ad_type::SERVICE_DATA_32_BIT_UUID => Some(4),
        ad_type::INCOMPLETE_LIST_128_BIT_SERVICE_UUIDS
        | ad_type::COMPLETE_LIST_128_BIT_SERVICE_UUIDS
        | ad_type::SERVICE_DATA_128_BIT_UUID => Some(16),
        _ => None,
    }
}

/// An index over the structures of one advertisement or scan response.
///
/// Nothing is parsed up front. Each accessor walks the record the first time it is called and memoizes the result,
/// so a filter that only looks at service data never pays for name decoding. Absent structures are reported as
/// `None` or an empty collection; a truncated record yields whatever was well-formed before the truncation.
pub struct AdvertisementIndex<'a> {
    data: &'a [u8],
    local_name: OnceCell<Option<String>>,
    services: OnceCell<Vec<Uuid>>,
    service_data: OnceCell<Vec<(Uuid, &'a [u8])>>,
    manufacturer_data: OnceCell<Vec<(u16, &'a [u8])>>,
}

impl<'a> AdvertisementIndex<'a> {
    /// Creates an index over `data`.
    pub fn new(data: &'a [u8]) -> Self {
        AdvertisementIndex {
            data,
            local_name: OnceCell::new(),
            services: OnceCell::new(),
            service_data: OnceCell::new(),
            manufacturer_data: OnceCell::new(),
        }
    }

    /// Creates an index over a record that must be complete, such as one read back from a beacon's configuration.
    ///
    /// Fails with [`ErrorKind::MalformedAdvertisement`] if the last structure runs past the end of `data`.
    pub fn new_complete(data: &'a [u8]) -> Result<Self> {
        let index = AdvertisementIndex::new(data);
        if index.is_truncated() {
            return Err(Error::new(
                ErrorKind::MalformedAdvertisement,
                None,
                format!("structure runs past the end of {} bytes", data.len()),
            ));
        }
        Ok(index)
    }

    /// The raw record
    pub fn raw(&self) -> &'a [u8] {
        self.data
    }

    /// Iterates over every well-formed structure in the record.
    pub fn entries(&self) -> TlvReader<'a> {
        TlvReader::new(self.data)
    }

    /// Returns `true` if the record ends with a structure that claims more bytes than are present.
    pub fn is_truncated(&self) -> bool {
        let mut reader = self.entries();
        reader.by_ref().for_each(drop);
        reader.is_truncated()
    }

    fn find(&self, code: u8) -> Option<TlvEntry<'a>> {
        self.entries().find(|entry| entry.ad_type == code)
    }

    /// The flags structure (CSS §A.1.3)
    pub fn flags(&self) -> Option<u8> {
        self.find(ad_type::FLAGS).and_then(|entry| entry.payload.first().copied())
    }

    /// The complete local name, or the shortened name if no complete name is present (CSS §A.1.2)
    pub fn local_name(&self) -> Option<&str> {
        self.local_name
            .get_or_init(|| {
                self.find(ad_type::COMPLETE_LOCAL_NAME)
                    .or_else(|| self.find(ad_type::SHORTENED_LOCAL_NAME))
                    .map(|entry| String::from_utf8_lossy(entry.payload).into_owned())
            })
            .as_deref()
    }

    /// Advertised service UUIDs from the complete and incomplete 16-, 32- and 128-bit lists (CSS §A.1.1)
    pub fn service_uuids(&self) -> &[Uuid] {
        self.services.get_or_init(|| {
            self.entries()
                .filter(|entry| entry.ad_type <= ad_type::COMPLETE_LIST_128_BIT_SERVICE_UUIDS)
                .filter_map(|entry| uuid_width(entry.ad_type).map(|width| (entry.payload, width)))
                .flat_map(|(payload, width)| payload.chunks_exact(width))
                .filter_map(Uuid::from_le_bluetooth_bytes)
                .collect()
        })
    }

    /// The transmitted power level in dBm (CSS §A.1.5)
    pub fn tx_power_level(&self) -> Option<i8> {
        self.find(ad_type::TX_POWER_LEVEL)
            .and_then(|entry| entry.payload.first())
            .map(|level| *level as i8)
    }

    /// Every manufacturer specific data structure as `(company_id, payload)` pairs (CSS §A.1.4)
    pub fn manufacturer_data_entries(&self) -> &[(u16, &'a [u8])] {
        self.manufacturer_data.get_or_init(|| {
            self.entries()
                .filter(|entry| entry.ad_type == ad_type::MANUFACTURER_SPECIFIC_DATA)
                .filter_map(|entry| match entry.payload {
                    [lo, hi, data @ ..] => Some((u16::from_le_bytes([*lo, *hi]), data)),
                    _ => {
                        trace!(len = entry.payload.len(), "skipping manufacturer data without a company id");
                        None
                    }
                })
                .collect()
        })
    }

    /// The manufacturer specific payload for `company_id`, excluding the company identifier
    pub fn manufacturer_data(&self, company_id: u16) -> Option<&'a [u8]> {
        self.manufacturer_data_entries()
            .iter()
            .find(|(id, _)| *id == company_id)
            .map(|(_, payload)| *payload)
    }

    /// Every service data structure as `(uuid, payload)` pairs (CSS §A.1.11)
    pub fn service_data_entries(&self) -> &[(Uuid, &'a [u8])] {
        self.service_data.get_or_init(|| {
            self.entries()
                .filter(|entry| {
                    matches!(
                        entry.ad_type,
                        ad_type::SERVICE_DATA_16_BIT_UUID
                            | ad_type::SERVICE_DATA_32_BIT_UUID
                            | ad_type::SERVICE_DATA_128_BIT_UUID
                    )
                })
                .filter_map(|entry| {
                    let width = uuid_width(entry.ad_type)?;
                    let Some(uuid) = entry.payload.get(..width).and_then(Uuid::from_le_bluetooth_bytes) else {
                        trace!(ad_type = entry.ad_type, "skipping service data shorter than its UUID");
                        return None;
                    };
                    Some((uuid, &entry.payload[width..]))
                })
                .collect()
        })
    }

    /// The service data payload for `uuid`, excluding the UUID itself
    pub fn service_data(&self, uuid: &Uuid) -> Option<&'a [u8]> {
        self.service_data_entries()
            .iter()
            .find(|(id, _)| id == uuid)
            .map(|(_, payload)| *payload)
    }

    /// Copies the parsed fields into an owned [`AdvertisementData`].
    pub fn to_advertisement_data(&self) -> AdvertisementData {
        let manufacturer_data = self
            .manufacturer_data_entries()
            .first()
            .map(|(company_id, data)| ManufacturerData {
                company_id: *company_id,
                data: data.to_vec(),
            });

        let service_data: HashMap<Uuid, SmallVec<[u8; 20]>> = self
            .service_data_entries()
            .iter()
            .map(|(uuid, data)| (*uuid, SmallVec::from_slice(data)))
            .collect();

        AdvertisementData {
            local_name: self.local_name().map(str::to_owned),
            manufacturer_data,
            services: self.service_uuids().to_vec(),
            service_data,
            tx_power_level: self.tx_power_level(),
            flags: self.flags(),
        }
    }
}

impl std::fmt::Debug for AdvertisementIndex<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AdvertisementIndex").field(&self.data).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btuuid::services::URI_BEACON;

    #[test]
    fn list_uuids_of_every_width() {
        let data = [
            0x05, 0x03, 0xd8, 0xfe, 0x0f, 0x18, // two 16-bit
            0x05, 0x05, 0x04, 0x03, 0x02, 0x01, // one 32-bit
            0x11, 0x07, 0xfb, 0x34, 0x9b, 0x5f, 0x80, 0x00, 0x00, 0x80, 0x00, 0x10, 0x00, 0x00, 0x0d, 0x18, 0x00,
            0x00, // 128-bit heart rate, reversed on air
        ];
        let index = AdvertisementIndex::new(&data);
        assert_eq!(
            index.service_uuids(),
            &[
                URI_BEACON,
                Uuid::from_u16(0x180f),
                Uuid::from_u32(0x01020304),
                Uuid::from_u16(0x180d),
            ]
        );
    }

    #[test]
    fn service_data_shorter_than_its_uuid_is_skipped() {
        let data = [0x02, 0x16, 0xd8, 0x04, 0x16, 0xd8, 0xfe, 0x07];
        let index = AdvertisementIndex::new(&data);
        assert_eq!(index.service_data_entries().len(), 1);
        assert_eq!(index.service_data(&URI_BEACON), Some(&[0x07][..]));
    }

    #[test]
    fn shortened_name_is_used_when_complete_name_is_absent() {
        let data = [0x04, 0x08, b'P', b'e', b'd'];
        assert_eq!(AdvertisementIndex::new(&data).local_name(), Some("Ped"));
    }
}
