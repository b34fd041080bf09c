//! Scan filters matched against parsed advertisements.

use smallvec::SmallVec;
use uuid::Uuid;

use crate::advertisement::AdvertisementIndex;
use crate::error::ErrorKind;
use crate::{DeviceId, Error, Result};

/// A byte pattern with an optional mask, matched against a prefix of a candidate payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataPattern {
    pattern: SmallVec<[u8; 20]>,
    mask: Option<SmallVec<[u8; 20]>>,
}

impl DataPattern {
    /// Matches payloads starting with exactly `pattern`.
    pub fn new(pattern: &[u8]) -> Self {
        DataPattern {
            pattern: SmallVec::from_slice(pattern),
            mask: None,
        }
    }

    /// Matches payloads whose first bytes equal `pattern` on every bit set in `mask`.
    pub fn with_mask(pattern: &[u8], mask: &[u8]) -> Self {
        DataPattern {
            pattern: SmallVec::from_slice(pattern),
            mask: Some(SmallVec::from_slice(mask)),
        }
    }

    /// Returns `true` if `candidate` is at least as long as the pattern and agrees with it under the mask.
    pub fn matches(&self, candidate: &[u8]) -> bool {
        if candidate.len() < self.pattern.len() {
            return false;
        }
        match &self.mask {
            Some(mask) => self
                .pattern
                .iter()
                .zip(mask.iter())
                .zip(candidate)
                .all(|((p, m), c)| (c & m) == (p & m)),
            None => candidate.starts_with(&self.pattern),
        }
    }

    fn validate(&self) -> Result<()> {
        match &self.mask {
            Some(mask) if mask.len() != self.pattern.len() => Err(Error::new(
                ErrorKind::InvalidParameter,
                None,
                format!("mask is {} bytes for a {} byte pattern", mask.len(), self.pattern.len()),
            )),
            _ => Ok(()),
        }
    }
}

/// A conjunction of advertisement predicates.
///
/// Every predicate that is set must hold for the filter to match. A filter without predicates matches every
/// advertisement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AdvertisementFilter {
    device: Option<DeviceId>,
    local_name: Option<String>,
    service_uuid: Option<(Uuid, Option<Uuid>)>,
    service_data: Option<(Uuid, DataPattern)>,
    manufacturer_data: Option<(u16, DataPattern)>,
}

impl AdvertisementFilter {
    /// A filter matching every advertisement
    pub fn new() -> Self {
        Self::default()
    }

    /// Only match advertisements sent by `device`.
    pub fn device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }

    /// Only match advertisements whose local name is exactly `name`.
    pub fn local_name(mut self, name: impl Into<String>) -> Self {
        self.local_name = Some(name.into());
        self
    }

    /// Only match advertisements listing `uuid` among their services.
    pub fn service_uuid(mut self, uuid: Uuid) -> Self {
        self.service_uuid = Some((uuid, None));
        self
    }

    /// Only match advertisements listing a service equal to `uuid` on the bits set in `mask`.
    pub fn service_uuid_masked(mut self, uuid: Uuid, mask: Uuid) -> Self {
        self.service_uuid = Some((uuid, Some(mask)));
        self
    }

    /// Only match advertisements carrying service data for `uuid` that matches `pattern`.
    pub fn service_data(mut self, uuid: Uuid, pattern: DataPattern) -> Self {
        self.service_data = Some((uuid, pattern));
        self
    }

    /// Only match advertisements carrying manufacturer data for `company_id` that matches `pattern`.
    pub fn manufacturer_data(mut self, company_id: u16, pattern: DataPattern) -> Self {
        self.manufacturer_data = Some((company_id, pattern));
        self
    }

    /// Checks that every pattern's mask, if any, is as long as the pattern.
    pub fn validate(&self) -> Result<()> {
        if let Some((_, pattern)) = &self.service_data {
            pattern.validate()?;
        }
        if let Some((_, pattern)) = &self.manufacturer_data {
            pattern.validate()?;
        }
        Ok(())
    }

    /// Tests an advertisement received from `device`.
    pub fn matches(&self, device: &DeviceId, index: &AdvertisementIndex<'_>) -> bool {
        if self.device.as_ref().is_some_and(|expected| expected != device) {
            return false;
        }

        if let Some(name) = &self.local_name {
            if index.local_name() != Some(name.as_str()) {
                return false;
            }
        }

        if let Some((uuid, mask)) = &self.service_uuid {
            let mask = mask.map_or(u128::MAX, |m| m.as_u128());
            let wanted = uuid.as_u128() & mask;
            if !index
                .service_uuids()
                .iter()
                .any(|candidate| candidate.as_u128() & mask == wanted)
            {
                return false;
            }
        }

        if let Some((uuid, pattern)) = &self.service_data {
            if !index.service_data(uuid).is_some_and(|data| pattern.matches(data)) {
                return false;
            }
        }

        if let Some((company_id, pattern)) = &self.manufacturer_data {
            if !index
                .manufacturer_data(*company_id)
                .is_some_and(|data| pattern.matches(data))
            {
                return false;
            }
        }

        true
    }
}
