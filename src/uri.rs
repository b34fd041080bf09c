//! Compressed URI encoding used by URI beacons, and the beacon's service data frame.
//!
//! A URI is packed into at most [`MAX_ENCODED_URI_LEN`] bytes: one byte selecting a scheme prefix followed by the
//! rest of the URI where common top level domain suffixes are replaced by single bytes below `0x0e`.

use smallvec::SmallVec;
use tracing::debug;

use crate::advertisement::{ad_type, AdvertisementIndex};
use crate::btuuid::services::URI_BEACON;
use crate::error::ErrorKind;
use crate::{Error, Result};

/// The longest encoded URI a beacon can advertise
pub const MAX_ENCODED_URI_LEN: usize = 18;

/// The longest advertisement a beacon can transmit
pub const MAX_ADVERTISEMENT_LEN: usize = 31;

const URI_BEACON_UUID16: u16 = 0xfed8;

/// Flags AD structure advertised by URI beacons: LE general discoverable, BR/EDR not supported
const ADVERTISEMENT_FLAGS: u8 = 0x06;

const URI_SCHEME_PREFIXES: [&str; 4] = ["http://www.", "https://www.", "http://", "https://"];

const URL_CODES: [&str; 14] = [
    ".com/", ".org/", ".edu/", ".net/", ".info/", ".biz/", ".gov/", ".com", ".org", ".edu", ".net", ".info", ".biz",
    ".gov",
];

/// Encoded URIs, small enough to never allocate
pub type EncodedUri = SmallVec<[u8; MAX_ENCODED_URI_LEN]>;

/// Trims surrounding whitespace and lowercases the scheme, leaving the rest of the URI untouched.
pub fn normalize(uri: &str) -> String {
    let uri = uri.trim();
    match uri.find("://") {
        Some(idx) => format!("{}{}", uri[..idx].to_ascii_lowercase(), &uri[idx..]),
        None => uri.to_owned(),
    }
}

/// Compresses `uri` into its beacon representation.
///
/// Fails with [`ErrorKind::UnsupportedScheme`] unless the scheme is `http` or `https`, with
/// [`ErrorKind::UriTooLong`] when the result would exceed [`MAX_ENCODED_URI_LEN`] bytes, and with
/// [`ErrorKind::InvalidParameter`] for characters outside printable ASCII.
pub fn encode(uri: &str) -> Result<EncodedUri> {
    let uri = normalize(uri);
    let scheme = uri.find("://").map(|idx| &uri[..idx]);
    if !matches!(scheme, Some("http") | Some("https")) {
        return Err(Error::new(ErrorKind::UnsupportedScheme, None, uri));
    }

    let (code, prefix) = URI_SCHEME_PREFIXES
        .iter()
        .enumerate()
        .find(|(_, prefix)| uri.starts_with(*prefix))
        .ok_or_else(|| Error::new(ErrorKind::UnsupportedScheme, None, uri.clone()))?;

    let mut encoded = EncodedUri::new();
    encoded.push(code as u8);

    let rest = &uri.as_bytes()[prefix.len()..];
    let mut pos = 0;
    while pos < rest.len() {
        let tail = &rest[pos..];
        if let Some((code, suffix)) = URL_CODES
            .iter()
            .enumerate()
            .find(|(_, suffix)| tail.starts_with(suffix.as_bytes()))
        {
            encoded.push(code as u8);
            pos += suffix.len();
        } else {
            let byte = tail[0];
            if !byte.is_ascii_graphic() {
                return Err(Error::new(
                    ErrorKind::InvalidParameter,
                    None,
                    format!("byte {byte:#04x} at offset {} cannot be encoded", prefix.len() + pos),
                ));
            }
            encoded.push(byte);
            pos += 1;
        }
    }

    if encoded.len() > MAX_ENCODED_URI_LEN {
        return Err(ErrorKind::UriTooLong(encoded.len()).into());
    }
    Ok(encoded)
}

/// Expands a compressed URI.
pub fn decode(encoded: &[u8]) -> Result<String> {
    let (&code, body) = encoded
        .split_first()
        .ok_or_else(|| Error::new(ErrorKind::DecodeFailure, None, "empty URI"))?;
    let prefix = URI_SCHEME_PREFIXES
        .get(usize::from(code))
        .ok_or_else(|| Error::new(ErrorKind::DecodeFailure, None, format!("unknown scheme prefix {code:#04x}")))?;

    let mut uri = String::from(*prefix);
    for &byte in body {
        if let Some(suffix) = URL_CODES.get(usize::from(byte)) {
            uri.push_str(suffix);
        } else if byte.is_ascii_graphic() {
            uri.push(char::from(byte));
        } else {
            return Err(Error::new(
                ErrorKind::DecodeFailure,
                None,
                format!("byte {byte:#04x} is neither a suffix code nor printable"),
            ));
        }
    }
    Ok(uri)
}

/// The configuration a URI beacon advertises: its URI, calibrated TX power and flags.
///
/// Values are never mutated after construction; build a new one to change a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UriBeacon {
    uri: String,
    tx_power_level: i8,
    flags: u8,
}

impl UriBeacon {
    /// Creates a beacon configuration after checking that `uri` can be encoded.
    pub fn new(uri: &str, tx_power_level: i8, flags: u8) -> Result<Self> {
        encode(uri)?;
        Ok(UriBeacon {
            uri: normalize(uri),
            tx_power_level,
            flags,
        })
    }

    /// Assembles a configuration read back from a beacon whose URI was already decoded.
    pub(crate) fn from_decoded(uri: String, tx_power_level: i8, flags: u8) -> Self {
        UriBeacon {
            uri,
            tx_power_level,
            flags,
        }
    }

    /// The full, expanded URI
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// TX power in dBm measured at 0 m
    pub fn tx_power_level(&self) -> i8 {
        self.tx_power_level
    }

    /// The beacon flags byte
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// The compressed form of [`uri`][Self::uri]
    pub fn encoded_uri(&self) -> Result<EncodedUri> {
        encode(&self.uri)
    }

    /// Parses the payload of the URI beacon service data: `[flags][tx power][encoded uri]`.
    pub fn parse_service_data(data: &[u8]) -> Result<Self> {
        match data {
            [flags, tx_power_level, encoded @ ..] if !encoded.is_empty() => {
                if encoded.len() > MAX_ENCODED_URI_LEN {
                    return Err(Error::new(
                        ErrorKind::DecodeFailure,
                        None,
                        format!("encoded URI is {} bytes long", encoded.len()),
                    ));
                }
                Ok(UriBeacon::from_decoded(decode(encoded)?, *tx_power_level as i8, *flags))
            }
            _ => Err(Error::new(ErrorKind::DecodeFailure, None, "service data too short")),
        }
    }

    /// Finds and parses the URI beacon service data in an advertisement.
    pub fn from_advertisement(index: &AdvertisementIndex<'_>) -> Result<Self> {
        let data = index
            .service_data(&URI_BEACON)
            .ok_or_else(|| Error::new(ErrorKind::DecodeFailure, None, "no URI beacon service data"))?;
        Self::parse_service_data(data).inspect_err(|err| debug!("unparsable URI beacon: {err}"))
    }

    /// Serializes the service data payload, excluding the service UUID.
    pub fn to_service_data(&self) -> Result<Vec<u8>> {
        let encoded = self.encoded_uri()?;
        let mut data = Vec::with_capacity(2 + encoded.len());
        data.push(self.flags);
        data.push(self.tx_power_level as u8);
        data.extend_from_slice(&encoded);
        Ok(data)
    }

    /// Serializes the full advertisement a beacon transmits: flags, the service UUID list, and the service data.
    pub fn to_advertisement(&self) -> Result<Vec<u8>> {
        let service_data = self.to_service_data()?;
        let uuid = URI_BEACON_UUID16.to_le_bytes();

        let mut adv = Vec::with_capacity(MAX_ADVERTISEMENT_LEN);
        adv.extend_from_slice(&[2, ad_type::FLAGS, ADVERTISEMENT_FLAGS]);
        adv.extend_from_slice(&[3, ad_type::COMPLETE_LIST_16_BIT_SERVICE_UUIDS, uuid[0], uuid[1]]);
        adv.push((service_data.len() + 3) as u8);
        adv.extend_from_slice(&[ad_type::SERVICE_DATA_16_BIT_UUID, uuid[0], uuid[1]]);
        adv.extend_from_slice(&service_data);
        debug_assert!(adv.len() <= MAX_ADVERTISEMENT_LEN);
        Ok(adv)
    }
}

impl std::fmt::Display for UriBeacon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} dBm, flags {:#04x})", self.uri, self.tx_power_level, self.flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_with_slash_wins_over_bare_suffix() {
        assert_eq!(&encode("http://a.com/b").unwrap()[..], &[0x02, b'a', 0x00, b'b']);
        assert_eq!(&encode("http://a.com").unwrap()[..], &[0x02, b'a', 0x07]);
    }

    #[test]
    fn suffix_codes_apply_anywhere_in_the_body() {
        assert_eq!(&encode("https://x.org.net").unwrap()[..], &[0x03, b'x', 0x08, 0x0a]);
    }

    #[test]
    fn normalize_only_touches_the_scheme() {
        assert_eq!(normalize("  HTTPS://Example.COM/Path "), "https://Example.COM/Path");
        assert_eq!(normalize("no scheme"), "no scheme");
    }

    #[test]
    fn control_bytes_do_not_decode() {
        assert_eq!(decode(&[0x02, 0x1f]).unwrap_err().kind(), ErrorKind::DecodeFailure);
        assert_eq!(decode(&[0x02, 0x80]).unwrap_err().kind(), ErrorKind::DecodeFailure);
    }
}
