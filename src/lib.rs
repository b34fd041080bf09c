#![warn(missing_docs)]

//! Uribeacon is a [Rust] library for discovering and configuring URI beacons: [Bluetooth Low Energy] devices that
//! advertise a compressed URL under the `0xFED8` service.
//!
//! The crate does not talk to a Bluetooth controller itself. A platform layer implements [`ScanRadio`] to run the
//! radio and [`GattBackend`] to open GATT connections; everything above that (advertisement parsing, URI compression,
//! scan multiplexing, and the configuration protocols) lives here and is fully testable without hardware.
//!
//! [Rust]: https://www.rust-lang.org/
//! [Bluetooth Low Energy]: https://www.bluetooth.com/specifications/specs/
//!
//! # Usage
//!
//! ```rust,no_run
//!# use futures_lite::StreamExt;
//!# use uribeacon::{AdvertisementFilter, ScanEvent, ScanRadio, ScanSettings, Scanner};
//!# async fn scan<R: ScanRadio>(radio: R) -> Result<(), Box<dyn std::error::Error>> {
//!let scanner = Scanner::new(radio);
//!let filter = AdvertisementFilter::new().service_uuid(uribeacon::btuuid::services::URI_BEACON);
//!let mut scan = scanner.start_scan(vec![filter], ScanSettings::default())?;
//!while let Some(event) = scan.next().await {
//!    if let ScanEvent::Found(result) = event {
//!        match result.uri_beacon() {
//!            Ok(beacon) => println!("{}: {}", result.device, beacon),
//!            Err(err) => println!("{}: {}", result.device, err),
//!        }
//!    }
//!}
//!#    Ok(())
//!# }
//! ```
//!
//! # Overview
//!
//! - Parsing advertisements:
//!   - Walking advertising data structures with [`TlvReader`][tlv::TlvReader]
//!   - Lazily indexing names, services, service data and manufacturer data with [`AdvertisementIndex`]
//!   - Matching advertisements with [`AdvertisementFilter`]s
//! - URI beacons:
//!   - [Encoding][uri::encode] and [decoding][uri::decode] compressed URIs
//!   - Reading and building the beacon frame with [`UriBeacon`]
//! - Scanning:
//!   - Sharing one radio scan between many requests with [`Scanner`]
//!   - Found, updated, lost and batched results as [`ScanEvent`]s on a [`Subscription`]
//!   - Adapting the duty cycle to screen and motion state with [`ScanModeController`]
//! - Configuring beacons:
//!   - Connecting with [`BeaconConfigurator`]
//!   - Reading and writing configuration over the version 1 or version 2 protocol through a [`BeaconConnection`]
//!
//! # Feature flags
//!
//! The `serde` feature is available to enable serializing/deserializing device identifiers, beacon configurations
//! and scan settings.

pub mod advertisement;
pub mod btuuid;
pub mod client;
pub mod error;
pub mod filter;
pub mod gatt;
pub mod protocol;
pub mod scan;
pub mod tlv;
pub mod uri;

use std::collections::HashMap;

pub use advertisement::AdvertisementIndex;
pub use btuuid::BluetoothUuidExt;
pub use client::{BeaconConfigurator, BeaconConnection};
pub use error::Error;
pub use filter::{AdvertisementFilter, DataPattern};
pub use gatt::{GattBackend, GattCompletions, GattLink, GattRequestQueue};
pub use protocol::{BeaconProtocol, ConfigProtocol, ProtocolVersion};
pub use scan::{
    CallbackType, RadioEvent, ScanConfig, ScanEvent, ScanMode, ScanModeController, ScanRadio, ScanResult,
    ScanSettings, Scanner, Subscription,
};
use smallvec::SmallVec;
pub use uri::UriBeacon;
pub use uuid::Uuid;

/// Convenience alias for a result with [`Error`]
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// The platform identifier of a Bluetooth device
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceId(pub(crate) String);

impl DeviceId {
    /// Wraps a platform identifier, typically a Bluetooth address.
    pub fn new(id: impl Into<String>) -> Self {
        DeviceId(id.into())
    }

    /// The identifier as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        DeviceId::new(id)
    }
}

/// Data included in a Bluetooth advertisement or scan reponse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisementData {
    /// The (possibly shortened) local name of the device (CSS §A.1.2)
    pub local_name: Option<String>,
    /// Manufacturer specific data (CSS §A.1.4)
    pub manufacturer_data: Option<ManufacturerData>,
    /// Advertised GATT service UUIDs (CSS §A.1.1)
    pub services: Vec<Uuid>,
    /// Service associated data (CSS §A.1.11)
    pub service_data: HashMap<Uuid, SmallVec<[u8; 20]>>,
    /// Transmitted power level (CSS §A.1.5)
    pub tx_power_level: Option<i8>,
    /// Advertising flags (CSS §A.1.3)
    pub flags: Option<u8>,
}

/// Manufacturer specific data included in Bluetooth advertisements. See the Bluetooth Core Specification Supplement
/// §A.1.4 for details.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ManufacturerData {
    /// Company identifier (defined [here](https://www.bluetooth.com/specifications/assigned-numbers/company-identifiers/))
    pub company_id: u16,
    /// Manufacturer specific data
    pub data: Vec<u8>,
}
