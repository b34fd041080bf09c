//! Multiplexes many filtered scan requests onto one radio scan.
//!
//! Every [`Scanner::start_scan`] call becomes a request with its own filters and [`ScanSettings`]. The
//! [`ScanAggregator`] keeps a single radio scan running whose duty cycle is the most aggressive of all active
//! requests, tracks when each device was last seen, and fans matching advertisements out to the requests that want
//! them.

mod aggregator;
mod clock;
mod mode_switch;
mod scanner;
mod settings;

use std::sync::Arc;
use std::time::Duration;

pub use self::aggregator::ScanAggregator;
pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::mode_switch::{DeviceStateEvent, ScanModeController};
pub use self::scanner::{Scanner, Subscription};
pub use self::settings::{CallbackType, ScanConfig, ScanMode, ScanSettings, ScanTiming, TimingOverride};
use crate::advertisement::AdvertisementIndex;
use crate::uri::UriBeacon;
use crate::{DeviceId, Result};

/// Identifies one scan request for the lifetime of its aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScanId(pub(crate) u64);

/// Opaque token a [`ScanRadio`] hands out for a running hardware scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScanHandle(pub u64);

/// The platform radio driven by the aggregator.
///
/// At most one scan is running at any time: the aggregator always stops the previous handle before starting a new
/// one. Matches and failures flow back through [`RadioEvent`]s.
pub trait ScanRadio: Send + 'static {
    /// Starts an unfiltered scan with the given duty cycle.
    fn start_scan(&mut self, timing: ScanTiming) -> Result<ScanHandle>;

    /// Stops a scan previously returned by [`start_scan`][ScanRadio::start_scan].
    fn stop_scan(&mut self, handle: ScanHandle);
}

/// Something the radio reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    /// An advertisement was received.
    Match {
        /// The advertiser
        device: DeviceId,
        /// The raw advertisement record
        data: Vec<u8>,
        /// Received signal strength in dBm
        rssi: i16,
        /// Reception time in the aggregator clock's timebase
        timestamp: Duration,
    },
    /// The radio scan failed and is no longer running.
    Failed {
        /// Platform specific error code
        error_code: i32,
    },
}

/// Why a scan request stopped receiving advertisements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanFailure {
    /// The radio reported an error
    Radio(i32),
    /// The radio refused to restart with a new duty cycle
    RestartRejected,
}

/// One sighting of a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// The advertiser
    pub device: DeviceId,
    /// The raw advertisement record
    pub data: Arc<[u8]>,
    /// Received signal strength in dBm
    pub rssi: i16,
    /// Reception time in the aggregator clock's timebase
    pub timestamp: Duration,
}

impl ScanResult {
    /// A parsed view of [`data`][Self::data].
    pub fn index(&self) -> AdvertisementIndex<'_> {
        AdvertisementIndex::new(&self.data)
    }

    /// Parses the URI beacon frame carried by this advertisement.
    pub fn uri_beacon(&self) -> Result<UriBeacon> {
        UriBeacon::from_advertisement(&self.index())
    }
}

/// An event delivered to a scan request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A device matched this request for the first time.
    Found(ScanResult),
    /// A device that already matched advertised again.
    Updated(ScanResult),
    /// A matched device has not been seen for longer than the lost threshold.
    Lost(ScanResult),
    /// Matches collected over one batching interval.
    Batch(Vec<ScanResult>),
    /// The radio scan stopped.
    ScanFailed(ScanFailure),
}
