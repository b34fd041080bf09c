use std::time::Duration;

use crate::error::ErrorKind;
use crate::{Error, Result};

/// How aggressively a scan request wants the radio to listen.
///
/// Variants are ordered from the least to the most aggressive, so the effective mode of several requests is their
/// maximum.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScanMode {
    /// Long idle windows between short active windows
    #[default]
    LowPower,
    /// Moderate idle windows
    Balanced,
    /// Listen continuously
    LowLatency,
}

/// Which events a scan request wants to receive.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CallbackType {
    /// `Found` the first time a device matches, nothing afterwards
    FirstMatch,
    /// `Found` the first time a device matches, then `Updated` for every later advertisement
    #[default]
    AllMatches,
    /// Only `Lost` once a matched device stops advertising
    MatchLost,
    /// `Found`, `Updated` and `Lost`
    All,
}

impl CallbackType {
    pub(crate) fn reports_found(self) -> bool {
        !matches!(self, CallbackType::MatchLost)
    }

    pub(crate) fn reports_updates(self) -> bool {
        matches!(self, CallbackType::AllMatches | CallbackType::All)
    }

    pub(crate) fn reports_lost(self) -> bool {
        matches!(self, CallbackType::MatchLost | CallbackType::All)
    }
}

/// Settings of one scan request.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanSettings {
    /// Requested duty cycle
    pub mode: ScanMode,
    /// Events to deliver
    pub callback_type: CallbackType,
    /// When set, matches are collected and delivered together once per interval
    pub batching_interval: Option<Duration>,
}

impl ScanSettings {
    /// Settings for `mode` delivering every match as it happens
    pub fn new(mode: ScanMode) -> Self {
        ScanSettings {
            mode,
            ..Default::default()
        }
    }

    /// Sets the callback type.
    pub fn callback_type(mut self, callback_type: CallbackType) -> Self {
        self.callback_type = callback_type;
        self
    }

    /// Sets the batching interval.
    pub fn batching_interval(mut self, interval: Duration) -> Self {
        self.batching_interval = Some(interval);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self.batching_interval {
            Some(interval) if interval.is_zero() => Err(Error::new(
                ErrorKind::InvalidParameter,
                None,
                "batching interval must be non-zero",
            )),
            Some(_) if self.callback_type != CallbackType::AllMatches => Err(Error::new(
                ErrorKind::InvalidParameter,
                None,
                format!("batching is not supported with {:?}", self.callback_type),
            )),
            _ => Ok(()),
        }
    }
}

/// A radio duty cycle: listen for `active`, then sleep for `idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanTiming {
    /// Listening window
    pub active: Duration,
    /// Sleeping window
    pub idle: Duration,
}

impl ScanTiming {
    /// Creates a timing from millisecond windows.
    pub const fn from_millis(active: u64, idle: u64) -> Self {
        ScanTiming {
            active: Duration::from_millis(active),
            idle: Duration::from_millis(idle),
        }
    }

    /// Length of one full cycle
    pub fn cycle(&self) -> Duration {
        self.active + self.idle
    }

    /// Component-wise most aggressive of the two: the longer active window and the shorter idle window.
    pub fn most_aggressive(self, other: ScanTiming) -> ScanTiming {
        ScanTiming {
            active: self.active.max(other.active),
            idle: self.idle.min(other.idle),
        }
    }
}

/// Explicit timing that replaces the mode-derived duty cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimingOverride {
    /// Listening window
    pub active: Duration,
    /// Sleeping window
    pub idle: Duration,
    /// Replaces the computed lost threshold when set
    pub lost: Option<Duration>,
}

/// Tuning constants of the scan aggregator.
///
/// The defaults are empirical battery/latency trade-offs; changing them never affects correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ScanConfig {
    /// Duty cycle of [`ScanMode::LowPower`]
    pub low_power: ScanTiming,
    /// Duty cycle of [`ScanMode::Balanced`]
    pub balanced: ScanTiming,
    /// Duty cycle of [`ScanMode::LowLatency`]
    pub low_latency: ScanTiming,
    /// Number of cycles a device may go unseen before it is reported lost
    pub lost_cycles: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            low_power: ScanTiming::from_millis(2_000, 148_000),
            balanced: ScanTiming::from_millis(2_000, 13_000),
            low_latency: ScanTiming::from_millis(5_000, 0),
            lost_cycles: 4,
        }
    }
}

impl ScanConfig {
    /// The duty cycle of `mode`
    pub fn timing(&self, mode: ScanMode) -> ScanTiming {
        match mode {
            ScanMode::LowPower => self.low_power,
            ScanMode::Balanced => self.balanced,
            ScanMode::LowLatency => self.low_latency,
        }
    }
}
