use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_channel::Sender;
use smallvec::SmallVec;
use tracing::{debug, info, trace, warn};

use super::{
    Clock, RadioEvent, ScanConfig, ScanEvent, ScanFailure, ScanHandle, ScanId, ScanMode, ScanRadio, ScanResult,
    ScanSettings, ScanTiming, TimingOverride,
};
use crate::advertisement::AdvertisementIndex;
use crate::error::ErrorKind;
use crate::filter::AdvertisementFilter;
use crate::{DeviceId, Error, Result};

struct ActiveRequest {
    filters: Vec<AdvertisementFilter>,
    settings: ScanSettings,
    sink: Sender<ScanEvent>,
    batch: Vec<ScanResult>,
    batch_started: Duration,
}

impl ActiveRequest {
    /// A request matches when any of its filters does. No filters means every advertisement.
    fn matches(&self, device: &DeviceId, index: &AdvertisementIndex<'_>) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|filter| filter.matches(device, index))
    }

    fn send(&self, event: ScanEvent) {
        if let Err(err) = self.sink.try_send(event) {
            trace!("scan event not delivered: {err}");
        }
    }

    fn report_match(&mut self, result: &ScanResult, first: bool) {
        let callback_type = self.settings.callback_type;
        let wanted = if first {
            callback_type.reports_found()
        } else {
            callback_type.reports_updates()
        };
        if !wanted {
            return;
        }

        if self.settings.batching_interval.is_some() {
            self.batch.push(result.clone());
        } else if first {
            self.send(ScanEvent::Found(result.clone()));
        } else {
            self.send(ScanEvent::Updated(result.clone()));
        }
    }

    fn report_lost(&self, result: &ScanResult) {
        if self.settings.callback_type.reports_lost() {
            self.send(ScanEvent::Lost(result.clone()));
        }
    }

    fn flush_batch(&mut self, now: Duration) {
        let Some(interval) = self.settings.batching_interval else {
            return;
        };
        if now.saturating_sub(self.batch_started) < interval {
            return;
        }
        self.batch_started = now;
        if !self.batch.is_empty() {
            let batch = std::mem::take(&mut self.batch);
            self.send(ScanEvent::Batch(batch));
        }
    }
}

struct DeviceSighting {
    last_seen: Duration,
    result: ScanResult,
    matched: BTreeSet<ScanId>,
}

/// The state machine behind [`Scanner`][super::Scanner].
///
/// Owns the active requests, the per-device sighting cache and the radio handle. All mutation happens through
/// `&mut self`, so callers serialize radio events against cycle completion simply by holding the aggregator behind
/// a single lock.
pub struct ScanAggregator<R, C> {
    radio: R,
    clock: C,
    config: ScanConfig,
    requests: BTreeMap<ScanId, ActiveRequest>,
    sightings: HashMap<DeviceId, DeviceSighting>,
    handle: Option<ScanHandle>,
    timing: ScanTiming,
    timing_override: Option<TimingOverride>,
    next_id: u64,
}

impl<R: ScanRadio, C: Clock> ScanAggregator<R, C> {
    /// Creates an idle aggregator. The radio is not touched until the first request starts.
    pub fn new(radio: R, clock: C, config: ScanConfig) -> Self {
        ScanAggregator {
            radio,
            clock,
            timing: config.low_power,
            config,
            requests: BTreeMap::new(),
            sightings: HashMap::new(),
            handle: None,
            timing_override: None,
            next_id: 0,
        }
    }

    /// The radio driven by this aggregator
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// The clock used for eviction
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// The duty cycle currently requested from the radio
    pub fn timing(&self) -> ScanTiming {
        self.timing
    }

    /// Returns `true` while a radio scan is running.
    pub fn is_scanning(&self) -> bool {
        self.handle.is_some()
    }

    /// Number of active requests
    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    /// Number of devices currently cached
    pub fn sighting_count(&self) -> usize {
        self.sightings.len()
    }

    /// How long a device may go unseen before it is reported lost.
    pub fn lost_threshold(&self) -> Duration {
        match self.timing_override.and_then(|o| o.lost) {
            Some(lost) => lost,
            None => self.timing.cycle() * self.config.lost_cycles,
        }
    }

    /// Registers a request and makes sure the radio runs with a duty cycle that satisfies it.
    ///
    /// Invalid settings or filters are rejected before the radio is touched. Devices already cached and still fresh
    /// are replayed to the new request before this returns.
    pub fn start(
        &mut self,
        filters: Vec<AdvertisementFilter>,
        settings: ScanSettings,
        sink: Sender<ScanEvent>,
    ) -> Result<ScanId> {
        settings.validate()?;
        for filter in &filters {
            filter.validate()?;
        }

        let id = ScanId(self.next_id);
        self.next_id += 1;
        let now = self.clock.now();
        self.requests.insert(
            id,
            ActiveRequest {
                filters,
                settings,
                sink,
                batch: Vec::new(),
                batch_started: now,
            },
        );

        if let Err(err) = self.apply_timing() {
            self.requests.remove(&id);
            self.restore_after_rejected_restart();
            return Err(err);
        }

        debug!(?id, ?settings, "scan request started");
        self.replay(id, now);
        Ok(id)
    }

    /// Removes a request. Returns `false` if it was not active.
    ///
    /// The request's event stream ends, and the radio is stopped or slowed down if nothing else needs it.
    pub fn stop(&mut self, id: ScanId) -> bool {
        let Some(request) = self.requests.remove(&id) else {
            return false;
        };
        request.sink.close();
        for sighting in self.sightings.values_mut() {
            sighting.matched.remove(&id);
        }
        debug!(?id, "scan request stopped");
        self.restore_after_rejected_restart();
        true
    }

    /// Changes the mode of an active request, restarting the radio if the effective duty cycle changes.
    pub fn set_scan_mode(&mut self, id: ScanId, mode: ScanMode) -> Result<()> {
        let request = self
            .requests
            .get_mut(&id)
            .ok_or_else(|| Error::new(ErrorKind::InvalidParameter, None, format!("{id:?} is not active")))?;
        request.settings.mode = mode;
        self.apply_timing()
    }

    /// Replaces the mode-derived duty cycle with an explicit one, or reverts to it with `None`.
    pub fn set_timing_override(&mut self, timing_override: Option<TimingOverride>) -> Result<()> {
        self.timing_override = timing_override;
        self.apply_timing()
    }

    /// Dispatches one radio event.
    pub fn handle_radio_event(&mut self, event: RadioEvent) {
        match event {
            RadioEvent::Match {
                device,
                data,
                rssi,
                timestamp,
            } => self.on_radio_match(device, data, rssi, timestamp),
            RadioEvent::Failed { error_code } => self.on_radio_failure(error_code),
        }
    }

    /// Tests an advertisement against every active request and reports it to those that match.
    pub fn on_radio_match(&mut self, device: DeviceId, data: Vec<u8>, rssi: i16, timestamp: Duration) {
        let data: Arc<[u8]> = data.into();
        let index = AdvertisementIndex::new(&data);
        if index.is_truncated() {
            debug!(%device, "advertisement ends with a truncated structure");
        }

        let matched: SmallVec<[ScanId; 4]> = self
            .requests
            .iter()
            .filter(|(_, request)| request.matches(&device, &index))
            .map(|(id, _)| *id)
            .collect();
        if matched.is_empty() {
            return;
        }

        let result = ScanResult {
            device: device.clone(),
            data: data.clone(),
            rssi,
            timestamp,
        };
        let sighting = self.sightings.entry(device).or_insert_with(|| DeviceSighting {
            last_seen: timestamp,
            result: result.clone(),
            matched: BTreeSet::new(),
        });
        sighting.last_seen = sighting.last_seen.max(timestamp);
        sighting.result = result.clone();

        for id in matched {
            let first = sighting.matched.insert(id);
            if let Some(request) = self.requests.get_mut(&id) {
                request.report_match(&result, first);
            }
        }
    }

    /// Reports a radio failure to every active request.
    ///
    /// Requests stay registered. The radio is started again the next time a request starts, stops or changes mode.
    pub fn on_radio_failure(&mut self, error_code: i32) {
        warn!(error_code, "radio scan failed");
        self.handle = None;
        self.notify_failure(ScanFailure::Radio(error_code));
    }

    /// Runs the end-of-cycle bookkeeping: evicts stale sightings, reporting each exactly once as lost, then flushes
    /// due batches.
    pub fn on_cycle_complete(&mut self) {
        let now = self.clock.now();
        let threshold = self.lost_threshold();

        let expired: Vec<DeviceId> = self
            .sightings
            .iter()
            .filter(|(_, sighting)| now.saturating_sub(sighting.last_seen) > threshold)
            .map(|(device, _)| device.clone())
            .collect();

        for device in expired {
            let Some(sighting) = self.sightings.remove(&device) else {
                continue;
            };
            debug!(%device, "device lost");
            for id in &sighting.matched {
                if let Some(request) = self.requests.get(id) {
                    request.report_lost(&sighting.result);
                }
            }
        }

        for request in self.requests.values_mut() {
            request.flush_batch(now);
        }
    }

    fn compute_timing(&self) -> ScanTiming {
        if let Some(o) = self.timing_override {
            return ScanTiming {
                active: o.active,
                idle: o.idle,
            };
        }
        self.requests
            .values()
            .map(|request| self.config.timing(request.settings.mode))
            .reduce(ScanTiming::most_aggressive)
            .unwrap_or(self.config.low_power)
    }

    /// Brings the radio in line with the active requests.
    fn apply_timing(&mut self) -> Result<()> {
        let timing = self.compute_timing();

        if self.requests.is_empty() {
            if let Some(handle) = self.handle.take() {
                info!("stopping radio scan");
                self.radio.stop_scan(handle);
            }
            self.timing = timing;
            return Ok(());
        }

        if self.handle.is_some() && timing == self.timing {
            return Ok(());
        }

        if let Some(handle) = self.handle.take() {
            self.radio.stop_scan(handle);
        }
        self.timing = timing;
        match self.radio.start_scan(timing) {
            Ok(handle) => {
                info!(?timing, "radio scan started");
                self.handle = Some(handle);
                Ok(())
            }
            Err(err) => {
                warn!("radio rejected scan: {err}");
                Err(Error::new(
                    ErrorKind::ScanStartFailure,
                    Some(Box::new(err)),
                    format!("{timing:?}"),
                ))
            }
        }
    }

    /// Re-applies timing after the request set shrank. Remaining requests learn about a rejected restart through
    /// their event streams since nobody is waiting on a result.
    fn restore_after_rejected_restart(&mut self) {
        if self.apply_timing().is_err() {
            self.notify_failure(ScanFailure::RestartRejected);
        }
    }

    fn notify_failure(&self, failure: ScanFailure) {
        for request in self.requests.values() {
            request.send(ScanEvent::ScanFailed(failure));
        }
    }

    fn replay(&mut self, id: ScanId, now: Duration) {
        let threshold = self.lost_threshold();
        let Some(request) = self.requests.get_mut(&id) else {
            return;
        };
        for sighting in self.sightings.values_mut() {
            if now.saturating_sub(sighting.last_seen) > threshold {
                continue;
            }
            if request.matches(&sighting.result.device, &sighting.result.index()) && sighting.matched.insert(id) {
                trace!(device = %sighting.result.device, ?id, "replaying cached sighting");
                request.report_match(&sighting.result, true);
            }
        }
    }
}

impl<R, C> std::fmt::Debug for ScanAggregator<R, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanAggregator")
            .field("requests", &self.requests.keys().collect::<Vec<_>>())
            .field("sightings", &self.sightings.len())
            .field("handle", &self.handle)
            .field("timing", &self.timing)
            .field("timing_override", &self.timing_override)
            .finish()
    }
}
