use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};
use std::time::Duration;

use async_channel::Receiver;
use futures_core::Stream;
use futures_lite::StreamExt;
use futures_timer::Delay;
use tracing::debug;

use super::{
    Clock, RadioEvent, ScanAggregator, ScanConfig, ScanEvent, ScanId, ScanMode, ScanRadio, ScanSettings, ScanTiming,
    SystemClock, TimingOverride,
};
use crate::filter::AdvertisementFilter;
use crate::Result;

/// Shortest duty-cycle timer the driver will arm, so a zero-length override cannot spin.
const MIN_CYCLE_PERIOD: Duration = Duration::from_millis(100);

trait ScanControl: Send + Sync {
    fn stop(&self, id: ScanId) -> bool;
}

impl<R: ScanRadio, C: Clock> ScanControl for Mutex<ScanAggregator<R, C>> {
    fn stop(&self, id: ScanId) -> bool {
        self.lock().unwrap_or_else(PoisonError::into_inner).stop(id)
    }
}

/// A shareable handle to a [`ScanAggregator`].
///
/// Radio events and cycle completions are serialized through one lock. Listener events are delivered on an
/// unbounded channel per [`Subscription`] in the order they were decided.
pub struct Scanner<R, C = SystemClock> {
    inner: Arc<Mutex<ScanAggregator<R, C>>>,
}

impl<R, C> Clone for Scanner<R, C> {
    fn clone(&self) -> Self {
        Scanner {
            inner: self.inner.clone(),
        }
    }
}

impl<R, C> std::fmt::Debug for Scanner<R, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Scanner").finish()
    }
}

impl<R: ScanRadio> Scanner<R> {
    /// Creates a scanner using the system clock and the default duty cycles.
    pub fn new(radio: R) -> Self {
        Self::with_config(radio, SystemClock::new(), ScanConfig::default())
    }
}

impl<R: ScanRadio, C: Clock> Scanner<R, C> {
    /// Creates a scanner with an explicit clock and configuration.
    pub fn with_config(radio: R, clock: C, config: ScanConfig) -> Self {
        Scanner {
            inner: Arc::new(Mutex::new(ScanAggregator::new(radio, clock, config))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScanAggregator<R, C>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` with exclusive access to the aggregator.
    pub fn with_aggregator<T>(&self, f: impl FnOnce(&mut ScanAggregator<R, C>) -> T) -> T {
        f(&mut self.lock())
    }

    /// Starts a scan request.
    ///
    /// Advertisements matching any of `filters` (or every advertisement if `filters` is empty) are delivered
    /// through the returned [`Subscription`] according to `settings`. Invalid settings and radio start failures are
    /// reported here rather than on the stream.
    pub fn start_scan(&self, filters: Vec<AdvertisementFilter>, settings: ScanSettings) -> Result<Subscription> {
        let (sender, receiver) = async_channel::unbounded();
        let id = self.lock().start(filters, settings, sender)?;
        let control: Arc<dyn ScanControl> = self.inner.clone();
        Ok(Subscription {
            id,
            events: Box::pin(receiver),
            control: Arc::downgrade(&control),
        })
    }

    /// Stops a scan request. Equivalent to dropping the subscription.
    pub fn stop_scan(&self, subscription: Subscription) {
        drop(subscription)
    }

    /// Changes the mode of a running request.
    pub fn set_scan_mode(&self, id: ScanId, mode: ScanMode) -> Result<()> {
        self.lock().set_scan_mode(id, mode)
    }

    /// Replaces the mode-derived duty cycle, or reverts to it with `None`.
    pub fn set_timing_override(&self, timing_override: Option<TimingOverride>) -> Result<()> {
        self.lock().set_timing_override(timing_override)
    }

    /// Feeds one radio event to the aggregator.
    pub fn handle_radio_event(&self, event: RadioEvent) {
        self.lock().handle_radio_event(event)
    }

    /// Runs end-of-cycle bookkeeping now.
    pub fn complete_cycle(&self) {
        self.lock().on_cycle_complete()
    }

    /// The duty cycle currently requested from the radio
    pub fn timing(&self) -> ScanTiming {
        self.lock().timing()
    }

    /// The current time on the aggregator's clock
    pub fn now(&self) -> Duration {
        self.lock().clock().now()
    }

    fn cycle_period(&self) -> Duration {
        self.timing().cycle().max(MIN_CYCLE_PERIOD)
    }

    /// Drives the duty-cycle timer and `radio_events` on the current task until the event stream ends.
    pub async fn run<S>(&self, mut radio_events: S)
    where
        S: Stream<Item = RadioEvent> + Unpin,
    {
        enum Step {
            Radio(Option<RadioEvent>),
            Cycle,
        }

        let mut timer = Delay::new(self.cycle_period());
        loop {
            // cycles still complete while radio events are always ready
            let step = futures_lite::future::or(
                async {
                    (&mut timer).await;
                    Step::Cycle
                },
                async { Step::Radio(radio_events.next().await) },
            )
            .await;

            match step {
                Step::Radio(Some(event)) => self.handle_radio_event(event),
                Step::Radio(None) => {
                    debug!("radio event stream ended");
                    return;
                }
                Step::Cycle => {
                    self.complete_cycle();
                    timer.reset(self.cycle_period());
                }
            }
        }
    }

    /// Drives only the duty-cycle timer, for hosts that push radio events through
    /// [`handle_radio_event`][Self::handle_radio_event] from elsewhere. Never returns.
    pub async fn run_cycles(&self) {
        loop {
            Delay::new(self.cycle_period()).await;
            self.complete_cycle();
        }
    }
}

/// The event stream of one scan request.
///
/// Dropping the subscription stops the request. The stream ends once the request is stopped.
pub struct Subscription {
    id: ScanId,
    events: Pin<Box<Receiver<ScanEvent>>>,
    control: Weak<dyn ScanControl>,
}

impl Subscription {
    /// The identifier of the underlying request
    pub fn id(&self) -> ScanId {
        self.id
    }

    /// Returns an event if one is already queued.
    pub fn try_next(&mut self) -> Option<ScanEvent> {
        self.events.try_recv().ok()
    }

    /// Stops the request.
    pub fn stop(self) {}
}

impl Stream for Subscription {
    type Item = ScanEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.as_mut().poll_next(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(control) = self.control.upgrade() {
            control.stop(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
