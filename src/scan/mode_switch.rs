use super::ScanMode;

/// Host state changes that influence how aggressively to scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceStateEvent {
    /// The screen turned on
    ScreenOn,
    /// The screen turned off
    ScreenOff,
    /// Motion was detected
    Moving,
    /// No motion for a while
    Stationary,
}

/// Picks a [`ScanMode`] from screen and motion state.
///
/// With the screen on the user is looking for beacons, so scan at low latency. With the screen off, scan at a
/// balanced rate while moving and at low power while stationary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanModeController {
    screen_on: bool,
    moving: bool,
}

impl ScanModeController {
    /// Creates a controller from the current host state.
    pub fn new(screen_on: bool, moving: bool) -> Self {
        ScanModeController { screen_on, moving }
    }

    /// The mode for the current state
    pub fn mode(&self) -> ScanMode {
        match (self.screen_on, self.moving) {
            (true, _) => ScanMode::LowLatency,
            (false, true) => ScanMode::Balanced,
            (false, false) => ScanMode::LowPower,
        }
    }

    /// Applies a state change and returns the new mode if it differs from the previous one.
    pub fn handle_event(&mut self, event: DeviceStateEvent) -> Option<ScanMode> {
        let before = self.mode();
        match event {
            DeviceStateEvent::ScreenOn => self.screen_on = true,
            DeviceStateEvent::ScreenOff => self.screen_on = false,
            DeviceStateEvent::Moving => self.moving = true,
            DeviceStateEvent::Stationary => self.moving = false,
        }
        let after = self.mode();
        (after != before).then_some(after)
    }
}

impl Default for ScanModeController {
    fn default() -> Self {
        Self::new(true, false)
    }
}
