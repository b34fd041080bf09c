#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uribeacon::error::ErrorKind;
use uribeacon::gatt::{GattOp, GattOpKind, GattTarget};
use uribeacon::scan::{ScanHandle, ScanTiming};
use uribeacon::{DeviceId, GattBackend, GattCompletions, GattLink, Result, ScanRadio, Uuid};

pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(EnvFilter::from_default_env())
        .try_init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioCall {
    Start(ScanTiming),
    Stop(ScanHandle),
}

/// A radio that records every call and can be told to reject starts.
#[derive(Debug, Clone, Default)]
pub struct FakeRadio {
    calls: Arc<Mutex<Vec<RadioCall>>>,
    reject: Arc<AtomicBool>,
    next_handle: Arc<AtomicU64>,
}

impl FakeRadio {
    pub fn calls(&self) -> Vec<RadioCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn starts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, RadioCall::Start(_)))
            .count()
    }

    pub fn last_start(&self) -> Option<ScanTiming> {
        self.calls().iter().rev().find_map(|call| match call {
            RadioCall::Start(timing) => Some(*timing),
            RadioCall::Stop(_) => None,
        })
    }

    pub fn reject_starts(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }
}

impl ScanRadio for FakeRadio {
    fn start_scan(&mut self, timing: ScanTiming) -> Result<ScanHandle> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(ErrorKind::Other.into());
        }
        self.calls.lock().unwrap().push(RadioCall::Start(timing));
        Ok(ScanHandle(self.next_handle.fetch_add(1, Ordering::SeqCst)))
    }

    fn stop_scan(&mut self, handle: ScanHandle) {
        self.calls.lock().unwrap().push(RadioCall::Stop(handle));
    }
}

/// The attribute table of a simulated beacon.
#[derive(Debug, Default)]
pub struct BeaconState {
    pub services: Vec<Uuid>,
    pub values: HashMap<Uuid, Vec<u8>>,
    pub statuses: HashMap<Uuid, u8>,
    pub log: Vec<GattOp>,
    pub disconnects: usize,
}

/// A GATT backend answering every operation synchronously from a [`BeaconState`].
#[derive(Debug, Clone, Default)]
pub struct FakeBeacon {
    pub state: Arc<Mutex<BeaconState>>,
}

impl FakeBeacon {
    pub fn new(services: &[Uuid]) -> Self {
        let beacon = FakeBeacon::default();
        beacon.state.lock().unwrap().services = services.to_vec();
        beacon
    }

    pub fn set(&self, characteristic: Uuid, value: &[u8]) {
        self.state.lock().unwrap().values.insert(characteristic, value.to_vec());
    }

    pub fn get(&self, characteristic: Uuid) -> Option<Vec<u8>> {
        self.state.lock().unwrap().values.get(&characteristic).cloned()
    }

    pub fn fail_with(&self, characteristic: Uuid, status: u8) {
        self.state.lock().unwrap().statuses.insert(characteristic, status);
    }

    pub fn log(&self) -> Vec<GattOp> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn disconnects(&self) -> usize {
        self.state.lock().unwrap().disconnects
    }
}

#[async_trait]
impl GattBackend for FakeBeacon {
    async fn connect(&self, _device: &DeviceId, completions: GattCompletions) -> Result<Box<dyn GattLink>> {
        Ok(Box::new(FakeLink {
            state: self.state.clone(),
            completions,
        }))
    }
}

struct FakeLink {
    state: Arc<Mutex<BeaconState>>,
    completions: GattCompletions,
}

#[async_trait]
impl GattLink for FakeLink {
    async fn discover_services(&mut self) -> Result<Vec<Uuid>> {
        Ok(self.state.lock().unwrap().services.clone())
    }

    fn dispatch(&mut self, op: &GattOp) -> Result<()> {
        let GattTarget::Characteristic { characteristic, .. } = op.target else {
            return Err(ErrorKind::NotSupported.into());
        };

        let (status, value) = {
            let mut state = self.state.lock().unwrap();
            state.log.push(op.clone());
            match state.statuses.get(&characteristic).copied() {
                Some(status) => (status, Vec::new()),
                None => match &op.kind {
                    GattOpKind::Read => match state.values.get(&characteristic) {
                        Some(value) => (0, value.clone()),
                        None => (0x0a, Vec::new()),
                    },
                    GattOpKind::Write(value) => {
                        state.values.insert(characteristic, value.clone());
                        (0, Vec::new())
                    }
                },
            }
        };
        self.completions.complete(status, value);
        Ok(())
    }

    fn disconnect(&mut self) {
        self.state.lock().unwrap().disconnects += 1;
    }
}

/// A link that only records dispatched operations, leaving completion to the test.
pub struct RecordingLink {
    pub dispatched: Arc<Mutex<Vec<GattOp>>>,
    pub reject: Arc<Mutex<Vec<Uuid>>>,
}

#[async_trait]
impl GattLink for RecordingLink {
    async fn discover_services(&mut self) -> Result<Vec<Uuid>> {
        Ok(Vec::new())
    }

    fn dispatch(&mut self, op: &GattOp) -> Result<()> {
        if let GattTarget::Characteristic { characteristic, .. } = op.target {
            if self.reject.lock().unwrap().contains(&characteristic) {
                return Err(ErrorKind::InvalidParameter.into());
            }
        }
        self.dispatched.lock().unwrap().push(op.clone());
        Ok(())
    }

    fn disconnect(&mut self) {}
}
