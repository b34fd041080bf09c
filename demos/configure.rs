use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, metadata::LevelFilter};
use uribeacon::btuuid::characteristics::*;
use uribeacon::btuuid::services::URI_BEACON_CONFIG_V2;
use uribeacon::gatt::{GattOp, GattOpKind, GattTarget};
use uribeacon::*;

/// An in-memory version 2 beacon that answers each operation a few milliseconds later.
#[derive(Clone)]
struct SimulatedBeacon {
    attributes: Arc<Mutex<HashMap<Uuid, Vec<u8>>>>,
}

impl SimulatedBeacon {
    fn new() -> Self {
        let attributes = HashMap::from([
            (V2_LOCK_STATE, vec![0]),
            (V2_URI_DATA, uri::encode("http://www.uribeacon.org").unwrap_or_default().to_vec()),
            (V2_FLAGS, vec![0]),
            (V2_ADVERTISED_TX_POWER_LEVELS, vec![0xe2, 0xec, 0xf6, 0x00]),
            (V2_TX_POWER_MODE, vec![2]),
            (V2_BEACON_PERIOD, 1000u16.to_le_bytes().to_vec()),
        ]);
        SimulatedBeacon {
            attributes: Arc::new(Mutex::new(attributes)),
        }
    }
}

#[async_trait]
impl GattBackend for SimulatedBeacon {
    async fn connect(&self, device: &DeviceId, completions: GattCompletions) -> Result<Box<dyn GattLink>> {
        info!("connecting to {}", device);
        Ok(Box::new(SimulatedLink {
            beacon: self.clone(),
            completions,
        }))
    }
}

struct SimulatedLink {
    beacon: SimulatedBeacon,
    completions: GattCompletions,
}

#[async_trait]
impl GattLink for SimulatedLink {
    async fn discover_services(&mut self) -> Result<Vec<Uuid>> {
        Ok(vec![URI_BEACON_CONFIG_V2])
    }

    fn dispatch(&mut self, op: &GattOp) -> Result<()> {
        let GattTarget::Characteristic { characteristic, .. } = op.target else {
            return Err(error::ErrorKind::NotSupported.into());
        };
        let value = {
            let mut attributes = self.beacon.attributes.lock().unwrap_or_else(|err| err.into_inner());
            match &op.kind {
                GattOpKind::Read => attributes.get(&characteristic).cloned().unwrap_or_default(),
                GattOpKind::Write(value) => {
                    attributes.insert(characteristic, value.clone());
                    Vec::new()
                }
            }
        };

        let completions = self.completions.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            completions.complete(0, value);
        });
        Ok(())
    }

    fn disconnect(&mut self) {
        info!("disconnected");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let new_uri = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://goo.gl/S6zT6P".to_owned());
    let device = DeviceId::new("00:00:00:00:00:01");
    let configurator = BeaconConfigurator::new(SimulatedBeacon::new());

    let connection = configurator.connect(&device).await?;
    info!("protocol {:?}", connection.protocol_version());
    info!("current configuration: {}", connection.read_config().await?);
    info!("locked: {}", connection.lock_state().await?);
    info!("beacon period: {}ms", connection.beacon_period().await?);

    let current = connection.read_config().await?;
    let updated = UriBeacon::new(&new_uri, current.tx_power_level(), current.flags())?;
    connection.write_config(&updated).await?;
    info!("new configuration: {}", connection.read_config().await?);
    connection.disconnect();

    Ok(())
}
