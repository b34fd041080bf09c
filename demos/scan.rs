use std::error::Error;
use std::time::Duration;

use futures_lite::StreamExt;
use tracing::{info, metadata::LevelFilter, warn};
use uribeacon::scan::{ScanHandle, ScanTiming};
use uribeacon::*;

/// Stands in for a platform radio and only logs what it is asked to do.
struct LoggingRadio {
    next: u64,
}

impl ScanRadio for LoggingRadio {
    fn start_scan(&mut self, timing: ScanTiming) -> Result<ScanHandle> {
        self.next += 1;
        info!(handle = self.next, ?timing, "radio on");
        Ok(ScanHandle(self.next))
    }

    fn stop_scan(&mut self, handle: ScanHandle) {
        info!(handle = handle.0, "radio off");
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

    let scanner = Scanner::new(LoggingRadio { next: 0 });

    info!("starting scan");
    let filter = AdvertisementFilter::new().service_uuid(btuuid::services::URI_BEACON);
    let settings = ScanSettings::new(ScanMode::LowLatency).callback_type(CallbackType::All);
    let mut scan = scanner.start_scan(vec![filter], settings)?;
    info!("scan started");

    let (radio_tx, radio_rx) = async_channel::unbounded();
    let driver = {
        let scanner = scanner.clone();
        tokio::spawn(async move { scanner.run(Box::pin(radio_rx)).await })
    };

    let beacons = [
        ("00:00:00:00:00:01", "https://goo.gl/S6zT6P"),
        ("00:00:00:00:00:02", "http://www.uribeacon.org"),
        ("00:00:00:00:00:01", "https://goo.gl/S6zT6P"),
    ];
    for (address, uri) in beacons {
        let data = UriBeacon::new(uri, -20, 0)?.to_advertisement()?;
        radio_tx
            .send(RadioEvent::Match {
                device: DeviceId::new(address),
                data,
                rssi: -55,
                timestamp: scanner.now(),
            })
            .await?;
    }
    radio_tx
        .send(RadioEvent::Match {
            device: DeviceId::new("00:00:00:00:00:03"),
            data: vec![0x02, 0x01, 0x06, 0x03, 0x03, 0xd8, 0xfe, 0x04, 0x16, 0xd8, 0xfe, 0x00],
            rssi: -80,
            timestamp: scanner.now(),
        })
        .await?;

    while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(1), scan.next()).await {
        match event {
            ScanEvent::Found(result) | ScanEvent::Updated(result) => match result.uri_beacon() {
                Ok(beacon) => info!("{} ({}dBm): {}", result.device, result.rssi, beacon),
                Err(err) => warn!("{}: {}", result.device, err),
            },
            ScanEvent::Lost(result) => info!("{} lost", result.device),
            ScanEvent::Batch(results) => info!("{} results", results.len()),
            ScanEvent::ScanFailed(failure) => warn!("scan failed: {:?}", failure),
        }
    }

    scanner.stop_scan(scan);
    drop(radio_tx);
    driver.await?;

    Ok(())
}
