#![allow(clippy::let_unit_value)]

use futures_lite::StreamExt;
use uribeacon::protocol::LockKey;
use uribeacon::scan::{ScanId, SystemClock};
use uribeacon::*;

fn assert_send<T: Send>(t: T) -> T {
    t
}

async fn check_scanner_apis<R: ScanRadio>(scanner: Scanner<R, SystemClock>) -> Result<ScanId> {
    let filter = AdvertisementFilter::new().service_uuid(btuuid::services::URI_BEACON);
    let mut scan: Subscription = assert_send(scanner.start_scan(vec![filter], ScanSettings::default()))?;
    let _event: Option<ScanEvent> = assert_send(scan.next()).await;
    let id = scan.id();
    let _res: Result<()> = scanner.set_scan_mode(id, ScanMode::Balanced);
    scanner.stop_scan(scan);

    let _run: () = assert_send(scanner.run(futures_lite::stream::empty())).await;
    Ok(id)
}

async fn check_configurator_apis<B: GattBackend>(configurator: BeaconConfigurator<B>) -> Result<BeaconConnection> {
    let device = DeviceId::new("00:11:22:33:44:55");
    let _beacon: Result<UriBeacon> = assert_send(configurator.connect_and_read_config(&device)).await;
    let beacon = UriBeacon::new("https://www.example.com/", -20, 0)?;
    let _res: Result<()> = assert_send(configurator.write_config(&device, &beacon)).await;
    assert_send(configurator.connect(&device)).await
}

async fn check_connection_apis(connection: BeaconConnection) -> Result<()> {
    let key: LockKey = [0; 16];
    let _version: ProtocolVersion = connection.protocol_version();
    let _beacon: Result<UriBeacon> = assert_send(connection.read_config()).await;
    let _raw: Result<Vec<u8>> = assert_send(connection.read_raw()).await;
    let _locked: Result<bool> = assert_send(connection.lock_state()).await;
    let _res: Result<()> = assert_send(connection.lock(&key)).await;
    let _res: Result<()> = assert_send(connection.unlock(&key)).await;
    let _period: Result<u16> = assert_send(connection.beacon_period()).await;
    let _res: Result<()> = assert_send(connection.set_beacon_period(1000)).await;
    let _res: Result<()> = assert_send(connection.reset()).await;
    connection.disconnect();

    Ok(())
}

#[allow(unused)]
async fn check_apis<R: ScanRadio, B: GattBackend>(radio: R, backend: B) -> Result<()> {
    check_scanner_apis(Scanner::new(radio)).await?;
    let connection = check_configurator_apis(BeaconConfigurator::new(backend)).await?;
    check_connection_apis(connection).await?;

    Ok(())
}

fn main() {}
