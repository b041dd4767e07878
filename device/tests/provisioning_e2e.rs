//! End-to-end provisioning tests.
//!
//! The device runs on a manual clock and a scratch state directory; the
//! companion app side is `bstwifi_core::client::AppClient`. These tests
//! verify the complete flow:
//! 1. Announcement on the bootstrap network
//! 2. HELLO and the status reply with the scan list
//! 3. SET_DATA, persistence and joining the destination network
//! 4. Failure reporting, key binding and restarts

use std::time::Duration;

use bstwifi_core::client::{AppClient, DeviceMessage};
use bstwifi_core::{CommandCode, Mode, StatusCode, StatusPacket};
use bstwifi_device::radio::NetworkSpec;
use bstwifi_device::{build_radio, serve, Clock, Config, CredentialStore, Device};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};

const DELAY: Duration = Duration::from_millis(500);
const TIMEOUT: Duration = Duration::from_secs(2);

fn test_config(overrides: &[(&str, &str)]) -> Config {
    let overrides: Vec<(String, String)> = overrides
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    Config::from_lookup(|key| {
        overrides
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .or_else(|| match key {
                "DEVICE_NAME" => Some("Heating".into()),
                "ASSOCIATION_DELAY_MS" => Some(DELAY.as_millis().to_string()),
                "TIMEOUT_CONNECTING_MS" => Some(TIMEOUT.as_millis().to_string()),
                _ => None,
            })
    })
}

fn start_device(dir: &tempfile::TempDir, config: &Config, clock: &Clock) -> Device {
    let store = CredentialStore::open(dir.path()).unwrap();
    let mut radio = build_radio(config).unwrap();
    radio.add_network(NetworkSpec::new("HomeWLAN", "hunter22"));
    Device::new(config, store, radio, clock.clone()).unwrap()
}

/// Let the radio associate and tick once.
fn associate(device: &mut Device, clock: &Clock) {
    clock.advance(DELAY);
    device.tick();
}

/// Decode the single status packet the device sent.
fn expect_status(device: &mut Device, app: &mut AppClient) -> StatusPacket {
    let outgoing = device.take_outgoing();
    assert_eq!(outgoing.len(), 1, "expected exactly one datagram");
    match app.receive(&outgoing[0]).unwrap() {
        DeviceMessage::Status(status) => status,
        other => panic!("expected status packet, got {other:?}"),
    }
}

/// Bring the device onto the bootstrap network and open a session.
fn open_session(device: &mut Device, clock: &Clock, app: &mut AppClient) -> StatusPacket {
    associate(device, clock);
    assert_eq!(device.mode(), Mode::WaitingForData);

    let outgoing = device.take_outgoing();
    assert_eq!(
        app.receive(&outgoing[0]).unwrap(),
        DeviceMessage::Announcement(StatusCode::Hello)
    );

    assert_eq!(device.input(&app.hello()), Some(CommandCode::Hello));
    device.tick();
    expect_status(device, app)
}

#[test]
fn test_full_provisioning_flow() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&[]);
    let clock = Clock::manual(0);
    let mut device = start_device(&dir, &config, &clock);
    assert_eq!(device.mode(), Mode::ConnectingToBootstrap);

    let mut app = AppClient::new(b"app_secret", [0x11; 8]);
    let status = open_session(&mut device, &clock, &mut app);
    assert_eq!(status.status, StatusCode::Ok);
    assert_eq!(status.log, "Heating");
    assert_eq!(status.unique_id, config.device_uid);

    // The bootstrap access point itself is not offered
    let ssids: Vec<_> = status.networks.iter().map(|n| n.ssid.as_str()).collect();
    assert_eq!(ssids, ["HomeWLAN"]);

    let set_data = app.set_data("HomeWLAN", "hunter22", b"").unwrap();
    assert_eq!(device.input(&set_data), Some(CommandCode::SetData));
    device.tick();
    assert_eq!(device.mode(), Mode::ConnectingToDestination);

    let outgoing = device.take_outgoing();
    assert_eq!(
        app.receive(&outgoing[0]).unwrap(),
        DeviceMessage::Announcement(StatusCode::BootstrapOk)
    );
    let store = CredentialStore::open(dir.path()).unwrap();
    assert_eq!(
        store.load_data().unwrap().as_deref(),
        Some(&b"HomeWLAN\0hunter22\0\0"[..])
    );

    associate(&mut device, &clock);
    assert_eq!(device.mode(), Mode::DestinationConnected);
    assert_eq!(device.engine().status(), StatusCode::Ok);
}

#[test]
fn test_restart_goes_straight_to_destination() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&[]);
    let clock = Clock::manual(0);
    {
        let mut device = start_device(&dir, &config, &clock);
        let mut app = AppClient::new(b"app_secret", [0x22; 8]);
        open_session(&mut device, &clock, &mut app);
        let set_data = app.set_data("HomeWLAN", "hunter22", b"").unwrap();
        device.input(&set_data);
        device.tick();
    }

    let mut device = start_device(&dir, &config, &clock);
    assert_eq!(device.mode(), Mode::ConnectingToDestination);
    associate(&mut device, &clock);
    assert_eq!(device.mode(), Mode::DestinationConnected);
}

#[test]
fn test_wrong_password_reported_to_app() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&[("RETRY_DESTINATION", "1")]);
    let clock = Clock::manual(0);
    let mut device = start_device(&dir, &config, &clock);

    let mut app = AppClient::new(b"app_secret", [0x33; 8]);
    open_session(&mut device, &clock, &mut app);
    let set_data = app.set_data("HomeWLAN", "wrong-password", b"").unwrap();
    device.input(&set_data);
    device.tick();
    device.take_outgoing();
    assert_eq!(device.mode(), Mode::ConnectingToDestination);

    // The failure only counts once the attempt has timed out
    associate(&mut device, &clock);
    assert_eq!(device.mode(), Mode::ConnectingToDestination);
    clock.advance(TIMEOUT);
    device.tick();
    assert_eq!(device.mode(), Mode::ConnectingToBootstrap);
    assert_eq!(device.engine().status(), StatusCode::CredentialsWrong);

    // Back on the bootstrap network the app learns why
    let status = open_session(&mut device, &clock, &mut app);
    assert_eq!(status.status, StatusCode::CredentialsWrong);
    assert_eq!(status.log, "WiFi Credentials wrong");

    // A corrected password gets the device online
    let set_data = app.set_data("HomeWLAN", "hunter22", b"").unwrap();
    device.input(&set_data);
    device.tick();
    associate(&mut device, &clock);
    assert_eq!(device.mode(), Mode::DestinationConnected);
}

#[test]
fn test_bound_key_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&[]);
    let clock = Clock::manual(0);
    {
        let mut device = start_device(&dir, &config, &clock);
        let mut app = AppClient::new(b"app_secret", [0x44; 8]);
        open_session(&mut device, &clock, &mut app);

        let bind = app.bind(b"household-key").unwrap();
        assert_eq!(device.input(&bind), Some(CommandCode::Bind));
        device.tick();

        // The refreshed status is already encrypted with the new key
        let status = expect_status(&mut device, &mut app);
        assert_eq!(status.status, StatusCode::Ok);
    }

    let store = CredentialStore::open(dir.path()).unwrap();
    assert_eq!(
        store.load_secret().unwrap().as_deref(),
        Some(&b"household-key"[..])
    );

    let mut device = start_device(&dir, &config, &clock);

    // The factory secret no longer decrypts anything
    let mut stale = AppClient::new(b"app_secret", [0x55; 8]);
    associate(&mut device, &clock);
    device.take_outgoing();
    device.input(&stale.hello());
    device.tick();
    let outgoing = device.take_outgoing();
    assert!(stale.receive(&outgoing[0]).is_err());

    // Same app nonce renews the session; the bound key works
    let mut app = AppClient::new(b"household-key", [0x55; 8]);
    device.input(&app.hello());
    device.tick();
    let status = expect_status(&mut device, &mut app);
    assert_eq!(status.log, "Heating");
}

#[test]
fn test_confirmation_gates_set_data() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&[("CONFIRMATION_MODE", "always")]);
    let clock = Clock::manual(0);
    let mut device = start_device(&dir, &config, &clock);

    let mut app = AppClient::new(b"app_secret", [0x66; 8]);
    open_session(&mut device, &clock, &mut app);

    let set_data = app.set_data("HomeWLAN", "hunter22", b"").unwrap();
    assert_eq!(device.input(&set_data), None);
    assert_eq!(device.mode(), Mode::WaitingForData);

    assert!(device.console("confirm".parse().unwrap()));
    let set_data = app.set_data("HomeWLAN", "hunter22", b"").unwrap();
    assert_eq!(device.input(&set_data), Some(CommandCode::SetData));
}

#[test]
fn test_factory_reset_erases_state() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&[]);
    let clock = Clock::manual(0);
    let mut device = start_device(&dir, &config, &clock);

    let mut app = AppClient::new(b"app_secret", [0x77; 8]);
    open_session(&mut device, &clock, &mut app);
    let bind = app.bind(b"household-key").unwrap();
    device.input(&bind);
    device.tick();
    device.take_outgoing();
    let set_data = app.set_data("HomeWLAN", "hunter22", b"").unwrap();
    device.input(&set_data);
    device.tick();
    associate(&mut device, &clock);
    assert_eq!(device.mode(), Mode::DestinationConnected);

    assert!(device.console("reset".parse().unwrap()));
    device.tick();
    assert_eq!(device.mode(), Mode::ConnectingToBootstrap);

    let store = CredentialStore::open(dir.path()).unwrap();
    assert_eq!(store.load_data().unwrap(), None);
    assert_eq!(store.load_secret().unwrap(), None);
}

async fn recv(socket: &UdpSocket, buf: &mut [u8]) -> usize {
    tokio::time::timeout(Duration::from_secs(5), socket.recv_from(buf))
        .await
        .expect("timed out waiting for device")
        .unwrap()
        .0
}

#[tokio::test]
async fn test_udp_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&[("ASSOCIATION_DELAY_MS", "0")]);
    let store = CredentialStore::open(dir.path()).unwrap();
    let radio = build_radio(&config).unwrap();
    let device = Device::new(&config, store, radio, Clock::monotonic()).unwrap();

    let device_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let app_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let device_addr = device_socket.local_addr().unwrap();
    let app_addr = app_socket.local_addr().unwrap();

    let (_console_tx, console_rx) = mpsc::channel(1);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        serve(
            device,
            &device_socket,
            app_addr,
            Duration::from_millis(10),
            console_rx,
            async move {
                let _ = shutdown_rx.await;
            },
        )
        .await
    });

    let mut app = AppClient::new(b"app_secret", [0x88; 8]);
    let mut buf = [0u8; 1024];

    let len = recv(&app_socket, &mut buf).await;
    assert_eq!(
        app.receive(&buf[..len]).unwrap(),
        DeviceMessage::Announcement(StatusCode::Hello)
    );

    app_socket.send_to(&app.hello(), device_addr).await.unwrap();
    let len = recv(&app_socket, &mut buf).await;
    let DeviceMessage::Status(status) = app.receive(&buf[..len]).unwrap() else {
        panic!("expected status packet");
    };
    assert_eq!(status.log, "Heating");

    shutdown_tx.send(()).unwrap();
    let device = handle.await.unwrap().unwrap();
    assert_eq!(device.mode(), Mode::WaitingForData);
}
