//! UDP service loop around the bootstrap engine.
//!
//! One task owns the [`Device`] and multiplexes:
//! - the tick timer driving `periodic`
//! - datagrams from the provisioning port
//! - operator console commands
//! - the shutdown signal
//!
//! After each event the queued platform work is drained: scan requests are
//! answered from the simulated radio and datagrams are broadcast.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use bstwifi_core::{Bootstrap, CommandCode, Mode};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::console::{ConsoleCommand, ParseCommandError, HELP};
use crate::error::{DeviceError, Result};
use crate::platform::{Clock, HostPlatform, PlatformEvent};
use crate::radio::{load_networks, NetworkSpec, SimulatedRadio};
use crate::store::CredentialStore;

/// Receive buffer, larger than any valid datagram so oversized ones are seen.
const RECV_BUFFER_SIZE: usize = 2048;

/// The engine plus the platform work it has queued
#[derive(Debug)]
pub struct Device {
    engine: Bootstrap<HostPlatform>,
    events: mpsc::UnboundedReceiver<PlatformEvent>,
}

impl Device {
    /// Build the engine and run `setup` with the persisted state.
    pub fn new(
        config: &Config,
        store: CredentialStore,
        radio: SimulatedRadio,
        clock: Clock,
    ) -> Result<Self> {
        let data = store.load_data()?;
        let secret = store.load_secret()?;

        let (tx, events) = mpsc::unbounded_channel();
        let mut engine = Bootstrap::new(HostPlatform::new(radio, store, tx, clock));
        engine.setup(config.options(), data.as_deref(), secret.as_deref());

        info!(mode = ?engine.mode(), "Device started");
        Ok(Self { engine, events })
    }

    pub fn engine(&self) -> &Bootstrap<HostPlatform> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Bootstrap<HostPlatform> {
        &mut self.engine
    }

    pub fn mode(&self) -> Mode {
        self.engine.mode()
    }

    /// One engine tick
    pub fn tick(&mut self) {
        self.engine.periodic();
    }

    /// Feed a received datagram to the engine.
    pub fn input(&mut self, datagram: &[u8]) -> Option<CommandCode> {
        let mut buf = datagram.to_vec();
        match self.engine.network_input(&mut buf) {
            Ok(code) => {
                debug!(?code, "Command accepted");
                Some(code)
            }
            Err(e) => {
                debug!(error = %e, kind = ?e.kind(), size = datagram.len(), "Datagram rejected");
                None
            }
        }
    }

    /// Drain queued platform work, returning the datagrams to broadcast.
    pub fn take_outgoing(&mut self) -> Vec<Vec<u8>> {
        let mut outgoing = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            match event {
                PlatformEvent::Transmit(datagram) => outgoing.push(datagram),
                PlatformEvent::ScanRequested => {
                    let networks = self.engine.platform().radio().scan();
                    debug!(networks = networks.len(), "Scan completed");
                    self.engine.submit_wifi_scan_results(&networks);
                }
            }
        }
        outgoing
    }

    /// Apply an operator command. Returns `false` on quit.
    pub fn console(&mut self, command: ConsoleCommand) -> bool {
        match command {
            ConsoleCommand::Confirm => {
                info!("Bootstrap confirmed by operator");
                self.engine.confirm_bootstrap();
            }
            ConsoleCommand::Reset => {
                info!("Factory reset requested by operator");
                self.engine.factory_reset();
            }
            ConsoleCommand::Status => println!("{}", self.status_line()),
            ConsoleCommand::Error(text) => self.engine.set_error_message(text),
            ConsoleCommand::Add { ssid, passphrase } => self
                .engine
                .platform_mut()
                .radio_mut()
                .add_network(NetworkSpec::new(ssid, passphrase)),
            ConsoleCommand::Remove { ssid } => {
                if !self.engine.platform_mut().radio_mut().remove_network(&ssid) {
                    warn!(ssid, "No such network");
                }
            }
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Quit => return false,
        }
        true
    }

    /// One-line summary of the engine state
    pub fn status_line(&self) -> String {
        let engine = &self.engine;
        let ssid = engine
            .data()
            .ssid()
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .unwrap_or_default();
        format!(
            "mode={:?} status={:?} confirmation={:?} link={:?} ssid={:?} error={:?}",
            engine.mode(),
            engine.status(),
            engine.confirmation_state(),
            engine.platform().radio().state(engine.platform().clock().now_ms()),
            ssid,
            engine.error_message().unwrap_or(""),
        )
    }
}

/// Build the simulated radio. The bootstrap access point is always visible.
pub fn build_radio(config: &Config) -> Result<SimulatedRadio> {
    let networks = match &config.networks_file {
        Some(path) => load_networks(path)?,
        None => Vec::new(),
    };
    let mut radio = SimulatedRadio::new(networks, config.association_delay);
    if !radio
        .networks()
        .iter()
        .any(|n| n.ssid == config.bootstrap_ssid)
    {
        radio.add_network(NetworkSpec::new(
            config.bootstrap_ssid.clone(),
            config.bootstrap_key.clone(),
        ));
    }
    Ok(radio)
}

/// Run the device until shutdown or `quit`.
pub async fn serve(
    mut device: Device,
    socket: &UdpSocket,
    target: SocketAddr,
    tick: Duration,
    mut console: mpsc::Receiver<ConsoleCommand>,
    shutdown: impl Future<Output = ()>,
) -> Result<Device> {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut buf = vec![0u8; RECV_BUFFER_SIZE];
    info!(local = %socket.local_addr()?, %target, "Serving provisioning port");

    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            _ = ticker.tick() => device.tick(),
            received = socket.recv_from(&mut buf) => match received {
                Ok((len, from)) => {
                    debug!(%from, len, "Datagram received");
                    device.input(&buf[..len]);
                }
                Err(e) => warn!(error = %e, "Receive failed"),
            },
            Some(command) = console.recv() => {
                if !device.console(command) {
                    info!("Quit requested");
                    break;
                }
            }
        }

        for datagram in device.take_outgoing() {
            if let Err(e) = socket.send_to(&datagram, target).await {
                warn!(error = %e, len = datagram.len(), "Send failed");
            }
        }
    }

    Ok(device)
}

/// Bind the socket, start the console and serve until Ctrl-C.
pub async fn run(config: Config) -> Result<()> {
    let store = CredentialStore::open(&config.state_dir)?;
    let radio = build_radio(&config)?;
    let device = Device::new(&config, store, radio, Clock::monotonic())?;

    let target: SocketAddr = format!("{}:{}", config.broadcast_addr, config.port)
        .parse()
        .map_err(|e| DeviceError::Config(format!("broadcast address: {e}")))?;
    let socket = UdpSocket::bind((config.bind_addr.as_str(), config.port)).await?;
    socket.set_broadcast(true)?;

    let console = spawn_console();
    serve(
        device,
        &socket,
        target,
        config.tick_interval,
        console,
        shutdown_signal(),
    )
    .await?;
    Ok(())
}

/// Forward parsed stdin lines until EOF.
fn spawn_console() -> mpsc::Receiver<ConsoleCommand> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match line.parse::<ConsoleCommand>() {
                    Ok(command) => {
                        if tx.send(command).await.is_err() {
                            break;
                        }
                    }
                    Err(ParseCommandError::Empty) => {}
                    Err(e) => println!("{e}"),
                },
                Ok(None) => {
                    debug!("Console closed");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Console read failed");
                    break;
                }
            }
        }
    });
    rx
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
