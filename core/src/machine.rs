//! Connection state machine.
//!
//! [`Bootstrap`] owns all protocol state and drives the [`Platform`]. The
//! embedding runtime calls:
//!
//! - [`setup`](Bootstrap::setup) once per boot with the persisted data
//! - [`periodic`](Bootstrap::periodic) at a steady interval, well below the
//!   connection timeout
//! - [`network_input`](Bootstrap::network_input) for every received datagram
//! - [`submit_wifi_scan_results`](Bootstrap::submit_wifi_scan_results) when a
//!   requested scan completes
//!
//! # Modes
//!
//! ```text
//!                setup (no ssid)                 setup (ssid known)
//!                      |                                 |
//!                      v                                 v
//!  +---------> ConnectingToBootstrap ---retries---> ConnectingToDestination
//!  |                   |  ^                            |   ^      |
//!  |             joined|  |link lost        retries    |   |      | joined
//!  |                   v  |                 exhausted  |   |      v
//!  |             WaitingForData ----SET_DATA-----------+---+  DestinationConnected
//!  |                                                              |
//!  +-----------------------------failure--------------------------+
//! ```
//!
//! # Deferred execution
//!
//! `network_input` only validates, authorizes and records. Anything touching
//! the radio, the disk or the transport happens in the next `periodic` tick,
//! one queued command per tick, highest priority first.

use std::borrow::Cow;

use tracing::{debug, info, warn};

use crate::error::{ConnectionFailure, Error, Result};
use crate::options::{ConfirmationMode, Options};
use crate::packet::{
    self, Command, CommandCode, ConfirmationState, StatusCode, StatusReport, WifiListEntry,
};
use crate::platform::{ConnectionState, Platform};
use crate::queue::{CommandQueue, PendingCommand};
use crate::session::{CryptoSecret, Session};
use crate::store::BootstrapData;

/// Externally visible mode of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// `setup` has not run, or no bootstrap network is configured.
    Uninitialized,
    /// Joining the bootstrap access point.
    ConnectingToBootstrap,
    /// On the bootstrap network, serving the companion app.
    WaitingForData,
    /// Joining the destination network.
    ConnectingToDestination,
    /// On the destination network.
    DestinationConnected,
}

/// Mode plus the deadline that only makes sense in that mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    ConnectingToBootstrap { retry_at: u64 },
    WaitingForData { check_at: u64 },
    ConnectingToDestination { retry_at: u64 },
    DestinationConnected { advanced_at: u64 },
}

impl Phase {
    fn mode(self) -> Mode {
        match self {
            Phase::Uninitialized => Mode::Uninitialized,
            Phase::ConnectingToBootstrap { .. } => Mode::ConnectingToBootstrap,
            Phase::WaitingForData { .. } => Mode::WaitingForData,
            Phase::ConnectingToDestination { .. } => Mode::ConnectingToDestination,
            Phase::DestinationConnected { .. } => Mode::DestinationConnected,
        }
    }
}

/// The bootstrap protocol engine.
pub struct Bootstrap<P: Platform> {
    platform: P,
    /// Options exactly as passed to `setup`, restored by a factory reset.
    configured: Options,
    options: Options,
    data: BootstrapData,
    secret: CryptoSecret,
    phase: Phase,
    session: Session,
    attempts: u32,
    status: StatusCode,
    error_message: Option<Cow<'static, str>>,
    queue: CommandQueue,
    confirmed: bool,
}

impl<P: Platform> Bootstrap<P> {
    /// Create an engine. Nothing happens until [`setup`](Self::setup).
    pub fn new(platform: P) -> Self {
        Self {
            platform,
            configured: Options::default(),
            options: Options::default(),
            data: BootstrapData::new(),
            secret: CryptoSecret::new(&[]),
            phase: Phase::Uninitialized,
            session: Session::new(),
            attempts: 0,
            status: StatusCode::Ok,
            error_message: None,
            queue: CommandQueue::new(),
            confirmed: false,
        }
    }

    /// (Re)initialize from options and persisted state.
    ///
    /// With stored bootstrap data the engine heads for the destination
    /// network, otherwise for the bootstrap network. A stored key takes
    /// precedence over the initial secret.
    pub fn setup(&mut self, options: Options, stored_data: Option<&[u8]>, stored_key: Option<&[u8]>) {
        self.configured = options.clone();
        self.options = options;
        self.phase = Phase::Uninitialized;
        self.reset_state();
        self.status = StatusCode::Ok;
        self.error_message = None;

        self.data.assign(stored_data.unwrap_or_default());
        match stored_key {
            Some(key) if !key.is_empty() => self.secret.set(key),
            _ => self.secret.set(&self.options.initial_secret),
        }

        info!(
            name = %self.options.name,
            bootstrapped = self.data.is_bootstrapped(),
            bound_key = stored_key.is_some_and(|k| !k.is_empty()),
            "Bootstrap engine setup"
        );

        if self.data.is_bootstrapped() {
            if self.options.confirmation == ConfirmationMode::RequiredFirstStart {
                self.options.confirmation = ConfirmationMode::NotRequired;
            }
            self.enter_destination();
        } else if !self.options.bootstrap_ssid.is_empty() {
            self.enter_bootstrap(StatusCode::Ok, None);
        }
    }

    /// Advance the state machine. Never blocks.
    pub fn periodic(&mut self) {
        if !self.options.is_usable() {
            return;
        }

        if let Some(command) = self.queue.pop() {
            self.execute(command);
            return;
        }

        let now = self.platform.now_ms();
        let link = self.platform.connection_state();
        self.step(now, link);
    }

    /// Handle a datagram from the companion app.
    ///
    /// Decrypts in place. Rejected datagrams leave every reported state
    /// untouched; the error only tells the runtime why.
    pub fn network_input(&mut self, datagram: &mut [u8]) -> Result<CommandCode> {
        let mode = self.mode();
        if mode != Mode::WaitingForData {
            return Err(Error::NotAcceptingInput { mode });
        }

        let now = self.platform.now_ms();
        let command =
            packet::decode_incoming(datagram, self.secret.as_bytes(), self.session.device_nonce())?;
        let code = command.code();

        match command {
            Command::Hello { app_nonce } => {
                let platform = &mut self.platform;
                let opened = self.session.open_or_renew(
                    &app_nonce,
                    now,
                    self.options.timeout_nonce_ms(),
                    || platform.random_u64(),
                );
                if !opened {
                    return Err(Error::SessionInUse);
                }
                self.queue.push(PendingCommand::WifiList);
                debug!(valid_until = ?self.session.valid_until(), "App session opened or renewed");
            }
            Command::Bind { key } => {
                if !self.session.is_valid(now) {
                    return Err(Error::NoSession);
                }
                if !self.queue.push(PendingCommand::Bind) {
                    return Err(Error::AlreadyPending);
                }
                self.secret.set(key);
                debug!(key_len = key.len(), "Bind accepted");
            }
            Command::SetData { blob } => {
                if !self.session.is_valid(now) {
                    return Err(Error::NoSession);
                }
                if self.options.confirmation.is_required() && !self.confirmed {
                    return Err(Error::ConfirmationRequired);
                }
                if self.queue.contains(PendingCommand::SetWifi) {
                    return Err(Error::AlreadyPending);
                }
                if blob.first().map_or(true, |&b| b == 0) {
                    return Err(Error::MissingSsid);
                }
                self.data.assign(blob);
                self.queue.push(PendingCommand::SetWifi);
                debug!(data = ?self.data, "Bootstrap data accepted");
            }
        }

        Ok(code)
    }

    /// Report scan results to the app holding the session.
    ///
    /// Ignored unless waiting for data.
    pub fn submit_wifi_scan_results(&mut self, networks: &[WifiListEntry]) {
        if self.mode() != Mode::WaitingForData {
            debug!(mode = ?self.mode(), "Scan results dropped");
            return;
        }

        let log: &str = match (&self.error_message, self.status) {
            (Some(message), status) if status != StatusCode::Ok => message.as_ref(),
            _ => self.options.name.as_str(),
        };
        let report = StatusReport {
            status: self.status,
            device_nonce: self.session.device_nonce(),
            unique_id: &self.options.unique_id,
            confirmation: self.confirmation_state(),
            networks,
            skip_ssid: &self.options.bootstrap_ssid,
            log,
        };
        let datagram =
            packet::encode_status(&report, self.secret.as_bytes(), self.session.app_nonce());

        debug!(
            status = ?self.status,
            networks = networks.len(),
            "Sending status packet"
        );
        self.platform.transmit(&datagram);
    }

    /// Erase persisted data and start over on the next tick.
    pub fn factory_reset(&mut self) {
        self.queue.push(PendingCommand::FactoryReset);
    }

    /// Grant the external confirmation for the current bootstrap attempt.
    pub fn confirm_bootstrap(&mut self) {
        self.confirmed = true;
    }

    /// Current mode.
    pub fn get_state(&self) -> Mode {
        self.mode()
    }

    /// Override the log text reported with the next failure.
    pub fn set_error_message(&mut self, message: impl Into<Cow<'static, str>>) {
        self.error_message = Some(message.into());
    }

    /// Current mode.
    pub fn mode(&self) -> Mode {
        self.phase.mode()
    }

    /// Status code reported to the app.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Current error message, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Confirmation field reported to the app.
    pub fn confirmation_state(&self) -> ConfirmationState {
        if !self.options.confirmation.is_required() {
            ConfirmationState::NotRequired
        } else if self.confirmed {
            ConfirmationState::Confirmed
        } else {
            ConfirmationState::Required
        }
    }

    /// Effective options.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Current bootstrap data.
    pub fn data(&self) -> &BootstrapData {
        &self.data
    }

    /// App session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The platform.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// The platform, mutably.
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    // ==================== Transitions ====================

    fn reset_state(&mut self) {
        self.queue.clear();
        self.session.close();
        self.confirmed = false;
        self.attempts = 0;
    }

    fn deadline(&self, now: u64) -> u64 {
        now.saturating_add(self.options.timeout_connecting_ms())
    }

    fn enter_bootstrap(&mut self, status: StatusCode, message: Option<Cow<'static, str>>) {
        self.reset_state();
        self.status = status;
        self.error_message = message;

        let now = self.platform.now_ms();
        self.phase = Phase::ConnectingToBootstrap {
            retry_at: self.deadline(now),
        };
        info!(
            ssid = %self.options.bootstrap_ssid,
            status = ?status,
            message = self.error_message.as_deref().unwrap_or(""),
            "Connecting to bootstrap network"
        );
        self.platform.connect_to_wifi(
            self.options.bootstrap_ssid.as_bytes(),
            self.options.bootstrap_key.as_bytes(),
        );
    }

    fn enter_destination(&mut self) {
        self.reset_state();
        self.status = StatusCode::Ok;
        self.error_message = None;

        let now = self.platform.now_ms();
        self.phase = Phase::ConnectingToDestination {
            retry_at: self.deadline(now),
        };
        info!(
            ssid = %String::from_utf8_lossy(self.data.ssid().unwrap_or_default()),
            "Connecting to destination network"
        );
        self.platform.connect_to_wifi(
            self.data.ssid().unwrap_or_default(),
            self.data.password().unwrap_or_default(),
        );
    }

    fn fail(&mut self, failure: ConnectionFailure) {
        let message = self
            .error_message
            .take()
            .unwrap_or(Cow::Borrowed(failure.default_message()));
        warn!(?failure, message = %message, "Destination connection failed");
        self.enter_bootstrap(failure.status_code(), Some(message));
    }

    fn execute(&mut self, command: PendingCommand) {
        debug!(?command, "Executing deferred command");
        match command {
            PendingCommand::FactoryReset => {
                info!("Factory reset");
                let options = self.configured.clone();
                self.platform.persist_bootstrap_data(&[]);
                self.platform.persist_crypto_secret(&[]);
                self.setup(options, None, None);
            }
            PendingCommand::Bind => {
                self.status = StatusCode::Ok;
                self.platform.persist_crypto_secret(self.secret.as_bytes());
                self.platform.request_wifi_scan();
            }
            PendingCommand::WifiList => {
                self.platform.request_wifi_scan();
            }
            PendingCommand::SetWifi => {
                self.platform
                    .transmit(&packet::encode_announcement(StatusCode::BootstrapOk));
                self.platform.persist_bootstrap_data(self.data.as_blob());
                self.enter_destination();
            }
        }
    }

    fn step(&mut self, now: u64, link: ConnectionState) {
        match self.phase {
            Phase::Uninitialized => {}

            Phase::ConnectingToBootstrap { retry_at } => {
                if link.is_connected() {
                    info!("Joined bootstrap network");
                    self.phase = Phase::WaitingForData {
                        check_at: self.deadline(now),
                    };
                    self.platform.on_bootstrap_network_joined();
                    self.platform
                        .transmit(&packet::encode_announcement(StatusCode::Hello));
                    self.step(now, link);
                    return;
                }
                if now < retry_at {
                    return;
                }
                self.phase = Phase::ConnectingToBootstrap {
                    retry_at: self.deadline(now),
                };

                if self.data.is_bootstrapped() {
                    self.attempts += 1;
                    if self.attempts > u32::from(self.options.retry_bootstrap) {
                        info!(attempts = self.attempts, "Bootstrap network unreachable");
                        self.enter_destination();
                        return;
                    }
                }
                debug!(attempts = self.attempts, "Retrying bootstrap network");
                self.platform.connect_to_wifi(
                    self.options.bootstrap_ssid.as_bytes(),
                    self.options.bootstrap_key.as_bytes(),
                );
            }

            Phase::WaitingForData { check_at } => {
                if !link.is_connected() {
                    info!("Lost bootstrap network");
                    self.phase = Phase::ConnectingToBootstrap { retry_at: check_at };
                    return;
                }
                if now < check_at {
                    return;
                }
                self.phase = Phase::WaitingForData {
                    check_at: self.deadline(now),
                };

                // An idle app must not keep a provisioned device off its network.
                if self.data.is_bootstrapped() && !self.session.is_valid(now) {
                    info!("No app session, returning to destination network");
                    self.enter_destination();
                }
            }

            Phase::ConnectingToDestination { retry_at } => {
                if link.is_connected() {
                    info!("Joined destination network");
                    self.phase = Phase::DestinationConnected { advanced_at: now };
                    if self.options.need_advanced {
                        self.attempts = 0;
                        self.status = StatusCode::Ok;
                        self.error_message = None;
                    }
                    self.step(now, link);
                    return;
                }
                if now <= retry_at {
                    return;
                }
                self.phase = Phase::ConnectingToDestination {
                    retry_at: self.deadline(now),
                };

                self.attempts += 1;
                if self.attempts >= u32::from(self.options.retry_destination) {
                    // Reported from the last link state: a rejected key gives
                    // CredentialsWrong, not WifiNotFound.
                    self.fail(match link {
                        ConnectionState::FailedCredentialsWrong => {
                            ConnectionFailure::CredentialsWrong
                        }
                        ConnectionState::FailedAdvanced => ConnectionFailure::Advanced,
                        _ => ConnectionFailure::WifiNotFound,
                    });
                } else {
                    debug!(attempts = self.attempts, ?link, "Retrying destination network");
                    self.platform.connect_to_wifi(
                        self.data.ssid().unwrap_or_default(),
                        self.data.password().unwrap_or_default(),
                    );
                }
            }

            Phase::DestinationConnected { advanced_at } => match link {
                ConnectionState::FailedSsidNotFound => self.fail(ConnectionFailure::WifiNotFound),
                ConnectionState::FailedCredentialsWrong => {
                    self.fail(ConnectionFailure::CredentialsWrong)
                }
                ConnectionState::FailedAdvanced => self.fail(ConnectionFailure::Advanced),
                ConnectionState::Connected if self.options.need_advanced => {
                    if self.attempts > u32::from(self.options.retry_destination) {
                        self.fail(ConnectionFailure::Advanced);
                        return;
                    }
                    if now >= advanced_at {
                        self.attempts += 1;
                        self.phase = Phase::DestinationConnected {
                            advanced_at: self.deadline(now),
                        };
                        debug!(attempts = self.attempts, "Starting advanced connection");
                        self.platform
                            .connect_advanced(self.data.additional().unwrap_or_default());
                    }
                }
                ConnectionState::Connected | ConnectionState::ConnectedAdvanced => {
                    self.status = StatusCode::Ok;
                    self.error_message = None;
                }
                ConnectionState::Connecting | ConnectionState::NoConnection => {
                    info!(?link, "Lost destination network");
                    self.attempts = 0;
                    self.phase = Phase::ConnectingToDestination {
                        retry_at: self.deadline(now),
                    };
                }
            },
        }
    }
}

impl<P: Platform + std::fmt::Debug> std::fmt::Debug for Bootstrap<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootstrap")
            .field("platform", &self.platform)
            .field("phase", &self.phase)
            .field("status", &self.status)
            .field("data", &self.data)
            .field("session", &self.session)
            .field("attempts", &self.attempts)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}
