//! Host implementation of the engine's [`Platform`].
//!
//! Radio calls go to the [`SimulatedRadio`], persistence to the
//! [`CredentialStore`]. Datagrams and scan requests are queued as
//! [`PlatformEvent`]s for the service loop, so the engine never waits on
//! the socket.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bstwifi_core::{ConnectionState, Platform};
use ring::rand::{SecureRandom, SystemRandom};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::radio::SimulatedRadio;
use crate::store::CredentialStore;

/// Work the engine hands to the service loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    /// Broadcast this datagram
    Transmit(Vec<u8>),
    /// Run a scan and submit the results
    ScanRequested,
}

/// Millisecond clock of the device
#[derive(Debug, Clone)]
pub enum Clock {
    /// Wall time since start
    Monotonic(Instant),
    /// Advanced explicitly, shared between clones
    Manual(Arc<AtomicU64>),
}

impl Clock {
    pub fn monotonic() -> Self {
        Clock::Monotonic(Instant::now())
    }

    pub fn manual(start_ms: u64) -> Self {
        Clock::Manual(Arc::new(AtomicU64::new(start_ms)))
    }

    pub fn now_ms(&self) -> u64 {
        match self {
            Clock::Monotonic(start) => start.elapsed().as_millis() as u64,
            Clock::Manual(now) => now.load(Ordering::SeqCst),
        }
    }

    /// Move a manual clock forward. No effect on a monotonic clock.
    pub fn advance(&self, by: Duration) {
        if let Clock::Manual(now) = self {
            now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
        }
    }
}

/// Platform of the host device
#[derive(Debug)]
pub struct HostPlatform {
    radio: SimulatedRadio,
    store: CredentialStore,
    events: mpsc::UnboundedSender<PlatformEvent>,
    clock: Clock,
    rng: SystemRandom,
    fallback_counter: u64,
}

impl HostPlatform {
    pub fn new(
        radio: SimulatedRadio,
        store: CredentialStore,
        events: mpsc::UnboundedSender<PlatformEvent>,
        clock: Clock,
    ) -> Self {
        Self {
            radio,
            store,
            events,
            clock,
            rng: SystemRandom::new(),
            fallback_counter: 0,
        }
    }

    pub fn radio(&self) -> &SimulatedRadio {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut SimulatedRadio {
        &mut self.radio
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    fn emit(&self, event: PlatformEvent) {
        if self.events.send(event).is_err() {
            debug!("Service loop gone, dropping platform event");
        }
    }
}

impl Platform for HostPlatform {
    fn transmit(&mut self, datagram: &[u8]) {
        self.emit(PlatformEvent::Transmit(datagram.to_vec()));
    }

    fn connection_state(&self) -> ConnectionState {
        self.radio.state(self.clock.now_ms())
    }

    fn connect_to_wifi(&mut self, ssid: &[u8], key: &[u8]) {
        let now = self.clock.now_ms();
        self.radio.connect(ssid, key, now);
    }

    fn connect_advanced(&mut self, data: &[u8]) {
        let now = self.clock.now_ms();
        self.radio.connect_advanced(data, now);
    }

    fn on_bootstrap_network_joined(&mut self) {
        info!("Bootstrap network joined, announcing device");
    }

    fn request_wifi_scan(&mut self) {
        self.emit(PlatformEvent::ScanRequested);
    }

    fn persist_bootstrap_data(&mut self, blob: &[u8]) {
        if let Err(e) = self.store.save_data(blob) {
            error!(error = %e, "Failed to persist bootstrap data");
        }
    }

    fn persist_crypto_secret(&mut self, key: &[u8]) {
        if let Err(e) = self.store.save_secret(key) {
            error!(error = %e, "Failed to persist shared secret");
        }
    }

    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    fn random_u64(&mut self) -> u64 {
        let mut bytes = [0u8; 8];
        for _ in 0..3 {
            if self.rng.fill(&mut bytes).is_ok() {
                return u64::from_le_bytes(bytes);
            }
            warn!("OS randomness unavailable, retrying");
        }

        // Without OS randomness a nonce still must not repeat across calls.
        error!("OS randomness unavailable, deriving nonce from the clock");
        self.fallback_counter += 1;
        let digest = ring::digest::digest(
            &ring::digest::SHA256,
            &[
                self.clock.now_ms().to_le_bytes(),
                self.fallback_counter.to_le_bytes(),
            ]
            .concat(),
        );
        bytes.copy_from_slice(&digest.as_ref()[..8]);
        u64::from_le_bytes(bytes)
    }
}
