//! Capabilities the engine needs from its environment.
//!
//! The engine never touches a radio, a socket, a clock or a disk itself.
//! Everything goes through [`Platform`], implemented once per target (the
//! host runtime in `bstwifi-device`, firmware glue, or a test double).
//!
//! All calls are made from the thread that drives `Bootstrap::periodic`
//! and must not block. Connection attempts and scans are asynchronous:
//! the engine polls [`Platform::connection_state`] and expects scan results
//! through `Bootstrap::submit_wifi_scan_results`.

/// Link state reported by the wireless stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Idle.
    #[default]
    NoConnection,
    /// Last attempt failed, the network was not found.
    FailedSsidNotFound,
    /// Last attempt failed, the access point rejected the key.
    FailedCredentialsWrong,
    /// The secondary connection failed.
    FailedAdvanced,
    /// Associated with a network.
    Connected,
    /// Associated and the secondary connection is up.
    ConnectedAdvanced,
    /// Association in progress.
    Connecting,
}

impl ConnectionState {
    /// `Connected` or `ConnectedAdvanced`.
    pub fn is_connected(self) -> bool {
        matches!(
            self,
            ConnectionState::Connected | ConnectionState::ConnectedAdvanced
        )
    }
}

/// Environment of a [`Bootstrap`](crate::Bootstrap) engine.
pub trait Platform {
    /// Broadcast a datagram on the provisioning port.
    fn transmit(&mut self, datagram: &[u8]);

    /// Current link state.
    fn connection_state(&self) -> ConnectionState;

    /// Start joining `ssid`. An empty `key` means an open network.
    fn connect_to_wifi(&mut self, ssid: &[u8], key: &[u8]);

    /// Start the secondary connection with the stored additional data.
    fn connect_advanced(&mut self, data: &[u8]);

    /// The bootstrap access point has been joined.
    fn on_bootstrap_network_joined(&mut self) {}

    /// Start a scan; results go to `Bootstrap::submit_wifi_scan_results`.
    fn request_wifi_scan(&mut self);

    /// Persist bootstrap data. An empty blob erases it.
    fn persist_bootstrap_data(&mut self, blob: &[u8]);

    /// Persist the shared secret. An empty key erases it.
    fn persist_crypto_secret(&mut self, key: &[u8]);

    /// Monotonic milliseconds.
    fn now_ms(&self) -> u64;

    /// Cryptographically secure random value.
    fn random_u64(&mut self) -> u64;
}
