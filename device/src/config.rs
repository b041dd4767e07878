//! Configuration for the bstwifi host device.
//!
//! All configuration is loaded from environment variables (optionally via a
//! `.env` file). Invalid values fall back to the defaults.
//! The shared secret is never logged.

use bstwifi_core::{ConfirmationMode, Options, UID_SIZE};
use std::path::PathBuf;
use std::time::Duration;

/// Default device identifier (locally administered MAC range).
pub const DEFAULT_DEVICE_UID: [u8; UID_SIZE] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];

/// Device runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Socket bind address
    pub bind_addr: String,

    /// Provisioning port
    pub port: u16,

    /// Destination address of outgoing broadcasts
    pub broadcast_addr: String,

    /// Directory holding the persisted bootstrap data and key
    pub state_dir: PathBuf,

    /// JSON file describing the simulated nearby networks
    pub networks_file: Option<PathBuf>,

    /// Interval between engine ticks (default: 100ms)
    pub tick_interval: Duration,

    /// Time the simulated radio takes to associate (default: 1.5s)
    pub association_delay: Duration,

    // === Engine options ===
    /// Human readable device name
    pub device_name: String,

    /// Device identifier, 6 bytes
    pub device_uid: [u8; UID_SIZE],

    /// Factory shared secret
    pub initial_secret: String,

    /// Bootstrap access point SSID
    pub bootstrap_ssid: String,

    /// Bootstrap access point passphrase
    pub bootstrap_key: String,

    /// Time budget of one connection attempt (default: 10s)
    pub timeout_connecting: Duration,

    /// App session validity (default: 60s)
    pub timeout_nonce: Duration,

    /// Require the secondary connection after joining the network
    pub need_advanced: bool,

    /// External confirmation policy
    pub confirmation: ConfirmationMode,

    /// Bootstrap attempts before falling back to stored credentials
    pub retry_bootstrap: u8,

    /// Destination attempts before falling back to bootstrap mode
    pub retry_destination: u8,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let millis = |key: &str, default: u64| {
            Duration::from_millis(
                lookup(key)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(default),
            )
        };
        let flag = |key: &str| {
            lookup(key)
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false)
        };

        Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(bstwifi_core::PORT),
            broadcast_addr: lookup("BROADCAST_ADDR")
                .unwrap_or_else(|| "255.255.255.255".to_string()),
            state_dir: lookup("STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./bst-state")),
            networks_file: lookup("NETWORKS_FILE").map(PathBuf::from),
            tick_interval: millis("TICK_INTERVAL_MS", 100),
            association_delay: millis("ASSOCIATION_DELAY_MS", 1500),

            device_name: lookup("DEVICE_NAME").unwrap_or_else(|| "bstwifi-device".to_string()),
            device_uid: lookup("DEVICE_UID")
                .and_then(|s| parse_uid(&s))
                .unwrap_or(DEFAULT_DEVICE_UID),
            initial_secret: lookup("INITIAL_SECRET").unwrap_or_else(|| "app_secret".to_string()),
            bootstrap_ssid: lookup("BOOTSTRAP_SSID")
                .unwrap_or_else(|| "Bootstrap_BST_v1".to_string()),
            bootstrap_key: lookup("BOOTSTRAP_KEY").unwrap_or_else(|| "bootstrap_key".to_string()),
            timeout_connecting: millis("TIMEOUT_CONNECTING_MS", 10_000),
            timeout_nonce: millis("TIMEOUT_NONCE_MS", 60_000),
            need_advanced: flag("NEED_ADVANCED"),
            confirmation: lookup("CONFIRMATION_MODE")
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            retry_bootstrap: lookup("RETRY_BOOTSTRAP")
                .and_then(|s| s.parse().ok())
                .unwrap_or(7),
            retry_destination: lookup("RETRY_DESTINATION")
                .and_then(|s| s.parse().ok())
                .unwrap_or(7),
        }
    }

    /// Engine options derived from this configuration
    pub fn options(&self) -> Options {
        Options {
            name: self.device_name.clone(),
            unique_id: self.device_uid,
            initial_secret: self.initial_secret.as_bytes().to_vec(),
            bootstrap_ssid: self.bootstrap_ssid.clone(),
            bootstrap_key: self.bootstrap_key.clone(),
            timeout_connecting: self.timeout_connecting,
            timeout_nonce: self.timeout_nonce,
            need_advanced: self.need_advanced,
            confirmation: self.confirmation,
            retry_bootstrap: self.retry_bootstrap,
            retry_destination: self.retry_destination,
        }
    }

    /// Device identifier as lowercase hex
    pub fn device_uid_hex(&self) -> String {
        hex::encode(self.device_uid)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Parse a 6-byte identifier written as hex, with or without `:` separators.
fn parse_uid(s: &str) -> Option<[u8; UID_SIZE]> {
    let digits: String = s.chars().filter(|c| *c != ':' && *c != '-').collect();
    hex::decode(digits).ok()?.try_into().ok()
}
