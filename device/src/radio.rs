//! Simulated wireless radio.
//!
//! The host has no access point to join, so the device runtime drives a
//! table of pretend networks instead. An attempt takes the association
//! delay, then resolves against the table:
//!
//! - unknown SSID: `FailedSsidNotFound`
//! - wrong passphrase on a protected network: `FailedCredentialsWrong`
//! - otherwise `Connected`
//!
//! Removing the network the radio is on drops the link.
//!
//! The table can be loaded from a JSON file:
//!
//! ```json
//! [
//!   { "ssid": "HomeWLAN", "passphrase": "hunter22", "strength": 82 },
//!   { "ssid": "Cafe", "encryption": "open" }
//! ]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use bstwifi_core::{ConnectionState, Encryption, WifiListEntry};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Encryption of a simulated network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionKind {
    Open,
    Wep,
    #[default]
    Wpa,
}

impl From<EncryptionKind> for Encryption {
    fn from(kind: EncryptionKind) -> Self {
        match kind {
            EncryptionKind::Open => Encryption::Open,
            EncryptionKind::Wep => Encryption::Wep,
            EncryptionKind::Wpa => Encryption::Wpa,
        }
    }
}

fn default_strength() -> u8 {
    70
}

/// A network the radio can see
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub ssid: String,

    #[serde(default)]
    pub passphrase: String,

    /// Signal strength in percent
    #[serde(default = "default_strength")]
    pub strength: u8,

    #[serde(default)]
    pub encryption: EncryptionKind,
}

impl NetworkSpec {
    /// A WPA network, or an open one when `passphrase` is empty.
    pub fn new(ssid: impl Into<String>, passphrase: impl Into<String>) -> Self {
        let passphrase = passphrase.into();
        let encryption = if passphrase.is_empty() {
            EncryptionKind::Open
        } else {
            EncryptionKind::Wpa
        };
        Self {
            ssid: ssid.into(),
            passphrase,
            strength: default_strength(),
            encryption,
        }
    }

    fn accepts(&self, key: &[u8]) -> bool {
        self.encryption == EncryptionKind::Open || self.passphrase.as_bytes() == key
    }
}

/// Read a network table from a JSON file
pub fn load_networks(path: &Path) -> Result<Vec<NetworkSpec>, RadioError> {
    let text = std::fs::read_to_string(path).map_err(|source| RadioError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| RadioError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Clone)]
struct Attempt {
    ssid: Vec<u8>,
    key: Vec<u8>,
    started_at: u64,
}

#[derive(Debug, Clone, Copy)]
struct AdvancedAttempt {
    succeeds: bool,
    started_at: u64,
}

/// Radio backed by a table of simulated networks
#[derive(Debug, Clone)]
pub struct SimulatedRadio {
    networks: Vec<NetworkSpec>,
    association_delay_ms: u64,
    attempt: Option<Attempt>,
    advanced: Option<AdvancedAttempt>,
}

impl SimulatedRadio {
    pub fn new(networks: Vec<NetworkSpec>, association_delay: Duration) -> Self {
        Self {
            networks,
            association_delay_ms: association_delay.as_millis() as u64,
            attempt: None,
            advanced: None,
        }
    }

    /// Add a network, replacing one with the same SSID
    pub fn add_network(&mut self, network: NetworkSpec) {
        info!(ssid = %network.ssid, "Network appeared");
        self.networks.retain(|n| n.ssid != network.ssid);
        self.networks.push(network);
    }

    /// Remove a network. Drops the link if the radio was on it.
    pub fn remove_network(&mut self, ssid: &str) -> bool {
        let before = self.networks.len();
        self.networks.retain(|n| n.ssid != ssid);
        let removed = self.networks.len() != before;
        if removed {
            info!(ssid, "Network disappeared");
            if self
                .attempt
                .as_ref()
                .is_some_and(|a| a.ssid == ssid.as_bytes())
            {
                self.attempt = None;
                self.advanced = None;
            }
        }
        removed
    }

    /// Networks currently visible
    pub fn networks(&self) -> &[NetworkSpec] {
        &self.networks
    }

    /// Start joining a network
    pub fn connect(&mut self, ssid: &[u8], key: &[u8], now_ms: u64) {
        debug!(ssid = %String::from_utf8_lossy(ssid), "Radio associating");
        self.attempt = Some(Attempt {
            ssid: ssid.to_vec(),
            key: key.to_vec(),
            started_at: now_ms,
        });
        self.advanced = None;
    }

    /// Start the secondary connection. It succeeds when `data` is non-empty.
    pub fn connect_advanced(&mut self, data: &[u8], now_ms: u64) {
        debug!(size = data.len(), "Radio starting advanced connection");
        self.advanced = Some(AdvancedAttempt {
            succeeds: !data.is_empty(),
            started_at: now_ms,
        });
    }

    /// Link state at `now_ms`
    pub fn state(&self, now_ms: u64) -> ConnectionState {
        let Some(attempt) = &self.attempt else {
            return ConnectionState::NoConnection;
        };
        if now_ms < attempt.started_at.saturating_add(self.association_delay_ms) {
            return ConnectionState::Connecting;
        }

        let Some(network) = self
            .networks
            .iter()
            .find(|n| n.ssid.as_bytes() == attempt.ssid)
        else {
            return ConnectionState::FailedSsidNotFound;
        };
        if !network.accepts(&attempt.key) {
            return ConnectionState::FailedCredentialsWrong;
        }

        match self.advanced {
            Some(adv) if now_ms >= adv.started_at.saturating_add(self.association_delay_ms) => {
                if adv.succeeds {
                    ConnectionState::ConnectedAdvanced
                } else {
                    ConnectionState::FailedAdvanced
                }
            }
            _ => ConnectionState::Connected,
        }
    }

    /// Scan results for the visible networks
    pub fn scan(&self) -> Vec<WifiListEntry> {
        self.networks
            .iter()
            .map(|n| WifiListEntry::new(n.ssid.clone(), n.strength, n.encryption.into()))
            .collect()
    }
}

/// Radio setup errors
#[derive(Debug, thiserror::Error)]
pub enum RadioError {
    #[error("cannot read network table {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid network table {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
