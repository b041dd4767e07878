//! Per-boot engine options.
//!
//! Options are supplied once to `Bootstrap::setup` and never change until the
//! next setup. The only exception is the confirmation mode, which drops from
//! [`ConfirmationMode::RequiredFirstStart`] to `NotRequired` once the device
//! has been provisioned.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::UID_SIZE;

/// Default timeout for a single connection attempt.
pub const DEFAULT_TIMEOUT_CONNECTING: Duration = Duration::from_secs(10);

/// Default validity of an app session.
pub const DEFAULT_TIMEOUT_NONCE: Duration = Duration::from_secs(60);

/// Default number of attempts for both retry counters.
pub const DEFAULT_RETRIES: u8 = 7;

/// When the device needs a human to approve new credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfirmationMode {
    /// Credentials are applied as soon as they arrive.
    #[default]
    NotRequired,
    /// Confirmation is needed until the device has been provisioned once.
    RequiredFirstStart,
    /// Every provisioning needs confirmation.
    AlwaysRequired,
}

impl ConfirmationMode {
    /// Whether SET_DATA must wait for `confirm_bootstrap`.
    pub fn is_required(self) -> bool {
        self != ConfirmationMode::NotRequired
    }
}

/// Unrecognised confirmation mode string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown confirmation mode '{0}' (expected not_required, first_start or always)")]
pub struct ParseConfirmationModeError(String);

impl FromStr for ConfirmationMode {
    type Err = ParseConfirmationModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "not_required" | "none" => Ok(ConfirmationMode::NotRequired),
            "first_start" | "required_first_start" => Ok(ConfirmationMode::RequiredFirstStart),
            "always" | "always_required" => Ok(ConfirmationMode::AlwaysRequired),
            _ => Err(ParseConfirmationModeError(s.to_string())),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Human readable device name, sent in the log field when error free.
    pub name: String,
    /// Device identifier included in every status packet.
    pub unique_id: [u8; UID_SIZE],
    /// Factory shared secret, used until an app binds a new key.
    pub initial_secret: Vec<u8>,
    /// SSID of the bootstrap access point.
    pub bootstrap_ssid: String,
    /// Passphrase of the bootstrap access point.
    pub bootstrap_key: String,
    /// Time budget of one connection attempt.
    pub timeout_connecting: Duration,
    /// Validity of an app session after its last HELLO.
    pub timeout_nonce: Duration,
    /// Whether a secondary connection is needed after joining the network.
    pub need_advanced: bool,
    /// External confirmation policy.
    pub confirmation: ConfirmationMode,
    /// Bootstrap attempts before falling back to known credentials.
    pub retry_bootstrap: u8,
    /// Destination attempts before falling back to bootstrap mode.
    pub retry_destination: u8,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            name: String::new(),
            unique_id: [0; UID_SIZE],
            initial_secret: Vec::new(),
            bootstrap_ssid: String::new(),
            bootstrap_key: String::new(),
            timeout_connecting: DEFAULT_TIMEOUT_CONNECTING,
            timeout_nonce: DEFAULT_TIMEOUT_NONCE,
            need_advanced: false,
            confirmation: ConfirmationMode::NotRequired,
            retry_bootstrap: DEFAULT_RETRIES,
            retry_destination: DEFAULT_RETRIES,
        }
    }
}

impl Options {
    /// Connection timeout in milliseconds, saturating.
    pub(crate) fn timeout_connecting_ms(&self) -> u64 {
        u64::try_from(self.timeout_connecting.as_millis()).unwrap_or(u64::MAX)
    }

    /// Session validity in milliseconds, saturating.
    pub(crate) fn timeout_nonce_ms(&self) -> u64 {
        u64::try_from(self.timeout_nonce.as_millis()).unwrap_or(u64::MAX)
    }

    /// Bootstrap SSID and initial secret are both present.
    pub(crate) fn is_usable(&self) -> bool {
        !self.bootstrap_ssid.is_empty() && !self.initial_secret.is_empty()
    }
}
