//! Error types for bstwifi-core.
//!
//! Every error here describes a dropped datagram or an ignored call. None of
//! them is fatal: the engine always resolves to a known mode within one
//! `periodic()` tick.
//!
//! # Error Categories
//!
//! - **Protocol errors**: `PacketTooShort`, `PacketTooLong`, `BadMagic`, `CrcMismatch`,
//!   `UnknownCommand`, `UnknownStatus`, `MalformedPayload`, `InvalidBindKey`
//! - **Session errors**: `NoSession`, `SessionInUse`, `NotAcceptingInput`
//! - **Configuration errors**: `MissingSsid`, `ConfirmationRequired`, `AlreadyPending`
//!
//! Connection failures are not errors of an operation. They are reported to
//! the companion app through the status code and log text, see
//! [`ConnectionFailure`].

use crate::machine::Mode;
use crate::packet::StatusCode;
use thiserror::Error;

/// Result type alias for bstwifi-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a datagram or call was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    // ==================== Protocol Errors ====================
    /// Datagram is shorter than the layout of its command requires.
    #[error("packet too short: {size} bytes, minimum {minimum}")]
    PacketTooShort {
        /// Actual datagram size.
        size: usize,
        /// Minimum size for this packet type.
        minimum: usize,
    },

    /// Datagram is longer than the largest valid packet.
    #[error("packet too long: {size} bytes, maximum {maximum}")]
    PacketTooLong {
        /// Actual datagram size.
        size: usize,
        /// Maximum accepted size.
        maximum: usize,
    },

    /// The datagram does not start with the protocol magic.
    #[error("bad packet magic")]
    BadMagic,

    /// CRC over the (decrypted) payload does not match the header.
    ///
    /// Also the symptom of a wrong key or a stale device nonce.
    #[error("CRC mismatch: expected {expected:#06x}, got {actual:#06x}")]
    CrcMismatch {
        /// CRC carried in the packet header.
        expected: u16,
        /// CRC computed over the payload.
        actual: u16,
    },

    /// Command or status byte is not one we know.
    #[error("unknown command code {code}")]
    UnknownCommand {
        /// The offending code.
        code: u8,
    },

    /// Status byte of a device packet is not one we know.
    #[error("unknown status code {code}")]
    UnknownStatus {
        /// The offending code.
        code: u8,
    },

    /// Wifi list or log region of a status packet is inconsistent.
    #[error("malformed status payload")]
    MalformedPayload,

    /// BIND carried an empty or oversized key.
    #[error("invalid bind key length {len} (maximum {max})")]
    InvalidBindKey {
        /// Announced key length.
        len: usize,
        /// Largest accepted key.
        max: usize,
    },

    // ==================== Session Errors ====================
    /// BIND or SET_DATA arrived without a valid session.
    #[error("no valid app session")]
    NoSession,

    /// HELLO from a different app while another session is still valid.
    #[error("another app session is active")]
    SessionInUse,

    /// Input arrived while the engine is not waiting for provisioning data.
    #[error("not accepting input in mode {mode:?}")]
    NotAcceptingInput {
        /// Mode at the time the datagram arrived.
        mode: Mode,
    },

    // ==================== Configuration Errors ====================
    /// Bootstrap data without a destination SSID.
    #[error("bootstrap data has no SSID")]
    MissingSsid,

    /// SET_DATA before the external confirmation was granted.
    #[error("external confirmation required")]
    ConfirmationRequired,

    /// The same command is already waiting for the next tick.
    #[error("command already pending")]
    AlreadyPending,
}

/// Coarse classification of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or undecryptable datagram.
    Protocol,
    /// Missing, foreign or expired session.
    Session,
    /// Valid datagram whose content cannot be applied right now.
    Configuration,
}

impl Error {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::PacketTooShort { .. }
            | Error::PacketTooLong { .. }
            | Error::BadMagic
            | Error::CrcMismatch { .. }
            | Error::UnknownCommand { .. }
            | Error::UnknownStatus { .. }
            | Error::MalformedPayload
            | Error::InvalidBindKey { .. } => ErrorKind::Protocol,
            Error::NoSession | Error::SessionInUse | Error::NotAcceptingInput { .. } => {
                ErrorKind::Session
            }
            Error::MissingSsid | Error::ConfirmationRequired | Error::AlreadyPending => {
                ErrorKind::Configuration
            }
        }
    }
}

/// Why the device gave up on the destination network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionFailure {
    /// Network not found or retries exhausted.
    WifiNotFound,
    /// Access point rejected the credentials.
    CredentialsWrong,
    /// The secondary connection could not be established.
    Advanced,
}

impl ConnectionFailure {
    /// Status code reported to the companion app.
    pub fn status_code(self) -> StatusCode {
        match self {
            ConnectionFailure::WifiNotFound => StatusCode::WifiNotFound,
            ConnectionFailure::CredentialsWrong => StatusCode::CredentialsWrong,
            ConnectionFailure::Advanced => StatusCode::Advanced,
        }
    }

    /// Log text used when no custom error message was set.
    pub fn default_message(self) -> &'static str {
        match self {
            ConnectionFailure::WifiNotFound => "WiFi not found",
            ConnectionFailure::CredentialsWrong => "WiFi Credentials wrong",
            ConnectionFailure::Advanced => "Failed to connect to advanced",
        }
    }
}
