//! bstwifi core - Wireless bootstrap protocol engine.
//!
//! This library brings a headless device onto a user's Wi-Fi network:
//! - Joins a well-known bootstrap access point
//! - Serves one companion app over UDP broadcast (HELLO, SET_DATA, BIND)
//! - Persists the delivered credentials and joins the destination network
//! - Falls back to the bootstrap network when the destination fails
//!
//! # Security Properties
//!
//! - Packets are Spritz-encrypted with a shared secret and per-direction nonces
//! - A CRC-16 over the plaintext rejects forged or mis-keyed packets
//! - Only one app session at a time; a second app is refused until it expires
//! - Status packets have a fixed size regardless of the wifi list
//! - Secrets and nonces are wiped from memory when replaced or dropped
//!
//! # Constraints
//!
//! This library intentionally does NOT:
//! - Access the network or the radio
//! - Perform file I/O
//! - Read a clock or OS randomness
//! - Block
//!
//! All of that is provided by a [`Platform`] implementation.
//!
//! # Example: Provisioning Round Trip
//!
//! ```
//! use bstwifi_core::client::{AppClient, DeviceMessage};
//! use bstwifi_core::{
//!     Bootstrap, ConnectionState, Encryption, Mode, Options, Platform, WifiListEntry,
//! };
//!
//! #[derive(Default)]
//! struct Board {
//!     link: ConnectionState,
//!     sent: Vec<Vec<u8>>,
//!     now: u64,
//!     seed: u64,
//! }
//!
//! impl Platform for Board {
//!     fn transmit(&mut self, datagram: &[u8]) { self.sent.push(datagram.to_vec()); }
//!     fn connection_state(&self) -> ConnectionState { self.link }
//!     fn connect_to_wifi(&mut self, _ssid: &[u8], _key: &[u8]) {}
//!     fn connect_advanced(&mut self, _data: &[u8]) {}
//!     fn request_wifi_scan(&mut self) {}
//!     fn persist_bootstrap_data(&mut self, _blob: &[u8]) {}
//!     fn persist_crypto_secret(&mut self, _key: &[u8]) {}
//!     fn now_ms(&self) -> u64 { self.now }
//!     fn random_u64(&mut self) -> u64 { self.seed += 1; self.seed }
//! }
//!
//! let options = Options {
//!     name: "Heating".into(),
//!     bootstrap_ssid: "AP".into(),
//!     initial_secret: b"s3cr3t".to_vec(),
//!     ..Options::default()
//! };
//!
//! // === DEVICE ===
//! let mut device = Bootstrap::new(Board::default());
//! device.setup(options, None, None);
//! assert_eq!(device.get_state(), Mode::ConnectingToBootstrap);
//!
//! device.platform_mut().link = ConnectionState::Connected;
//! device.periodic();
//! assert_eq!(device.get_state(), Mode::WaitingForData);
//!
//! // === APP ===
//! let mut app = AppClient::new(b"s3cr3t", [0x5a; 8]);
//! let mut hello = app.hello();
//! device.network_input(&mut hello).unwrap();
//!
//! // The next tick requests a scan; the platform answers with results.
//! device.periodic();
//! device.submit_wifi_scan_results(&[WifiListEntry::new("n1", 80, Encryption::Wpa)]);
//!
//! let reply = device.platform_mut().sent.pop().unwrap();
//! let DeviceMessage::Status(status) = app.receive(&reply).unwrap() else {
//!     panic!("expected status");
//! };
//! assert_eq!(status.networks[0].ssid, "n1");
//!
//! // Credentials go out encrypted with the device nonce from that reply.
//! let mut set_data = app.set_data("WLAN", "password", b"").unwrap();
//! device.network_input(&mut set_data).unwrap();
//! device.periodic();
//! assert_eq!(device.get_state(), Mode::ConnectingToDestination);
//! ```

pub mod cipher;
pub mod client;
pub mod crc;
pub mod error;
pub mod machine;
pub mod options;
pub mod packet;
pub mod platform;
pub mod queue;
pub mod session;
pub mod store;

#[cfg(test)]
mod testing;

pub use error::{ConnectionFailure, Error, ErrorKind, Result};
pub use machine::{Bootstrap, Mode};
pub use options::{ConfirmationMode, Options};
pub use packet::{
    CommandCode, ConfirmationState, Encryption, StatusCode, StatusPacket, WifiListEntry,
};
pub use platform::{ConnectionState, Platform};

/// Protocol magic at the start of every packet.
pub const MAGIC: [u8; 8] = *b"BSTwifi1";

/// Width of app and device nonces in bytes.
pub const NONCE_SIZE: usize = 8;

/// Width of the device identifier in bytes.
pub const UID_SIZE: usize = 6;

/// Longest shared secret in bytes.
pub const BIND_KEY_MAX: usize = 32;

/// Capacity of the bootstrap data buffer in bytes.
pub const STORAGE_SIZE: usize = 512;

/// Size of every status packet in bytes.
pub const PACKET_SIZE: usize = 512;

/// UDP port of the provisioning protocol.
pub const PORT: u16 = 8711;
