//! Companion app side of the protocol.
//!
//! [`AppClient`] builds the datagrams an app sends and decodes what the
//! device broadcasts. It tracks the device nonce from the most recent
//! status packet, which every encrypted command needs.
//!
//! ```
//! use bstwifi_core::client::AppClient;
//!
//! let client = AppClient::new(b"app_secret", [7; 8]);
//! let hello = client.hello();
//! assert_eq!(&hello[..8], b"BSTwifi1");
//!
//! // No status packet received yet, so no device nonce to encrypt with.
//! assert!(client.set_data("WLAN", "password", b"").is_err());
//! ```

use crate::error::{Error, Result};
use crate::packet::{
    self, StatusCode, StatusPacket, ANNOUNCEMENT_SIZE, BIND_SIZE, HELLO_SIZE, SET_DATA_SIZE,
};
use crate::session::CryptoSecret;
use crate::NONCE_SIZE;

/// A datagram received from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceMessage {
    /// Clear announcement (`Hello` or `BootstrapOk`).
    Announcement(StatusCode),
    /// Encrypted status packet.
    Status(StatusPacket),
}

/// Protocol state of one companion app.
#[derive(Debug)]
pub struct AppClient {
    app_nonce: [u8; NONCE_SIZE],
    secret: CryptoSecret,
    device_nonce: Option<[u8; NONCE_SIZE]>,
}

impl AppClient {
    /// Create a client with the shared secret and a fresh app nonce.
    pub fn new(secret: &[u8], app_nonce: [u8; NONCE_SIZE]) -> Self {
        Self {
            app_nonce,
            secret: CryptoSecret::new(secret),
            device_nonce: None,
        }
    }

    /// Nonce identifying this app's session.
    pub fn app_nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.app_nonce
    }

    /// Device nonce from the last status packet.
    pub fn device_nonce(&self) -> Option<&[u8; NONCE_SIZE]> {
        self.device_nonce.as_ref()
    }

    /// Secret currently in use.
    pub fn secret(&self) -> &[u8] {
        self.secret.as_bytes()
    }

    /// HELLO datagram opening or renewing the session.
    pub fn hello(&self) -> [u8; HELLO_SIZE] {
        packet::encode_hello(&self.app_nonce)
    }

    /// SET_DATA datagram carrying destination credentials.
    pub fn set_data(
        &self,
        ssid: &str,
        password: &str,
        additional: &[u8],
    ) -> Result<[u8; SET_DATA_SIZE]> {
        if ssid.is_empty() {
            return Err(Error::MissingSsid);
        }
        let device_nonce = self.device_nonce.as_ref().ok_or(Error::NoSession)?;

        let mut blob = Vec::with_capacity(ssid.len() + password.len() + additional.len() + 3);
        for field in [ssid.as_bytes(), password.as_bytes(), additional] {
            blob.extend_from_slice(field);
            blob.push(0);
        }
        packet::encode_set_data(&blob, self.secret.as_bytes(), device_nonce)
    }

    /// BIND datagram. The client switches to `key` afterwards, as the
    /// device does once it accepts the command.
    pub fn bind(&mut self, key: &[u8]) -> Result<[u8; BIND_SIZE]> {
        let device_nonce = self.device_nonce.as_ref().ok_or(Error::NoSession)?;
        let datagram = packet::encode_bind(key, self.secret.as_bytes(), device_nonce)?;
        self.secret.set(key);
        Ok(datagram)
    }

    /// Decode a datagram from the device.
    ///
    /// A status packet updates the device nonce used for the next command.
    pub fn receive(&mut self, datagram: &[u8]) -> Result<DeviceMessage> {
        if datagram.len() == ANNOUNCEMENT_SIZE {
            return packet::decode_announcement(datagram).map(DeviceMessage::Announcement);
        }
        let status = packet::decode_status(datagram, self.secret.as_bytes(), &self.app_nonce)?;
        self.device_nonce = Some(status.device_nonce);
        Ok(DeviceMessage::Status(status))
    }
}
