//! In-memory bootstrap data.
//!
//! The companion app delivers up to three NUL separated fields:
//!
//! ```text
//! ssid \0 password \0 additional \0
//! ```
//!
//! They are copied into a fixed buffer of [`STORAGE_SIZE`] bytes. The last
//! three bytes are always zero so that three empty fields still parse.
//! Empty fields read as `None`.

use std::ops::Range;

use crate::cipher::secure_zero;
use crate::STORAGE_SIZE;

/// Largest blob kept, the rest of the buffer holds terminators.
pub const MAX_BLOB_SIZE: usize = STORAGE_SIZE - 3;

/// Parsed bootstrap data.
pub struct BootstrapData {
    storage: [u8; STORAGE_SIZE],
    len: usize,
    ssid: Option<Range<usize>>,
    password: Option<Range<usize>>,
    additional: Option<Range<usize>>,
}

impl Default for BootstrapData {
    fn default() -> Self {
        Self {
            storage: [0; STORAGE_SIZE],
            len: 0,
            ssid: None,
            password: None,
            additional: None,
        }
    }
}

impl BootstrapData {
    /// Empty data: not bootstrapped.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `blob`, replacing all previous content.
    ///
    /// Input beyond [`MAX_BLOB_SIZE`] is dropped. Applying the result of
    /// [`as_blob`](Self::as_blob) again yields the same fields.
    pub fn assign(&mut self, blob: &[u8]) {
        let len = blob.len().min(MAX_BLOB_SIZE);
        secure_zero(&mut self.storage);
        self.storage[..len].copy_from_slice(&blob[..len]);

        let mut fields = [None, None, None];
        let mut pos = 0;
        for field in fields.iter_mut() {
            let end = pos
                + self.storage[pos..]
                    .iter()
                    .position(|&b| b == 0)
                    .unwrap_or(STORAGE_SIZE - pos);
            if end > pos {
                *field = Some(pos..end);
            }
            pos = end + 1;
        }

        let [ssid, password, additional] = fields;
        self.ssid = ssid;
        self.password = password;
        self.additional = additional;
        self.len = len.min(pos);
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.assign(&[]);
    }

    fn field(&self, range: &Option<Range<usize>>) -> Option<&[u8]> {
        range.as_ref().map(|r| &self.storage[r.clone()])
    }

    /// Destination network name.
    pub fn ssid(&self) -> Option<&[u8]> {
        self.field(&self.ssid)
    }

    /// Destination network passphrase.
    pub fn password(&self) -> Option<&[u8]> {
        self.field(&self.password)
    }

    /// Data for the advanced connection.
    pub fn additional(&self) -> Option<&[u8]> {
        self.field(&self.additional)
    }

    /// Whether destination credentials are known.
    pub fn is_bootstrapped(&self) -> bool {
        self.ssid.is_some()
    }

    /// Blob to persist.
    pub fn as_blob(&self) -> &[u8] {
        &self.storage[..self.len]
    }
}

impl Drop for BootstrapData {
    fn drop(&mut self) {
        secure_zero(&mut self.storage);
    }
}

impl std::fmt::Debug for BootstrapData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapData")
            .field("ssid", &self.ssid().map(String::from_utf8_lossy))
            .field("has_password", &self.password.is_some())
            .field("has_additional", &self.additional.is_some())
            .finish()
    }
}
