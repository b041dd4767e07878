//! App session and shared secret.
//!
//! A session binds the device to exactly one companion app. It is opened by
//! a HELLO carrying the app's nonce and stays valid for the configured nonce
//! timeout after the most recent HELLO. While valid, a HELLO with any other
//! app nonce is refused, so a second app cannot take over a running
//! provisioning.
//!
//! Every accepted HELLO draws a fresh device nonce. Once the session
//! expires both nonces are wiped.

use crate::cipher::secure_zero;
use crate::{BIND_KEY_MAX, NONCE_SIZE};

/// Session state.
#[derive(Debug, Default)]
pub struct Session {
    app_nonce: [u8; NONCE_SIZE],
    device_nonce: [u8; NONCE_SIZE],
    /// Absolute expiry in platform milliseconds, `None` without session.
    valid_until: Option<u64>,
}

impl Session {
    /// A session slot with nothing open.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session for `app_nonce`, or renew the running one.
    ///
    /// Returns false if a different app holds a valid session. On success
    /// the device nonce is replaced from `random_u64` and the validity is
    /// extended to `now + validity_ms`.
    pub fn open_or_renew(
        &mut self,
        app_nonce: &[u8; NONCE_SIZE],
        now: u64,
        validity_ms: u64,
        mut random_u64: impl FnMut() -> u64,
    ) -> bool {
        match self.valid_until {
            Some(until) if until > now => {
                if self.app_nonce != *app_nonce {
                    return false;
                }
            }
            _ => self.app_nonce = *app_nonce,
        }

        for chunk in self.device_nonce.chunks_mut(8) {
            let word = random_u64().to_le_bytes();
            chunk.copy_from_slice(&word[..chunk.len()]);
        }
        self.valid_until = Some(now.saturating_add(validity_ms));
        true
    }

    /// Whether a session is valid at `now`.
    ///
    /// An expired session is closed and its nonces are wiped.
    pub fn is_valid(&mut self, now: u64) -> bool {
        match self.valid_until {
            Some(until) if until >= now => true,
            _ => {
                self.close();
                false
            }
        }
    }

    /// Close the session and wipe both nonces.
    pub fn close(&mut self) {
        secure_zero(&mut self.app_nonce);
        secure_zero(&mut self.device_nonce);
        self.valid_until = None;
    }

    /// Nonce of the app owning the session (zero without session).
    pub fn app_nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.app_nonce
    }

    /// Current device nonce (zero without session).
    pub fn device_nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.device_nonce
    }

    /// Expiry timestamp of the running session.
    pub fn valid_until(&self) -> Option<u64> {
        self.valid_until
    }
}

/// The active shared secret, at most [`BIND_KEY_MAX`] bytes.
///
/// Memory is wiped on drop and on replacement.
#[derive(Clone)]
pub struct CryptoSecret {
    bytes: [u8; BIND_KEY_MAX],
    len: usize,
}

impl CryptoSecret {
    /// Create a secret, truncating to [`BIND_KEY_MAX`] bytes.
    pub fn new(key: &[u8]) -> Self {
        let mut secret = Self {
            bytes: [0; BIND_KEY_MAX],
            len: 0,
        };
        secret.set(key);
        secret
    }

    /// Replace the secret, truncating to [`BIND_KEY_MAX`] bytes.
    pub fn set(&mut self, key: &[u8]) {
        secure_zero(&mut self.bytes);
        let len = key.len().min(BIND_KEY_MAX);
        self.bytes[..len].copy_from_slice(&key[..len]);
        self.len = len;
    }

    /// Key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Key length.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no key is set.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for CryptoSecret {
    fn drop(&mut self) {
        secure_zero(&mut self.bytes);
    }
}

impl std::fmt::Debug for CryptoSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoSecret")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: [u8; NONCE_SIZE] = [1; NONCE_SIZE];
    const B: [u8; NONCE_SIZE] = [2; NONCE_SIZE];

    fn counter() -> impl FnMut() -> u64 {
        let mut n = 0u64;
        move || {
            n += 1;
            n
        }
    }

    #[test]
    fn opens_fresh_session() {
        let mut session = Session::new();
        assert!(!session.is_valid(0));

        assert!(session.open_or_renew(&A, 1000, 60_000, counter()));
        assert_eq!(session.app_nonce(), &A);
        assert_eq!(session.device_nonce(), &1u64.to_le_bytes());
        assert_eq!(session.valid_until(), Some(61_000));
        assert!(session.is_valid(61_000));
    }

    #[test]
    fn foreign_nonce_rejected_while_valid() {
        let mut session = Session::new();
        let mut rng = counter();
        assert!(session.open_or_renew(&A, 0, 60_000, &mut rng));
        let device_nonce = *session.device_nonce();

        assert!(!session.open_or_renew(&B, 30_000, 60_000, &mut rng));
        assert_eq!(session.app_nonce(), &A);
        assert_eq!(session.device_nonce(), &device_nonce);
        assert_eq!(session.valid_until(), Some(60_000));
    }

    #[test]
    fn same_nonce_renews_device_nonce() {
        let mut session = Session::new();
        let mut rng = counter();
        assert!(session.open_or_renew(&A, 0, 60_000, &mut rng));
        let first = *session.device_nonce();

        assert!(session.open_or_renew(&A, 30_000, 60_000, &mut rng));
        assert_ne!(session.device_nonce(), &first);
        assert_eq!(session.valid_until(), Some(90_000));
    }

    #[test]
    fn foreign_nonce_accepted_after_expiry() {
        let mut session = Session::new();
        let mut rng = counter();
        assert!(session.open_or_renew(&A, 0, 60_000, &mut rng));
        assert!(session.open_or_renew(&B, 60_000, 60_000, &mut rng));
        assert_eq!(session.app_nonce(), &B);
    }

    #[test]
    fn expiry_wipes_nonces() {
        let mut session = Session::new();
        assert!(session.open_or_renew(&A, 0, 100, counter()));
        assert!(session.is_valid(100));
        assert!(!session.is_valid(101));
        assert_eq!(session.app_nonce(), &[0; NONCE_SIZE]);
        assert_eq!(session.device_nonce(), &[0; NONCE_SIZE]);
        assert_eq!(session.valid_until(), None);
    }

    #[test]
    fn secret_truncates_and_replaces() {
        let mut secret = CryptoSecret::new(&[7u8; 40]);
        assert_eq!(secret.len(), BIND_KEY_MAX);

        secret.set(b"short");
        assert_eq!(secret.as_bytes(), b"short");
        assert!(!secret.is_empty());
        assert!(CryptoSecret::new(b"").is_empty());
    }

    #[test]
    fn secret_debug_hides_key() {
        let secret = CryptoSecret::new(b"hunter2");
        let dbg = format!("{secret:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("len: 7"));
    }
}
