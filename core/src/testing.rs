//! Recording platform for engine tests.

use crate::options::Options;
use crate::platform::{ConnectionState, Platform};

/// Options shared by the engine tests.
pub(crate) fn test_options() -> Options {
    Options {
        name: "Heating".into(),
        unique_id: [1, 2, 3, 4, 5, 6],
        initial_secret: b"s3cr3t".to_vec(),
        bootstrap_ssid: "AP".into(),
        bootstrap_key: "apkey".into(),
        ..Options::default()
    }
}

/// Platform double: a settable clock and link, recording every call.
#[derive(Debug, Default)]
pub(crate) struct MockPlatform {
    pub now: u64,
    pub link: ConnectionState,
    pub sent: Vec<Vec<u8>>,
    pub connects: Vec<(Vec<u8>, Vec<u8>)>,
    pub advanced: Vec<Vec<u8>>,
    pub scans: usize,
    pub joined: usize,
    pub stored_data: Option<Vec<u8>>,
    pub stored_key: Option<Vec<u8>>,
    rng: u64,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            now: 1_000,
            ..Self::default()
        }
    }
}

impl Platform for MockPlatform {
    fn transmit(&mut self, datagram: &[u8]) {
        self.sent.push(datagram.to_vec());
    }

    fn connection_state(&self) -> ConnectionState {
        self.link
    }

    fn connect_to_wifi(&mut self, ssid: &[u8], key: &[u8]) {
        self.connects.push((ssid.to_vec(), key.to_vec()));
    }

    fn connect_advanced(&mut self, data: &[u8]) {
        self.advanced.push(data.to_vec());
    }

    fn on_bootstrap_network_joined(&mut self) {
        self.joined += 1;
    }

    fn request_wifi_scan(&mut self) {
        self.scans += 1;
    }

    fn persist_bootstrap_data(&mut self, blob: &[u8]) {
        self.stored_data = Some(blob.to_vec());
    }

    fn persist_crypto_secret(&mut self, key: &[u8]) {
        self.stored_key = Some(key.to_vec());
    }

    fn now_ms(&self) -> u64 {
        self.now
    }

    fn random_u64(&mut self) -> u64 {
        // splitmix64
        self.rng = self.rng.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.rng;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}
