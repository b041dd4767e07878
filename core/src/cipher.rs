//! Spritz stream cipher for packet confidentiality.
//!
//! Spritz is the RC4 redesign by Rivest and Schuldt. Packets are
//! transformed in place: the key is absorbed, then a stop marker, then the
//! nonce, and each byte is combined with one `drip` of the keystream.
//! Encryption adds the keystream byte (mod 256), decryption subtracts it.
//!
//! # Nonce direction
//!
//! - app -> device traffic is keyed with the **device** nonce
//! - device -> app traffic is keyed with the **app** nonce
//!
//! Using different nonces per direction means a captured device packet
//! cannot be reflected back to the device.
//!
//! There is no authentication in the cipher itself; integrity comes from
//! the CRC computed over the plaintext (see `packet`).

/// Size of the Spritz permutation.
const N: usize = 256;

/// Securely zero memory, preventing compiler optimization.
#[inline(never)]
pub(crate) fn secure_zero(data: &mut [u8]) {
    for byte in data.iter_mut() {
        // SAFETY: We're writing to valid, aligned memory that we own
        unsafe {
            std::ptr::write_volatile(byte, 0);
        }
    }
    std::sync::atomic::compiler_fence(std::sync::atomic::Ordering::SeqCst);
}

/// Spritz sponge state.
struct Spritz {
    s: [u8; N],
    a: u8,
    i: u8,
    j: u8,
    k: u8,
    w: u8,
    z: u8,
}

impl Spritz {
    fn new() -> Self {
        let mut s = [0u8; N];
        for (v, slot) in s.iter_mut().enumerate() {
            *slot = v as u8;
        }
        Self {
            s,
            a: 0,
            i: 0,
            j: 0,
            k: 0,
            w: 1,
            z: 0,
        }
    }

    /// Key setup followed by the nonce, as used for packet encryption.
    fn with_key_and_nonce(key: &[u8], nonce: &[u8]) -> Self {
        let mut state = Self::new();
        state.absorb(key);
        state.absorb_stop();
        state.absorb(nonce);
        state
    }

    fn update(&mut self) {
        self.i = self.i.wrapping_add(self.w);
        let y = self.j.wrapping_add(self.s[self.i as usize]);
        self.j = self.k.wrapping_add(self.s[y as usize]);
        self.k = self
            .i
            .wrapping_add(self.k)
            .wrapping_add(self.s[self.j as usize]);
        self.s.swap(self.i as usize, self.j as usize);
    }

    fn output(&mut self) -> u8 {
        let y1 = self.z.wrapping_add(self.k);
        let x1 = self.i.wrapping_add(self.s[y1 as usize]);
        let y2 = self.j.wrapping_add(self.s[x1 as usize]);
        self.z = self.s[y2 as usize];
        self.z
    }

    fn crush(&mut self) {
        for v in 0..N / 2 {
            let y = N - 1 - v;
            if self.s[v] > self.s[y] {
                self.s.swap(v, y);
            }
        }
    }

    fn whip(&mut self) {
        for _ in 0..N * 2 {
            self.update();
        }
        self.w = self.w.wrapping_add(2);
    }

    fn shuffle(&mut self) {
        self.whip();
        self.crush();
        self.whip();
        self.crush();
        self.whip();
        self.a = 0;
    }

    fn absorb_stop(&mut self) {
        if self.a as usize == N / 2 {
            self.shuffle();
        }
        self.a += 1;
    }

    fn absorb_nibble(&mut self, x: u8) {
        if self.a as usize == N / 2 {
            self.shuffle();
        }
        self.s.swap(self.a as usize, N / 2 + x as usize);
        self.a += 1;
    }

    fn absorb(&mut self, data: &[u8]) {
        for &byte in data {
            self.absorb_nibble(byte & 0x0F);
            self.absorb_nibble(byte >> 4);
        }
    }

    fn drip(&mut self) -> u8 {
        if self.a > 0 {
            self.shuffle();
        }
        self.update();
        self.output()
    }
}

impl Drop for Spritz {
    fn drop(&mut self) {
        secure_zero(&mut self.s);
        self.i = 0;
        self.j = 0;
        self.k = 0;
        self.z = 0;
    }
}

/// Encrypt `buf` in place with the given nonce and key.
pub fn encrypt_in_place(buf: &mut [u8], nonce: &[u8], key: &[u8]) {
    let mut state = Spritz::with_key_and_nonce(key, nonce);
    for byte in buf.iter_mut() {
        *byte = byte.wrapping_add(state.drip());
    }
}

/// Decrypt `buf` in place with the given nonce and key.
pub fn decrypt_in_place(buf: &mut [u8], nonce: &[u8], key: &[u8]) {
    let mut state = Spritz::with_key_and_nonce(key, nonce);
    for byte in buf.iter_mut() {
        *byte = byte.wrapping_sub(state.drip());
    }
}
