//! CRC-16 computation for packet integrity.
//!
//! CRC-16/CCITT-FALSE: poly 0x1021, init 0xFFFF, no reflection, no final XOR.
//! On the wire the checksum is written most significant byte first.

use crc::{Crc, CRC_16_IBM_3740};

/// CRC-16/CCITT-FALSE (catalogued as IBM-3740).
const CCITT_FALSE: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Size of the CRC field on the wire.
pub const CRC_SIZE: usize = 2;

/// Compute the CRC-16 checksum of data.
#[inline]
pub fn compute(data: &[u8]) -> u16 {
    CCITT_FALSE.checksum(data)
}

/// Compute the checksum and return it in wire byte order.
#[inline]
pub fn compute_bytes(data: &[u8]) -> [u8; CRC_SIZE] {
    compute(data).to_be_bytes()
}

/// Verify that data matches a checksum read from the wire.
#[inline]
pub fn verify(data: &[u8], expected: [u8; CRC_SIZE]) -> bool {
    compute(data) == u16::from_be_bytes(expected)
}
