//! Wire format of the provisioning protocol.
//!
//! All packets share a clear 11-byte header:
//!
//! ```text
//! +----------+---------+------------+-------------------------+
//! | magic(8) | crc(2)  | code(1)    | payload ...             |
//! +----------+---------+------------+-------------------------+
//! ```
//!
//! The CRC covers the payload (bytes `11..`) in plaintext. Except for HELLO
//! and the short announcements, the payload is then Spritz-encrypted with the
//! shared secret and the nonce of the receiving side.
//!
//! # App -> device commands
//!
//! - HELLO: `app_nonce(8)`, never encrypted
//! - SET_DATA: `blob(512)`, NUL separated `ssid\0password\0additional\0`
//! - BIND: `key_len(1) | key(32)`
//!
//! # Device -> app status packet (always 512 bytes)
//!
//! ```text
//! magic(8) | crc(2) | status(1) | device_nonce(8) | uid(6) | confirmation(1)
//! | list_bytes(1) | list_entries(1) | trailer(484)
//! ```
//!
//! The trailer holds the wifi list (`strength(1) | encryption(1) | ssid | NUL`
//! per entry) followed by a NUL terminated log text, zero padded. The fixed
//! size hides the number of nearby networks from passive observers.

use crate::cipher;
use crate::crc::{self, CRC_SIZE};
use crate::error::{Error, Result};
use crate::{BIND_KEY_MAX, MAGIC, NONCE_SIZE, PACKET_SIZE, STORAGE_SIZE, UID_SIZE};

/// Offset of the CRC field.
pub const CRC_OFFSET: usize = MAGIC.len();

/// Offset of the command/status byte.
pub const CODE_OFFSET: usize = CRC_OFFSET + CRC_SIZE;

/// Clear header size, also the start of the protected payload.
pub const HEADER_SIZE: usize = CODE_OFFSET + 1;

/// HELLO packet size.
pub const HELLO_SIZE: usize = HEADER_SIZE + NONCE_SIZE;

/// BIND packet size.
pub const BIND_SIZE: usize = HEADER_SIZE + 1 + BIND_KEY_MAX;

/// SET_DATA packet size, also the largest accepted datagram.
pub const SET_DATA_SIZE: usize = HEADER_SIZE + STORAGE_SIZE;

/// Announcement packet size.
pub const ANNOUNCEMENT_SIZE: usize = HEADER_SIZE;

/// Status packet header size, the wifi list starts here.
pub const STATUS_HEADER_SIZE: usize = HEADER_SIZE + NONCE_SIZE + UID_SIZE + 3;

/// Room for wifi list and log text in a status packet.
pub const TRAILER_SIZE: usize = PACKET_SIZE - STATUS_HEADER_SIZE;

const NONCE_OFFSET: usize = HEADER_SIZE;
const UID_OFFSET: usize = NONCE_OFFSET + NONCE_SIZE;
const CONFIRMATION_OFFSET: usize = UID_OFFSET + UID_SIZE;
const LIST_BYTES_OFFSET: usize = CONFIRMATION_OFFSET + 1;
const LIST_ENTRIES_OFFSET: usize = LIST_BYTES_OFFSET + 1;

/// Per-entry overhead in the wifi list: strength, encryption, terminator.
const ENTRY_OVERHEAD: usize = 3;

// ============================================================================
// Codes
// ============================================================================

/// Commands sent by the companion app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandCode {
    /// Open or renew a session.
    Hello = 1,
    /// Deliver bootstrap data.
    SetData = 2,
    /// Replace the shared secret.
    Bind = 3,
}

impl TryFrom<u8> for CommandCode {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            1 => Ok(CommandCode::Hello),
            2 => Ok(CommandCode::SetData),
            3 => Ok(CommandCode::Bind),
            _ => Err(Error::UnknownCommand { code }),
        }
    }
}

/// Status byte reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum StatusCode {
    /// No error.
    #[default]
    Ok = 0,
    /// Announcement: device joined the bootstrap network.
    Hello = 1,
    /// Announcement: bootstrap data accepted, switching networks.
    BootstrapOk = 2,
    /// Unspecified error.
    Unspecified = 3,
    /// Binding failed.
    Binding = 4,
    /// Bootstrap data rejected.
    BootstrapData = 5,
    /// Wifi list unavailable.
    WifiList = 6,
    /// Destination network not found.
    WifiNotFound = 7,
    /// Destination network rejected the credentials.
    CredentialsWrong = 8,
    /// Secondary connection failed.
    Advanced = 9,
}

impl TryFrom<u8> for StatusCode {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        Ok(match code {
            0 => StatusCode::Ok,
            1 => StatusCode::Hello,
            2 => StatusCode::BootstrapOk,
            3 => StatusCode::Unspecified,
            4 => StatusCode::Binding,
            5 => StatusCode::BootstrapData,
            6 => StatusCode::WifiList,
            7 => StatusCode::WifiNotFound,
            8 => StatusCode::CredentialsWrong,
            9 => StatusCode::Advanced,
            _ => return Err(Error::UnknownStatus { code }),
        })
    }
}

/// Confirmation field of a status packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConfirmationState {
    /// Credentials are applied without confirmation.
    NotRequired = 0,
    /// Waiting for a human to confirm on the device.
    Required = 1,
    /// Confirmation granted.
    Confirmed = 2,
}

impl TryFrom<u8> for ConfirmationState {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ConfirmationState::NotRequired),
            1 => Ok(ConfirmationState::Required),
            2 => Ok(ConfirmationState::Confirmed),
            _ => Err(Error::MalformedPayload),
        }
    }
}

/// Encryption of a scanned network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encryption {
    /// Open network.
    Open,
    /// WEP.
    Wep,
    /// WPA or WPA2.
    Wpa,
    /// Anything else.
    Unknown,
}

impl From<Encryption> for u8 {
    fn from(value: Encryption) -> u8 {
        match value {
            Encryption::Open => 0,
            Encryption::Wep => 1,
            Encryption::Wpa => 2,
            Encryption::Unknown => 255,
        }
    }
}

impl From<u8> for Encryption {
    fn from(value: u8) -> Self {
        match value {
            0 => Encryption::Open,
            1 => Encryption::Wep,
            2 => Encryption::Wpa,
            _ => Encryption::Unknown,
        }
    }
}

/// One network from a wifi scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiListEntry {
    /// Network name.
    pub ssid: String,
    /// Signal strength in percent.
    pub strength_percent: u8,
    /// Encryption mode.
    pub encryption: Encryption,
}

impl WifiListEntry {
    /// Create a new entry.
    pub fn new(ssid: impl Into<String>, strength_percent: u8, encryption: Encryption) -> Self {
        Self {
            ssid: ssid.into(),
            strength_percent,
            encryption,
        }
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

fn check_magic(buf: &[u8]) -> Result<()> {
    if buf.len() < HEADER_SIZE {
        return Err(Error::PacketTooShort {
            size: buf.len(),
            minimum: HEADER_SIZE,
        });
    }
    if buf[..CRC_OFFSET] != MAGIC {
        return Err(Error::BadMagic);
    }
    Ok(())
}

fn require(buf: &[u8], minimum: usize) -> Result<()> {
    if buf.len() < minimum {
        return Err(Error::PacketTooShort {
            size: buf.len(),
            minimum,
        });
    }
    Ok(())
}

fn check_crc(buf: &[u8]) -> Result<()> {
    let expected = [buf[CRC_OFFSET], buf[CRC_OFFSET + 1]];
    if !crc::verify(&buf[HEADER_SIZE..], expected) {
        return Err(Error::CrcMismatch {
            expected: u16::from_be_bytes(expected),
            actual: crc::compute(&buf[HEADER_SIZE..]),
        });
    }
    Ok(())
}

fn write_header(buf: &mut [u8], code: u8) {
    buf[..CRC_OFFSET].copy_from_slice(&MAGIC);
    buf[CODE_OFFSET] = code;
}

/// Write the CRC of the payload, then encrypt the payload.
fn seal(buf: &mut [u8], secret: &[u8], nonce: &[u8; NONCE_SIZE]) {
    let crc = crc::compute_bytes(&buf[HEADER_SIZE..]);
    buf[CRC_OFFSET..CODE_OFFSET].copy_from_slice(&crc);
    cipher::encrypt_in_place(&mut buf[HEADER_SIZE..], nonce, secret);
}

/// Decrypt the payload, then verify its CRC.
fn open(buf: &mut [u8], secret: &[u8], nonce: &[u8; NONCE_SIZE]) -> Result<()> {
    cipher::decrypt_in_place(&mut buf[HEADER_SIZE..], nonce, secret);
    check_crc(buf)
}

// ============================================================================
// App -> device
// ============================================================================

/// A validated command from the companion app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// Session request.
    Hello {
        /// Nonce chosen by the app.
        app_nonce: [u8; NONCE_SIZE],
    },
    /// Bootstrap data, NUL separated fields.
    SetData {
        /// Raw storage blob.
        blob: &'a [u8],
    },
    /// New shared secret.
    Bind {
        /// Key bytes, 1 to 32 long.
        key: &'a [u8],
    },
}

impl Command<'_> {
    /// Code of this command.
    pub fn code(&self) -> CommandCode {
        match self {
            Command::Hello { .. } => CommandCode::Hello,
            Command::SetData { .. } => CommandCode::SetData,
            Command::Bind { .. } => CommandCode::Bind,
        }
    }
}

/// Validate and decrypt a datagram from the app.
///
/// Decrypts in place with `(secret, device_nonce)` unless the command is
/// HELLO, then checks the CRC and the per-command layout.
pub fn decode_incoming<'a>(
    buf: &'a mut [u8],
    secret: &[u8],
    device_nonce: &[u8; NONCE_SIZE],
) -> Result<Command<'a>> {
    check_magic(buf)?;
    if buf.len() > SET_DATA_SIZE {
        return Err(Error::PacketTooLong {
            size: buf.len(),
            maximum: SET_DATA_SIZE,
        });
    }

    let code = buf[CODE_OFFSET];
    if code == CommandCode::Hello as u8 {
        check_crc(buf)?;
    } else {
        open(buf, secret, device_nonce)?;
    }

    let buf: &'a [u8] = buf;
    match CommandCode::try_from(code)? {
        CommandCode::Hello => {
            require(buf, HELLO_SIZE)?;
            let mut app_nonce = [0u8; NONCE_SIZE];
            app_nonce.copy_from_slice(&buf[HEADER_SIZE..HELLO_SIZE]);
            Ok(Command::Hello { app_nonce })
        }
        CommandCode::SetData => {
            require(buf, SET_DATA_SIZE)?;
            Ok(Command::SetData {
                blob: &buf[HEADER_SIZE..],
            })
        }
        CommandCode::Bind => {
            require(buf, BIND_SIZE)?;
            let len = buf[HEADER_SIZE] as usize;
            if len == 0 || len > BIND_KEY_MAX {
                return Err(Error::InvalidBindKey {
                    len,
                    max: BIND_KEY_MAX,
                });
            }
            let start = HEADER_SIZE + 1;
            Ok(Command::Bind {
                key: &buf[start..start + len],
            })
        }
    }
}

/// Build a HELLO datagram.
pub fn encode_hello(app_nonce: &[u8; NONCE_SIZE]) -> [u8; HELLO_SIZE] {
    let mut buf = [0u8; HELLO_SIZE];
    write_header(&mut buf, CommandCode::Hello as u8);
    buf[HEADER_SIZE..].copy_from_slice(app_nonce);
    let crc = crc::compute_bytes(&buf[HEADER_SIZE..]);
    buf[CRC_OFFSET..CODE_OFFSET].copy_from_slice(&crc);
    buf
}

/// Build an encrypted SET_DATA datagram carrying `blob`.
///
/// The blob is zero padded to the full storage size.
pub fn encode_set_data(
    blob: &[u8],
    secret: &[u8],
    device_nonce: &[u8; NONCE_SIZE],
) -> Result<[u8; SET_DATA_SIZE]> {
    if blob.len() > STORAGE_SIZE {
        return Err(Error::PacketTooLong {
            size: HEADER_SIZE + blob.len(),
            maximum: SET_DATA_SIZE,
        });
    }
    let mut buf = [0u8; SET_DATA_SIZE];
    write_header(&mut buf, CommandCode::SetData as u8);
    buf[HEADER_SIZE..HEADER_SIZE + blob.len()].copy_from_slice(blob);
    seal(&mut buf, secret, device_nonce);
    Ok(buf)
}

/// Build an encrypted BIND datagram announcing `key` as the new secret.
pub fn encode_bind(
    key: &[u8],
    secret: &[u8],
    device_nonce: &[u8; NONCE_SIZE],
) -> Result<[u8; BIND_SIZE]> {
    if key.is_empty() || key.len() > BIND_KEY_MAX {
        return Err(Error::InvalidBindKey {
            len: key.len(),
            max: BIND_KEY_MAX,
        });
    }
    let mut buf = [0u8; BIND_SIZE];
    write_header(&mut buf, CommandCode::Bind as u8);
    buf[HEADER_SIZE] = key.len() as u8;
    buf[HEADER_SIZE + 1..HEADER_SIZE + 1 + key.len()].copy_from_slice(key);
    seal(&mut buf, secret, device_nonce);
    Ok(buf)
}

// ============================================================================
// Device -> app
// ============================================================================

/// Content of a status packet before encryption.
#[derive(Debug, Clone)]
pub struct StatusReport<'a> {
    /// Status byte.
    pub status: StatusCode,
    /// Nonce the app must use for its next command.
    pub device_nonce: &'a [u8; NONCE_SIZE],
    /// Device identifier.
    pub unique_id: &'a [u8; UID_SIZE],
    /// Confirmation state.
    pub confirmation: ConfirmationState,
    /// Scan results.
    pub networks: &'a [WifiListEntry],
    /// Network left out of the list (the bootstrap access point).
    pub skip_ssid: &'a str,
    /// Error message or device name.
    pub log: &'a str,
}

/// Build an encrypted, fixed-size status packet.
///
/// Entries matching `skip_ssid` or containing NUL are left out. The list
/// stops at the first entry that does not fit. The log text is only written
/// when it fits completely, including its terminator.
pub fn encode_status(
    report: &StatusReport<'_>,
    secret: &[u8],
    app_nonce: &[u8; NONCE_SIZE],
) -> [u8; PACKET_SIZE] {
    let mut buf = [0u8; PACKET_SIZE];
    write_header(&mut buf, report.status as u8);
    buf[NONCE_OFFSET..UID_OFFSET].copy_from_slice(report.device_nonce);
    buf[UID_OFFSET..CONFIRMATION_OFFSET].copy_from_slice(report.unique_id);
    buf[CONFIRMATION_OFFSET] = report.confirmation as u8;

    let mut pos = STATUS_HEADER_SIZE;
    let mut list_bytes: u8 = 0;
    let mut list_entries: u8 = 0;
    for entry in report.networks {
        let ssid = entry.ssid.as_bytes();
        if ssid == report.skip_ssid.as_bytes() || ssid.contains(&0) {
            continue;
        }
        let size = ssid.len() + ENTRY_OVERHEAD;
        if pos + size > PACKET_SIZE {
            break;
        }
        let Ok(total) = u8::try_from(list_bytes as usize + size) else {
            break;
        };

        buf[pos] = entry.strength_percent;
        buf[pos + 1] = entry.encryption.into();
        buf[pos + 2..pos + 2 + ssid.len()].copy_from_slice(ssid);
        pos += size;
        list_bytes = total;
        list_entries += 1;
    }
    buf[LIST_BYTES_OFFSET] = list_bytes;
    buf[LIST_ENTRIES_OFFSET] = list_entries;

    let log = report.log.as_bytes();
    let log = log.split(|&b| b == 0).next().unwrap_or_default();
    if pos + log.len() < PACKET_SIZE {
        buf[pos..pos + log.len()].copy_from_slice(log);
    }

    seal(&mut buf, secret, app_nonce);
    buf
}

/// Build a clear announcement packet.
pub fn encode_announcement(status: StatusCode) -> [u8; ANNOUNCEMENT_SIZE] {
    let mut buf = [0u8; ANNOUNCEMENT_SIZE];
    write_header(&mut buf, status as u8);
    let crc = crc::compute_bytes(&[]);
    buf[CRC_OFFSET..CODE_OFFSET].copy_from_slice(&crc);
    buf
}

/// Decode a clear announcement packet.
pub fn decode_announcement(buf: &[u8]) -> Result<StatusCode> {
    check_magic(buf)?;
    if buf.len() != ANNOUNCEMENT_SIZE {
        return Err(Error::PacketTooLong {
            size: buf.len(),
            maximum: ANNOUNCEMENT_SIZE,
        });
    }
    check_crc(buf)?;
    StatusCode::try_from(buf[CODE_OFFSET])
}

/// A decrypted status packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPacket {
    /// Status byte.
    pub status: StatusCode,
    /// Nonce to use for the next command.
    pub device_nonce: [u8; NONCE_SIZE],
    /// Device identifier.
    pub unique_id: [u8; UID_SIZE],
    /// Confirmation state.
    pub confirmation: ConfirmationState,
    /// Networks the device can see.
    pub networks: Vec<WifiListEntry>,
    /// Error message or device name.
    pub log: String,
}

/// Decrypt and parse a status packet.
pub fn decode_status(
    buf: &[u8],
    secret: &[u8],
    app_nonce: &[u8; NONCE_SIZE],
) -> Result<StatusPacket> {
    check_magic(buf)?;
    require(buf, PACKET_SIZE)?;
    if buf.len() > PACKET_SIZE {
        return Err(Error::PacketTooLong {
            size: buf.len(),
            maximum: PACKET_SIZE,
        });
    }

    let mut plain = [0u8; PACKET_SIZE];
    plain.copy_from_slice(buf);
    open(&mut plain, secret, app_nonce)?;

    let status = StatusCode::try_from(plain[CODE_OFFSET])?;
    let mut device_nonce = [0u8; NONCE_SIZE];
    device_nonce.copy_from_slice(&plain[NONCE_OFFSET..UID_OFFSET]);
    let mut unique_id = [0u8; UID_SIZE];
    unique_id.copy_from_slice(&plain[UID_OFFSET..CONFIRMATION_OFFSET]);
    let confirmation = ConfirmationState::try_from(plain[CONFIRMATION_OFFSET])?;

    let list_end = STATUS_HEADER_SIZE + plain[LIST_BYTES_OFFSET] as usize;
    if list_end > PACKET_SIZE {
        return Err(Error::MalformedPayload);
    }
    let mut list = &plain[STATUS_HEADER_SIZE..list_end];
    let mut networks = Vec::with_capacity(plain[LIST_ENTRIES_OFFSET] as usize);
    for _ in 0..plain[LIST_ENTRIES_OFFSET] {
        if list.len() < ENTRY_OVERHEAD {
            return Err(Error::MalformedPayload);
        }
        let name_len = list[2..]
            .iter()
            .position(|&b| b == 0)
            .ok_or(Error::MalformedPayload)?;
        networks.push(WifiListEntry {
            ssid: String::from_utf8_lossy(&list[2..2 + name_len]).into_owned(),
            strength_percent: list[0],
            encryption: Encryption::from(list[1]),
        });
        list = &list[name_len + ENTRY_OVERHEAD..];
    }
    if !list.is_empty() {
        return Err(Error::MalformedPayload);
    }

    let trailer = &plain[list_end..];
    let log_len = trailer.iter().position(|&b| b == 0).unwrap_or(trailer.len());
    let log = String::from_utf8_lossy(&trailer[..log_len]).into_owned();

    Ok(StatusPacket {
        status,
        device_nonce,
        unique_id,
        confirmation,
        networks,
        log,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"app_secret";
    const APP_NONCE: [u8; NONCE_SIZE] = [1, 2, 3, 4, 5, 6, 7, 8];
    const DEVICE_NONCE: [u8; NONCE_SIZE] = [9, 10, 11, 12, 13, 14, 15, 16];
    const UID: [u8; UID_SIZE] = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff];

    fn report<'a>(networks: &'a [WifiListEntry], log: &'a str) -> StatusReport<'a> {
        StatusReport {
            status: StatusCode::Ok,
            device_nonce: &DEVICE_NONCE,
            unique_id: &UID,
            confirmation: ConfirmationState::NotRequired,
            networks,
            skip_ssid: "Bootstrap_BST_v1",
            log,
        }
    }

    #[test]
    fn layout_sizes() {
        assert_eq!(HEADER_SIZE, 11);
        assert_eq!(HELLO_SIZE, 19);
        assert_eq!(BIND_SIZE, 44);
        assert_eq!(SET_DATA_SIZE, 523);
        assert_eq!(STATUS_HEADER_SIZE, 28);
        assert_eq!(TRAILER_SIZE, 484);
    }

    #[test]
    fn hello_is_clear_and_decodes() {
        let mut pkt = encode_hello(&APP_NONCE);
        assert_eq!(&pkt[..8], b"BSTwifi1");
        assert_eq!(pkt[CODE_OFFSET], 1);
        assert_eq!(&pkt[HEADER_SIZE..], &APP_NONCE);

        let cmd = decode_incoming(&mut pkt, SECRET, &DEVICE_NONCE).unwrap();
        assert_eq!(
            cmd,
            Command::Hello {
                app_nonce: APP_NONCE
            }
        );
        assert_eq!(cmd.code(), CommandCode::Hello);
    }

    #[test]
    fn hello_with_bad_crc_rejected() {
        let mut pkt = encode_hello(&APP_NONCE);
        pkt[HEADER_SIZE] ^= 0xff;
        assert!(matches!(
            decode_incoming(&mut pkt, SECRET, &DEVICE_NONCE),
            Err(Error::CrcMismatch { .. })
        ));
    }

    #[test]
    fn short_and_long_packets_rejected() {
        let mut short = *b"BSTwifi1\0\0";
        assert_eq!(
            decode_incoming(&mut short, SECRET, &DEVICE_NONCE),
            Err(Error::PacketTooShort {
                size: 10,
                minimum: HEADER_SIZE
            })
        );

        let mut long = vec![0u8; SET_DATA_SIZE + 1];
        long[..8].copy_from_slice(&MAGIC);
        assert!(matches!(
            decode_incoming(&mut long, SECRET, &DEVICE_NONCE),
            Err(Error::PacketTooLong { .. })
        ));
    }

    #[test]
    fn bad_magic_rejected() {
        let mut pkt = encode_hello(&APP_NONCE);
        pkt[0] = b'X';
        assert_eq!(
            decode_incoming(&mut pkt, SECRET, &DEVICE_NONCE),
            Err(Error::BadMagic)
        );
    }

    #[test]
    fn truncated_hello_rejected_after_crc() {
        let mut pkt = [0u8; HEADER_SIZE + 4];
        write_header(&mut pkt, CommandCode::Hello as u8);
        let crc = crc::compute_bytes(&pkt[HEADER_SIZE..]);
        pkt[CRC_OFFSET..CODE_OFFSET].copy_from_slice(&crc);
        assert_eq!(
            decode_incoming(&mut pkt, SECRET, &DEVICE_NONCE),
            Err(Error::PacketTooShort {
                size: HEADER_SIZE + 4,
                minimum: HELLO_SIZE
            })
        );
    }

    #[test]
    fn set_data_decodes_with_device_nonce() {
        let blob = b"WLAN\0password\0extra\0";
        let mut pkt = encode_set_data(blob, SECRET, &DEVICE_NONCE).unwrap();
        assert_eq!(pkt.len(), SET_DATA_SIZE);
        assert_ne!(&pkt[HEADER_SIZE..HEADER_SIZE + blob.len()], blob);

        match decode_incoming(&mut pkt, SECRET, &DEVICE_NONCE).unwrap() {
            Command::SetData { blob: got } => {
                assert_eq!(got.len(), STORAGE_SIZE);
                assert_eq!(&got[..blob.len()], blob);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn set_data_with_wrong_nonce_fails_crc() {
        let mut pkt = encode_set_data(b"WLAN\0pw\0", SECRET, &DEVICE_NONCE).unwrap();
        assert!(matches!(
            decode_incoming(&mut pkt, SECRET, &APP_NONCE),
            Err(Error::CrcMismatch { .. })
        ));
    }

    #[test]
    fn set_data_blob_too_large() {
        let blob = vec![b'a'; STORAGE_SIZE + 1];
        assert!(encode_set_data(&blob, SECRET, &DEVICE_NONCE).is_err());
    }

    #[test]
    fn bind_decodes_key() {
        let mut pkt = encode_bind(b"new-key", SECRET, &DEVICE_NONCE).unwrap();
        let cmd = decode_incoming(&mut pkt, SECRET, &DEVICE_NONCE).unwrap();
        assert_eq!(cmd, Command::Bind { key: b"new-key" });
    }

    #[test]
    fn bind_key_length_checked() {
        assert!(encode_bind(b"", SECRET, &DEVICE_NONCE).is_err());
        assert!(encode_bind(&[1u8; BIND_KEY_MAX + 1], SECRET, &DEVICE_NONCE).is_err());

        // Forge a BIND announcing 33 key bytes.
        let mut pkt = [0u8; BIND_SIZE];
        write_header(&mut pkt, CommandCode::Bind as u8);
        pkt[HEADER_SIZE] = 33;
        seal(&mut pkt, SECRET, &DEVICE_NONCE);
        assert_eq!(
            decode_incoming(&mut pkt, SECRET, &DEVICE_NONCE),
            Err(Error::InvalidBindKey { len: 33, max: 32 })
        );
    }

    #[test]
    fn unknown_command_rejected() {
        let mut pkt = [0u8; HELLO_SIZE];
        write_header(&mut pkt, 42);
        seal(&mut pkt, SECRET, &DEVICE_NONCE);
        assert_eq!(
            decode_incoming(&mut pkt, SECRET, &DEVICE_NONCE),
            Err(Error::UnknownCommand { code: 42 })
        );
    }

    #[test]
    fn status_roundtrip_with_list_and_name() {
        let networks = vec![
            WifiListEntry::new("n1", 80, Encryption::Wpa),
            WifiListEntry::new("Bootstrap_BST_v1", 99, Encryption::Wpa),
            WifiListEntry::new("cafe", 20, Encryption::Open),
        ];
        let pkt = encode_status(&report(&networks, "Heating"), SECRET, &APP_NONCE);
        assert_eq!(pkt.len(), PACKET_SIZE);
        assert_eq!(pkt[CODE_OFFSET], 0);

        let status = decode_status(&pkt, SECRET, &APP_NONCE).unwrap();
        assert_eq!(status.status, StatusCode::Ok);
        assert_eq!(status.device_nonce, DEVICE_NONCE);
        assert_eq!(status.unique_id, UID);
        assert_eq!(status.confirmation, ConfirmationState::NotRequired);
        assert_eq!(
            status.networks,
            vec![
                WifiListEntry::new("n1", 80, Encryption::Wpa),
                WifiListEntry::new("cafe", 20, Encryption::Open),
            ]
        );
        assert_eq!(status.log, "Heating");
    }

    #[test]
    fn status_list_byte_count() {
        let networks = vec![WifiListEntry::new("n1", 80, Encryption::Wpa)];
        let mut pkt = encode_status(&report(&networks, ""), SECRET, &APP_NONCE);
        open(&mut pkt, SECRET, &APP_NONCE).unwrap();
        assert_eq!(pkt[LIST_BYTES_OFFSET], 5);
        assert_eq!(pkt[LIST_ENTRIES_OFFSET], 1);
        assert_eq!(&pkt[STATUS_HEADER_SIZE..STATUS_HEADER_SIZE + 5], &[80, 2, b'n', b'1', 0]);
    }

    #[test]
    fn status_packet_size_is_fixed() {
        for count in [0usize, 1, 5, 20, 100] {
            let networks: Vec<_> = (0..count)
                .map(|i| WifiListEntry::new(format!("network-{i}"), 50, Encryption::Wep))
                .collect();
            let pkt = encode_status(&report(&networks, "device"), SECRET, &APP_NONCE);
            assert_eq!(pkt.len(), PACKET_SIZE);
            assert!(decode_status(&pkt, SECRET, &APP_NONCE).is_ok());
        }
    }

    #[test]
    fn status_list_capped_by_byte_counter() {
        // 32-byte SSIDs take 35 bytes each; 7 fit under 255.
        let networks: Vec<_> = (0..20)
            .map(|i| WifiListEntry::new(format!("{i:0>32}"), 10, Encryption::Wpa))
            .collect();
        let pkt = encode_status(&report(&networks, ""), SECRET, &APP_NONCE);
        let status = decode_status(&pkt, SECRET, &APP_NONCE).unwrap();
        assert_eq!(status.networks.len(), 7);
    }

    #[test]
    fn status_skips_ssid_with_nul() {
        let networks = vec![
            WifiListEntry::new("bad\0name", 10, Encryption::Open),
            WifiListEntry::new("good", 10, Encryption::Open),
        ];
        let pkt = encode_status(&report(&networks, ""), SECRET, &APP_NONCE);
        let status = decode_status(&pkt, SECRET, &APP_NONCE).unwrap();
        assert_eq!(status.networks, vec![WifiListEntry::new("good", 10, Encryption::Open)]);
    }

    #[test]
    fn status_log_dropped_when_it_does_not_fit() {
        let log = "x".repeat(TRAILER_SIZE);
        let pkt = encode_status(&report(&[], &log), SECRET, &APP_NONCE);
        let status = decode_status(&pkt, SECRET, &APP_NONCE).unwrap();
        assert_eq!(status.log, "");

        let log = "y".repeat(TRAILER_SIZE - 1);
        let pkt = encode_status(&report(&[], &log), SECRET, &APP_NONCE);
        let status = decode_status(&pkt, SECRET, &APP_NONCE).unwrap();
        assert_eq!(status.log, log);
    }

    #[test]
    fn status_with_wrong_nonce_rejected() {
        let pkt = encode_status(&report(&[], "name"), SECRET, &APP_NONCE);
        assert!(matches!(
            decode_status(&pkt, SECRET, &DEVICE_NONCE),
            Err(Error::CrcMismatch { .. })
        ));
    }

    #[test]
    fn announcement_roundtrip() {
        let pkt = encode_announcement(StatusCode::BootstrapOk);
        assert_eq!(pkt.len(), 11);
        assert_eq!(&pkt[..8], b"BSTwifi1");
        assert_eq!(&pkt[8..10], &[0xff, 0xff]);
        assert_eq!(pkt[10], 2);
        assert_eq!(decode_announcement(&pkt).unwrap(), StatusCode::BootstrapOk);
    }

    #[test]
    fn status_codes_map() {
        for code in 0..=9u8 {
            assert_eq!(StatusCode::try_from(code).unwrap() as u8, code);
        }
        assert_eq!(
            StatusCode::try_from(10),
            Err(Error::UnknownStatus { code: 10 })
        );
    }

    #[test]
    fn encryption_codes() {
        assert_eq!(u8::from(Encryption::Wpa), 2);
        assert_eq!(u8::from(Encryption::Unknown), 255);
        assert_eq!(Encryption::from(1), Encryption::Wep);
        assert_eq!(Encryption::from(77), Encryption::Unknown);
    }
}
