//! Lume wire format: on-wire types for discovery and sessions.
//!
//! These types ARE the protocol. Layouts reproduce the C structs existing
//! Lume peers put on the wire on 64-bit Linux: native byte order, `int`
//! sized enum and port fields, `size_t` lengths, and the implicit alignment
//! padding spelled out as explicit reserved bytes.
//!
//! The `Raw*` structs are `#[repr(C, packed)]` with zerocopy derives, as in
//! every fixed-layout type here. Callers never see them: the typed
//! [`Envelope`], [`FileMetadata`] and [`BeaconPacket`] validate every field
//! at the decode boundary.

use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::name::{NameError, PeerName, WireFilename};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Size of the name buffer in envelopes and beacons (31 usable + NUL).
pub const USERNAME_LEN: usize = 32;

/// Size of the filename buffer in a file offer.
pub const FILENAME_LEN: usize = 256;

/// Maximum payload of a single FILE_CHUNK message.
pub const CHUNK_SIZE: usize = 4096;

/// Maximum number of entries in the peer registry.
pub const MAX_PEERS: usize = 50;

/// UDP port beacons are broadcast to and received on.
pub const DISCOVERY_PORT: u16 = 9000;

/// Seconds between beacons.
pub const BEACON_INTERVAL_SECS: u64 = 3;

/// Seconds an inbound file offer waits for a local decision.
pub const OFFER_TIMEOUT_SECS: u64 = 30;

/// Largest TEXT body a session will accept.
pub const MAX_TEXT_LEN: u64 = 1024 * 1024;

// ── Message type ──────────────────────────────────────────────────────────────

/// Discriminant carried in every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MessageType {
    Text = 0,
    FileMetadata = 1,
    FileChunk = 2,
    FileAccept = 3,
    FileReject = 4,
}

impl TryFrom<u32> for MessageType {
    type Error = WireError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MessageType::Text),
            1 => Ok(MessageType::FileMetadata),
            2 => Ok(MessageType::FileChunk),
            3 => Ok(MessageType::FileAccept),
            4 => Ok(MessageType::FileReject),
            other => Err(WireError::UnknownType(other)),
        }
    }
}

impl From<MessageType> for u32 {
    fn from(t: MessageType) -> u32 {
        t as u32
    }
}

// ── Raw layouts ───────────────────────────────────────────────────────────────

/// Envelope as it appears on a TCP connection.
///
/// Wire size: 48 bytes (4 type + 32 name + 4 alignment padding + 8 length).
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct RawEnvelope {
    pub msg_type: u32,
    pub sender_name: [u8; USERNAME_LEN],
    /// Padding before the 8-byte aligned length. Written as zero, ignored on read.
    pub reserved: [u8; 4],
    pub payload_len: u64,
}

assert_eq_size!(RawEnvelope, [u8; 48]);

/// Payload of a FILE_METADATA envelope.
///
/// Wire size: 264 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct RawFileMetadata {
    pub filename: [u8; FILENAME_LEN],
    pub file_size: u64,
}

assert_eq_size!(RawFileMetadata, [u8; 264]);

/// UDP discovery datagram.
///
/// Wire size: 36 bytes.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct RawBeacon {
    pub username: [u8; USERNAME_LEN],
    pub tcp_port: i32,
}

assert_eq_size!(RawBeacon, [u8; 36]);

// ── Envelope ──────────────────────────────────────────────────────────────────

/// Header preceding every message on a TCP connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub msg_type: MessageType,
    pub sender: PeerName,
    /// Byte length of the payload that immediately follows.
    pub payload_len: u64,
}

impl Envelope {
    pub const WIRE_SIZE: usize = std::mem::size_of::<RawEnvelope>();

    pub fn new(msg_type: MessageType, sender: &PeerName, payload_len: u64) -> Self {
        Self {
            msg_type,
            sender: sender.clone(),
            payload_len,
        }
    }

    pub fn encode(&self) -> [u8; Self::WIRE_SIZE] {
        let raw = RawEnvelope {
            msg_type: self.msg_type.into(),
            sender_name: self.sender.to_wire(),
            reserved: [0; 4],
            payload_len: self.payload_len,
        };
        let mut out = [0u8; Self::WIRE_SIZE];
        out.copy_from_slice(raw.as_bytes());
        out
    }

    /// Decode exactly `WIRE_SIZE` bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let raw = RawEnvelope::read_from(bytes).ok_or(WireError::Length {
            expected: Self::WIRE_SIZE,
            actual: bytes.len(),
        })?;
        // Copy packed fields out before use.
        let msg_type = raw.msg_type;
        let sender_name = raw.sender_name;
        let payload_len = raw.payload_len;
        Ok(Self {
            msg_type: MessageType::try_from(msg_type)?,
            sender: PeerName::from_wire(&sender_name)?,
            payload_len,
        })
    }
}

// ── FileMetadata ──────────────────────────────────────────────────────────────

/// A file offer: the name the sender used and the exact byte count to follow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub filename: WireFilename,
    pub file_size: u64,
}

impl FileMetadata {
    pub const WIRE_SIZE: usize = std::mem::size_of::<RawFileMetadata>();

    pub fn encode(&self) -> [u8; Self::WIRE_SIZE] {
        let raw = RawFileMetadata {
            filename: self.filename.to_wire(),
            file_size: self.file_size,
        };
        let mut out = [0u8; Self::WIRE_SIZE];
        out.copy_from_slice(raw.as_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let raw = RawFileMetadata::read_from(bytes).ok_or(WireError::Length {
            expected: Self::WIRE_SIZE,
            actual: bytes.len(),
        })?;
        let filename = raw.filename;
        let file_size = raw.file_size;
        Ok(Self {
            filename: WireFilename::from_wire(&filename)?,
            file_size,
        })
    }
}

// ── BeaconPacket ──────────────────────────────────────────────────────────────

/// Periodic announcement of a display name and its listening TCP port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeaconPacket {
    pub username: PeerName,
    pub tcp_port: u16,
}

impl BeaconPacket {
    pub const WIRE_SIZE: usize = std::mem::size_of::<RawBeacon>();

    pub fn encode(&self) -> [u8; Self::WIRE_SIZE] {
        let raw = RawBeacon {
            username: self.username.to_wire(),
            tcp_port: i32::from(self.tcp_port),
        };
        let mut out = [0u8; Self::WIRE_SIZE];
        out.copy_from_slice(raw.as_bytes());
        out
    }

    /// Decode a datagram. Anything but exactly `WIRE_SIZE` bytes is rejected.
    pub fn decode(datagram: &[u8]) -> Result<Self, WireError> {
        let raw = RawBeacon::read_from(datagram).ok_or(WireError::Length {
            expected: Self::WIRE_SIZE,
            actual: datagram.len(),
        })?;
        let username = raw.username;
        let tcp_port = raw.tcp_port;
        let port = u16::try_from(tcp_port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or(WireError::InvalidPort(tcp_port))?;
        Ok(Self {
            username: PeerName::from_wire(&username)?,
            tcp_port: port,
        })
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting wire-format data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("unknown message type: {0}")]
    UnknownType(u32),

    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("invalid tcp port in beacon: {0}")]
    InvalidPort(i32),

    #[error("invalid name field: {0}")]
    Name(#[from] NameError),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
