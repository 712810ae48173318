//! Bounded text values carried in fixed-size wire buffers.
//!
//! The wire carries names and paths as zero-padded byte arrays. Nothing
//! outside this module touches those arrays: decoding always yields a
//! validated, length-bounded `String`, and encoding always produces a
//! terminated buffer.

use std::fmt;

use crate::wire::{FILENAME_LEN, USERNAME_LEN};

/// Errors produced when a name does not fit its wire buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("name is empty")]
    Empty,

    #[error("name is {len} bytes, limit is {max}")]
    TooLong { len: usize, max: usize },

    #[error("name contains a NUL byte")]
    InteriorNul,

    #[error("name field is not NUL-terminated")]
    Unterminated,

    #[error("name is not valid UTF-8")]
    InvalidUtf8,
}

// ── PeerName ──────────────────────────────────────────────────────────────────

/// A display name: 1..=31 bytes of UTF-8 without NUL.
///
/// Names are the registry key and travel in every envelope and beacon.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerName(String);

impl PeerName {
    /// Usable bytes; the 32nd byte of the wire buffer is the terminator.
    pub const MAX_LEN: usize = USERNAME_LEN - 1;

    /// Validate a name without altering it.
    pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();
        check(&name, Self::MAX_LEN)?;
        Ok(Self(name))
    }

    /// Cut a name down to `MAX_LEN` bytes on a character boundary, then validate.
    pub fn truncated(name: &str) -> Result<Self, NameError> {
        Self::new(truncate_utf8(name, Self::MAX_LEN))
    }

    /// Decode from a zero-padded 32-byte field.
    pub fn from_wire(field: &[u8; USERNAME_LEN]) -> Result<Self, NameError> {
        let end = field
            .iter()
            .position(|&b| b == 0)
            .ok_or(NameError::Unterminated)?;
        let text = std::str::from_utf8(&field[..end]).map_err(|_| NameError::InvalidUtf8)?;
        Self::new(text)
    }

    /// Encode into a zero-padded 32-byte field.
    pub fn to_wire(&self) -> [u8; USERNAME_LEN] {
        let mut field = [0u8; USERNAME_LEN];
        field[..self.0.len()].copy_from_slice(self.0.as_bytes());
        field
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for PeerName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for PeerName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

// ── WireFilename ──────────────────────────────────────────────────────────────

/// The filename carried in a file offer: up to 255 bytes, possibly a path.
///
/// Senders transmit the path as given; receivers only ever use
/// [`WireFilename::basename`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFilename(String);

impl WireFilename {
    pub const MAX_LEN: usize = FILENAME_LEN - 1;

    pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();
        check(&name, Self::MAX_LEN)?;
        Ok(Self(name))
    }

    pub fn truncated(name: &str) -> Result<Self, NameError> {
        Self::new(truncate_utf8(name, Self::MAX_LEN))
    }

    /// Decode from a 256-byte field.
    ///
    /// Senders may leave the final byte unset, so only the first 255 bytes
    /// are inspected and a missing terminator within them is tolerated.
    pub fn from_wire(field: &[u8; FILENAME_LEN]) -> Result<Self, NameError> {
        let usable = &field[..Self::MAX_LEN];
        let end = usable.iter().position(|&b| b == 0).unwrap_or(usable.len());
        let text = std::str::from_utf8(&usable[..end]).map_err(|_| NameError::InvalidUtf8)?;
        Self::new(text)
    }

    pub fn to_wire(&self) -> [u8; FILENAME_LEN] {
        let mut field = [0u8; FILENAME_LEN];
        field[..self.0.len()].copy_from_slice(self.0.as_bytes());
        field
    }

    /// Everything after the last `/`.
    pub fn basename(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WireFilename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn check(name: &str, max: usize) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.len() > max {
        return Err(NameError::TooLong {
            len: name.len(),
            max,
        });
    }
    if name.as_bytes().contains(&0) {
        return Err(NameError::InteriorNul);
    }
    Ok(())
}

fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
