//! lume-core — shared types, wire format, and configuration.
//! All other Lume crates depend on this one.

pub mod config;
pub mod identity;
pub mod name;
pub mod wire;

pub use config::{ConfigError, LumeConfig};
pub use identity::{IdentityError, LocalIdentity};
pub use name::{NameError, PeerName, WireFilename};
pub use wire::{BeaconPacket, Envelope, FileMetadata, MessageType, WireError};
