//! The local identity a node advertises and stamps on its envelopes.

use std::net::Ipv4Addr;

use crate::name::{NameError, PeerName};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("invalid username: {0}")]
    Name(#[from] NameError),

    #[error("port must be between 1 and 65535")]
    Port,
}

/// Display name, listening port and (when known) the LAN address of this node.
///
/// Fixed once at startup; every component reads it through the service context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalIdentity {
    pub name: PeerName,
    pub tcp_port: u16,
    pub address: Option<Ipv4Addr>,
}

impl LocalIdentity {
    /// Build from a username and port, truncating the name to 31 bytes.
    pub fn new(username: &str, tcp_port: u16) -> Result<Self, IdentityError> {
        if tcp_port == 0 {
            return Err(IdentityError::Port);
        }
        Ok(Self {
            name: PeerName::truncated(username.trim())?,
            tcp_port,
            address: None,
        })
    }

    pub fn with_address(mut self, address: Option<Ipv4Addr>) -> Self {
        self.address = address;
        self
    }

    /// Address for banners and headers: the resolved IPv4 or "unknown".
    pub fn display_address(&self) -> String {
        self.address
            .map(|a| a.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}
