//! Peer registry: the bounded, name-keyed table of discovered peers.
//!
//! Written by the discovery listener, read by the console and outbound
//! senders. Entries are kept in discovery order so a UI can address them
//! by index. Peers are never removed; `last_seen` shows staleness.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use lume_core::wire::MAX_PEERS;
use lume_core::PeerName;

/// A peer as last seen in a beacon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub name: PeerName,
    /// Source address of the most recent beacon.
    pub addr: Ipv4Addr,
    /// TCP port the peer listens on.
    pub tcp_port: u16,
    pub last_seen: Instant,
}

impl Peer {
    pub fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.addr, self.tcp_port)
    }
}

/// Result of [`PeerRegistry::upsert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// Unknown name, appended. Carries a copy of the new entry.
    Inserted(Peer),
    /// Known name, address/port/last_seen refreshed in place.
    Refreshed,
    /// Unknown name and the registry already holds `MAX_PEERS` entries.
    Full,
    /// The name is our own.
    SelfIgnored,
}

impl UpsertOutcome {
    pub fn is_new(&self) -> bool {
        matches!(self, UpsertOutcome::Inserted(_))
    }
}

/// The peer registry, shared between discovery, console and sender tasks.
///
/// One exclusive lock serializes every read and write. The lock is never
/// held across an await point; readers get copies.
#[derive(Clone)]
pub struct PeerRegistry {
    local_name: PeerName,
    capacity: usize,
    peers: Arc<Mutex<Vec<Peer>>>,
}

impl PeerRegistry {
    /// Create an empty registry that refuses entries named `local_name`.
    pub fn new(local_name: PeerName) -> Self {
        Self::with_capacity(local_name, MAX_PEERS)
    }

    pub fn with_capacity(local_name: PeerName, capacity: usize) -> Self {
        Self {
            local_name,
            capacity,
            peers: Arc::new(Mutex::new(Vec::with_capacity(capacity))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Peer>> {
        // Every critical section leaves the table consistent, so a panic
        // elsewhere does not invalidate it.
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or refresh the entry for `name`.
    pub fn upsert(&self, name: &PeerName, addr: Ipv4Addr, tcp_port: u16) -> UpsertOutcome {
        if *name == self.local_name {
            return UpsertOutcome::SelfIgnored;
        }
        let now = Instant::now();
        let mut peers = self.lock();
        if let Some(peer) = peers.iter_mut().find(|p| p.name == *name) {
            peer.addr = addr;
            peer.tcp_port = tcp_port;
            peer.last_seen = now;
            return UpsertOutcome::Refreshed;
        }
        if peers.len() >= self.capacity {
            return UpsertOutcome::Full;
        }
        let peer = Peer {
            name: name.clone(),
            addr,
            tcp_port,
            last_seen: now,
        };
        peers.push(peer.clone());
        UpsertOutcome::Inserted(peer)
    }

    /// Copy of the entry at `index` in discovery order.
    pub fn lookup_by_index(&self, index: usize) -> Option<Peer> {
        self.lock().get(index).cloned()
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<Peer> {
        self.lock().iter().find(|p| p.name == name).cloned()
    }

    /// Position of `name` in discovery order.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.lock().iter().position(|p| p.name == name)
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Point-in-time copy of every entry.
    pub fn snapshot(&self) -> Vec<Peer> {
        self.lock().clone()
    }
}
