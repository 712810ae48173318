//! The service context handed to every engine component.
//!
//! Owns the local identity, the peer registry, the pending-offer slot, the
//! UI event sink and the runtime settings. Cloning is cheap; all clones share
//! the same state, and two contexts never do.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use lume_core::wire::{BEACON_INTERVAL_SECS, DISCOVERY_PORT, OFFER_TIMEOUT_SECS};
use lume_core::{LocalIdentity, LumeConfig};

use crate::events::EventSink;
use crate::pending::{Decision, PendingSlot};
use crate::registry::PeerRegistry;

/// Runtime knobs, resolved from [`LumeConfig`] at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub discovery_port: u16,
    pub broadcast_addr: SocketAddrV4,
    pub beacon_interval: Duration,
    pub connect_timeout: Duration,
    /// `None` waits for a FILE_ACCEPT/FILE_REJECT indefinitely.
    pub reply_timeout: Option<Duration>,
    pub offer_timeout: Duration,
    pub download_dir: PathBuf,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            discovery_port: DISCOVERY_PORT,
            broadcast_addr: SocketAddrV4::new(Ipv4Addr::BROADCAST, DISCOVERY_PORT),
            beacon_interval: Duration::from_secs(BEACON_INTERVAL_SECS),
            connect_timeout: Duration::from_secs(10),
            reply_timeout: Some(Duration::from_secs(OFFER_TIMEOUT_SECS + 5)),
            offer_timeout: Duration::from_secs(OFFER_TIMEOUT_SECS),
            download_dir: PathBuf::from("."),
        }
    }
}

impl From<&LumeConfig> for EngineSettings {
    fn from(config: &LumeConfig) -> Self {
        Self {
            discovery_port: config.network.discovery_port,
            broadcast_addr: config.network.broadcast_addr,
            beacon_interval: config.network.beacon_interval(),
            connect_timeout: config.network.connect_timeout(),
            reply_timeout: config.network.reply_timeout(),
            offer_timeout: config.transfer.offer_timeout(),
            download_dir: config.transfer.download_dir.clone(),
        }
    }
}

struct Inner {
    identity: LocalIdentity,
    registry: PeerRegistry,
    pending: PendingSlot,
    events: Arc<dyn EventSink>,
    settings: EngineSettings,
}

#[derive(Clone)]
pub struct LumeContext {
    inner: Arc<Inner>,
}

impl LumeContext {
    pub fn new(identity: LocalIdentity, settings: EngineSettings, events: Arc<dyn EventSink>) -> Self {
        let registry = PeerRegistry::new(identity.name.clone());
        Self {
            inner: Arc::new(Inner {
                identity,
                registry,
                pending: PendingSlot::new(),
                events,
                settings,
            }),
        }
    }

    pub fn identity(&self) -> &LocalIdentity {
        &self.inner.identity
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.inner.registry
    }

    pub fn pending(&self) -> &PendingSlot {
        &self.inner.pending
    }

    pub fn events(&self) -> &dyn EventSink {
        self.inner.events.as_ref()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    /// Emit a user-visible status line and mirror it to the log.
    pub fn status(&self, text: impl AsRef<str>) {
        let text = text.as_ref();
        tracing::debug!(status = text);
        self.inner.events.on_status(text);
    }

    /// Answer the pending file offer. Returns false, and reports it, when
    /// there is nothing to answer.
    pub fn decide_pending_transfer(&self, accept: bool) -> bool {
        let decision = if accept { Decision::Accepted } else { Decision::Rejected };
        match self.inner.pending.decide(decision) {
            Some(transfer) => {
                tracing::info!(
                    from = %transfer.sender,
                    filename = %transfer.filename,
                    ?decision,
                    "file offer answered"
                );
                self.status(if accept {
                    "File transfer accepted"
                } else {
                    "File transfer rejected"
                });
                true
            }
            None => {
                self.status("No pending file transfer");
                false
            }
        }
    }
}
