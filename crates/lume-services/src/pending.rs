//! The pending-transfer slot. At most one inbound file offer awaits a
//! local accept/reject decision, system-wide.
//!
//! A session handler claims the slot with [`PendingSlot::offer`] and waits
//! on the returned [`PendingOffer`]. The UI answers through
//! [`PendingSlot::decide`], which empties the slot and wakes the waiter. A
//! second offer arriving while the slot is occupied gets [`SlotBusy`] and is
//! rejected by its session immediately.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use lume_core::PeerName;

/// The local user's answer to an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accepted,
    Rejected,
}

/// How an offer's wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferOutcome {
    Accepted,
    Rejected,
    /// No decision within the offer window; treated as a rejection.
    TimedOut,
}

impl From<Decision> for OfferOutcome {
    fn from(d: Decision) -> Self {
        match d {
            Decision::Accepted => OfferOutcome::Accepted,
            Decision::Rejected => OfferOutcome::Rejected,
        }
    }
}

/// Description of the offer currently occupying the slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransfer {
    pub id: u64,
    pub sender: PeerName,
    /// Basename the file will be written under.
    pub filename: String,
    pub file_size: u64,
    /// Remote end of the connection that made the offer.
    pub peer_addr: SocketAddr,
    pub offered_at: Instant,
}

/// Returned by [`PendingSlot::offer`] when another offer is still undecided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotBusy {
    pub current: PendingTransfer,
}

struct Occupant {
    transfer: PendingTransfer,
    decide_tx: oneshot::Sender<Decision>,
}

/// Shared single-slot holder. Cheap to clone.
#[derive(Clone, Default)]
pub struct PendingSlot {
    inner: Arc<Mutex<Option<Occupant>>>,
    next_id: Arc<AtomicU64>,
}

impl PendingSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Occupant>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the slot for a new offer.
    pub fn offer(
        &self,
        sender: PeerName,
        filename: String,
        file_size: u64,
        peer_addr: SocketAddr,
    ) -> Result<PendingOffer, SlotBusy> {
        let mut slot = self.lock();
        if let Some(occupant) = slot.as_ref() {
            return Err(SlotBusy {
                current: occupant.transfer.clone(),
            });
        }
        let transfer = PendingTransfer {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            sender,
            filename,
            file_size,
            peer_addr,
            offered_at: Instant::now(),
        };
        let (decide_tx, decide_rx) = oneshot::channel();
        *slot = Some(Occupant {
            transfer: transfer.clone(),
            decide_tx,
        });
        Ok(PendingOffer {
            slot: self.clone(),
            transfer,
            decide_rx,
        })
    }

    /// Answer the pending offer. Returns the answered offer, or `None` when
    /// nothing is pending (a no-op).
    pub fn decide(&self, decision: Decision) -> Option<PendingTransfer> {
        let occupant = self.lock().take()?;
        // The waiter may have just timed out and dropped its receiver; the
        // slot is cleared either way.
        let _ = occupant.decide_tx.send(decision);
        Some(occupant.transfer)
    }

    /// The offer currently awaiting a decision, if any.
    pub fn current(&self) -> Option<PendingTransfer> {
        self.lock().as_ref().map(|o| o.transfer.clone())
    }

    pub fn is_pending(&self) -> bool {
        self.lock().is_some()
    }

    /// Empty the slot if it still holds offer `id`.
    fn clear(&self, id: u64) -> bool {
        let mut slot = self.lock();
        if slot.as_ref().is_some_and(|o| o.transfer.id == id) {
            *slot = None;
            true
        } else {
            false
        }
    }
}

/// A claimed slot. Dropping it releases the slot.
pub struct PendingOffer {
    slot: PendingSlot,
    transfer: PendingTransfer,
    decide_rx: oneshot::Receiver<Decision>,
}

impl PendingOffer {
    pub fn transfer(&self) -> &PendingTransfer {
        &self.transfer
    }

    /// Wait for a decision for at most `window` from now.
    ///
    /// The slot is empty when this returns, whatever the outcome.
    pub async fn wait(mut self, window: Duration) -> OfferOutcome {
        match tokio::time::timeout(window, &mut self.decide_rx).await {
            Ok(Ok(decision)) => decision.into(),
            // Sender gone without an answer: only possible if the slot was torn down.
            Ok(Err(_)) => OfferOutcome::Rejected,
            Err(_) => {
                if self.slot.clear(self.transfer.id) {
                    OfferOutcome::TimedOut
                } else {
                    // A decision took the slot right at the deadline.
                    match self.decide_rx.try_recv() {
                        Ok(decision) => decision.into(),
                        Err(_) => OfferOutcome::TimedOut,
                    }
                }
            }
        }
    }
}

impl Drop for PendingOffer {
    fn drop(&mut self) {
        self.slot.clear(self.transfer.id);
    }
}
