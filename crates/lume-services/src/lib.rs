//! lume-services — shared node state: peer registry, pending file offer,
//! UI event sink, and the context object that ties them together.

pub mod context;
pub mod events;
pub mod pending;
pub mod registry;

pub use context::{EngineSettings, LumeContext};
pub use events::{ChannelSink, Event, EventSink, LogSink};
pub use pending::{Decision, OfferOutcome, PendingOffer, PendingSlot, PendingTransfer, SlotBusy};
pub use registry::{Peer, PeerRegistry, UpsertOutcome};
