//! Peer discovery: a periodic beacon broadcaster and a listener that feeds
//! received beacons into the peer registry.

pub mod broadcast;
pub mod listener;

pub use broadcast::broadcast_loop;
pub use listener::{handle_datagram, listener_loop};
