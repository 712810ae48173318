//! UI notifications raised by the engine.
//!
//! The engine never prints. Everything a user would see goes through an
//! [`EventSink`], which the console (or a test) supplies at startup.

use tokio::sync::mpsc;

use lume_core::PeerName;

use crate::registry::Peer;

/// Receiver of engine notifications. Called from engine tasks, so
/// implementations must not block.
pub trait EventSink: Send + Sync {
    /// A name was added to the registry for the first time.
    fn on_peer_discovered(&self, peer: &Peer);

    /// A TEXT message arrived.
    fn on_chat_message(&self, sender: &PeerName, body: &str);

    /// A file offer is waiting for /accept or /reject.
    fn on_file_offer(&self, sender: &PeerName, filename: &str, size: u64);

    /// Free-form progress or error line.
    fn on_status(&self, text: &str);
}

/// Owned form of each notification, for channel-based consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    PeerDiscovered(Peer),
    ChatMessage { sender: PeerName, body: String },
    FileOffer { sender: PeerName, filename: String, size: u64 },
    Status(String),
}

/// Forwards every notification into an unbounded channel.
///
/// A dropped receiver silently discards further events.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn emit(&self, event: Event) {
        let _ = self.tx.send(event);
    }
}

impl EventSink for ChannelSink {
    fn on_peer_discovered(&self, peer: &Peer) {
        self.emit(Event::PeerDiscovered(peer.clone()));
    }

    fn on_chat_message(&self, sender: &PeerName, body: &str) {
        self.emit(Event::ChatMessage {
            sender: sender.clone(),
            body: body.to_string(),
        });
    }

    fn on_file_offer(&self, sender: &PeerName, filename: &str, size: u64) {
        self.emit(Event::FileOffer {
            sender: sender.clone(),
            filename: filename.to_string(),
            size,
        });
    }

    fn on_status(&self, text: &str) {
        self.emit(Event::Status(text.to_string()));
    }
}

/// Sink for headless nodes: notifications become log lines only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn on_peer_discovered(&self, peer: &Peer) {
        tracing::info!(peer = %peer.name, addr = %peer.socket_addr(), "peer discovered");
    }

    fn on_chat_message(&self, sender: &PeerName, body: &str) {
        tracing::info!(from = %sender, len = body.len(), "chat message");
    }

    fn on_file_offer(&self, sender: &PeerName, filename: &str, size: u64) {
        tracing::info!(from = %sender, filename, size, "file offer");
    }

    fn on_status(&self, text: &str) {
        tracing::info!(status = text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::time::Instant;

    #[test]
    fn channel_sink_forwards_in_order() {
        let (sink, mut rx) = ChannelSink::new();
        let bob = PeerName::new("bob").unwrap();
        let peer = Peer {
            name: bob.clone(),
            addr: Ipv4Addr::LOCALHOST,
            tcp_port: 7000,
            last_seen: Instant::now(),
        };

        sink.on_peer_discovered(&peer);
        sink.on_chat_message(&bob, "hi");
        sink.on_file_offer(&bob, "a.txt", 12);
        sink.on_status("ok");

        assert_eq!(rx.try_recv().unwrap(), Event::PeerDiscovered(peer));
        assert_eq!(
            rx.try_recv().unwrap(),
            Event::ChatMessage { sender: bob.clone(), body: "hi".into() }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            Event::FileOffer { sender: bob, filename: "a.txt".into(), size: 12 }
        );
        assert_eq!(rx.try_recv().unwrap(), Event::Status("ok".into()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.on_status("nobody listening");
    }
}
