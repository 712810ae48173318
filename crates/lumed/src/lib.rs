//! lumed — the Lume network engine.
//!
//! Discovery, the inbound session protocol and the outbound senders, driven
//! by a [`Node`] over a shared [`lume_services::LumeContext`].

pub mod console;
pub mod discovery;
pub mod framing;
pub mod net;
pub mod node;
pub mod send;
pub mod session;

pub use node::Node;
pub use send::{send_file, send_file_to, send_text, send_text_to, FileSendOutcome, SendError};
pub use session::{ConnectionListener, Session, SessionError};
