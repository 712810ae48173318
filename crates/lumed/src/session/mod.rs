//! Inbound TCP sessions: the connection listener and the per-connection
//! protocol handler.

pub mod handler;
pub mod listener;

pub use handler::{Session, SessionError};
pub use listener::ConnectionListener;
