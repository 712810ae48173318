//! Inbound connection listener.
//!
//! Accepts TCP connections on the local port and runs one [`Session`] task
//! per connection. Session tasks live in a `JoinSet` so shutdown can abort
//! them together.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use anyhow::Result;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinSet;

use lume_services::LumeContext;

use super::handler::Session;

pub struct ConnectionListener {
    ctx: LumeContext,
    listener: TcpListener,
    shutdown: broadcast::Receiver<()>,
}

impl ConnectionListener {
    /// Bind the identity's TCP port on all interfaces.
    pub async fn bind(ctx: LumeContext, shutdown: broadcast::Receiver<()>) -> std::io::Result<Self> {
        let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, ctx.identity().tcp_port);
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            ctx,
            listener,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(mut self) -> Result<()> {
        let mut sessions = JoinSet::new();

        tracing::info!(
            addr = %self.listener.local_addr()?,
            "connection listener starting"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!(active = sessions.len(), "connection listener shutting down");
                    sessions.shutdown().await;
                    return Ok(());
                }

                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            tracing::error!(error = %e, "session task panicked");
                        }
                    }
                }

                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr)) => {
                            tracing::debug!(%peer_addr, "connection accepted");
                            sessions.spawn(serve(self.ctx.clone(), stream, peer_addr));
                        }
                        Err(e) => tracing::warn!(error = %e, "accept failed"),
                    }
                }
            }
        }
    }
}

async fn serve(ctx: LumeContext, stream: TcpStream, peer_addr: SocketAddr) {
    if let Err(e) = Session::new(ctx, stream, peer_addr).run().await {
        tracing::warn!(%peer_addr, error = %e, "session terminated");
    }
}
