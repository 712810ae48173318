//! Beacon listener.
//!
//! Binds the discovery port and upserts every well-formed beacon into the
//! peer registry. Malformed datagrams and our own beacons are dropped.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::broadcast;

use lume_core::BeaconPacket;
use lume_services::{LumeContext, UpsertOutcome};

/// Receive beacons until a shutdown signal arrives.
pub async fn listener_loop(ctx: LumeContext, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
    let port = ctx.settings().discovery_port;
    let socket = make_listener_socket(port)
        .with_context(|| format!("failed to bind discovery port {port}"))?;
    let socket = UdpSocket::from_std(socket).context("failed to convert to tokio UdpSocket")?;

    // Larger than any beacon so oversized datagrams are seen whole and dropped.
    let mut buf = vec![0u8; 512];

    tracing::info!(port, "discovery listener starting");

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("discovery listener shutting down");
                return Ok(());
            }
            result = socket.recv_from(&mut buf) => {
                let (len, from) = match result {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!(error = %e, "recv_from failed");
                        continue;
                    }
                };
                handle_datagram(&ctx, &buf[..len], from);
            }
        }
    }
}

/// Validate one datagram and upsert the peer it announces.
///
/// Returns `None` when the datagram is discarded before reaching the registry.
pub fn handle_datagram(ctx: &LumeContext, datagram: &[u8], from: SocketAddr) -> Option<UpsertOutcome> {
    let addr = match from {
        SocketAddr::V4(v4) => *v4.ip(),
        SocketAddr::V6(_) => {
            tracing::trace!(%from, "ignoring IPv6 datagram");
            return None;
        }
    };

    let beacon = match BeaconPacket::decode(datagram) {
        Ok(b) => b,
        Err(e) => {
            tracing::trace!(%from, error = %e, "discarding malformed beacon");
            return None;
        }
    };

    let outcome = ctx.registry().upsert(&beacon.username, addr, beacon.tcp_port);
    match &outcome {
        UpsertOutcome::Inserted(peer) => {
            tracing::info!(peer = %peer.name, addr = %peer.socket_addr(), "peer discovered");
            ctx.events().on_peer_discovered(peer);
        }
        UpsertOutcome::Refreshed => {
            tracing::trace!(peer = %beacon.username, %addr, "peer refreshed");
        }
        UpsertOutcome::Full => {
            tracing::debug!(peer = %beacon.username, "peer registry full, beacon dropped");
        }
        UpsertOutcome::SelfIgnored => {
            tracing::trace!("ignoring own beacon");
        }
    }
    Some(outcome)
}

/// Create a UDP socket bound to the discovery port on all interfaces.
///
/// Address (and, on unix, port) reuse lets several nodes on one host share
/// the port.
fn make_listener_socket(port: u16) -> Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).context("socket()")?;

    socket.set_reuse_address(true).context("SO_REUSEADDR")?;
    #[cfg(unix)]
    socket.set_reuse_port(true).context("SO_REUSEPORT")?;
    socket.set_broadcast(true).context("SO_BROADCAST")?;
    socket.set_nonblocking(true).context("set_nonblocking")?;

    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
    socket.bind(&bind_addr.into()).context("bind()")?;

    Ok(socket.into())
}
