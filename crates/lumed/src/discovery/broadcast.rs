//! Beacon broadcast.
//!
//! Sends this node's name and TCP port to the broadcast address every
//! beacon interval. Best-effort: a failed send is logged and the next tick
//! tries again.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tokio::time;

use lume_core::BeaconPacket;
use lume_services::LumeContext;

/// Broadcast beacons until a shutdown signal arrives.
pub async fn broadcast_loop(ctx: LumeContext, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
    let socket = make_broadcast_socket().context("failed to create beacon socket")?;
    let socket = UdpSocket::from_std(socket).context("failed to convert to tokio UdpSocket")?;

    let identity = ctx.identity();
    let beacon = BeaconPacket {
        username: identity.name.clone(),
        tcp_port: identity.tcp_port,
    }
    .encode();
    let dest = SocketAddr::V4(ctx.settings().broadcast_addr);
    let mut interval = time::interval(ctx.settings().beacon_interval);

    tracing::info!(
        dest = %dest,
        interval_secs = ctx.settings().beacon_interval.as_secs(),
        "beacon broadcast starting"
    );

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("beacon broadcast shutting down");
                return Ok(());
            }
            _ = interval.tick() => {
                match socket.send_to(&beacon, dest).await {
                    Ok(n) => tracing::trace!(bytes = n, "beacon sent"),
                    Err(e) => tracing::debug!(error = %e, "beacon send failed"),
                }
            }
        }
    }
}

/// Create a non-blocking UDP socket allowed to send to broadcast addresses.
fn make_broadcast_socket() -> Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).context("socket()")?;

    socket.set_broadcast(true).context("SO_BROADCAST")?;
    socket.set_nonblocking(true).context("set_nonblocking")?;

    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0);
    socket.bind(&bind_addr.into()).context("bind()")?;

    Ok(socket.into())
}
