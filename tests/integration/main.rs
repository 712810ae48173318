//! Lume integration test harness.
//!
//! Every test runs real nodes inside the test process over loopback. Each
//! node listens for beacons on its own discovery port and sends its beacons
//! to its partner's port on 127.0.0.1, so no broadcast domain or privileges
//! are needed and tests never interfere with each other.
//!
//!   cargo test --test integration

mod discovery;
mod files;
mod messaging;

use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc::UnboundedReceiver;

use lume_core::LocalIdentity;
use lume_services::{ChannelSink, EngineSettings, Event, LumeContext, Peer};
use lumed::Node;

// ── Harness ───────────────────────────────────────────────────────────────────

/// Beacon interval used by test nodes.
pub const BEACON_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound on any single wait in a test.
pub const WAIT: Duration = Duration::from_secs(10);

/// A running node plus everything a test needs to observe it.
pub struct TestNode {
    pub node: Node,
    pub ctx: LumeContext,
    pub events: UnboundedReceiver<Event>,
    /// Download directory, unique to this node.
    pub dir: PathBuf,
    pub discovery_port: u16,
}

pub struct NodeOptions {
    pub name: &'static str,
    /// Port this node's beacons are sent to.
    pub beacon_target: u16,
    pub discovery_port: u16,
    pub offer_timeout: Duration,
}

pub fn free_tcp_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .expect("no free tcp port")
}

pub fn free_udp_port() -> u16 {
    std::net::UdpSocket::bind("127.0.0.1:0")
        .and_then(|s| s.local_addr())
        .map(|a| a.port())
        .expect("no free udp port")
}

/// A fresh, empty directory under the system temp dir.
pub fn scratch_dir(tag: &str) -> Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!("lume-it-{tag}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    Ok(dir)
}

pub async fn spawn_node(tag: &str, opts: NodeOptions) -> Result<TestNode> {
    let dir = scratch_dir(&format!("{tag}-{}", opts.name))?;
    let settings = EngineSettings {
        discovery_port: opts.discovery_port,
        broadcast_addr: SocketAddrV4::new(Ipv4Addr::LOCALHOST, opts.beacon_target),
        beacon_interval: BEACON_INTERVAL,
        connect_timeout: Duration::from_secs(2),
        offer_timeout: opts.offer_timeout,
        download_dir: dir.clone(),
        ..EngineSettings::default()
    };
    let identity = LocalIdentity::new(opts.name, free_tcp_port())?;
    let (sink, events) = ChannelSink::new();
    let ctx = LumeContext::new(identity, settings, Arc::new(sink));
    let node = Node::start(ctx.clone()).await;
    if node.tcp_addr().is_none() {
        bail!("{} failed to bind its tcp port", opts.name);
    }
    Ok(TestNode {
        node,
        ctx,
        events,
        dir,
        discovery_port: opts.discovery_port,
    })
}

/// Two nodes, `bob` and `carol`, beaconing at each other.
pub async fn spawn_pair(tag: &str, offer_timeout: Duration) -> Result<(TestNode, TestNode)> {
    let bob_port = free_udp_port();
    let carol_port = free_udp_port();
    let bob = spawn_node(
        tag,
        NodeOptions {
            name: "bob",
            beacon_target: carol_port,
            discovery_port: bob_port,
            offer_timeout,
        },
    )
    .await?;
    let carol = spawn_node(
        tag,
        NodeOptions {
            name: "carol",
            beacon_target: bob_port,
            discovery_port: carol_port,
            offer_timeout,
        },
    )
    .await?;
    Ok((bob, carol))
}

/// Two nodes that have already discovered each other.
pub async fn connected_pair(tag: &str, offer_timeout: Duration) -> Result<(TestNode, TestNode)> {
    let (bob, carol) = spawn_pair(tag, offer_timeout).await?;
    wait_for_peer(&bob.ctx, "carol").await?;
    wait_for_peer(&carol.ctx, "bob").await?;
    Ok((bob, carol))
}

/// Poll the registry until `name` appears.
pub async fn wait_for_peer(ctx: &LumeContext, name: &str) -> Result<Peer> {
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        if let Some(peer) = ctx.registry().lookup_by_name(name) {
            return Ok(peer);
        }
        if tokio::time::Instant::now() >= deadline {
            bail!("{} never discovered {name}", ctx.identity().name);
        }
        tokio::time::sleep(BEACON_INTERVAL / 2).await;
    }
}

/// Skip events until one matches.
pub async fn wait_for_event<F>(events: &mut UnboundedReceiver<Event>, mut matches: F) -> Result<Event>
where
    F: FnMut(&Event) -> bool,
{
    let wait = async {
        while let Some(event) = events.recv().await {
            if matches(&event) {
                return Ok(event);
            }
        }
        bail!("event stream closed")
    };
    tokio::time::timeout(WAIT, wait)
        .await
        .context("timed out waiting for event")?
}

pub async fn wait_for_status(events: &mut UnboundedReceiver<Event>, prefix: &str) -> Result<String> {
    match wait_for_event(events, |e| matches!(e, Event::Status(s) if s.starts_with(prefix))).await? {
        Event::Status(s) => Ok(s),
        other => bail!("unexpected event {other:?}"),
    }
}

impl TestNode {
    pub async fn shutdown(self) {
        self.node.shutdown().await;
        let _ = std::fs::remove_dir_all(&self.dir);
    }

    /// Registry index of `name`, as a console would select it.
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.ctx
            .registry()
            .index_of(name)
            .with_context(|| format!("{} does not know {name}", self.ctx.identity().name))
    }
}
