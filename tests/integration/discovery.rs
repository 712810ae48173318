use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use lume_core::{LocalIdentity, PeerName};
use lume_services::{ChannelSink, EngineSettings, Event, LumeContext};
use lumed::{FileSendOutcome, Node};

use crate::*;

#[tokio::test]
async fn peers_find_each_other_with_correct_ports() -> Result<()> {
    let (mut bob, mut carol) = spawn_pair("find", Duration::from_secs(30)).await?;

    let carol_seen = wait_for_peer(&bob.ctx, "carol").await?;
    let bob_seen = wait_for_peer(&carol.ctx, "bob").await?;
    assert_eq!(carol_seen.tcp_port, carol.ctx.identity().tcp_port);
    assert_eq!(bob_seen.tcp_port, bob.ctx.identity().tcp_port);

    let event = wait_for_event(&mut bob.events, |e| matches!(e, Event::PeerDiscovered(_))).await?;
    assert!(matches!(event, Event::PeerDiscovered(p) if p.name == "carol"));
    wait_for_event(&mut carol.events, |e| matches!(e, Event::PeerDiscovered(_))).await?;

    // Repeated beacons refresh the one entry instead of adding more.
    tokio::time::sleep(BEACON_INTERVAL * 5).await;
    assert_eq!(bob.ctx.registry().count(), 1);
    let refreshed = wait_for_peer(&bob.ctx, "carol").await?;
    assert!(refreshed.last_seen > carol_seen.last_seen);

    bob.shutdown().await;
    carol.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn own_beacons_are_ignored() -> Result<()> {
    let port = free_udp_port();
    let mut solo = spawn_node(
        "self",
        NodeOptions {
            name: "solo",
            beacon_target: port,
            discovery_port: port,
            offer_timeout: Duration::from_secs(30),
        },
    )
    .await?;

    tokio::time::sleep(BEACON_INTERVAL * 5).await;
    assert!(solo.ctx.registry().is_empty());
    while let Ok(event) = solo.events.try_recv() {
        assert!(!matches!(event, Event::PeerDiscovered(_)));
    }

    solo.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn busy_tcp_port_still_discovers_and_sends() -> Result<()> {
    let (mut bob, carol) = spawn_pair("degraded", Duration::from_secs(30)).await?;

    // Third node whose TCP port is taken by carol's listener.
    let taken = carol.ctx.identity().tcp_port;
    let settings = EngineSettings {
        discovery_port: free_udp_port(),
        broadcast_addr: SocketAddrV4::new(Ipv4Addr::LOCALHOST, bob.discovery_port),
        beacon_interval: BEACON_INTERVAL,
        ..EngineSettings::default()
    };
    let (sink, mut events) = ChannelSink::new();
    let ctx = LumeContext::new(LocalIdentity::new("dave", taken)?, settings, Arc::new(sink));
    let dave = Node::start(ctx.clone()).await;
    assert!(dave.tcp_addr().is_none());
    wait_for_status(&mut events, "Error: Could not bind to TCP port").await?;

    // Still announced, and still able to send.
    wait_for_peer(&bob.ctx, "dave").await?;
    let _ = ctx
        .registry()
        .upsert(&PeerName::new("bob")?, Ipv4Addr::LOCALHOST, bob.ctx.identity().tcp_port);
    lumed::send_text(&ctx, 0, "still here").await?;
    let event = wait_for_event(&mut bob.events, |e| matches!(e, Event::ChatMessage { .. })).await?;
    assert!(matches!(event, Event::ChatMessage { sender, .. } if sender == "dave"));

    dave.shutdown().await;
    bob.shutdown().await;
    carol.shutdown().await;
    Ok(())
}

/// bob and carol discover each other, chat, and move a 9000-byte file.
#[tokio::test]
async fn discover_chat_and_transfer() -> Result<()> {
    let (mut bob, mut carol) = spawn_pair("scenario", Duration::from_secs(30)).await?;

    let carol_seen = wait_for_peer(&bob.ctx, "carol").await?;
    let bob_seen = wait_for_peer(&carol.ctx, "bob").await?;
    assert_eq!(carol_seen.tcp_port, carol.ctx.identity().tcp_port);
    assert_eq!(bob_seen.tcp_port, bob.ctx.identity().tcp_port);

    lumed::send_text(&bob.ctx, bob.index_of("carol")?, "hi carol").await?;
    let event = wait_for_event(&mut carol.events, |e| matches!(e, Event::ChatMessage { .. })).await?;
    assert_eq!(
        event,
        Event::ChatMessage {
            sender: PeerName::new("bob")?,
            body: "hi carol".into(),
        }
    );

    let data: Vec<u8> = (0..9000u32).map(|i| (i % 253) as u8).collect();
    let src = bob.dir.join("report.dat");
    std::fs::write(&src, &data)?;

    let send = lumed::send_file(&bob.ctx, bob.index_of("carol")?, &src);
    let accept = async {
        let offer = wait_for_event(&mut carol.events, |e| matches!(e, Event::FileOffer { .. })).await?;
        assert_eq!(
            offer,
            Event::FileOffer {
                sender: PeerName::new("bob")?,
                filename: "report.dat".into(),
                size: 9000,
            }
        );
        carol.ctx.decide_pending_transfer(true);
        Ok::<(), anyhow::Error>(())
    };
    let (sent, accepted) = tokio::join!(send, accept);
    accepted?;
    assert_eq!(sent?, FileSendOutcome::Completed { bytes: 9000 });
    wait_for_status(&mut bob.events, "Sent file").await?;

    wait_for_status(&mut carol.events, "File received: report.dat").await?;
    assert!(std::fs::read(carol.dir.join("report.dat"))? == data);

    bob.shutdown().await;
    carol.shutdown().await;
    Ok(())
}
