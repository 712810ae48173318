use std::net::Ipv4Addr;
use std::time::Duration;

use anyhow::Result;
use lume_core::PeerName;
use lume_services::Event;

use crate::*;

#[tokio::test]
async fn text_arrives_exactly_once() -> Result<()> {
    let (mut bob, mut carol) = connected_pair("text", Duration::from_secs(30)).await?;

    lumed::send_text(&bob.ctx, bob.index_of("carol")?, "hello").await?;

    let event = wait_for_event(&mut carol.events, |e| matches!(e, Event::ChatMessage { .. })).await?;
    assert_eq!(
        event,
        Event::ChatMessage {
            sender: PeerName::new("bob")?,
            body: "hello".into(),
        }
    );
    wait_for_status(&mut bob.events, "Me -> carol: hello").await?;

    // No duplicate delivery.
    tokio::time::sleep(Duration::from_millis(300)).await;
    while let Ok(event) = carol.events.try_recv() {
        assert!(!matches!(event, Event::ChatMessage { .. }), "duplicate: {event:?}");
    }

    bob.shutdown().await;
    carol.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn messages_flow_both_ways() -> Result<()> {
    let (mut bob, mut carol) = connected_pair("both-ways", Duration::from_secs(30)).await?;

    lumed::send_text(&bob.ctx, bob.index_of("carol")?, "ping").await?;
    lumed::send_text(&carol.ctx, carol.index_of("bob")?, "pong").await?;

    let at_carol = wait_for_event(&mut carol.events, |e| matches!(e, Event::ChatMessage { .. })).await?;
    let at_bob = wait_for_event(&mut bob.events, |e| matches!(e, Event::ChatMessage { .. })).await?;
    assert!(matches!(at_carol, Event::ChatMessage { body, .. } if body == "ping"));
    assert!(matches!(at_bob, Event::ChatMessage { body, .. } if body == "pong"));

    bob.shutdown().await;
    carol.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn unreachable_peer_is_reported_not_retried() -> Result<()> {
    let (mut bob, carol) = spawn_pair("unreachable", Duration::from_secs(30)).await?;

    // A registry entry whose port has nothing listening.
    let dead_port = free_tcp_port();
    bob.ctx
        .registry()
        .upsert(&PeerName::new("ghost")?, Ipv4Addr::LOCALHOST, dead_port);

    let result = lumed::send_text(&bob.ctx, bob.index_of("ghost")?, "anyone?").await;
    assert!(matches!(result, Err(lumed::SendError::Connect { .. })));
    wait_for_status(&mut bob.events, "Failed to connect to ghost").await?;

    bob.shutdown().await;
    carol.shutdown().await;
    Ok(())
}
