use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use lume_core::wire::CHUNK_SIZE;
use lume_services::Event;
use lumed::FileSendOutcome;

use crate::*;

/// Deterministic, non-repeating-per-chunk content.
fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// Send `src` from bob to carol, answering the offer with `accept`.
async fn offer(
    bob: &TestNode,
    carol: &mut TestNode,
    src: &Path,
    accept: bool,
) -> Result<FileSendOutcome> {
    let index = bob.index_of("carol")?;
    let send = lumed::send_file(&bob.ctx, index, src);
    let decide = async {
        wait_for_event(&mut carol.events, |e| matches!(e, Event::FileOffer { .. })).await?;
        anyhow::ensure!(carol.ctx.decide_pending_transfer(accept), "offer vanished");
        Ok::<(), anyhow::Error>(())
    };
    let (sent, decided) = tokio::join!(send, decide);
    decided?;
    Ok(sent?)
}

#[tokio::test]
async fn files_arrive_byte_identical_around_chunk_boundaries() -> Result<()> {
    let (bob, mut carol) = connected_pair("sizes", Duration::from_secs(30)).await?;

    for size in [0, 1, CHUNK_SIZE - 1, CHUNK_SIZE, CHUNK_SIZE + 1, 1024 * 1024 + 1] {
        let name = format!("size-{size}.bin");
        let src = bob.dir.join(&name);
        let data = pattern(size);
        std::fs::write(&src, &data)?;

        let outcome = offer(&bob, &mut carol, &src, true).await?;
        assert_eq!(outcome, FileSendOutcome::Completed { bytes: size as u64 });

        wait_for_status(&mut carol.events, &format!("File received: {name}")).await?;
        let received = std::fs::read(carol.dir.join(&name))
            .with_context(|| format!("{name} missing at receiver"))?;
        assert_eq!(received.len(), size, "{name}: length");
        assert!(received == data, "{name}: content differs");
        assert!(!carol.ctx.pending().is_pending());
    }

    bob.shutdown().await;
    carol.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn rejected_offer_writes_nothing() -> Result<()> {
    let (mut bob, mut carol) = connected_pair("reject", Duration::from_secs(30)).await?;
    let src = bob.dir.join("unwanted.txt");
    std::fs::write(&src, b"no thanks")?;

    let outcome = offer(&bob, &mut carol, &src, false).await?;
    assert_eq!(outcome, FileSendOutcome::Rejected);
    wait_for_status(&mut bob.events, "carol rejected file").await?;
    wait_for_status(&mut carol.events, "File transfer rejected").await?;
    assert!(!carol.dir.join("unwanted.txt").exists());

    bob.shutdown().await;
    carol.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn undecided_offer_times_out_as_rejection() -> Result<()> {
    let (mut bob, mut carol) = connected_pair("timeout", Duration::from_millis(500)).await?;
    let src = bob.dir.join("ignored.txt");
    std::fs::write(&src, b"hello?")?;

    let started = tokio::time::Instant::now();
    let outcome = lumed::send_file(&bob.ctx, bob.index_of("carol")?, &src).await?;
    assert_eq!(outcome, FileSendOutcome::Rejected);
    assert!(started.elapsed() >= Duration::from_millis(500));

    wait_for_status(&mut carol.events, "File transfer from bob timed out").await?;
    assert!(!carol.ctx.pending().is_pending());
    assert!(!carol.dir.join("ignored.txt").exists());

    // A late decision has nothing to act on.
    assert!(!carol.ctx.decide_pending_transfer(true));
    wait_for_status(&mut carol.events, "No pending file transfer").await?;
    wait_for_status(&mut bob.events, "carol rejected file").await?;

    bob.shutdown().await;
    carol.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn missing_source_file_is_reported() -> Result<()> {
    let (mut bob, carol) = connected_pair("missing", Duration::from_secs(30)).await?;
    let src = bob.dir.join("not-there.bin");

    let result = lumed::send_file(&bob.ctx, bob.index_of("carol")?, &src).await;
    assert!(matches!(result, Err(lumed::SendError::OpenFile { .. })));
    wait_for_status(&mut bob.events, "Failed to open file").await?;
    assert!(!carol.ctx.pending().is_pending());

    bob.shutdown().await;
    carol.shutdown().await;
    Ok(())
}
