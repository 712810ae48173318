//! Outbound senders.
//!
//! Each send opens a fresh TCP connection to the peer, drives one exchange
//! and closes it. Failures are reported through the status stream and
//! returned; nothing is retried.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;

use lume_core::wire::CHUNK_SIZE;
use lume_core::{Envelope, FileMetadata, MessageType, NameError, PeerName, WireFilename};
use lume_services::{LumeContext, Peer};

use crate::framing::{read_envelope, read_full, write_message, FrameError};

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("no peer at index {0}")]
    NoSuchPeer(usize),

    #[error("failed to connect to {peer}: {source}")]
    Connect {
        peer: PeerName,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out connecting to {0}")]
    ConnectTimeout(PeerName),

    #[error("failed to open file {}: {source}", path.display())]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file name cannot be sent: {0}")]
    FileName(#[from] NameError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("{0} closed the connection without answering")]
    NoReply(PeerName),

    #[error("{0} did not answer the file offer in time")]
    ReplyTimeout(PeerName),

    #[error("invalid response from {peer}: {got:?}")]
    InvalidResponse { peer: PeerName, got: MessageType },
}

/// How a file offer ended on the sending side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSendOutcome {
    Completed { bytes: u64 },
    Rejected,
}

/// Send `text` to the peer at registry `index`.
pub async fn send_text(ctx: &LumeContext, index: usize, text: &str) -> Result<(), SendError> {
    let peer = resolve(ctx, index)?;
    send_text_to(ctx, &peer, text).await
}

/// Offer the file at `path` to the peer at registry `index` and stream it
/// if accepted.
pub async fn send_file(
    ctx: &LumeContext,
    index: usize,
    path: &Path,
) -> Result<FileSendOutcome, SendError> {
    let peer = resolve(ctx, index)?;
    send_file_to(ctx, &peer, path).await
}

fn resolve(ctx: &LumeContext, index: usize) -> Result<Peer, SendError> {
    ctx.registry().lookup_by_index(index).ok_or_else(|| {
        ctx.status("No peer selected");
        SendError::NoSuchPeer(index)
    })
}

pub async fn send_text_to(ctx: &LumeContext, peer: &Peer, text: &str) -> Result<(), SendError> {
    let result = async {
        let mut stream = connect(ctx, peer).await?;
        let envelope = Envelope::new(MessageType::Text, &ctx.identity().name, text.len() as u64);
        write_message(&mut stream, &envelope, text.as_bytes()).await?;
        stream.shutdown().await?;
        Ok::<(), SendError>(())
    }
    .await;

    match &result {
        Ok(()) => {
            tracing::debug!(peer = %peer.name, len = text.len(), "text sent");
            ctx.status(format!("Me -> {}: {text}", peer.name));
        }
        Err(e) => report(ctx, peer, e, "message"),
    }
    result
}

pub async fn send_file_to(
    ctx: &LumeContext,
    peer: &Peer,
    path: &Path,
) -> Result<FileSendOutcome, SendError> {
    let result = offer_and_stream(ctx, peer, path).await;
    match &result {
        Ok(FileSendOutcome::Completed { bytes }) => {
            tracing::info!(peer = %peer.name, path = %path.display(), bytes, "file sent");
            ctx.status(format!("Sent file {} to {}", path.display(), peer.name));
        }
        Ok(FileSendOutcome::Rejected) => {
            tracing::info!(peer = %peer.name, path = %path.display(), "file rejected by peer");
            ctx.status(format!("{} rejected file {}", peer.name, path.display()));
        }
        Err(e) => report(ctx, peer, e, "file"),
    }
    result
}

async fn offer_and_stream(
    ctx: &LumeContext,
    peer: &Peer,
    path: &Path,
) -> Result<FileSendOutcome, SendError> {
    // The file is checked before any network traffic.
    let file = File::open(path).await.map_err(|source| SendError::OpenFile {
        path: path.to_path_buf(),
        source,
    })?;
    let size = file.metadata().await?.len();
    let meta = FileMetadata {
        filename: WireFilename::truncated(&path.to_string_lossy())?,
        file_size: size,
    };

    let mut stream = connect(ctx, peer).await?;
    let name = &ctx.identity().name;
    let envelope = Envelope::new(MessageType::FileMetadata, name, FileMetadata::WIRE_SIZE as u64);
    write_message(&mut stream, &envelope, &meta.encode()).await?;

    tracing::debug!(peer = %peer.name, size, "file offered, awaiting reply");
    let reply = match ctx.settings().reply_timeout {
        Some(limit) => time::timeout(limit, read_envelope(&mut stream))
            .await
            .map_err(|_| SendError::ReplyTimeout(peer.name.clone()))??,
        None => read_envelope(&mut stream).await?,
    };
    let reply = reply.ok_or_else(|| SendError::NoReply(peer.name.clone()))?;

    match reply.msg_type {
        MessageType::FileAccept => {}
        MessageType::FileReject => return Ok(FileSendOutcome::Rejected),
        got => {
            return Err(SendError::InvalidResponse {
                peer: peer.name.clone(),
                got,
            })
        }
    }

    // Never send more than was announced, even if the file grew meanwhile.
    let mut reader = file.take(size);
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut sent = 0u64;
    loop {
        let n = read_full(&mut reader, &mut buf).await?;
        if n == 0 {
            break;
        }
        let chunk = Envelope::new(MessageType::FileChunk, name, n as u64);
        write_message(&mut stream, &chunk, &buf[..n]).await?;
        sent += n as u64;
        if n < CHUNK_SIZE {
            break;
        }
    }
    if sent < size {
        tracing::warn!(peer = %peer.name, sent, size, "file shrank while sending");
    }
    stream.shutdown().await?;
    Ok(FileSendOutcome::Completed { bytes: sent })
}

async fn connect(ctx: &LumeContext, peer: &Peer) -> Result<TcpStream, SendError> {
    let addr = peer.socket_addr();
    match time::timeout(ctx.settings().connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(SendError::Connect {
            peer: peer.name.clone(),
            source,
        }),
        Err(_) => Err(SendError::ConnectTimeout(peer.name.clone())),
    }
}

fn report(ctx: &LumeContext, peer: &Peer, err: &SendError, what: &str) {
    tracing::warn!(peer = %peer.name, error = %err, "{what} send failed");
    match err {
        SendError::Connect { .. } | SendError::ConnectTimeout(_) => {
            ctx.status(format!("Failed to connect to {}", peer.name));
        }
        SendError::OpenFile { path, .. } => {
            ctx.status(format!("Failed to open file: {}", path.display()));
        }
        other => ctx.status(format!("Failed to send {what} to {}: {other}", peer.name)),
    }
}
