//! Inbound session: one per accepted connection.
//!
//! Reads envelopes until the peer closes the stream and dispatches each by
//! type. A FILE_METADATA envelope drives the offer state machine:
//!
//! ```text
//! Idle → Offered → AwaitingDecision → Accepted → Transferring → Complete
//!                                   → Rejected
//!                                   → TimedOut
//! ```
//!
//! Every terminal state returns to Idle; the connection stays open for the
//! next envelope. Protocol violations end the session.

use std::net::SocketAddr;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter};

use lume_core::wire::{CHUNK_SIZE, MAX_TEXT_LEN};
use lume_core::{Envelope, FileMetadata, MessageType, PeerName};
use lume_services::{LumeContext, OfferOutcome};

use crate::framing::{read_envelope, read_payload, write_message, FrameError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("text payload of {0} bytes exceeds limit")]
    TextTooLarge(u64),

    #[error("file metadata payload must be {expected} bytes, got {got}")]
    MetadataLength { expected: usize, got: u64 },

    #[error("file chunk of {0} bytes exceeds chunk size")]
    ChunkTooLarge(u64),

    #[error("file chunk of {got} bytes overruns the {remaining} bytes still owed")]
    ChunkOverrun { got: u64, remaining: u64 },

    #[error("file chunk outside of a transfer")]
    UnexpectedChunk,

    #[error("expected {expected:?} during transfer, got {got:?}")]
    UnexpectedMessage { expected: MessageType, got: MessageType },

    #[error("{0:?} reply carries a {1} byte payload")]
    ReplyPayload(MessageType, u64),

    #[error("stream closed after {received} of {expected} file bytes")]
    TransferAborted { received: u64, expected: u64 },
}

/// Protocol state of one inbound connection.
pub struct Session<S> {
    ctx: LumeContext,
    stream: S,
    peer_addr: SocketAddr,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(ctx: LumeContext, stream: S, peer_addr: SocketAddr) -> Self {
        Self {
            ctx,
            stream,
            peer_addr,
        }
    }

    /// Serve the connection until the peer closes it or violates the protocol.
    pub async fn run(mut self) -> Result<(), SessionError> {
        tracing::debug!(peer = %self.peer_addr, "session started");
        while let Some(envelope) = read_envelope(&mut self.stream).await? {
            match envelope.msg_type {
                MessageType::Text => self.on_text(envelope).await?,
                MessageType::FileMetadata => self.on_file_offer(envelope).await?,
                MessageType::FileChunk => return Err(SessionError::UnexpectedChunk),
                MessageType::FileAccept | MessageType::FileReject => {
                    if envelope.payload_len != 0 {
                        return Err(SessionError::ReplyPayload(
                            envelope.msg_type,
                            envelope.payload_len,
                        ));
                    }
                    tracing::info!(
                        peer = %self.peer_addr,
                        from = %envelope.sender,
                        msg_type = ?envelope.msg_type,
                        "ignoring unsolicited reply"
                    );
                }
            }
        }
        tracing::debug!(peer = %self.peer_addr, "session closed by peer");
        Ok(())
    }

    async fn on_text(&mut self, envelope: Envelope) -> Result<(), SessionError> {
        if envelope.payload_len > MAX_TEXT_LEN {
            return Err(SessionError::TextTooLarge(envelope.payload_len));
        }
        let body = read_payload(&mut self.stream, envelope.payload_len as usize).await?;
        let body = String::from_utf8_lossy(&body);
        tracing::debug!(from = %envelope.sender, len = body.len(), "text received");
        self.ctx.events().on_chat_message(&envelope.sender, &body);
        Ok(())
    }

    async fn on_file_offer(&mut self, envelope: Envelope) -> Result<(), SessionError> {
        if envelope.payload_len != FileMetadata::WIRE_SIZE as u64 {
            return Err(SessionError::MetadataLength {
                expected: FileMetadata::WIRE_SIZE,
                got: envelope.payload_len,
            });
        }
        let payload = read_payload(&mut self.stream, FileMetadata::WIRE_SIZE).await?;
        let meta = FileMetadata::decode(&payload).map_err(FrameError::from)?;
        let sender = envelope.sender;
        let filename = meta.filename.basename().to_string();
        let size = meta.file_size;

        tracing::info!(from = %sender, %filename, size, "file offered");

        if !is_storable_name(&filename) {
            self.ctx.status(format!(
                "Rejected file from {sender}: invalid file name \"{}\"",
                meta.filename
            ));
            return self.reply(MessageType::FileReject).await;
        }

        // Offered: claim the single pending slot.
        let offer = match self
            .ctx
            .pending()
            .offer(sender.clone(), filename.clone(), size, self.peer_addr)
        {
            Ok(offer) => offer,
            Err(busy) => {
                tracing::info!(
                    from = %sender,
                    pending_from = %busy.current.sender,
                    "another offer is pending, rejecting"
                );
                self.ctx.status(format!(
                    "Rejected file {filename} from {sender}: another transfer is pending"
                ));
                return self.reply(MessageType::FileReject).await;
            }
        };
        self.ctx.events().on_file_offer(&sender, &filename, size);

        // AwaitingDecision: the slot is empty again once this returns.
        match offer.wait(self.ctx.settings().offer_timeout).await {
            OfferOutcome::Accepted => {}
            OfferOutcome::Rejected => {
                tracing::info!(from = %sender, %filename, "file offer rejected");
                return self.reply(MessageType::FileReject).await;
            }
            OfferOutcome::TimedOut => {
                tracing::info!(from = %sender, %filename, "file offer timed out");
                self.ctx
                    .status(format!("File transfer from {sender} timed out: {filename}"));
                return self.reply(MessageType::FileReject).await;
            }
        }

        let path = self.ctx.settings().download_dir.join(&filename);
        let file = match File::create(&path).await {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot create file");
                self.ctx
                    .status(format!("Failed to create file: {}", path.display()));
                return self.reply(MessageType::FileReject).await;
            }
        };
        self.reply(MessageType::FileAccept).await?;
        self.receive_file(file, &path, &filename, size, &sender).await
    }

    /// Transferring: append chunks until `size` bytes have arrived.
    async fn receive_file(
        &mut self,
        file: File,
        path: &Path,
        filename: &str,
        size: u64,
        sender: &PeerName,
    ) -> Result<(), SessionError> {
        let mut writer = BufWriter::new(file);
        let mut received = 0u64;
        let result = self.copy_chunks(&mut writer, size, &mut received).await;
        // Partial data stays on disk after an abort.
        let flushed = writer.flush().await;

        match result.and(flushed.map_err(SessionError::from)) {
            Ok(()) => {
                tracing::info!(from = %sender, path = %path.display(), bytes = received, "file received");
                self.ctx.status(format!("File received: {filename}"));
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    from = %sender,
                    path = %path.display(),
                    received,
                    expected = size,
                    error = %e,
                    "file transfer aborted"
                );
                self.ctx.status(format!(
                    "File transfer from {sender} aborted after {received} of {size} bytes"
                ));
                Err(e)
            }
        }
    }

    async fn copy_chunks<W>(
        &mut self,
        writer: &mut W,
        size: u64,
        received: &mut u64,
    ) -> Result<(), SessionError>
    where
        W: AsyncWrite + Unpin,
    {
        while *received < size {
            let envelope = read_envelope(&mut self.stream)
                .await?
                .ok_or(SessionError::TransferAborted {
                    received: *received,
                    expected: size,
                })?;
            if envelope.msg_type != MessageType::FileChunk {
                return Err(SessionError::UnexpectedMessage {
                    expected: MessageType::FileChunk,
                    got: envelope.msg_type,
                });
            }
            if envelope.payload_len > CHUNK_SIZE as u64 {
                return Err(SessionError::ChunkTooLarge(envelope.payload_len));
            }
            let remaining = size - *received;
            if envelope.payload_len > remaining {
                return Err(SessionError::ChunkOverrun {
                    got: envelope.payload_len,
                    remaining,
                });
            }
            let chunk = read_payload(&mut self.stream, envelope.payload_len as usize).await?;
            writer.write_all(&chunk).await?;
            *received += chunk.len() as u64;
        }
        Ok(())
    }

    async fn reply(&mut self, msg_type: MessageType) -> Result<(), SessionError> {
        let envelope = Envelope::new(msg_type, &self.ctx.identity().name, 0);
        write_message(&mut self.stream, &envelope, &[]).await?;
        Ok(())
    }
}

/// A received basename must name a plain file inside the download directory.
fn is_storable_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('\\')
}
