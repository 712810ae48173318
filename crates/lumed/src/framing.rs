//! Envelope framing over a byte stream.
//!
//! Every message is a fixed-size [`Envelope`] followed by exactly
//! `payload_len` bytes. A stream that ends inside either part is a protocol
//! violation, not a short read to retry.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use lume_core::{Envelope, WireError};

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stream ended after {got} of {expected} bytes")]
    Truncated { expected: usize, got: usize },

    #[error("malformed frame: {0}")]
    Wire(#[from] WireError),
}

/// Read into `buf` until it is full or the stream ends. Returns the number of
/// bytes read.
pub(crate) async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Read the next envelope. `Ok(None)` means the peer closed the stream
/// cleanly between messages.
pub async fn read_envelope<R>(reader: &mut R) -> Result<Option<Envelope>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; Envelope::WIRE_SIZE];
    match read_full(reader, &mut buf).await? {
        0 => Ok(None),
        n if n < Envelope::WIRE_SIZE => Err(FrameError::Truncated {
            expected: Envelope::WIRE_SIZE,
            got: n,
        }),
        _ => Ok(Some(Envelope::decode(&buf)?)),
    }
}

/// Read exactly `len` payload bytes.
pub async fn read_payload<R>(reader: &mut R, len: usize) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; len];
    let got = read_full(reader, &mut buf).await?;
    if got < len {
        return Err(FrameError::Truncated { expected: len, got });
    }
    Ok(buf)
}

/// Write one envelope and its payload.
pub async fn write_message<W>(
    writer: &mut W,
    envelope: &Envelope,
    payload: &[u8],
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    debug_assert_eq!(envelope.payload_len, payload.len() as u64);
    writer.write_all(&envelope.encode()).await?;
    if !payload.is_empty() {
        writer.write_all(payload).await?;
    }
    writer.flush().await
}
