//! Streaming SHA-256
//!
//! [`ChecksumReader`] hashes bytes as the consumer pulls them through, so a
//! file or object body is digested in the same pass that moves it.

use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};

use crate::error::TransferError;

/// Pass-through reader that digests everything read from it
pub struct ChecksumReader<R> {
    inner: R,
    hasher: Sha256,
    bytes: u64,
    eof: bool,
    failed: bool,
}

impl<R: AsyncRead + Unpin> ChecksumReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            bytes: 0,
            eof: false,
            failed: false,
        }
    }

    /// Bytes passed through so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes
    }

    /// Hex digest of the whole source.
    ///
    /// Only available once the source has been drained to EOF without a read
    /// error; a partially read stream never yields a digest.
    pub fn finish(self) -> Result<String, TransferError> {
        if self.failed {
            return Err(TransferError::Io(io::Error::new(
                io::ErrorKind::Other,
                "source failed before the digest was complete",
            )));
        }
        if !self.eof {
            return Err(TransferError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("source not drained after {} bytes", self.bytes),
            )));
        }
        Ok(hex::encode(self.hasher.finalize()))
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ChecksumReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let had_room = buf.remaining() > 0;

        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let chunk = &buf.filled()[before..];
                if chunk.is_empty() {
                    if had_room {
                        this.eof = true;
                    }
                } else {
                    this.hasher.update(chunk);
                    this.bytes += chunk.len() as u64;
                }
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Err(e)) => {
                this.failed = true;
                Poll::Ready(Err(e))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Drain `reader` and return its hex digest
pub async fn sha256_reader<R: AsyncRead + Unpin>(reader: R) -> Result<String, TransferError> {
    let mut reader = ChecksumReader::new(reader);
    tokio::io::copy(&mut reader, &mut tokio::io::sink()).await?;
    reader.finish()
}

/// Hex digest of a local file, read in bounded chunks
pub async fn sha256_file(path: &Path) -> Result<String, TransferError> {
    let file = tokio::fs::File::open(path).await?;
    sha256_reader(file).await
}

/// Copy `reader` into `writer`, returning the digest of the copied bytes
pub async fn copy_with_checksum<R, W>(reader: R, writer: &mut W) -> Result<String, TransferError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = ChecksumReader::new(reader);
    tokio::io::copy(&mut reader, writer).await?;
    writer.flush().await?;
    reader.finish()
}

/// Hex digest of an in-memory buffer
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
