//! Zip archive assembly
//!
//! Entries are deflated at level 9 and written in the order they are
//! appended. The zip writer is synchronous, so every write runs on the
//! blocking pool with the async entry stream bridged through
//! [`SyncIoBridge`]. Reads fail once the job token is cancelled, which ends
//! a blocking copy that nobody awaits anymore. Until
//! [`ArchiveAssembler::finish`] succeeds the output file is owned by a guard
//! that deletes it, so an aborted bundle never leaves a partial archive.
//! Entries are always written with zip64 support since object sizes are not
//! known up front.

use std::fs::File;
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::io::SyncIoBridge;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::TransferError;
use crate::storage::ObjectReader;

use super::types::FetchedEntry;

const COMPRESSION_LEVEL: i64 = 9;

/// Summary of a finished archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    pub entries: usize,
    /// Uncompressed bytes written across all entries
    pub bytes: u64,
}

/// Deletes the archive file on drop unless disarmed
struct PartialArchive {
    path: PathBuf,
    keep: bool,
}

impl Drop for PartialArchive {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed partial archive"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove partial archive"
            ),
        }
    }
}

/// Writes one zip archive to a new file
pub struct ArchiveAssembler {
    writer: Option<ZipWriter<File>>,
    guard: PartialArchive,
    options: SimpleFileOptions,
    entries: usize,
    bytes: u64,
}

impl ArchiveAssembler {
    /// Create the archive at `path`; fails if the file already exists
    pub async fn create(path: &Path) -> Result<Self, TransferError> {
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    TransferError::Archive(format!("{} already exists", path.display()))
                } else {
                    TransferError::Io(e)
                }
            })?;
        let file = file.into_std().await;

        Ok(Self {
            writer: Some(ZipWriter::new(file)),
            guard: PartialArchive {
                path: path.to_path_buf(),
                keep: false,
            },
            options: entry_options(),
            entries: 0,
            bytes: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.guard.path
    }

    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Stream `reader` into a new entry named `name`.
    ///
    /// Cancelling `cancel` makes the copy fail at its next read, even when
    /// this future has already been dropped. After an error the assembler is
    /// unusable and the file is deleted when it is dropped.
    pub async fn append(
        &mut self,
        name: &str,
        reader: ObjectReader,
        cancel: &CancellationToken,
    ) -> Result<u64, TransferError> {
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| TransferError::Archive("archive writer is unusable".to_string()))?;
        let options = self.options.clone();
        let entry_name = name.to_string();
        let mut source = SyncIoBridge::new(CancellableReader::new(reader, cancel));

        let (writer, written) = tokio::task::spawn_blocking(move || {
            let written = writer
                .start_file(entry_name.as_str(), options)
                .map_err(TransferError::from)
                .and_then(|()| std::io::copy(&mut source, &mut writer).map_err(TransferError::from));
            (writer, written)
        })
        .await
        .map_err(|e| TransferError::Archive(format!("archive writer task failed: {}", e)))?;

        let written = match written {
            Err(_) if cancel.is_cancelled() => return Err(TransferError::Cancelled),
            other => other?,
        };
        self.writer = Some(writer);
        self.entries += 1;
        self.bytes += written;
        tracing::trace!(entry = %name, bytes = written, "Archive entry written");
        Ok(written)
    }

    /// Write the central directory and keep the file
    pub async fn finish(mut self) -> Result<ArchiveSummary, TransferError> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| TransferError::Archive("archive writer is unusable".to_string()))?;

        tokio::task::spawn_blocking(move || -> Result<(), TransferError> {
            let mut file = writer.finish()?;
            file.flush()?;
            file.sync_all()?;
            Ok(())
        })
        .await
        .map_err(|e| TransferError::Archive(format!("archive writer task failed: {}", e)))??;

        self.guard.keep = true;
        Ok(ArchiveSummary {
            path: self.guard.path.clone(),
            entries: self.entries,
            bytes: self.bytes,
        })
    }

    /// Discard the archive and delete its file
    pub fn abort(self) {
        tracing::debug!(path = %self.guard.path.display(), "Aborting archive");
    }
}

/// Options for every entry: deflate at level 9, zip64 allowed
fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL))
        .large_file(true)
}

/// Entry source whose reads fail once the job is cancelled
struct CancellableReader {
    inner: ObjectReader,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl CancellableReader {
    fn new(inner: ObjectReader, cancel: &CancellationToken) -> Self {
        Self {
            inner,
            cancelled: Box::pin(cancel.clone().cancelled_owned()),
        }
    }
}

impl AsyncRead for CancellableReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        if self.cancelled.as_mut().poll(cx).is_ready() {
            return Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "archive job cancelled",
            )));
        }
        self.inner.as_mut().poll_read(cx, buf)
    }
}

/// Write every entry of `entries` into a new archive at `output_path`.
///
/// The first error from the stream or the writer aborts the archive; the
/// stream is dropped with it, which cancels any outstanding fetches.
/// `cancel` stops an entry copy in progress.
pub async fn assemble<S>(
    entries: S,
    output_path: &Path,
    cancel: &CancellationToken,
) -> Result<ArchiveSummary, TransferError>
where
    S: Stream<Item = Result<FetchedEntry, TransferError>> + Unpin,
{
    let mut entries = entries;
    let mut assembler = ArchiveAssembler::create(output_path).await?;

    while let Some(entry) = entries.next().await {
        let entry = entry?;
        assembler.append(&entry.item.name, entry.reader, cancel).await?;
    }
    drop(entries);

    let summary = assembler.finish().await?;
    tracing::info!(
        path = %summary.path.display(),
        entries = summary.entries,
        bytes = summary.bytes,
        "Archive complete"
    );
    Ok(summary)
}
