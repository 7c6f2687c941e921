//! Verified transfers
//!
//! Upload → read back → compare digests. The read-back copy lives in a
//! transient `.downloaded` file next to the source; it is a
//! [`tempfile::NamedTempFile`], so it is removed when the upload scope ends
//! whatever the outcome (mismatch, I/O error, cancellation or timeout).

use std::path::Path;
use std::sync::Arc;

use tempfile::NamedTempFile;

use crate::error::TransferError;
use crate::storage::ObjectStore;

use super::checksum;
use super::types::{TransferRequest, TransferResult};

/// Suffix of the transient read-back file
pub const TRANSIENT_SUFFIX: &str = ".downloaded";

/// Uploads files and proves the stored bytes match the source
#[derive(Clone)]
pub struct VerifiedTransfer {
    store: Arc<dyn ObjectStore>,
}

impl VerifiedTransfer {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Upload `request.source_path` under `request.target_key` and verify it.
    ///
    /// Steps run strictly in order: digest the source, stream it into the
    /// store, stream the object back into a transient file while digesting it,
    /// compare.
    pub async fn upload(&self, request: &TransferRequest) -> Result<TransferResult, TransferError> {
        let key = request.target_key.as_str();
        let source = request.source_path.as_path();

        let expected = checksum::sha256_file(source).await?;

        let bytes = self.store.put_file(key, source).await?;
        tracing::debug!(key = %key, bytes, "Upload complete, verifying");

        let transient = transient_file_for(source)?;
        let actual = {
            let reader = self.store.get(key).await?;
            let mut file = tokio::fs::File::from_std(transient.as_file().try_clone()?);
            checksum::copy_with_checksum(reader, &mut file).await?
        };
        drop(transient);

        if expected != actual {
            tracing::error!(
                key = %key,
                expected = %expected,
                actual = %actual,
                "Checksum mismatch: upload corrupted"
            );
            return Err(TransferError::ChecksumMismatch {
                key: key.to_string(),
                expected,
                actual,
            });
        }

        tracing::info!(key = %key, sha256 = %expected, bytes, "File uploaded and verified");
        Ok(TransferResult::verified(key, expected))
    }

    /// Stream `remote_key` into `target`, returning the digest of the written bytes.
    ///
    /// Bytes land in a sibling temp file that is renamed over `target` only
    /// once the object has been read completely.
    pub async fn download(&self, target: &Path, remote_key: &str) -> Result<String, TransferError> {
        let dir = parent_dir(target);
        let staging = tempfile::Builder::new()
            .prefix(".orderbox-")
            .suffix(".part")
            .tempfile_in(dir)?;

        let reader = self.store.get(remote_key).await?;
        let mut file = tokio::fs::File::from_std(staging.as_file().try_clone()?);
        let digest = checksum::copy_with_checksum(reader, &mut file).await?;
        file.sync_all().await?;
        drop(file);

        staging
            .persist(target)
            .map_err(|e| TransferError::Io(e.error))?;

        tracing::info!(key = %remote_key, target = %target.display(), sha256 = %digest, "File downloaded");
        Ok(digest)
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Create the transient read-back file beside `source`
fn transient_file_for(source: &Path) -> Result<NamedTempFile, TransferError> {
    let stem = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    let file = tempfile::Builder::new()
        .prefix(&format!(".{}.", stem))
        .suffix(TRANSIENT_SUFFIX)
        .tempfile_in(parent_dir(source))?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_file_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("invoice.pdf");
        std::fs::write(&source, b"pdf").unwrap();

        let transient = transient_file_for(&source).unwrap();
        let path = transient.path().to_path_buf();
        assert_eq!(path.parent(), Some(dir.path()));
        assert!(path.to_string_lossy().ends_with(TRANSIENT_SUFFIX));
        assert!(path.exists());

        drop(transient);
        assert!(!path.exists());
    }

    #[test]
    fn test_parent_dir_of_bare_name() {
        assert_eq!(parent_dir(Path::new("file.txt")), Path::new("."));
        assert_eq!(parent_dir(Path::new("/a/b.txt")), Path::new("/a"));
    }
}
