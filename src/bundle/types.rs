//! Bundle types

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::TransferError;
use crate::storage::{ObjectReader, ObjectStore};

/// One object to place in a bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    /// Store key, or path relative to the base directory for local bundles
    pub key: String,

    /// Entry name inside the archive
    pub name: String,
}

impl BatchItem {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
        }
    }
}

/// Where bundle items are read from
#[derive(Clone)]
pub enum FetchSource {
    /// Objects in the remote store
    Remote(Arc<dyn ObjectStore>),
    /// Files under a local base directory
    Local(PathBuf),
}

impl fmt::Debug for FetchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchSource::Remote(_) => f.write_str("Remote"),
            FetchSource::Local(base) => f.debug_tuple("Local").field(base).finish(),
        }
    }
}

impl FetchSource {
    /// Open `key` for streaming reads
    pub async fn open(&self, key: &str) -> Result<ObjectReader, TransferError> {
        match self {
            FetchSource::Remote(store) => Ok(store.get(key).await?),
            FetchSource::Local(base) => {
                validate_local_key(key)?;
                let file = tokio::fs::File::open(base.join(key)).await?;
                Ok(Box::pin(file))
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FetchSource::Remote(_) => "remote",
            FetchSource::Local(_) => "local",
        }
    }
}

/// A fetched item whose stream is open and ready to be archived.
///
/// Dropping the entry closes the stream.
pub struct FetchedEntry {
    /// Position of the item in the caller's list
    pub index: usize,
    pub item: BatchItem,
    pub reader: ObjectReader,
}

impl fmt::Debug for FetchedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchedEntry")
            .field("index", &self.index)
            .field("item", &self.item)
            .finish_non_exhaustive()
    }
}

/// A finished bundle archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZipBundle {
    /// Location of the archive on disk
    pub archive_path: PathBuf,

    /// `downloads/<file name>`, relative to the base directory
    pub archive_name: String,
}

/// Reject local keys that could escape the base directory.
///
/// Rejects empty keys, absolute paths, `..` components and Windows prefixes.
pub fn validate_local_key(key: &str) -> Result<(), TransferError> {
    if key.is_empty() {
        return Err(TransferError::Configuration("empty local key".into()));
    }

    let path = Path::new(key);
    if path.is_absolute() {
        return Err(TransferError::Configuration(format!(
            "absolute path not allowed: {key}"
        )));
    }

    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(TransferError::Configuration(format!(
                    "parent directory traversal not allowed: {key}"
                )));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(TransferError::Configuration(format!(
                    "absolute path not allowed: {key}"
                )));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_traversal_and_absolute_keys() {
        assert!(validate_local_key("").is_err());
        assert!(validate_local_key("../etc/passwd").is_err());
        assert!(validate_local_key("orders/../../escape").is_err());
        assert!(validate_local_key("/tmp/malicious").is_err());
    }

    #[test]
    fn accepts_relative_keys() {
        assert!(validate_local_key("invoice.pdf").is_ok());
        assert!(validate_local_key("orders/2024/invoice.pdf").is_ok());
        assert!(validate_local_key("./invoice.pdf").is_ok());
    }

    #[test]
    fn batch_item_wire_shape() {
        let item: BatchItem =
            serde_json::from_str(r#"{"key":"orders/1.pdf","name":"Order 1.pdf"}"#).unwrap();
        assert_eq!(item, BatchItem::new("orders/1.pdf", "Order 1.pdf"));
    }

    #[tokio::test]
    async fn local_source_opens_files_under_base() {
        use tokio::io::AsyncReadExt;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"alpha").unwrap();
        let source = FetchSource::Local(dir.path().to_path_buf());

        let mut reader = source.open("a.txt").await.unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "alpha");

        let err = match source.open("missing.txt").await {
            Err(e) => e,
            Ok(_) => panic!("expected error"),
        };
        assert!(err.is_not_found());
        assert!(source.open("../a.txt").await.is_err());
    }
}
