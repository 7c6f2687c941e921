//! Transfer types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A local file to be uploaded under a store key
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub source_path: PathBuf,
    pub target_key: String,
}

impl TransferRequest {
    pub fn new(source_path: impl Into<PathBuf>, target_key: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            target_key: target_key.into(),
        }
    }
}

/// Outcome of an upload whose stored bytes were read back and compared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    /// Store key; serialized as `fileName` for existing HTTP clients
    #[serde(rename = "fileName")]
    pub target_key: String,

    /// Hex SHA-256 of the uploaded bytes
    pub checksum: String,

    pub status: TransferStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Verified,
    Failed,
}

impl TransferResult {
    pub fn verified(target_key: impl Into<String>, checksum: impl Into<String>) -> Self {
        Self {
            target_key: target_key.into(),
            checksum: checksum.into(),
            status: TransferStatus::Verified,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.status == TransferStatus::Verified
    }
}
