//! Verified Transfer Module
//!
//! Implements uploads that prove integrity:
//! - SHA-256 of the source computed by streaming it once
//! - Streaming put into the object store
//! - Read-back of the stored object and digest comparison
//! - Transient read-back file removed on every outcome

pub mod checksum;
pub mod types;
pub mod verified;

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::TransferError;

pub use checksum::{ChecksumReader, sha256_bytes, sha256_file, sha256_reader};
pub use types::{TransferRequest, TransferResult, TransferStatus};
pub use verified::{VerifiedTransfer, TRANSIENT_SUFFIX};

/// Run `operation` until it finishes, `cancel` fires, or `timeout` elapses.
///
/// On cancellation or timeout the operation future is dropped, which releases
/// every scoped resource it holds (open streams, transient files).
pub async fn with_deadline<T, F>(
    cancel: &CancellationToken,
    timeout: Duration,
    operation: F,
) -> Result<T, TransferError>
where
    F: Future<Output = Result<T, TransferError>>,
{
    tokio::select! {
        _ = cancel.cancelled() => Err(TransferError::Cancelled),
        result = tokio::time::timeout(timeout, operation) => {
            result.map_err(|_| TransferError::Timeout(timeout))?
        }
    }
}
