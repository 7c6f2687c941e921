//! Storage module for S3-compatible backends
//!
//! Supports Wasabi, MinIO, Cloudflare R2, Backblaze B2, and AWS S3.
//! Transfers and bundles talk to the [`ObjectStore`] trait so the S3 client
//! can be swapped for an in-memory store in tests.

mod s3_client;

use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::StorageError;

pub use s3_client::S3Client;

/// An open object body, read incrementally
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Streaming object store capability
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Stream a local file into the store under `key`, returning the bytes sent
    async fn put_file(&self, key: &str, source: &Path) -> Result<u64, StorageError>;

    /// Open an object for streaming reads
    async fn get(&self, key: &str) -> Result<ObjectReader, StorageError>;

    /// Create a time-limited download URL for `key`
    async fn presign(&self, key: &str, ttl: Duration) -> Result<String, StorageError>;
}
