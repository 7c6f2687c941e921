//! Transfer service
//!
//! The operations exposed to the HTTP layer. Each one runs under the
//! caller's cancellation token and the configured operation timeout; when
//! either fires, the in-progress work is dropped along with every stream and
//! temporary file it owns.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::bundle::{self, naming, BatchFetcher, BatchItem, FetchSource, ZipBundle};
use crate::config::TransferConfig;
use crate::error::TransferError;
use crate::notify::{self, OrderNotifier};
use crate::storage::ObjectStore;
use crate::transfer::{with_deadline, TransferRequest, TransferResult, VerifiedTransfer};

#[derive(Clone)]
pub struct TransferService {
    store: Arc<dyn ObjectStore>,
    notifier: Arc<dyn OrderNotifier>,
    transfer: VerifiedTransfer,
    config: TransferConfig,
}

impl TransferService {
    pub fn new(
        config: TransferConfig,
        store: Arc<dyn ObjectStore>,
        notifier: Arc<dyn OrderNotifier>,
    ) -> Result<Self, TransferError> {
        config.validate()?;
        Ok(Self {
            transfer: VerifiedTransfer::new(store.clone()),
            store,
            notifier,
            config,
        })
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Upload a local file and verify the stored copy
    pub async fn upload(
        &self,
        source_path: &Path,
        target_key: &str,
        cancel: &CancellationToken,
    ) -> Result<TransferResult, TransferError> {
        let request = TransferRequest::new(source_path, target_key);
        tracing::info!(
            source = %request.source_path.display(),
            key = %request.target_key,
            "Uploading file"
        );

        with_deadline(cancel, self.config.operation_timeout(), self.transfer.upload(&request)).await
    }

    /// Verified upload followed by a detached order notification.
    ///
    /// The notification is only sent once the upload has verified; its
    /// outcome never affects the returned result.
    pub async fn upload_and_notify(
        &self,
        source_path: &Path,
        target_key: &str,
        update: serde_json::Value,
        session_id: String,
        cancel: &CancellationToken,
    ) -> Result<TransferResult, TransferError> {
        let result = self.upload(source_path, target_key, cancel).await?;
        notify::spawn_notification(self.notifier.clone(), update, session_id);
        Ok(result)
    }

    /// Stream an object to a local path
    pub async fn download(
        &self,
        target: &Path,
        remote_key: &str,
        cancel: &CancellationToken,
    ) -> Result<(), TransferError> {
        with_deadline(
            cancel,
            self.config.operation_timeout(),
            self.transfer.download(target, remote_key),
        )
        .await?;
        Ok(())
    }

    /// Presigned GET URL for `remote_key`; `ttl` defaults to the configured lifetime
    pub async fn get_signed_url(
        &self,
        remote_key: &str,
        ttl: Option<Duration>,
    ) -> Result<String, TransferError> {
        let ttl = ttl.unwrap_or_else(|| self.config.signed_url_ttl());
        let url = self.store.presign(remote_key, ttl).await?;
        tracing::debug!(key = %remote_key, ttl_secs = ttl.as_secs(), "Presigned URL issued");
        Ok(url)
    }

    /// Bundle objects from the store into a zip under `downloads/`
    pub async fn download_zip_from_store(
        &self,
        items: Vec<BatchItem>,
        preferred_name: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ZipBundle, TransferError> {
        self.bundle(FetchSource::Remote(self.store.clone()), items, preferred_name, cancel)
            .await
    }

    /// Bundle files under the base directory into a zip under `downloads/`
    pub async fn download_zip_from_local(
        &self,
        items: Vec<BatchItem>,
        preferred_name: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ZipBundle, TransferError> {
        let source = FetchSource::Local(self.config.base_dir.clone());
        self.bundle(source, items, preferred_name, cancel).await
    }

    async fn bundle(
        &self,
        source: FetchSource,
        items: Vec<BatchItem>,
        preferred_name: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ZipBundle, TransferError> {
        bundle::check_entry_names(&items)?;
        let file_name = naming::resolve(preferred_name)?;
        let fetcher = BatchFetcher::new(source, self.config.concurrency_limit)?;

        let dir = self.config.ensure_downloads_dir().await?;
        let archive_path: PathBuf = dir.join(&file_name);

        let job_id = Uuid::new_v4();
        tracing::info!(
            job_id = %job_id,
            items = items.len(),
            archive = %archive_path.display(),
            "Building bundle"
        );

        let summary = with_deadline(cancel, self.config.operation_timeout(), async {
            // Cancelled when this future completes or is dropped on timeout
            let job = cancel.child_token();
            let _stop = job.clone().drop_guard();
            let entries = fetcher.fetch_all(items, &job);
            bundle::assemble(entries, &archive_path, &job).await
        })
        .await
        .map_err(|e| {
            tracing::error!(job_id = %job_id, error = %e, "Bundle failed");
            e
        })?;

        tracing::info!(job_id = %job_id, entries = summary.entries, "Bundle ready");
        Ok(ZipBundle {
            archive_path,
            archive_name: naming::archive_name(&file_name),
        })
    }
}
