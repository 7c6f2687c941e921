//! Application state management

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::TransferError;
use crate::notify::OrderNotifier;
use crate::service::TransferService;
use crate::storage::ObjectStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    service: TransferService,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn ObjectStore>,
        notifier: Arc<dyn OrderNotifier>,
    ) -> Result<Self, TransferError> {
        let service = TransferService::new(config.transfer.clone(), store, notifier)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                service,
                shutdown: CancellationToken::new(),
            }),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the transfer service
    pub fn service(&self) -> &TransferService {
        &self.inner.service
    }

    /// Token for one request; cancelled when the server shuts down
    pub fn request_token(&self) -> CancellationToken {
        self.inner.shutdown.child_token()
    }

    /// Cancel every in-flight transfer
    pub fn shutdown(&self) {
        tracing::info!("Cancelling in-flight transfers...");
        self.inner.shutdown.cancel();
    }
}
