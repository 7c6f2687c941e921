//! Order notifications
//!
//! After a verified upload the order system is told about it out of band.
//! Delivery is fire-and-forget: the notification runs on its own task, its
//! failure is logged and never reaches the upload's caller.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Order service responded with {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Receiver of order updates
#[async_trait]
pub trait OrderNotifier: Send + Sync {
    async fn notify(&self, update: &serde_json::Value, session_id: &str) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderUpdate<'a> {
    session_id: &'a str,
    update: &'a serde_json::Value,
}

/// Posts updates as JSON to the order service
pub struct HttpOrderNotifier {
    client: reqwest::Client,
    url: String,
}

impl HttpOrderNotifier {
    pub fn new(url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl OrderNotifier for HttpOrderNotifier {
    async fn notify(&self, update: &serde_json::Value, session_id: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&OrderUpdate { session_id, update })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

/// Used when no order service is configured
pub struct LogOnlyNotifier;

#[async_trait]
impl OrderNotifier for LogOnlyNotifier {
    async fn notify(&self, update: &serde_json::Value, session_id: &str) -> Result<(), NotifyError> {
        tracing::info!(session_id = %session_id, update = %update, "Order update (no order service configured)");
        Ok(())
    }
}

/// Build the notifier for an optional order service URL
pub fn from_url(url: Option<&str>) -> Arc<dyn OrderNotifier> {
    match url {
        Some(url) => Arc::new(HttpOrderNotifier::new(url)),
        None => Arc::new(LogOnlyNotifier),
    }
}

/// Deliver `update` on a detached task.
///
/// The handle is only useful to tests; callers normally drop it.
pub fn spawn_notification(
    notifier: Arc<dyn OrderNotifier>,
    update: serde_json::Value,
    session_id: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(session_id = %session_id, "Updating order");
        match notifier.notify(&update, &session_id).await {
            Ok(()) => tracing::info!(session_id = %session_id, "Order updated"),
            Err(e) => tracing::error!(session_id = %session_id, error = %e, "Order update failed"),
        }
    })
}
