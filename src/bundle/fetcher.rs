//! Bounded-concurrency batch fetcher
//!
//! Opens item streams with at most `limit` items fetching or fetched-but-not-
//! yet-consumed at any moment, and yields them in request order. Slots are
//! refilled only as the consumer pulls entries, so a slow archive writer
//! throttles the network side instead of piling up open streams.
//!
//! The first failure ends the batch as soon as it happens, not in request
//! order: the failing task cancels the batch, the stream yields that error
//! next, already opened streams are dropped, and no further item is started.

use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use futures::stream::{BoxStream, Stream, StreamExt};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::error::TransferError;

use super::types::{BatchItem, FetchSource, FetchedEntry};

/// Fetches batches of items from one source with a fixed concurrency cap
#[derive(Debug, Clone)]
pub struct BatchFetcher {
    source: FetchSource,
    limit: usize,
}

impl BatchFetcher {
    pub fn new(source: FetchSource, limit: usize) -> Result<Self, TransferError> {
        if limit == 0 {
            return Err(TransferError::Configuration(
                "concurrency limit must be at least 1".to_string(),
            ));
        }
        Ok(Self { source, limit })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Start fetching `items`, yielding open entries in input order.
    ///
    /// Cancelling `cancel` stops every outstanding fetch; dropping the
    /// returned stream does the same. A failure is reported as soon as it
    /// happens, even while earlier items are still being fetched.
    pub fn fetch_all(&self, items: Vec<BatchItem>, cancel: &CancellationToken) -> FetchStream {
        let batch = cancel.child_token();
        let guard = batch.clone().drop_guard();
        let failure = FirstFailure::default();
        let source = self.source.clone();
        let total = items.len();

        tracing::debug!(
            source = source.kind(),
            items = total,
            limit = self.limit,
            "Starting batch fetch"
        );

        let task_failure = failure.clone();
        let inner = futures::stream::iter(items.into_iter().enumerate())
            .map(move |(index, item)| {
                let key = item.key.clone();
                let handle = (!batch.is_cancelled()).then(|| {
                    tokio::spawn(fetch_one(
                        source.clone(),
                        index,
                        item,
                        batch.clone(),
                        task_failure.clone(),
                    ))
                });
                async move {
                    let Some(handle) = handle else {
                        return Err(TransferError::Cancelled);
                    };
                    match handle.await {
                        Ok(result) => result,
                        Err(e) => Err(TransferError::fetch(
                            key,
                            TransferError::Archive(format!("fetch task failed: {}", e)),
                        )),
                    }
                }
            })
            .buffered(self.limit)
            .boxed();

        FetchStream {
            inner: Some(inner),
            guard: Some(guard),
            failure,
        }
    }
}

/// First item failure of a batch, shared between fetch tasks and the stream
#[derive(Clone, Default)]
struct FirstFailure(Arc<Mutex<Option<TransferError>>>);

impl FirstFailure {
    fn record(&self, error: TransferError) {
        if let Ok(mut slot) = self.0.lock() {
            if slot.is_none() {
                *slot = Some(error);
            }
        }
    }

    fn take(&self) -> Option<TransferError> {
        self.0.lock().ok().and_then(|mut slot| slot.take())
    }
}

async fn fetch_one(
    source: FetchSource,
    index: usize,
    item: BatchItem,
    token: CancellationToken,
    failure: FirstFailure,
) -> Result<FetchedEntry, TransferError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(TransferError::Cancelled),
        opened = source.open(&item.key) => match opened {
            Ok(reader) => {
                tracing::trace!(key = %item.key, index, "Item opened");
                Ok(FetchedEntry { index, item, reader })
            }
            Err(e) => {
                tracing::debug!(key = %item.key, index, error = %e, "Item failed");
                failure.record(TransferError::fetch(item.key, e));
                token.cancel();
                Err(TransferError::Cancelled)
            }
        },
    }
}

/// Ordered stream of fetched entries; ends after the first error
pub struct FetchStream {
    inner: Option<BoxStream<'static, Result<FetchedEntry, TransferError>>>,
    guard: Option<DropGuard>,
    failure: FirstFailure,
}

impl FetchStream {
    fn close(&mut self, cancel: bool) {
        self.inner = None;
        if let Some(guard) = self.guard.take() {
            if cancel {
                drop(guard);
            } else {
                let _ = guard.disarm();
            }
        }
    }

    fn fail(&mut self, error: TransferError) -> Poll<Option<Result<FetchedEntry, TransferError>>> {
        tracing::warn!(error = %error, "Batch fetch failed, cancelling outstanding items");
        self.close(true);
        Poll::Ready(Some(Err(error)))
    }
}

impl Stream for FetchStream {
    type Item = Result<FetchedEntry, TransferError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.inner.is_none() {
            return Poll::Ready(None);
        }
        // A failed item wins over earlier items still in flight
        if let Some(error) = this.failure.take() {
            return this.fail(error);
        }
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        match inner.poll_next_unpin(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(None) => {
                this.close(false);
                Poll::Ready(None)
            }
            Poll::Ready(Some(Ok(entry))) => Poll::Ready(Some(Ok(entry))),
            Poll::Ready(Some(Err(e))) => {
                let error = this.failure.take().unwrap_or(e);
                this.fail(error)
            }
        }
    }
}
