//! Test helpers: in-memory object stores and a recording notifier

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, ReadBuf};

use orderbox_server::config::{Config, TransferConfig};
use orderbox_server::error::StorageError;
use orderbox_server::notify::{NotifyError, OrderNotifier};
use orderbox_server::service::TransferService;
use orderbox_server::storage::{ObjectReader, ObjectStore};

// ============================================================================
// MemoryStore
// ============================================================================

/// Object store backed by a map
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, body: impl Into<Vec<u8>>) {
        self.objects.lock().unwrap().insert(key.to_string(), body.into());
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_file(&self, key: &str, source: &Path) -> Result<u64, StorageError> {
        let body = tokio::fs::read(source).await?;
        let len = body.len() as u64;
        self.insert(key, body);
        Ok(len)
    }

    async fn get(&self, key: &str) -> Result<ObjectReader, StorageError> {
        let body = self
            .object(key)
            .ok_or_else(|| StorageError::ObjectNotFound(key.to_string()))?;
        Ok(Box::pin(Cursor::new(body)))
    }

    async fn presign(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        Ok(format!("memory://{}?expires={}", key, ttl.as_secs()))
    }
}

// ============================================================================
// CorruptingStore
// ============================================================================

/// Stores faithfully but returns altered bytes on read
#[derive(Default)]
pub struct CorruptingStore {
    inner: MemoryStore,
}

#[async_trait]
impl ObjectStore for CorruptingStore {
    async fn put_file(&self, key: &str, source: &Path) -> Result<u64, StorageError> {
        self.inner.put_file(key, source).await
    }

    async fn get(&self, key: &str) -> Result<ObjectReader, StorageError> {
        let mut body = self
            .inner
            .object(key)
            .ok_or_else(|| StorageError::ObjectNotFound(key.to_string()))?;
        match body.first_mut() {
            Some(byte) => *byte ^= 0xFF,
            None => body.push(0),
        }
        Ok(Box::pin(Cursor::new(body)))
    }

    async fn presign(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        self.inner.presign(key, ttl).await
    }
}

// ============================================================================
// BrokenReadStore
// ============================================================================

/// Accepts uploads but every read fails after a few bytes
#[derive(Default)]
pub struct BrokenReadStore {
    inner: MemoryStore,
}

struct BrokenReader {
    sent: bool,
}

impl AsyncRead for BrokenReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        if !self.sent {
            self.sent = true;
            buf.put_slice(b"part");
            return Poll::Ready(Ok(()));
        }
        Poll::Ready(Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset",
        )))
    }
}

#[async_trait]
impl ObjectStore for BrokenReadStore {
    async fn put_file(&self, key: &str, source: &Path) -> Result<u64, StorageError> {
        self.inner.put_file(key, source).await
    }

    async fn get(&self, _key: &str) -> Result<ObjectReader, StorageError> {
        Ok(Box::pin(BrokenReader { sent: false }))
    }

    async fn presign(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        self.inner.presign(key, ttl).await
    }
}

// ============================================================================
// CountingStore
// ============================================================================

/// Tracks how many fetches are in flight or holding an open stream
pub struct CountingStore {
    inner: MemoryStore,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
    requested: Mutex<Vec<String>>,
    failing: HashSet<String>,
    delay: Duration,
    slow: HashMap<String, Duration>,
}

/// One unit of `active`, released on drop
struct Slot {
    active: Arc<AtomicUsize>,
}

impl Slot {
    fn acquire(active: &Arc<AtomicUsize>, max_active: &AtomicUsize) -> Self {
        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
        max_active.fetch_max(now, Ordering::SeqCst);
        Self {
            active: active.clone(),
        }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

struct CountingReader {
    inner: Cursor<Vec<u8>>,
    _slot: Slot,
}

impl AsyncRead for CountingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl CountingStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryStore::new(),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
            requested: Mutex::new(Vec::new()),
            failing: HashSet::new(),
            delay,
            slow: HashMap::new(),
        }
    }

    /// Use `delay` instead of the default for `key`
    pub fn slow_on(mut self, key: &str, delay: Duration) -> Self {
        self.slow.insert(key.to_string(), delay);
        self
    }

    pub fn failing_on(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }

    pub fn insert(&self, key: &str, body: impl Into<Vec<u8>>) {
        self.inner.insert(key, body);
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for CountingStore {
    async fn put_file(&self, key: &str, source: &Path) -> Result<u64, StorageError> {
        self.inner.put_file(key, source).await
    }

    async fn get(&self, key: &str) -> Result<ObjectReader, StorageError> {
        self.requested.lock().unwrap().push(key.to_string());
        let slot = Slot::acquire(&self.active, &self.max_active);

        let delay = self.slow.get(key).copied().unwrap_or(self.delay);
        tokio::time::sleep(delay).await;

        if self.failing.contains(key) {
            return Err(StorageError::ObjectNotFound(key.to_string()));
        }
        let body = self
            .inner
            .object(key)
            .ok_or_else(|| StorageError::ObjectNotFound(key.to_string()))?;

        Ok(Box::pin(CountingReader {
            inner: Cursor::new(body),
            _slot: slot,
        }))
    }

    async fn presign(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        self.inner.presign(key, ttl).await
    }
}

// ============================================================================
// RecordingNotifier
// ============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<(serde_json::Value, String)>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn calls(&self) -> Vec<(serde_json::Value, String)> {
        self.calls.lock().unwrap().clone()
    }

    /// Wait until at least `n` notifications arrived, or give up after a second
    pub async fn wait_for(&self, n: usize) -> bool {
        for _ in 0..100 {
            if self.calls.lock().unwrap().len() >= n {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

#[async_trait]
impl OrderNotifier for RecordingNotifier {
    async fn notify(&self, update: &serde_json::Value, session_id: &str) -> Result<(), NotifyError> {
        self.calls
            .lock()
            .unwrap()
            .push((update.clone(), session_id.to_string()));
        if self.fail {
            return Err(NotifyError::Rejected {
                status: 503,
                body: "order service unavailable".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn transfer_config(base_dir: &Path, concurrency_limit: usize) -> TransferConfig {
    TransferConfig {
        base_dir: base_dir.to_path_buf(),
        concurrency_limit,
        ..TransferConfig::default()
    }
}

pub fn app_config(base_dir: &Path) -> Config {
    let mut config = Config::default();
    config.transfer = transfer_config(base_dir, 10);
    config
}

pub fn service(
    base_dir: &Path,
    store: Arc<dyn ObjectStore>,
    notifier: Arc<dyn OrderNotifier>,
) -> TransferService {
    TransferService::new(transfer_config(base_dir, 10), store, notifier).unwrap()
}

/// Files in `dir` whose name ends with `suffix`
pub fn files_with_suffix(dir: &Path, suffix: &str) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.to_string_lossy().ends_with(suffix))
        .collect()
}

pub fn write_file(dir: &Path, name: &str, body: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, body).unwrap();
    path
}
