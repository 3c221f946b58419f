//! Per-product status persistence and the status state machine helpers

use crate::{
    error::{HarmonizeError, Result},
    types::{ProcessedImage, ProcessingRecord, ProcessingStatus, Product},
};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// External key-value store holding one `ProcessingRecord` per product
///
/// No transactional guarantees: records are read and overwritten whole, last
/// write wins.
#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn get(&self, product_id: &str) -> Result<Option<ProcessingRecord>>;

    async fn set(&self, product_id: &str, record: ProcessingRecord) -> Result<()>;
}

#[async_trait]
impl<T: StatusStore + ?Sized> StatusStore for Arc<T> {
    async fn get(&self, product_id: &str) -> Result<Option<ProcessingRecord>> {
        (**self).get(product_id).await
    }

    async fn set(&self, product_id: &str, record: ProcessingRecord) -> Result<()> {
        (**self).set(product_id, record).await
    }
}

/// Process-local store, used for dry runs and tests
#[derive(Debug, Default)]
pub struct InMemoryStatusStore {
    records: RwLock<HashMap<String, ProcessingRecord>>,
}

impl InMemoryStatusStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored record
    pub async fn snapshot(&self) -> HashMap<String, ProcessingRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn get(&self, product_id: &str) -> Result<Option<ProcessingRecord>> {
        Ok(self.records.read().await.get(product_id).cloned())
    }

    async fn set(&self, product_id: &str, record: ProcessingRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert(product_id.to_string(), record);
        Ok(())
    }
}

/// Records persisted as one JSON object keyed by product id
///
/// Every `set` rewrites the whole file through a temporary sibling and a
/// rename, serialized by an in-process lock.
#[derive(Debug)]
pub struct JsonFileStatusStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStatusStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, ProcessingRecord>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                HarmonizeError::status_store(format!(
                    "Corrupt status file '{}': {}",
                    self.path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(HarmonizeError::file_io_error("read status file", &self.path, &e)),
        }
    }
}

#[async_trait]
impl StatusStore for JsonFileStatusStore {
    async fn get(&self, product_id: &str) -> Result<Option<ProcessingRecord>> {
        Ok(self.load().await?.remove(product_id))
    }

    async fn set(&self, product_id: &str, record: ProcessingRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.load().await?;
        records.insert(product_id.to_string(), record);
        let json = serde_json::to_vec_pretty(&records)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| HarmonizeError::file_io_error("create status directory", parent, &e))?;
        }

        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, &json)
            .await
            .map_err(|e| HarmonizeError::file_io_error("write status file", &staging, &e))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|e| HarmonizeError::file_io_error("replace status file", &self.path, &e))?;
        Ok(())
    }
}

/// Per-status counts over a product list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusStatistics {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub failed: usize,
    pub skipped: usize,
    pub pending: usize,
}

/// Status transitions over a `StatusStore`
#[derive(Clone)]
pub struct StatusTracker {
    store: Arc<dyn StatusStore>,
}

impl StatusTracker {
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn StatusStore> {
        &self.store
    }

    pub async fn record(&self, product_id: &str) -> Result<Option<ProcessingRecord>> {
        self.store.get(product_id).await
    }

    /// Current status; a missing record reads as `Pending`
    pub async fn status(&self, product_id: &str) -> Result<ProcessingStatus> {
        Ok(self
            .store
            .get(product_id)
            .await?
            .map_or(ProcessingStatus::Pending, |record| record.status))
    }

    /// Whether a product should be picked up by the next batch
    ///
    /// Products whose record cannot be read are retried.
    pub async fn needs_processing(&self, product_id: &str) -> bool {
        match self.store.get(product_id).await {
            Ok(Some(record)) => record.status.needs_processing(),
            Ok(None) => true,
            Err(e) => {
                warn!(product_id, error = %e, "Failed to read status, including product");
                true
            },
        }
    }

    pub async fn mark_in_progress(&self, product_id: &str, title: &str) -> Result<()> {
        self.store
            .set(product_id, ProcessingRecord::in_progress(title))
            .await
    }

    pub async fn mark_completed(
        &self,
        product_id: &str,
        title: &str,
        processed_images: Vec<ProcessedImage>,
    ) -> Result<()> {
        info!(product_id, images = processed_images.len(), "Marking product as harmonized");
        self.store
            .set(product_id, ProcessingRecord::completed(title, processed_images))
            .await
    }

    pub async fn mark_completed_without_images(&self, product_id: &str, title: &str) -> Result<()> {
        self.store
            .set(product_id, ProcessingRecord::completed_without_images(title))
            .await
    }

    pub async fn mark_failed(&self, product_id: &str, title: &str, error: &str) -> Result<()> {
        warn!(product_id, error, "Marking product as failed");
        self.store
            .set(product_id, ProcessingRecord::failed(title, error))
            .await
    }

    /// Operator action: exclude a product from future batches
    pub async fn mark_skipped(&self, product_id: &str, title: &str, reason: &str) -> Result<()> {
        info!(product_id, reason, "Marking product as skipped");
        self.store
            .set(product_id, ProcessingRecord::skipped(title, reason))
            .await
    }

    /// Operator action: make a product eligible again
    pub async fn reset(&self, product_id: &str) -> Result<()> {
        info!(product_id, "Resetting product status");
        self.store.set(product_id, ProcessingRecord::reset()).await
    }

    /// Count products per status; unreadable records count as pending
    pub async fn statistics(&self, products: &[Product]) -> StatusStatistics {
        let mut stats = StatusStatistics {
            total: products.len(),
            ..StatusStatistics::default()
        };

        for product in products {
            let status = match self.store.get(&product.id).await {
                Ok(record) => record.map_or(ProcessingStatus::Pending, |r| r.status),
                Err(e) => {
                    warn!(product_id = %product.id, error = %e, "Failed to read status");
                    ProcessingStatus::Pending
                },
            };

            match status {
                ProcessingStatus::Completed => stats.completed += 1,
                ProcessingStatus::InProgress => stats.in_progress += 1,
                ProcessingStatus::Failed => stats.failed += 1,
                ProcessingStatus::Skipped => stats.skipped += 1,
                ProcessingStatus::Pending => stats.pending += 1,
            }
        }

        stats
    }

    /// Products currently in `status`; unreadable records are left out
    pub async fn products_by_status(
        &self,
        products: &[Product],
        status: ProcessingStatus,
    ) -> Vec<Product> {
        let mut matching = Vec::new();
        for product in products {
            match self.store.get(&product.id).await {
                Ok(record) => {
                    let current = record.map_or(ProcessingStatus::Pending, |r| r.status);
                    if current == status {
                        matching.push(product.clone());
                    }
                },
                Err(e) => warn!(product_id = %product.id, error = %e, "Failed to read status"),
            }
        }
        matching
    }
}

impl std::fmt::Debug for StatusTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusTracker").finish_non_exhaustive()
    }
}
