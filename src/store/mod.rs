//! Content store abstraction.
//!
//! A subscribable document store: named collections of JSON records plus
//! addressable single documents. Subscriptions push the full current snapshot
//! on attach and again after every change.

mod sqlite;

pub use sqlite::SqliteContentStore;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::errors::AppError;

/// A stored record: the store-assigned id and its fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

/// Address of a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    pub collection: String,
    pub id: String,
}

impl DocumentPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Push-based feed of snapshots. Dropping it stops the producer.
pub struct SnapshotStream<T> {
    rx: mpsc::Receiver<Result<T, AppError>>,
    producer: Option<AbortHandle>,
}

impl<T> SnapshotStream<T> {
    pub fn new(rx: mpsc::Receiver<Result<T, AppError>>, producer: Option<AbortHandle>) -> Self {
        Self { rx, producer }
    }

    /// Next snapshot, or `None` once the store closed the feed.
    pub async fn next(&mut self) -> Option<Result<T, AppError>> {
        self.rx.recv().await
    }
}

impl<T> Drop for SnapshotStream<T> {
    fn drop(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
    }
}

/// Operations the synchronizer and gateway need from the backing store.
#[async_trait]
pub trait ContentStore: Send + Sync + 'static {
    /// Watch a whole collection, optionally sorted descending by `order_by`.
    async fn subscribe_collection(
        &self,
        collection: &str,
        order_by: Option<&str>,
    ) -> Result<SnapshotStream<Vec<Document>>, AppError>;

    /// Watch one document; `None` snapshots mean it does not exist.
    async fn subscribe_document(
        &self,
        path: &DocumentPath,
    ) -> Result<SnapshotStream<Option<Document>>, AppError>;

    async fn read_document(&self, path: &DocumentPath) -> Result<Option<Document>, AppError>;

    /// Write only the given fields, creating the document if needed.
    async fn upsert_merge(
        &self,
        path: &DocumentPath,
        fields: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), AppError>;

    /// Create a document and return its new id.
    async fn create(
        &self,
        collection: &str,
        fields: serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, AppError>;

    /// Delete a document. Missing documents are not an error.
    async fn delete_document(&self, path: &DocumentPath) -> Result<(), AppError>;

    /// Monotonic counter bumped by every write.
    async fn revision_id(&self) -> Result<i64, AppError>;
}
