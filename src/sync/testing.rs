//! In-memory store whose snapshots are driven by the test.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::AppError;
use crate::store::{ContentStore, Document, DocumentPath, SnapshotStream};

type JsonMap = serde_json::Map<String, serde_json::Value>;
type Feed<T> = mpsc::Sender<Result<T, AppError>>;

#[derive(Default)]
pub(crate) struct ScriptedStore {
    collections: Mutex<HashMap<String, Vec<Document>>>,
    documents: Mutex<HashMap<DocumentPath, Document>>,
    collection_feeds: Mutex<HashMap<String, Vec<Feed<Vec<Document>>>>>,
    document_feeds: Mutex<HashMap<DocumentPath, Vec<Feed<Option<Document>>>>>,
    fail_subscribe: AtomicBool,
    fail_first_snapshot: AtomicBool,
    creates: AtomicUsize,
    upserts: Mutex<Vec<(DocumentPath, JsonMap)>>,
}

impl ScriptedStore {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn set_collection(&self, collection: &str, documents: Vec<Document>) {
        self.collections
            .lock()
            .unwrap()
            .insert(collection.to_string(), documents);
    }

    /// Replace the collection contents and push them to every subscriber.
    pub(crate) fn emit_collection(&self, collection: &str, documents: Vec<Document>) {
        self.set_collection(collection, documents.clone());
        if let Some(feeds) = self.collection_feeds.lock().unwrap().get(collection) {
            for feed in feeds {
                let _ = feed.try_send(Ok(documents.clone()));
            }
        }
    }

    pub(crate) fn emit_error(&self, collection: &str) {
        if let Some(feeds) = self.collection_feeds.lock().unwrap().get(collection) {
            for feed in feeds {
                let _ = feed.try_send(Err(AppError::Unavailable("listener failed".into())));
            }
        }
    }

    pub(crate) fn fail_next_subscribe(&self) {
        self.fail_subscribe.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_first_snapshot(&self) {
        self.fail_first_snapshot.store(true, Ordering::SeqCst);
    }

    pub(crate) fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub(crate) fn upserts(&self) -> Vec<(DocumentPath, JsonMap)> {
        self.upserts.lock().unwrap().clone()
    }

    fn check_subscribe(&self) -> Result<(), AppError> {
        if self.fail_subscribe.swap(false, Ordering::SeqCst) {
            return Err(AppError::Unavailable("store offline".into()));
        }
        Ok(())
    }

    fn first<T>(&self, value: T) -> Result<T, AppError> {
        if self.fail_first_snapshot.swap(false, Ordering::SeqCst) {
            return Err(AppError::Database("permission denied".into()));
        }
        Ok(value)
    }
}

#[async_trait]
impl ContentStore for ScriptedStore {
    async fn subscribe_collection(
        &self,
        collection: &str,
        _order_by: Option<&str>,
    ) -> Result<SnapshotStream<Vec<Document>>, AppError> {
        self.check_subscribe()?;
        let (tx, rx) = mpsc::channel(16);
        let current = self
            .collections
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default();
        let _ = tx.try_send(self.first(current));
        self.collection_feeds
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .push(tx);
        Ok(SnapshotStream::new(rx, None))
    }

    async fn subscribe_document(
        &self,
        path: &DocumentPath,
    ) -> Result<SnapshotStream<Option<Document>>, AppError> {
        self.check_subscribe()?;
        let (tx, rx) = mpsc::channel(16);
        let current = self.documents.lock().unwrap().get(path).cloned();
        let _ = tx.try_send(self.first(current));
        self.document_feeds
            .lock()
            .unwrap()
            .entry(path.clone())
            .or_default()
            .push(tx);
        Ok(SnapshotStream::new(rx, None))
    }

    async fn read_document(&self, path: &DocumentPath) -> Result<Option<Document>, AppError> {
        Ok(self.documents.lock().unwrap().get(path).cloned())
    }

    async fn upsert_merge(&self, path: &DocumentPath, fields: JsonMap) -> Result<(), AppError> {
        self.upserts
            .lock()
            .unwrap()
            .push((path.clone(), fields.clone()));

        let merged = {
            let mut documents = self.documents.lock().unwrap();
            let doc = documents
                .entry(path.clone())
                .or_insert_with(|| Document::new(path.id.clone(), JsonMap::new()));
            doc.fields.extend(fields);
            doc.clone()
        };
        if let Some(feeds) = self.document_feeds.lock().unwrap().get(path) {
            for feed in feeds {
                let _ = feed.try_send(Ok(Some(merged.clone())));
            }
        }
        Ok(())
    }

    async fn create(&self, collection: &str, fields: JsonMap) -> Result<String, AppError> {
        let n = self.creates.fetch_add(1, Ordering::SeqCst);
        let id = format!("{}-{}", collection, n);
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .push(Document::new(id.clone(), fields));
        Ok(id)
    }

    async fn delete_document(&self, path: &DocumentPath) -> Result<(), AppError> {
        self.documents.lock().unwrap().remove(path);
        if let Some(docs) = self.collections.lock().unwrap().get_mut(&path.collection) {
            docs.retain(|d| d.id != path.id);
        }
        Ok(())
    }

    async fn revision_id(&self) -> Result<i64, AppError> {
        Ok(0)
    }
}
