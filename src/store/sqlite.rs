//! SQLite-backed content store.

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use super::{ContentStore, Document, DocumentPath, SnapshotStream};
use crate::db::Repository;
use crate::errors::AppError;

/// Snapshots buffered per subscription before the producer waits on the consumer.
const SNAPSHOT_BUFFER: usize = 8;

#[derive(Clone)]
pub struct SqliteContentStore {
    repo: Repository,
}

impl SqliteContentStore {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Spawn a producer that runs `query` now and after every change to `collection`.
    fn pump<T, F, Fut>(&self, collection: String, query: F) -> SnapshotStream<T>
    where
        T: Send + 'static,
        F: Fn(Repository) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<T, AppError>> + Send,
    {
        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        // Subscribe before the first read so no change slips between the two.
        let mut changes = self.repo.changes();
        let repo = self.repo.clone();

        let task = tokio::spawn(async move {
            if tx.send(query(repo.clone()).await).await.is_err() {
                return;
            }
            loop {
                match changes.recv().await {
                    Ok(changed) if changed != collection => continue,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(
                            "Change feed lagged by {} events for {}, re-reading",
                            skipped,
                            collection
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
                if tx.send(query(repo.clone()).await).await.is_err() {
                    break;
                }
            }
            tracing::debug!("Snapshot producer for {} stopped", collection);
        });

        SnapshotStream::new(rx, Some(task.abort_handle()))
    }
}

#[async_trait]
impl ContentStore for SqliteContentStore {
    async fn subscribe_collection(
        &self,
        collection: &str,
        order_by: Option<&str>,
    ) -> Result<SnapshotStream<Vec<Document>>, AppError> {
        let name = collection.to_string();
        let order_by = order_by.map(str::to_string);
        Ok(self.pump(collection.to_string(), move |repo| {
            let name = name.clone();
            let order_by = order_by.clone();
            async move { repo.list_documents(&name, order_by.as_deref()).await }
        }))
    }

    async fn subscribe_document(
        &self,
        path: &DocumentPath,
    ) -> Result<SnapshotStream<Option<Document>>, AppError> {
        let path = path.clone();
        Ok(self.pump(path.collection.clone(), move |repo| {
            let path = path.clone();
            async move { repo.get_document(&path.collection, &path.id).await }
        }))
    }

    async fn read_document(&self, path: &DocumentPath) -> Result<Option<Document>, AppError> {
        self.repo.get_document(&path.collection, &path.id).await
    }

    async fn upsert_merge(
        &self,
        path: &DocumentPath,
        fields: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), AppError> {
        self.repo
            .merge_document(&path.collection, &path.id, &fields)
            .await
    }

    async fn create(
        &self,
        collection: &str,
        fields: serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, AppError> {
        self.repo.insert_document(collection, &fields).await
    }

    async fn delete_document(&self, path: &DocumentPath) -> Result<(), AppError> {
        let removed = self.repo.delete_document(&path.collection, &path.id).await?;
        if !removed {
            tracing::debug!("Delete of missing document {} ignored", path);
        }
        Ok(())
    }

    async fn revision_id(&self) -> Result<i64, AppError> {
        self.repo.get_revision_id().await
    }
}
