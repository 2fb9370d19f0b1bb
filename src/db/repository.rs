//! Database repository for document and account operations.
//!
//! Every write bumps the global revision and announces the touched collection
//! on a broadcast channel, which is what drives live subscriptions.

use chrono::Utc;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tokio::sync::broadcast;

use crate::errors::AppError;
use crate::store::Document;

/// Capacity of the change feed. Lagging listeners re-query, so losing
/// individual events is harmless.
const CHANGE_FEED_CAPACITY: usize = 256;

type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
    changes: broadcast::Sender<String>,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { pool, changes }
    }

    /// Subscribe to the names of collections as they change.
    pub fn changes(&self) -> broadcast::Receiver<String> {
        self.changes.subscribe()
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }

    async fn increment_revision(tx: &mut Transaction<'_, Sqlite>) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
            .bind(&now)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    fn notify(&self, collection: &str) {
        // No receivers simply means nobody is subscribed right now.
        let _ = self.changes.send(collection.to_string());
    }

    // ==================== DOCUMENT OPERATIONS ====================

    /// List every document of a collection, optionally sorted descending by a field.
    pub async fn list_documents(
        &self,
        collection: &str,
        order_by: Option<&str>,
    ) -> Result<Vec<Document>, AppError> {
        let rows = match order_by {
            Some(field) => {
                let path = json_path(field)?;
                sqlx::query(
                    "SELECT id, data FROM documents WHERE collection = ? ORDER BY json_extract(data, ?) DESC, created_at DESC",
                )
                .bind(collection)
                .bind(path)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, data FROM documents WHERE collection = ? ORDER BY created_at, id",
                )
                .bind(collection)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows
            .iter()
            .filter_map(|row| match document_from_row(row) {
                Ok(doc) => Some(doc),
                Err(e) => {
                    tracing::warn!("Skipping unreadable document in {}: {}", collection, e);
                    None
                }
            })
            .collect())
    }

    /// Get a document by collection and ID.
    pub async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, AppError> {
        let row = sqlx::query("SELECT id, data FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(document_from_row).transpose()
    }

    /// Insert a new document and return its generated ID.
    pub async fn insert_document(&self, collection: &str, fields: &JsonMap) -> Result<String, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let data = serde_json::to_string(fields)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO documents (collection, id, data, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(collection)
        .bind(&id)
        .bind(&data)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        Self::increment_revision(&mut tx).await?;
        tx.commit().await?;

        self.notify(collection);
        Ok(id)
    }

    /// Merge `fields` into the document, creating it when absent.
    ///
    /// Only top-level fields named in `fields` are replaced.
    pub async fn merge_document(
        &self,
        collection: &str,
        id: &str,
        fields: &JsonMap,
    ) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        // Write first so the transaction takes the write lock before reading.
        // A read-then-write upgrade fails with SQLITE_BUSY under concurrent merges.
        Self::increment_revision(&mut tx).await?;

        let existing: Option<String> =
            sqlx::query_scalar("SELECT data FROM documents WHERE collection = ? AND id = ?")
                .bind(collection)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let mut merged: JsonMap = match existing {
            Some(data) => serde_json::from_str(&data)?,
            None => JsonMap::new(),
        };
        for (key, value) in fields {
            merged.insert(key.clone(), value.clone());
        }
        let data = serde_json::to_string(&merged)?;

        sqlx::query(
            r#"INSERT INTO documents (collection, id, data, created_at, updated_at) VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(collection, id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at"#,
        )
        .bind(collection)
        .bind(id)
        .bind(&data)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        self.notify(collection);
        Ok(())
    }

    /// Delete a document. Returns whether anything was removed.
    pub async fn delete_document(&self, collection: &str, id: &str) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        Self::increment_revision(&mut tx).await?;
        tx.commit().await?;

        self.notify(collection);
        Ok(true)
    }

    // ==================== ADMIN ACCOUNT OPERATIONS ====================

    /// Count registered admin accounts.
    pub async fn count_admin_accounts(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM admin_accounts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Get the stored password hash of an account.
    pub async fn get_admin_password_hash(&self, email: &str) -> Result<Option<String>, AppError> {
        let hash: Option<String> =
            sqlx::query_scalar("SELECT password_hash FROM admin_accounts WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(hash)
    }

    /// Create an admin account; an existing account with that email is left untouched.
    pub async fn create_admin_account(&self, email: &str, password_hash: &str) -> Result<(), AppError> {
        sqlx::query(
            "INSERT OR IGNORE INTO admin_accounts (email, password_hash, created_at) VALUES (?, ?, ?)",
        )
        .bind(email)
        .bind(password_hash)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// Helper functions for row conversion

fn document_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Document, AppError> {
    let id: String = row.get("id");
    let data: String = row.get("data");
    let fields: JsonMap = serde_json::from_str(&data)?;
    Ok(Document::new(id, fields))
}

/// JSON path for an order-by field. Field names are restricted to plain identifiers.
fn json_path(field: &str) -> Result<String, AppError> {
    let valid = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(AppError::BadRequest(format!(
            "Invalid order-by field '{}'",
            field
        )));
    }
    Ok(format!("$.{}", field))
}
