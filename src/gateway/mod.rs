//! CRUD gateway used by the admin forms.
//!
//! Writes go straight to the store; published views update only through the
//! store's own change feed.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::errors::AppError;
use crate::media::MediaStore;
use crate::models::{site_info_path, Collection, Draft, Entity, EntityPatch, SiteInfo};
use crate::store::{ContentStore, DocumentPath};

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub id: String,
    pub created: bool,
}

/// An upload running in the background.
pub struct MediaUpload {
    progress: watch::Receiver<u8>,
    task: JoinHandle<Result<String, AppError>>,
}

impl MediaUpload {
    /// Percent complete, 0 to 100.
    pub fn progress(&self) -> watch::Receiver<u8> {
        self.progress.clone()
    }

    /// Wait for the public URL of the stored object.
    pub async fn finish(self) -> Result<String, AppError> {
        self.task
            .await
            .map_err(|e| AppError::Internal(format!("Upload task failed: {}", e)))?
    }
}

/// Entry point for all admin writes.
#[derive(Clone)]
pub struct ContentGateway {
    store: Arc<dyn ContentStore>,
    media: Arc<dyn MediaStore>,
}

impl ContentGateway {
    pub fn new(store: Arc<dyn ContentStore>, media: Arc<dyn MediaStore>) -> Self {
        Self { store, media }
    }

    /// Typed gateway for one collection.
    pub fn collection<E: Entity>(&self, collection: Collection) -> CrudGateway<E> {
        CrudGateway {
            collection,
            store: self.store.clone(),
            media: self.media.clone(),
            _entity: PhantomData,
        }
    }

    /// Replace the site settings singleton.
    pub async fn save_site_info(&self, info: &SiteInfo) -> Result<(), AppError> {
        info.validate()?;
        self.store
            .upsert_merge(&site_info_path(), info.to_fields()?)
            .await?;
        tracing::info!("Site info saved");
        Ok(())
    }

    /// Start an upload. It keeps running even if the caller stops waiting.
    pub fn upload_media(&self, folder: &str, file_name: &str, bytes: Vec<u8>) -> MediaUpload {
        let (tx, rx) = watch::channel(0u8);
        let media = self.media.clone();
        let folder = folder.to_string();
        let file_name = file_name.to_string();

        let task = tokio::spawn(async move {
            let size = bytes.len();
            let result = media.upload(&folder, &file_name, bytes, tx).await;
            match &result {
                Ok(url) => tracing::info!("Uploaded {} ({} bytes)", url, size),
                Err(e) => tracing::warn!("Upload of {} to {} failed: {}", file_name, folder, e),
            }
            result
        });

        MediaUpload { progress: rx, task }
    }
}

/// Save and delete for one collection of `E`.
pub struct CrudGateway<E> {
    collection: Collection,
    store: Arc<dyn ContentStore>,
    media: Arc<dyn MediaStore>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> CrudGateway<E> {
    pub fn collection(&self) -> Collection {
        self.collection
    }

    fn path(&self, id: &str) -> DocumentPath {
        DocumentPath::new(self.collection.name(), id)
    }

    /// Create a new record or merge the supplied fields into an existing one.
    pub async fn save(&self, draft: Draft<E::Patch>) -> Result<SaveOutcome, AppError> {
        match draft {
            Draft::New(patch) => {
                patch.validate(true)?;
                let id = self
                    .store
                    .create(self.collection.name(), patch.to_fields()?)
                    .await?;
                tracing::info!("Created {}/{}", self.collection, id);
                Ok(SaveOutcome { id, created: true })
            }
            Draft::Existing { id, changes } => {
                changes.validate(false)?;
                let fields = changes.to_fields()?;
                if fields.is_empty() {
                    return Err(AppError::Validation("Nothing to update".to_string()));
                }
                self.store.upsert_merge(&self.path(&id), fields).await?;
                tracing::info!("Updated {}/{}", self.collection, id);
                Ok(SaveOutcome { id, created: false })
            }
        }
    }

    /// Remove a record. Missing records are fine.
    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        if id.trim().is_empty() {
            return Err(AppError::Validation("id must not be empty".to_string()));
        }
        self.store.delete_document(&self.path(id)).await?;
        tracing::info!("Deleted {}/{}", self.collection, id);
        Ok(())
    }

    /// Delete the record and, best effort, the media object it owns.
    pub async fn delete_with_media(&self, id: &str, media_url: Option<&str>) -> Result<(), AppError> {
        if let Some(url) = media_url.filter(|u| !u.is_empty() && self.media.owns(u)) {
            if let Err(e) = self.media.delete_by_url(url).await {
                tracing::warn!(
                    "Failed to delete media {} for {}/{}, deleting record anyway: {}",
                    url,
                    self.collection,
                    id,
                    e
                );
            }
        }
        self.delete(id).await
    }

    /// Look up the record's media URL, then delete both.
    pub async fn delete_entity(&self, id: &str) -> Result<(), AppError> {
        let media_url = match self.store.read_document(&self.path(id)).await {
            Ok(Some(document)) => match E::from_document(document) {
                Ok(entity) => entity.media_url().map(str::to_string),
                Err(e) => {
                    tracing::warn!("Record {}/{} is unreadable: {}", self.collection, id, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Could not read {}/{} before delete: {}", self.collection, id, e);
                None
            }
        };
        self.delete_with_media(id, media_url.as_deref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_database, Repository};
    use crate::media::LocalMediaStore;
    use crate::models::{GalleryItem, Notice, NoticePatch, Teacher, TeacherPatch};
    use crate::store::SqliteContentStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const MEDIA_BASE: &str = "http://localhost:8080/media";

    /// Owns everything under the media base and fails every delete.
    #[derive(Default)]
    struct BrokenMedia {
        delete_attempts: AtomicUsize,
    }

    #[async_trait]
    impl MediaStore for BrokenMedia {
        fn owns(&self, url: &str) -> bool {
            url.starts_with(MEDIA_BASE)
        }

        async fn upload(
            &self,
            _folder: &str,
            _file_name: &str,
            _bytes: Vec<u8>,
            _progress: watch::Sender<u8>,
        ) -> Result<String, AppError> {
            Err(AppError::Media("bucket unavailable".into()))
        }

        async fn delete_by_url(&self, _url: &str) -> Result<(), AppError> {
            self.delete_attempts.fetch_add(1, Ordering::SeqCst);
            Err(AppError::Media("permission denied".into()))
        }
    }

    struct Fixture {
        gateway: ContentGateway,
        store: Arc<SqliteContentStore>,
        _dir: TempDir,
    }

    async fn fixture(media: Option<Arc<dyn MediaStore>>) -> Fixture {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("test.sqlite")).await.unwrap();
        let store = Arc::new(SqliteContentStore::new(Repository::new(pool)));
        let media = media.unwrap_or_else(|| {
            Arc::new(LocalMediaStore::new(dir.path().join("media"), MEDIA_BASE))
        });
        Fixture {
            gateway: ContentGateway::new(store.clone(), media),
            store,
            _dir: dir,
        }
    }

    fn teacher_patch(name: &str) -> TeacherPatch {
        TeacherPatch {
            name: Some(name.to_string()),
            designation: Some("প্রভাষক".to_string()),
            image_url: Some(format!("{}/teachers/a.jpg", MEDIA_BASE)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_update_writes_only_supplied_fields() {
        let f = fixture(None).await;
        let teachers = f.gateway.collection::<Teacher>(Collection::Teachers);

        let created = teachers.save(Draft::New(teacher_patch("Old"))).await.unwrap();
        assert!(created.created);

        let changes = TeacherPatch {
            name: Some("New Name".to_string()),
            ..Default::default()
        };
        let updated = teachers
            .save(Draft::from_parts(Some(created.id.clone()), changes))
            .await
            .unwrap();
        assert_eq!(updated, SaveOutcome { id: created.id.clone(), created: false });

        let doc = f
            .store
            .read_document(&DocumentPath::new("teachers", &created.id))
            .await
            .unwrap()
            .unwrap();
        let teacher = Teacher::from_document(doc).unwrap();
        assert_eq!(teacher.name, "New Name");
        assert_eq!(teacher.designation, "প্রভাষক");
        assert_eq!(teacher.image_url, format!("{}/teachers/a.jpg", MEDIA_BASE));
    }

    #[tokio::test]
    async fn test_new_draft_requires_all_fields() {
        let f = fixture(None).await;
        let notices = f.gateway.collection::<Notice>(Collection::Notices);
        let partial = NoticePatch {
            title: Some("Only a title".to_string()),
            ..Default::default()
        };

        let err = notices.save(Draft::New(partial)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(f.store.revision_id().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_media_failure_does_not_block_record_delete() {
        let media = Arc::new(BrokenMedia::default());
        let f = fixture(Some(media.clone())).await;
        let teachers = f.gateway.collection::<Teacher>(Collection::Teachers);
        let saved = teachers.save(Draft::New(teacher_patch("T"))).await.unwrap();

        teachers.delete_entity(&saved.id).await.unwrap();

        assert_eq!(media.delete_attempts.load(Ordering::SeqCst), 1);
        let gone = f
            .store
            .read_document(&DocumentPath::new("teachers", &saved.id))
            .await
            .unwrap();
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn test_foreign_media_url_is_left_alone() {
        let media = Arc::new(BrokenMedia::default());
        let f = fixture(Some(media.clone())).await;
        let gallery = f.gateway.collection::<GalleryItem>(Collection::GalleryItems);

        gallery
            .delete_with_media("whatever", Some("https://picsum.photos/seed/1/400/300"))
            .await
            .unwrap();
        gallery.delete_with_media("whatever", Some("")).await.unwrap();
        assert_eq!(media.delete_attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_delete_missing_record_succeeds() {
        let f = fixture(None).await;
        let results = f.gateway.collection::<Notice>(Collection::Results);
        results.delete("does-not-exist").await.unwrap();
        results.delete_entity("does-not-exist").await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_outlives_caller_and_reports_progress() {
        let f = fixture(None).await;
        let upload = f
            .gateway
            .upload_media("gallery", "photo.png", vec![1u8; 200_000]);
        let progress = upload.progress();

        let url = upload.finish().await.unwrap();
        assert!(url.starts_with("http://localhost:8080/media/gallery/"));
        assert_eq!(*progress.borrow(), 100);
    }

    #[tokio::test]
    async fn test_upload_failure_surfaces_from_finish() {
        let f = fixture(Some(Arc::new(BrokenMedia::default()))).await;
        let err = f
            .gateway
            .upload_media("gallery", "photo.png", vec![1u8; 10])
            .finish()
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Media(_)));
    }

    #[tokio::test]
    async fn test_save_site_info_validates() {
        let f = fixture(None).await;
        let mut info = SiteInfo::default();
        info.college_name = "  ".to_string();
        assert!(f.gateway.save_site_info(&info).await.is_err());

        info.college_name = "New College".to_string();
        f.gateway.save_site_info(&info).await.unwrap();
        let doc = f.store.read_document(&site_info_path()).await.unwrap().unwrap();
        assert_eq!(SiteInfo::from_document(doc).unwrap(), info);
    }
}
