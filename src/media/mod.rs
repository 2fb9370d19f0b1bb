//! Media store for uploaded images.
//!
//! Assets are addressed by public URL. Only URLs under the store's own prefix
//! belong to it; anything else (external image links) is never touched.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;

use crate::errors::AppError;

/// Bytes written between progress reports.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

#[async_trait]
pub trait MediaStore: Send + Sync + 'static {
    /// Whether `url` points at an object held by this store.
    fn owns(&self, url: &str) -> bool;

    /// Store `bytes` under `folder`, reporting percent complete on `progress`.
    async fn upload(
        &self,
        folder: &str,
        file_name: &str,
        bytes: Vec<u8>,
        progress: watch::Sender<u8>,
    ) -> Result<String, AppError>;

    async fn delete_by_url(&self, url: &str) -> Result<(), AppError>;
}

/// Media kept in a local directory and served under a public URL prefix.
#[derive(Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
    public_base: String,
}

impl LocalMediaStore {
    pub fn new(root: PathBuf, public_base: impl Into<String>) -> Self {
        Self {
            root,
            public_base: public_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create the media directory if needed.
    pub async fn initialize(&self) -> Result<(), AppError> {
        fs::create_dir_all(&self.root).await?;
        tracing::info!("Media store initialized at: {:?}", self.root);
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an owned URL to its file, refusing anything outside the root.
    fn path_for_url(&self, url: &str) -> Result<PathBuf, AppError> {
        let relative = url
            .strip_prefix(&self.public_base)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| AppError::Media(format!("URL is not owned by the media store: {}", url)))?;
        let relative = relative.split(['?', '#']).next().unwrap_or_default();

        let relative = Path::new(relative);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || relative.as_os_str().is_empty() {
            return Err(AppError::Validation(format!("Invalid media path: {}", url)));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    fn owns(&self, url: &str) -> bool {
        url.strip_prefix(&self.public_base)
            .is_some_and(|rest| rest.starts_with('/') && rest.len() > 1)
    }

    async fn upload(
        &self,
        folder: &str,
        file_name: &str,
        bytes: Vec<u8>,
        progress: watch::Sender<u8>,
    ) -> Result<String, AppError> {
        let folder = sanitize_folder(folder)?;
        let object_name = format!("{}-{}", uuid::Uuid::new_v4(), sanitize_file_name(file_name));

        let dir = self.root.join(&folder);
        fs::create_dir_all(&dir).await?;
        let path = dir.join(&object_name);

        let total = bytes.len();
        write_then_rename(&path, &bytes, &progress).await?;

        let url = format!("{}/{}/{}", self.public_base, folder, object_name);
        tracing::debug!("Uploaded media {} ({} bytes)", url, total);
        Ok(url)
    }

    async fn delete_by_url(&self, url: &str) -> Result<(), AppError> {
        let path = self.path_for_url(url)?;
        fs::remove_file(&path).await?;
        tracing::debug!("Deleted media {}", url);
        Ok(())
    }
}

/// Write `bytes` to a `.part` file beside `path`, then rename it into place.
/// The temp file is removed on any failure.
async fn write_then_rename(
    path: &Path,
    bytes: &[u8],
    progress: &watch::Sender<u8>,
) -> std::io::Result<()> {
    let temp_path = path.with_extension("part");
    let result = async {
        let mut file = fs::File::create(&temp_path).await?;
        let total = bytes.len();
        let mut written = 0usize;
        progress.send_replace(0);

        for chunk in bytes.chunks(UPLOAD_CHUNK_SIZE) {
            file.write_all(chunk).await?;
            written += chunk.len();
            progress.send_replace(percent(written, total));
        }
        file.sync_all().await?;
        drop(file);
        fs::rename(&temp_path, path).await
    }
    .await;

    match result {
        Ok(()) => {
            progress.send_replace(100);
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(&temp_path).await;
            Err(e)
        }
    }
}

fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u8
}

/// Folders are one or more plain path segments of `[A-Za-z0-9_-]`.
fn sanitize_folder(folder: &str) -> Result<String, AppError> {
    let segments: Vec<&str> = folder
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    let valid = !segments.is_empty()
        && segments.iter().all(|s| {
            s.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        });
    if !valid {
        return Err(AppError::Validation(format!("Invalid media folder '{}'", folder)));
    }
    Ok(segments.join("/"))
}

fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}
