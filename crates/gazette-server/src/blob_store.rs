//! Filesystem image store.
//!
//! Uploaded images live under `<base>/<category>/` and are served statically
//! at `/uploads/<category>/<file>`.  File names are sanitized and prefixed
//! with a fresh UUID, and every path is validated to stay inside the upload
//! root before it is touched.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ServerError;

/// URL prefix under which stored images are served.
pub const UPLOAD_URL_PREFIX: &str = "/uploads";

/// Upload destination, one subdirectory per kind of image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageCategory {
    Avatars,
    Posts,
}

impl ImageCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Avatars => "avatars",
            Self::Posts => "posts",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlobStore {
    base_path: PathBuf,
    max_size: usize,
}

impl BlobStore {
    pub async fn new(base_path: PathBuf, max_size: usize) -> Result<Self, ServerError> {
        for category in [ImageCategory::Avatars, ImageCategory::Posts] {
            let dir = base_path.join(category.as_str());
            fs::create_dir_all(&dir).await.map_err(|e| {
                ServerError::UploadFailed(format!(
                    "Failed to create upload directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        info!(path = %base_path.display(), "Image store initialized");

        Ok(Self {
            base_path,
            max_size,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Store an uploaded image and return its public URL.
    ///
    /// Rejects empty and oversized payloads.  The stored name is
    /// `<uuid>_<sanitized original name>`, so repeated uploads of the same
    /// file never collide.
    pub async fn store_image(
        &self,
        category: ImageCategory,
        original_name: &str,
        data: &[u8],
    ) -> Result<String, ServerError> {
        if data.is_empty() {
            return Err(ServerError::UploadFailed("Empty image".to_string()));
        }
        if data.len() > self.max_size {
            return Err(ServerError::UploadTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }

        let file_name = format!("{}_{}", Uuid::new_v4(), sanitize_file_name(original_name));
        let path = self.safe_path(category, &file_name)?;

        fs::write(&path, data).await.map_err(|e| {
            ServerError::UploadFailed(format!("Failed to write image {file_name}: {e}"))
        })?;

        debug!(file = %file_name, size = data.len(), "Stored image");
        Ok(format!(
            "{UPLOAD_URL_PREFIX}/{}/{file_name}",
            category.as_str()
        ))
    }

    /// Delete a previously stored image by its public URL.
    ///
    /// URLs that do not point inside the upload root are rejected; a URL
    /// whose file is already gone is a successful no-op.
    pub async fn delete_by_url(&self, url: &str) -> Result<(), ServerError> {
        let rest = url
            .strip_prefix(UPLOAD_URL_PREFIX)
            .and_then(|r| r.strip_prefix('/'))
            .ok_or_else(|| {
                ServerError::BadRequest(format!("Not an upload URL: {url}"))
            })?;

        let (category_str, file_name) = rest
            .split_once('/')
            .ok_or_else(|| ServerError::BadRequest(format!("Not an upload URL: {url}")))?;

        let category = match category_str {
            "avatars" => ImageCategory::Avatars,
            "posts" => ImageCategory::Posts,
            other => {
                return Err(ServerError::BadRequest(format!(
                    "Unknown upload category: {other}"
                )))
            }
        };

        let path = self.safe_path(category, file_name)?;
        if !path.exists() {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            ServerError::UploadFailed(format!("Failed to delete image {file_name}: {e}"))
        })?;

        debug!(file = %file_name, "Deleted image");
        Ok(())
    }

    /// Build a path under a category directory, rejecting any traversal.
    fn safe_path(&self, category: ImageCategory, file_name: &str) -> Result<PathBuf, ServerError> {
        if file_name.is_empty()
            || file_name.contains('/')
            || file_name.contains('\\')
            || file_name.contains("..")
        {
            return Err(ServerError::BadRequest(
                "Path traversal detected".to_string(),
            ));
        }
        Ok(self.base_path.join(category.as_str()).join(file_name))
    }
}

/// Replace every character outside `[A-Za-z0-9.-]` with `_`, and collapse
/// any remaining `..` so the result always passes the traversal check.
fn sanitize_file_name(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    while sanitized.contains("..") {
        sanitized = sanitized.replace("..", "_");
    }

    if sanitized.trim_matches(['_', '.']).is_empty() {
        "image".to_string()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_store() -> (BlobStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = BlobStore::new(dir.path().to_path_buf(), 1024 * 1024)
            .await
            .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_store_and_delete() {
        let (store, dir) = test_store().await;

        let url = store
            .store_image(ImageCategory::Posts, "sunset.jpg", b"jpeg-bytes")
            .await
            .unwrap();
        assert!(url.starts_with("/uploads/posts/"));
        assert!(url.ends_with("_sunset.jpg"));

        let file = dir
            .path()
            .join(url.strip_prefix("/uploads/").unwrap());
        assert!(file.exists());

        store.delete_by_url(&url).await.unwrap();
        assert!(!file.exists());

        // Deleting again is a no-op.
        store.delete_by_url(&url).await.unwrap();
    }

    #[tokio::test]
    async fn test_sanitizes_hostile_names() {
        let (store, _dir) = test_store().await;

        let url = store
            .store_image(ImageCategory::Avatars, "../../etc/passwd", b"data")
            .await
            .unwrap();
        assert!(url.starts_with("/uploads/avatars/"));
        assert!(!url.contains(".."));
    }

    #[tokio::test]
    async fn test_empty_image_rejected() {
        let (store, _dir) = test_store().await;
        assert!(store
            .store_image(ImageCategory::Posts, "a.png", b"")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_size_cap_enforced() {
        let dir = TempDir::new().unwrap();
        let store = BlobStore::new(dir.path().to_path_buf(), 8).await.unwrap();

        let err = store
            .store_image(ImageCategory::Posts, "big.png", b"123456789")
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::UploadTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_delete_rejects_foreign_urls() {
        let (store, _dir) = test_store().await;

        assert!(store.delete_by_url("/etc/passwd").await.is_err());
        assert!(store.delete_by_url("/uploads/avatars/../escape").await.is_err());
        assert!(store.delete_by_url("/uploads/other/file.png").await.is_err());
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("photo 1.png"), "photo_1.png");
        assert_eq!(sanitize_file_name("café.jpg"), "caf_.jpg");
        assert_eq!(sanitize_file_name("..."), "image");
        assert_eq!(sanitize_file_name(""), "image");
    }
}
