//! Blob storage abstraction for post images and profile pictures.
//!
//! Blobs are addressed by slash-separated paths such as `forum/{postId}/{name}.png`.
//! Deleting a post removes everything under its `forum/{postId}/` prefix.

use std::path::{Path, PathBuf};

use crate::{AppError, AppResult};

/// Uploaded blob metadata.
#[derive(Debug, Clone)]
pub struct UploadedBlob {
    /// Storage path.
    pub path: String,
    /// Public URL to access the blob.
    pub url: String,
    /// Size in bytes.
    pub size: u64,
    /// MIME content type.
    pub content_type: String,
    /// MD5 hash of the content.
    pub md5: String,
}

/// Blob store backend trait.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload bytes to a path, replacing any existing blob there.
    async fn upload(&self, path: &str, data: &[u8], content_type: &str)
    -> AppResult<UploadedBlob>;

    /// Public URL of a stored blob. Fails when the blob does not exist.
    async fn download_url(&self, path: &str) -> AppResult<String>;

    /// Delete a single blob. Deleting a missing blob is not an error.
    async fn delete(&self, path: &str) -> AppResult<()>;

    /// Delete every blob under a prefix. Returns how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> AppResult<usize>;
}

/// File extension for an uploaded image: `png` iff the content type is `image/png`, else `jpg`.
#[must_use]
pub fn image_extension(content_type: &str) -> &'static str {
    if content_type.eq_ignore_ascii_case("image/png") {
        "png"
    } else {
        "jpg"
    }
}

/// Local filesystem blob store.
pub struct LocalBlobStore {
    base_path: PathBuf,
    base_url: String,
}

impl LocalBlobStore {
    /// Create a new local blob store.
    #[must_use]
    pub const fn new(base_path: PathBuf, base_url: String) -> Self {
        Self {
            base_path,
            base_url,
        }
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn resolve(&self, path: &str) -> AppResult<PathBuf> {
        let relative = Path::new(path);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(AppError::BadRequest(format!("Invalid blob path: {path}")));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait::async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(
        &self,
        path: &str,
        data: &[u8],
        content_type: &str,
    ) -> AppResult<UploadedBlob> {
        let full_path = self.resolve(path)?;

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("Failed to create directory: {e}")))?;
        }

        tokio::fs::write(&full_path, data)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to write blob: {e}")))?;

        Ok(UploadedBlob {
            path: path.to_string(),
            url: self.public_url(path),
            size: data.len() as u64,
            content_type: content_type.to_string(),
            md5: format!("{:x}", md5::compute(data)),
        })
    }

    async fn download_url(&self, path: &str) -> AppResult<String> {
        let full_path = self.resolve(path)?;
        let exists = tokio::fs::try_exists(&full_path)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;
        if !exists {
            return Err(AppError::NotFound(format!("Blob {path}")));
        }
        Ok(self.public_url(path))
    }

    async fn delete(&self, path: &str) -> AppResult<()> {
        let full_path = self.resolve(path)?;
        match tokio::fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!("Failed to delete blob: {e}"))),
        }
    }

    async fn delete_prefix(&self, prefix: &str) -> AppResult<usize> {
        let dir = self.resolve(prefix.trim_end_matches('/'))?;
        let mut removed = 0;
        let mut pending = vec![dir.clone()];

        while let Some(current) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(AppError::Storage(e.to_string())),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| AppError::Storage(e.to_string()))?
            {
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| AppError::Storage(e.to_string()))?;
                if file_type.is_dir() {
                    pending.push(entry.path());
                } else {
                    tokio::fs::remove_file(entry.path())
                        .await
                        .map_err(|e| AppError::Storage(e.to_string()))?;
                    removed += 1;
                }
            }
        }

        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(AppError::Storage(e.to_string())),
        }

        Ok(removed)
    }
}
