use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{ApiConfig, StorageConfig};

/// Directory under the public root that holds uploaded media
pub const UPLOADS_DIR: &str = "uploads";

#[derive(Debug, Error)]
pub enum FileError {
    #[error("file exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("file reference escapes the public directory: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Extension for an accepted upload MIME type. Anything else is rejected.
pub fn extension_for(mime: &str) -> Option<&'static str> {
    match mime {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        _ => None,
    }
}

/// Media files referenced by gallery items, stored below a public root.
///
/// A record's `fileUrl` is a root-relative path such as `/uploads/<name>.png`;
/// it always resolves inside `public_dir`.
#[derive(Debug, Clone)]
pub struct FileStore {
    public_dir: PathBuf,
    max_bytes: usize,
}

impl FileStore {
    pub fn new(public_dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            public_dir: public_dir.into(),
            max_bytes,
        }
    }

    pub fn from_config(storage: &StorageConfig, api: &ApiConfig) -> Self {
        Self::new(storage.public_dir.clone(), api.max_upload_bytes)
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn resolve(&self, file_url: &str) -> Result<PathBuf, FileError> {
        let relative = Path::new(file_url.trim_start_matches('/'));
        let safe = relative.components().count() > 0
            && relative.components().all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(FileError::InvalidPath(file_url.to_string()));
        }
        Ok(self.public_dir.join(relative))
    }

    /// Writes an upload under a fresh name and returns its `fileUrl`
    pub async fn save_upload(&self, mime: &str, bytes: &[u8]) -> Result<String, FileError> {
        let ext = extension_for(mime).ok_or_else(|| FileError::UnsupportedType(mime.to_string()))?;
        if bytes.len() > self.max_bytes {
            return Err(FileError::TooLarge { limit: self.max_bytes });
        }

        let dir = self.public_dir.join(UPLOADS_DIR);
        tokio::fs::create_dir_all(&dir).await?;

        let name = format!("{}.{}", Uuid::new_v4(), ext);
        tokio::fs::write(dir.join(&name), bytes).await?;
        info!("Stored upload {} ({} bytes)", name, bytes.len());

        Ok(format!("/{}/{}", UPLOADS_DIR, name))
    }

    /// Removes the file behind `file_url`. A file that is already gone is not
    /// an error; returns whether something was deleted.
    pub async fn remove(&self, file_url: &str) -> Result<bool, FileError> {
        let path = self.resolve(file_url)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("File already absent: {}", path.display());
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}
