//! Media library
//!
//! Uploaded files are stored flat in the upload directory under a random
//! UUID name with an extension derived from the MIME type, and are served
//! from `/uploads/{name}`.

use crate::config::UploadConfig;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tokio::fs;
use uuid::Uuid;

/// A stored file
#[derive(Debug, Clone, Serialize)]
pub struct MediaFile {
    pub name: String,
    pub url: String,
    pub size: u64,
    pub content_type: String,
    pub modified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct MediaService {
    config: UploadConfig,
}

impl MediaService {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    pub fn upload_dir(&self) -> &PathBuf {
        &self.config.path
    }

    pub fn max_file_size(&self) -> u64 {
        self.config.max_file_size
    }

    /// Check type and size, then write the bytes under a fresh name
    pub async fn store(&self, content_type: &str, data: &[u8]) -> Result<MediaFile, MediaError> {
        let content_type = content_type.split(';').next().unwrap_or_default().trim().to_lowercase();
        if !self.config.is_type_allowed(&content_type) {
            return Err(MediaError::ValidationError(format!(
                "Invalid file type: {}. Allowed types: {}",
                content_type,
                self.config.allowed_types.join(", ")
            )));
        }
        if data.is_empty() {
            return Err(MediaError::ValidationError("File is empty".to_string()));
        }
        if data.len() as u64 > self.config.max_file_size {
            return Err(MediaError::ValidationError(format!(
                "File too large. Maximum size: {} bytes ({} MB)",
                self.config.max_file_size,
                self.config.max_file_size / 1024 / 1024
            )));
        }

        fs::create_dir_all(&self.config.path)
            .await
            .with_context(|| format!("Failed to create upload directory: {:?}", self.config.path))?;

        let name = format!("{}.{}", Uuid::new_v4(), self.config.extension_for(&content_type));
        let path = self.config.path.join(&name);
        fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to save file: {:?}", path))?;

        tracing::info!("Stored upload {} ({} bytes)", name, data.len());
        Ok(MediaFile {
            url: format!("/uploads/{}", name),
            name,
            size: data.len() as u64,
            content_type,
            modified_at: Some(Utc::now()),
        })
    }

    /// Files in the upload directory, newest first
    pub async fn list(&self) -> Result<Vec<MediaFile>, MediaError> {
        let mut entries = match fs::read_dir(&self.config.path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(anyhow::Error::new(e).context("Failed to read upload directory").into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.context("Failed to read upload directory")? {
            let metadata = entry.metadata().await.context("Failed to read file metadata")?;
            if !metadata.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            files.push(MediaFile {
                url: format!("/uploads/{}", name),
                content_type: content_type_for(&name).to_string(),
                size: metadata.len(),
                modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
                name,
            });
        }
        files.sort_by(|a, b| b.modified_at.cmp(&a.modified_at).then_with(|| a.name.cmp(&b.name)));
        Ok(files)
    }

    /// Delete a stored file by its bare name
    pub async fn delete(&self, name: &str) -> Result<(), MediaError> {
        if !is_safe_name(name) {
            return Err(MediaError::ValidationError(format!("Invalid file name: {}", name)));
        }
        let path = self.config.path.join(name);
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!("Deleted upload {}", name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(MediaError::NotFound(name.to_string())),
            Err(e) => Err(anyhow::Error::new(e).context("Failed to delete file").into()),
        }
    }
}

/// A single path component without separators or dot segments
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
}

fn content_type_for(name: &str) -> &'static str {
    match name.rsplit('.').next().map(|e| e.to_ascii_lowercase()).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}
