use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use tokio::fs;
use tracing::info;
use uuid::Uuid;

use tidings_types::api::UploadedFile;

/// Where video cards end up. Returns a URL the recipient can fetch.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn upload(&self, file: UploadedFile) -> Result<String>;
}

/// Stores uploads as flat files under one directory, served by the
/// server itself at `{public_base}/uploads/{name}`.
pub struct DiskArtifactStore {
    dir: PathBuf,
    public_base: String,
}

impl DiskArtifactStore {
    pub async fn new(dir: PathBuf, public_base: impl Into<String>) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Artifact storage directory: {}", dir.display());
        Ok(Self {
            dir,
            public_base: public_base.into(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ArtifactStore for DiskArtifactStore {
    async fn upload(&self, file: UploadedFile) -> Result<String> {
        // Never trust the client's file name for the path; keep only a
        // short alphanumeric extension.
        let name = match extension(&file.file_name) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };

        let path = self.dir.join(&name);
        fs::write(&path, &file.data).await?;
        info!("Stored artifact {} ({} bytes)", name, file.data.len());

        Ok(format!(
            "{}/uploads/{}",
            self.public_base.trim_end_matches('/'),
            name
        ))
    }
}

fn extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 8 || !ext.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
