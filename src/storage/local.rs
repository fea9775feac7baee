//! Blob store on the local file system
//!
//! Blobs live under `<base_dir>/<first two hex digits>/<ref>`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs as tokio_fs;
use tokio::io::AsyncWriteExt;

use super::{blob_ref, parse_blob_ref, BlobStore, StorageError};

pub struct LocalBlobStore {
    base_dir: PathBuf,
}

impl LocalBlobStore {
    pub async fn new(base_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_dir = base_dir.into();
        if !base_dir.exists() {
            tokio_fs::create_dir_all(&base_dir).await?;
        }
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn get_path(&self, id: &str) -> Result<PathBuf, StorageError> {
        let digest = parse_blob_ref(id)?;
        Ok(self.base_dir.join(&digest[0..2]).join(id))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn store(&self, bytes: &[u8]) -> Result<String, StorageError> {
        let id = blob_ref(bytes);
        let path = self.get_path(&id)?;
        if path.exists() {
            return Ok(id);
        }
        if let Some(parent) = path.parent() {
            tokio_fs::create_dir_all(parent).await?;
        }

        // Write aside and rename so a reader never sees a partial blob
        let partial = path.with_extension("partial");
        let mut file = tokio_fs::File::create(&partial).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        tokio_fs::rename(&partial, &path).await?;

        Ok(id)
    }

    async fn retrieve(&self, id: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.get_path(id)?;
        if !path.exists() {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(tokio_fs::read(&path).await?)
    }

    async fn exists(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.get_path(id)?.exists())
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut ids = Vec::new();
        let mut prefixes = tokio_fs::read_dir(&self.base_dir).await?;
        while let Some(prefix) = prefixes.next_entry().await? {
            if !prefix.path().is_dir() {
                continue;
            }
            let mut files = tokio_fs::read_dir(prefix.path()).await?;
            while let Some(file) = files.next_entry().await? {
                if let Some(name) = file.file_name().to_str() {
                    if parse_blob_ref(name).is_ok() {
                        ids.push(name.to_string());
                    }
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}
