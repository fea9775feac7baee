use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{blob_ref, BlobStore, StorageError};

/// A blob store that keeps everything in memory
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn store(&self, bytes: &[u8]) -> Result<String, StorageError> {
        let id = blob_ref(bytes);
        self.blobs
            .write()
            .await
            .entry(id.clone())
            .or_insert_with(|| bytes.to_vec());
        Ok(id)
    }

    async fn retrieve(&self, id: &str) -> Result<Vec<u8>, StorageError> {
        self.blobs
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn exists(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.blobs.read().await.contains_key(id))
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut ids: Vec<String> = self.blobs.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_and_retrieve() {
        let store = MemoryBlobStore::new();
        let id = store.store(b"hello").await.unwrap();
        assert_eq!(id, blob_ref(b"hello"));
        assert_eq!(store.store(b"hello").await.unwrap(), id);

        assert!(store.exists(&id).await.unwrap());
        assert_eq!(store.retrieve(&id).await.unwrap(), b"hello".to_vec());
        assert_eq!(store.list().await.unwrap(), vec![id]);

        let missing = blob_ref(b"other");
        assert!(matches!(store.retrieve(&missing).await, Err(StorageError::NotFound(_))));
    }
}
