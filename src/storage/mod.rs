//! Content-addressed blob storage
//!
//! Every blob is named by the SHA-256 of its bytes. Stores never interpret
//! the bytes; decoding happens in the replica.

pub mod local;
pub mod memory;

use sha2::{Digest, Sha256};
use thiserror::Error;

pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;

const REF_PREFIX: &str = "sha256-";

/// Error types for storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid blob ref: {0}")]
    InvalidRef(String),
}

/// The content address of `bytes`
pub fn blob_ref(bytes: &[u8]) -> String {
    format!("{}{}", REF_PREFIX, hex::encode(Sha256::digest(bytes)))
}

/// The hex digest of a well-formed blob ref
pub fn parse_blob_ref(id: &str) -> Result<&str, StorageError> {
    let digest = id
        .strip_prefix(REF_PREFIX)
        .ok_or_else(|| StorageError::InvalidRef(id.to_string()))?;
    let valid = digest.len() == 64 && digest.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
    if !valid {
        return Err(StorageError::InvalidRef(id.to_string()));
    }
    Ok(digest)
}

/// Trait for blob stores
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a blob and return its ref; storing the same bytes twice is a no-op
    async fn store(&self, bytes: &[u8]) -> Result<String, StorageError>;

    async fn retrieve(&self, id: &str) -> Result<Vec<u8>, StorageError>;

    async fn exists(&self, id: &str) -> Result<bool, StorageError>;

    /// Refs of every stored blob
    async fn list(&self) -> Result<Vec<String>, StorageError>;
}
