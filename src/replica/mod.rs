//! Replica: every document a site holds, fed from a blob store
//!
//! A replica decodes blobs as they are stored, routes them to the document
//! they belong to and integrates them. Blobs for a document whose root has
//! not arrived yet are parked until it does. Locally authored blobs take the
//! same path: they are encoded, stored, then delivered like any other blob.

pub mod config;
pub mod envelope;
pub mod ingest;

pub use config::ReplicaConfig;
pub use envelope::{DocumentRoot, Envelope, MutationEnvelope, PermissionEnvelope};
pub use ingest::{IngestHandle, StoredBlob};

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::history::Seq;
use crate::integrator::{Change, Consumer, Integrator, Status};
use crate::ot::{Operation, OtError};
use crate::permission::Permission;
use crate::storage::{blob_ref, BlobStore, MemoryBlobStore, StorageError};

#[derive(Error, Debug)]
pub enum ReplicaError {
    #[error("Operation error: {0}")]
    Ot(#[from] OtError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Blob ref mismatch: expected {expected}, content hashes to {actual}")]
    BlobRefMismatch { expected: String, actual: String },

    #[error("Ingest channel closed")]
    ChannelClosed,
}

/// What happened to a delivered blob
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    DocumentCreated(String),
    Integrated(Status),
    /// The blob's document is not known yet
    Parked,
}

pub struct Replica<S: BlobStore = MemoryBlobStore> {
    store: S,
    config: ReplicaConfig,
    site: String,
    documents: HashMap<String, Integrator>,
    /// Document id -> changes delivered before the document root
    orphans: HashMap<String, Vec<Change>>,
    consumers: Vec<Arc<dyn Consumer>>,
}

impl Replica<MemoryBlobStore> {
    pub fn in_memory(config: ReplicaConfig) -> Self {
        Self::new(MemoryBlobStore::new(), config)
    }
}

impl<S: BlobStore> Replica<S> {
    pub fn new(store: S, config: ReplicaConfig) -> Self {
        let site = config.site_or_generate();
        Self {
            store,
            config,
            site,
            documents: HashMap::new(),
            orphans: HashMap::new(),
            consumers: Vec::new(),
        }
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn config(&self) -> &ReplicaConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Register a consumer for every current and future document
    pub fn add_consumer(&mut self, consumer: Arc<dyn Consumer>) {
        for document in self.documents.values_mut() {
            document.add_consumer(Arc::clone(&consumer));
        }
        self.consumers.push(consumer);
    }

    pub fn document(&self, id: &str) -> Option<&Integrator> {
        self.documents.get(id)
    }

    pub fn document_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.documents.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of blobs parked until their document root arrives
    pub fn parked_count(&self) -> usize {
        self.orphans.values().map(Vec::len).sum()
    }

    /// Handle a blob that has just been stored under `id`.
    pub fn on_blob_stored(&mut self, bytes: &[u8], id: &str) -> Result<Delivery, ReplicaError> {
        if self.config.verify_blob_refs {
            let actual = blob_ref(bytes);
            if actual != id {
                return Err(ReplicaError::BlobRefMismatch {
                    expected: id.to_string(),
                    actual,
                });
            }
        }

        let envelope = Envelope::decode(bytes)?;
        let doc = envelope.document_id(id).to_string();
        let change: Change = match envelope {
            Envelope::Document(root) => return Ok(self.open_document(id, &root)),
            Envelope::Mutation(m) => m.into_mutation(id)?.into(),
            Envelope::Permission(p) => p.into_permission(id)?.into(),
        };

        match self.documents.get_mut(&doc) {
            Some(document) => Ok(Delivery::Integrated(document.integrate(change)?)),
            None => {
                log::debug!("Parking {} until document {} arrives", id, doc);
                self.orphans.entry(doc).or_default().push(change);
                Ok(Delivery::Parked)
            }
        }
    }

    /// Fetch a blob from the store and deliver it
    pub async fn load(&mut self, id: &str) -> Result<Delivery, ReplicaError> {
        let bytes = self.store.retrieve(id).await?;
        self.on_blob_stored(&bytes, id)
    }

    /// Store and deliver a blob produced elsewhere
    pub async fn receive(&mut self, bytes: &[u8]) -> Result<Delivery, ReplicaError> {
        let id = self.store.store(bytes).await?;
        self.on_blob_stored(bytes, &id)
    }

    pub async fn create_document(&mut self) -> Result<String, ReplicaError> {
        let root = Envelope::Document(DocumentRoot {
            site: self.site.clone(),
            nonce: Uuid::new_v4().to_string(),
        });
        self.publish(&root).await
    }

    /// Author an edit written against the state after sequence `apply_after`
    pub async fn create_mutation(
        &mut self,
        doc: &str,
        op: Operation,
        apply_after: Seq,
    ) -> Result<String, ReplicaError> {
        let mutation = self.integrator(doc)?.create_mutation(op, apply_after)?;
        let envelope = Envelope::Mutation(MutationEnvelope::from_mutation(doc, &mutation)?);
        self.publish(&envelope).await
    }

    /// Author an edit against the current state
    pub async fn edit(&mut self, doc: &str, op: Operation) -> Result<String, ReplicaError> {
        let seen = self.integrator(doc)?.last_seq();
        self.create_mutation(doc, op, seen).await
    }

    pub async fn create_permission(
        &mut self,
        doc: &str,
        user: &str,
        allow: u64,
        deny: u64,
    ) -> Result<String, ReplicaError> {
        let dep = self.integrator(doc)?.frontier().to_vec();
        // Reject an invalid mask before it is stored
        Permission::new("", user, allow, deny, dep.clone())?;
        let envelope = Envelope::Permission(PermissionEnvelope {
            doc: doc.to_string(),
            user: user.to_string(),
            allow,
            deny,
            dep,
        });
        self.publish(&envelope).await
    }

    fn integrator(&self, doc: &str) -> Result<&Integrator, OtError> {
        self.documents
            .get(doc)
            .ok_or_else(|| OtError::UnknownDocument(doc.to_string()))
    }

    async fn publish(&mut self, envelope: &Envelope) -> Result<String, ReplicaError> {
        let bytes = envelope.encode()?;
        let id = self.store.store(&bytes).await?;
        self.on_blob_stored(&bytes, &id)?;
        Ok(id)
    }

    fn open_document(&mut self, id: &str, root: &DocumentRoot) -> Delivery {
        if self.documents.contains_key(id) {
            return Delivery::Integrated(Status::Duplicate);
        }
        log::info!("Opening document {} created by {}", id, root.site);

        let mut document = Integrator::new(id, self.site.clone())
            .with_rollback_warn_threshold(self.config.rollback_warn_threshold);
        for consumer in &self.consumers {
            document.add_consumer(Arc::clone(consumer));
        }

        for change in self.orphans.remove(id).unwrap_or_default() {
            // Failures are logged and reported to consumers by the integrator
            let _ = document.integrate(change);
        }
        self.documents.insert(id.to_string(), document);
        Delivery::DocumentCreated(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replica(site: &str) -> Replica {
        Replica::in_memory(ReplicaConfig::default().with_site(site))
    }

    #[tokio::test]
    async fn test_local_editing() {
        let mut r = replica("s1");
        let doc = r.create_document().await.unwrap();
        r.edit(&doc, Operation::string(vec![Operation::insert_text("Hello")]))
            .await
            .unwrap();
        r.edit(&doc, Operation::string(vec![Operation::Skip(5), Operation::insert_text("!")]))
            .await
            .unwrap();

        assert_eq!(r.document(&doc).unwrap().render().unwrap(), "Hello!");
        assert_eq!(r.store().list().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_document() {
        let mut r = replica("s1");
        let err = r
            .edit("sha256-nothing", Operation::string(vec![Operation::insert_text("x")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ReplicaError::Ot(OtError::UnknownDocument(_))));
    }

    #[tokio::test]
    async fn test_blobs_before_root_are_parked() {
        let mut author = replica("s1");
        let doc = author.create_document().await.unwrap();
        let edit = author
            .edit(&doc, Operation::string(vec![Operation::insert_text("hi")]))
            .await
            .unwrap();

        let mut reader = replica("s2");
        let bytes = author.store().retrieve(&edit).await.unwrap();
        assert_eq!(reader.receive(&bytes).await.unwrap(), Delivery::Parked);
        assert_eq!(reader.parked_count(), 1);

        let root = author.store().retrieve(&doc).await.unwrap();
        assert_eq!(
            reader.receive(&root).await.unwrap(),
            Delivery::DocumentCreated(doc.clone())
        );
        assert_eq!(reader.parked_count(), 0);
        assert_eq!(reader.document(&doc).unwrap().render().unwrap(), "hi");
    }

    #[tokio::test]
    async fn test_rejects_tampered_blob() {
        let mut r = replica("s1");
        let doc = r.create_document().await.unwrap();
        let bytes = format!(
            r#"{{"type":"mutation","doc":"{}","site":"s9","dep":[],"op":"x"}}"#,
            doc
        );
        let err = r.on_blob_stored(bytes.as_bytes(), &doc).unwrap_err();
        assert!(matches!(err, ReplicaError::BlobRefMismatch { .. }));

        let err = r.receive(b"{\"type\":\"mutation\"}").await.unwrap_err();
        assert!(matches!(err, ReplicaError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_invalid_permission_is_not_stored() {
        let mut r = replica("s1");
        let doc = r.create_document().await.unwrap();
        let err = r.create_permission(&doc, "alice", 0b1, !0b1).await.unwrap_err();
        assert!(matches!(
            err,
            ReplicaError::Ot(OtError::ConflictingPermission { .. })
        ));
        assert_eq!(r.store().list().await.unwrap(), vec![doc]);
    }
}
