//! Async ingest loop
//!
//! Blobs announced by a transport are queued on a channel and integrated one
//! at a time by a background task.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use super::{Replica, ReplicaError};
use crate::storage::BlobStore;

/// A blob that has been written to storage
#[derive(Clone, Debug)]
pub struct StoredBlob {
    pub id: String,
    pub bytes: Vec<u8>,
}

pub struct IngestHandle {
    tx: mpsc::Sender<StoredBlob>,
    task: JoinHandle<usize>,
}

/// Start integrating blobs into `replica` as they are delivered
pub fn spawn<S>(replica: Arc<Mutex<Replica<S>>>, capacity: usize) -> IngestHandle
where
    S: BlobStore + 'static,
{
    let (tx, mut rx) = mpsc::channel::<StoredBlob>(capacity);

    let task = tokio::spawn(async move {
        let mut delivered = 0;
        while let Some(blob) = rx.recv().await {
            let mut replica = replica.lock().await;
            match replica.on_blob_stored(&blob.bytes, &blob.id) {
                Ok(delivery) => {
                    delivered += 1;
                    log::debug!("Ingested {}: {:?}", blob.id, delivery);
                }
                Err(e) => {
                    log::warn!("Dropping blob {}: {}", blob.id, e);
                }
            }
        }
        delivered
    });

    IngestHandle { tx, task }
}

impl IngestHandle {
    pub async fn deliver(&self, blob: StoredBlob) -> Result<(), ReplicaError> {
        self.tx
            .send(blob)
            .await
            .map_err(|_| ReplicaError::ChannelClosed)
    }

    /// Stop accepting blobs, wait for the queue to drain and return how many
    /// blobs were accepted.
    pub async fn shutdown(self) -> Result<usize, ReplicaError> {
        drop(self.tx);
        self.task.await.map_err(|_| ReplicaError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ot::Operation;
    use crate::replica::ReplicaConfig;

    #[tokio::test]
    async fn test_ingest_in_any_order() {
        let mut author = Replica::in_memory(ReplicaConfig::default().with_site("s1"));
        let doc = author.create_document().await.unwrap();
        author
            .edit(&doc, Operation::string(vec![Operation::insert_text("ab")]))
            .await
            .unwrap();
        author
            .edit(&doc, Operation::string(vec![Operation::Skip(2), Operation::insert_text("c")]))
            .await
            .unwrap();

        let mut blobs = Vec::new();
        for id in author.store().list().await.unwrap() {
            let bytes = author.store().retrieve(&id).await.unwrap();
            blobs.push(StoredBlob { id, bytes });
        }
        blobs.reverse();
        blobs.push(StoredBlob {
            id: "sha256-bogus".to_string(),
            bytes: b"{}".to_vec(),
        });

        let reader = Arc::new(Mutex::new(Replica::in_memory(
            ReplicaConfig::default().with_site("s2"),
        )));
        let handle = spawn(Arc::clone(&reader), 4);
        for blob in blobs {
            handle.deliver(blob).await.unwrap();
        }
        assert_eq!(handle.shutdown().await.unwrap(), 3);

        let reader = reader.lock().await;
        assert_eq!(reader.document(&doc).unwrap().render().unwrap(), "abc");
    }
}
