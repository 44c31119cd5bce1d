use crate::error::PortalResult;
use crate::infrastructure::kv::KeyValueStore;
use crate::models::FileRecord;
use crate::services::collection::JsonCollection;
use crate::services::storage::{Blob, BlobRef, BlobStorage};
use std::sync::Arc;

pub mod delete;
pub mod types;
pub mod upload;

pub use types::{BYTES_PER_MB, NewUpload};

pub const FILES_KEY: &str = "uploaded_files";

/// File metadata plus the blob store holding the bytes.
///
/// Quota is not enforced here; see [`crate::services::quota::QuotaAccountant`].
pub struct FileStore {
    records: JsonCollection<FileRecord>,
    blobs: Arc<dyn BlobStorage>,
}

impl FileStore {
    pub fn new(store: Arc<dyn KeyValueStore>, blobs: Arc<dyn BlobStorage>) -> Self {
        Self {
            records: JsonCollection::new(store, FILES_KEY),
            blobs,
        }
    }

    pub fn list_all(&self) -> Vec<FileRecord> {
        self.records.load()
    }

    pub fn list_by_owner(&self, owner_id: &str) -> Vec<FileRecord> {
        self.list_all()
            .into_iter()
            .filter(|f| f.user_id == owner_id)
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<FileRecord> {
        self.list_all().into_iter().find(|f| f.id == id)
    }

    pub async fn blob_reference(&self, id: &str) -> PortalResult<Option<BlobRef>> {
        Ok(self.blobs.reference(id).await?)
    }

    /// Metadata and decoded bytes. `None` when either half is gone.
    pub async fn download(&self, id: &str) -> PortalResult<Option<(FileRecord, Blob)>> {
        let Some(record) = self.get(id) else {
            return Ok(None);
        };
        Ok(self.blobs.fetch(id).await?.map(|blob| (record, blob)))
    }

    pub async fn has_content(&self, id: &str) -> PortalResult<bool> {
        Ok(self.blobs.exists(id).await?)
    }
}
