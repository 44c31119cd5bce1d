use crate::infrastructure::kv::KeyValueStore;
use crate::utils::data_uri;
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;

pub const BLOB_KEY_PREFIX: &str = "file_data_";

/// Opaque handle to stored file content. For the data-URI backend this is the
/// URI itself, usable directly as a download link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BlobRef(pub String);

impl BlobRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub struct Blob {
    pub content_type: String,
    pub data: Bytes,
}

#[async_trait]
pub trait BlobStorage: Send + Sync {
    async fn put(&self, id: &str, content_type: &str, data: Bytes) -> Result<BlobRef>;
    async fn fetch(&self, id: &str) -> Result<Option<Blob>>;
    async fn reference(&self, id: &str) -> Result<Option<BlobRef>>;
    /// Deleting a missing blob is not an error.
    async fn delete(&self, id: &str) -> Result<()>;
    async fn exists(&self, id: &str) -> Result<bool>;
    /// Ids of every stored blob.
    async fn ids(&self) -> Result<Vec<String>>;
}

/// Stores each blob as a base64 data URI under `file_data_<id>`.
pub struct DataUriBlobStorage {
    store: Arc<dyn KeyValueStore>,
}

impl DataUriBlobStorage {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn key(id: &str) -> String {
        format!("{BLOB_KEY_PREFIX}{id}")
    }
}

#[async_trait]
impl BlobStorage for DataUriBlobStorage {
    async fn put(&self, id: &str, content_type: &str, data: Bytes) -> Result<BlobRef> {
        let content_type = content_type.to_string();
        let uri =
            tokio::task::spawn_blocking(move || data_uri::encode(&content_type, &data)).await?;
        self.store.set(&Self::key(id), &uri)?;
        Ok(BlobRef(uri))
    }

    async fn fetch(&self, id: &str) -> Result<Option<Blob>> {
        let Some(uri) = self.store.get(&Self::key(id))? else {
            return Ok(None);
        };
        let (content_type, data) = tokio::task::spawn_blocking(move || data_uri::decode(&uri))
            .await??;
        Ok(Some(Blob {
            content_type,
            data: Bytes::from(data),
        }))
    }

    async fn reference(&self, id: &str) -> Result<Option<BlobRef>> {
        Ok(self.store.get(&Self::key(id))?.map(BlobRef))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.store.remove(&Self::key(id))
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        self.store.contains(&Self::key(id))
    }

    async fn ids(&self) -> Result<Vec<String>> {
        Ok(self
            .store
            .keys(BLOB_KEY_PREFIX)?
            .into_iter()
            .filter_map(|k| k.strip_prefix(BLOB_KEY_PREFIX).map(str::to_string))
            .collect())
    }
}
