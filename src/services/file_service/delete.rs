use crate::error::{PortalError, PortalResult};
use crate::models::FileRecord;
use std::collections::HashSet;
use tracing::{info, warn};

use super::FileStore;

impl FileStore {
    /// Removes bytes and metadata. Unknown ids are a no-op.
    pub async fn delete(&self, id: &str) -> PortalResult<()> {
        self.blobs.delete(id).await?;
        let removed = self.records.modify(|records| {
            let before = records.len();
            records.retain(|f| f.id != id);
            Ok::<_, PortalError>(before != records.len())
        })?;

        if removed {
            info!("🗑️  Deleted file {}", id);
        }
        Ok(())
    }

    /// Deletes every file owned by `owner_id` and returns their ids.
    pub async fn delete_by_owner(&self, owner_id: &str) -> PortalResult<Vec<String>> {
        self.delete_where(|f| f.user_id == owner_id).await
    }

    /// Deletes every file matching `predicate` and returns their ids.
    pub async fn delete_where<F>(&self, predicate: F) -> PortalResult<Vec<String>>
    where
        F: Fn(&FileRecord) -> bool,
    {
        let doomed: Vec<String> = self
            .list_all()
            .into_iter()
            .filter(|f| predicate(f))
            .map(|f| f.id)
            .collect();

        for id in &doomed {
            self.delete(id).await?;
        }
        Ok(doomed)
    }

    /// Keeps the files matching `keep` and deletes the rest.
    pub async fn retain<F>(&self, keep: F) -> PortalResult<Vec<String>>
    where
        F: Fn(&FileRecord) -> bool,
    {
        self.delete_where(|f| !keep(f)).await
    }

    /// Removes stored bytes that no metadata record points at. An upload in
    /// flight looks orphaned, so callers must hold off uploads while sweeping.
    pub async fn sweep_orphan_blobs(&self) -> PortalResult<Vec<String>> {
        let known: HashSet<String> = self.list_all().into_iter().map(|f| f.id).collect();
        let mut swept = Vec::new();
        for id in self.blobs.ids().await? {
            if !known.contains(&id) {
                self.blobs.delete(&id).await?;
                swept.push(id);
            }
        }
        if !swept.is_empty() {
            warn!("Removed {} blobs without metadata", swept.len());
        }
        Ok(swept)
    }
}
