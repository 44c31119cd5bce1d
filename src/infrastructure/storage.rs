use crate::config::{PortalConfig, StorageBackend};
use crate::infrastructure::kv::{DiskStore, KeyValueStore, MemoryStore};
use std::sync::Arc;
use tracing::{info, warn};

pub fn setup_store(config: &PortalConfig) -> anyhow::Result<Arc<dyn KeyValueStore>> {
    match config.storage_backend {
        StorageBackend::Disk => {
            let store = DiskStore::open(&config.data_dir)?;
            info!("📂 Disk store: {}", store.root().display());
            Ok(Arc::new(store))
        }
        StorageBackend::Memory => {
            warn!("🧪 In-memory store: all data is lost when the process exits");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_disk_store_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("nested").join("data");
        let config = PortalConfig {
            storage_backend: StorageBackend::Disk,
            data_dir: data_dir.to_string_lossy().to_string(),
            ..PortalConfig::default()
        };

        let store = setup_store(&config).unwrap();
        store.set("marker", "1").unwrap();
        assert!(data_dir.join("marker.json").exists());
    }
}
