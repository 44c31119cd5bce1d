use crate::infrastructure::kv::KeyValueStore;
use serde::{Serialize, de::DeserializeOwned};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

/// An ordered list of records persisted as one JSON document under `key`.
///
/// Reads never fail: a missing, unreadable or malformed document is an empty list.
/// Writes are serialised by a per-collection lock so concurrent read-modify-write
/// cycles on the same key cannot drop each other's changes.
pub struct JsonCollection<T> {
    store: Arc<dyn KeyValueStore>,
    key: &'static str,
    write_lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCollection<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(store: Arc<dyn KeyValueStore>, key: &'static str) -> Self {
        Self {
            store,
            key,
            write_lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn load(&self) -> Vec<T> {
        let raw = match self.store.get(self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::error!("Failed to read '{}', treating as empty: {:#}", self.key, e);
                return Vec::new();
            }
        };

        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!("Discarding unreadable '{}' document: {}", self.key, e);
            Vec::new()
        })
    }

    /// Loads the list, lets `f` edit it, and writes it back. Nothing is written
    /// when `f` returns an error.
    pub fn modify<R, E>(&self, f: impl FnOnce(&mut Vec<T>) -> Result<R, E>) -> Result<R, E>
    where
        E: From<anyhow::Error>,
    {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut items = self.load();
        let result = f(&mut items)?;
        self.save(&items)?;
        Ok(result)
    }

    fn save(&self, items: &[T]) -> anyhow::Result<()> {
        let raw = serde_json::to_string(items)?;
        self.store.set(self.key, &raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::kv::MemoryStore;

    fn collection() -> (Arc<MemoryStore>, JsonCollection<u32>) {
        let store = Arc::new(MemoryStore::new());
        let col = JsonCollection::new(store.clone() as Arc<dyn KeyValueStore>, "numbers");
        (store, col)
    }

    #[test]
    fn test_missing_document_is_empty() {
        let (_, col) = collection();
        assert!(col.load().is_empty());
    }

    #[test]
    fn test_malformed_document_self_heals() {
        let (store, col) = collection();
        store.set("numbers", "{not json").unwrap();
        assert!(col.load().is_empty());

        col.modify(|items| {
            items.push(7);
            Ok::<_, anyhow::Error>(())
        })
        .unwrap();
        assert_eq!(col.load(), vec![7]);
    }

    #[test]
    fn test_failed_modify_writes_nothing() {
        let (store, col) = collection();
        let result: anyhow::Result<()> = col.modify(|items| {
            items.push(1);
            Err(anyhow::anyhow!("rejected"))
        });
        assert!(result.is_err());
        assert_eq!(store.get("numbers").unwrap(), None);
    }
}
