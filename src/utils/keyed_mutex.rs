use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Async lock per string key, here an account id. Work for different owners
/// proceeds in parallel; work for one owner is serialised.
#[derive(Debug, Clone, Default)]
pub struct KeyedMutex {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedMutex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Held until the guard is dropped.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        mutex.lock_owned().await
    }

    /// Forgets the lock for `key` unless a task holds or awaits it.
    pub fn forget(&self, key: &str) {
        self.locks
            .remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    /// Drops every idle entry.
    pub fn cleanup(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_serialises() {
        let locks = KeyedMutex::new();
        let guard = locks.lock("owner-1").await;

        let contender = locks.clone();
        let waiting = tokio::spawn(async move {
            let _g = contender.lock("owner-1").await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(guard);
        waiting.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyedMutex::new();
        let _a = locks.lock("a").await;
        let _b = tokio::time::timeout(Duration::from_millis(50), locks.lock("b"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_idle_entries_are_dropped() {
        let locks = KeyedMutex::new();
        drop(locks.lock("a").await);
        let held = locks.lock("b").await;

        locks.forget("a");
        locks.forget("b");
        assert_eq!(locks.len(), 1);

        drop(held);
        locks.cleanup();
        assert!(locks.is_empty());
    }
}
