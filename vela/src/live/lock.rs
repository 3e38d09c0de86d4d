use fnv::FnvHashMap;
use parking_lot::Mutex;
use std::{hash::Hash, sync::Arc};
use tokio::sync::OwnedMutexGuard;

/// Map of per-key async mutexes, used to serialise validate-then-commit sequences for a
/// given user.
///
/// Entries are created on first use; [`KeyedMutex::evict_quiescent`] drops locks no task
/// is holding or waiting on.
#[derive(Debug, Default)]
pub struct KeyedMutex<Key> {
    locks: Mutex<FnvHashMap<Key, Arc<tokio::sync::Mutex<()>>>>,
}

impl<Key> KeyedMutex<Key>
where
    Key: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(FnvHashMap::default()),
        }
    }

    /// Acquire the lock for `key`, waiting behind any holder.
    pub async fn lock(&self, key: Key) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(key).or_default())
        };

        lock.lock_owned().await
    }

    /// Drop lock entries that no task currently holds or awaits.
    pub fn evict_quiescent(&self) {
        self.locks
            .lock()
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_same_key_serialises() {
        let locks = Arc::new(KeyedMutex::new());
        let counter = Arc::new(Mutex::new(0u32));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let counter = Arc::clone(&counter);
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock("user_1").await;
                let value = {
                    let mut counter = counter.lock();
                    *counter += 1;
                    *counter
                };
                // no interleaving: the count observed under the lock is stable
                tokio::task::yield_now().await;
                assert_eq!(*counter.lock(), value);
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*counter.lock(), 8);
    }

    #[tokio::test]
    async fn test_evict_quiescent_removes_idle_entries() {
        let locks = KeyedMutex::new();

        {
            let _guard = locks.lock("user_1").await;
            locks.evict_quiescent();
            // held lock survives eviction
            assert_eq!(locks.len(), 1);
        }

        locks.evict_quiescent();
        assert!(locks.is_empty());
    }
}
