//! Keyed async locks
//!
//! One mutex per key, created on first use. Holding the guard for a run ID
//! serializes every state change of that run; different runs never contend.
//!
//! An entry is dropped again when its last guard is released with nobody
//! waiting, so the table only holds keys that are in use.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lock table keyed by `K`
#[derive(Debug)]
pub struct LockTable<K: Eq + Hash> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash + Clone> LockTable<K> {
    /// Empty table
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Wait for exclusive access to `key`
    pub async fn lock(&self, key: K) -> KeyGuard<'_, K> {
        // Clone the Arc out so the shard guard is released before awaiting
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        let guard = mutex.lock_owned().await;
        KeyGuard {
            table: self,
            key,
            guard: Some(guard),
        }
    }

    /// Number of keys currently held or awaited
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// No key held or awaited
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Exclusive access to one key of a [`LockTable`]
#[derive(Debug)]
pub struct KeyGuard<'a, K: Eq + Hash + Clone> {
    table: &'a LockTable<K>,
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash + Clone> Drop for KeyGuard<'_, K> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Entry creation and removal both hold the shard lock, so a count of
        // one means no guard and no waiter references this mutex
        self.table
            .locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

impl<K: Eq + Hash + Clone> Default for LockTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let table = Arc::new(LockTable::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let table = table.clone();
            let inside = inside.clone();
            let max_seen = max_seen.clone();
            tasks.push(tokio::spawn(async move {
                let _guard = table.lock("run").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_released_keys_are_dropped() {
        let table = LockTable::new();
        let a = table.lock("a").await;
        let b = table.lock("b").await;
        assert_eq!(table.len(), 2);

        drop(a);
        assert_eq!(table.len(), 1);
        drop(b);
        assert!(table.is_empty());

        let _again = table.lock("a").await;
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_entry_kept_while_waiter_queued() {
        let table = Arc::new(LockTable::new());
        let first = table.lock(7u32).await;

        let waiter = {
            let table = table.clone();
            tokio::spawn(async move {
                let _guard = table.lock(7u32).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(first);
        assert_eq!(table.len(), 1);
        waiter.await.unwrap();
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let table = LockTable::new();
        let _a = table.lock(1u32).await;
        let b = tokio::time::timeout(Duration::from_millis(100), table.lock(2u32)).await;
        assert!(b.is_ok());
    }
}
