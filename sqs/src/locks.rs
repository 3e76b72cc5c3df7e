use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap<K> = Arc<DashMap<K, Arc<Mutex<()>>>>;

/// In-process async mutex per key, for read-modify-write sequences on a single store key.
///
/// An entry lives only while someone holds or waits for its lock.
pub(crate) struct KeyLocks<K: Eq + Hash> {
    locks: LockMap<K>,
}

impl<K: Eq + Hash> Clone for KeyLocks<K> {
    fn clone(&self) -> Self {
        Self { locks: self.locks.clone() }
    }
}

impl<K: Eq + Hash + Clone> KeyLocks<K> {
    #[inline]
    pub(crate) fn new() -> Self {
        Self { locks: Arc::new(DashMap::new()) }
    }

    pub(crate) async fn lock(&self, key: K) -> KeyGuard<K> {
        let lock = self.locks.entry(key.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).value().clone();
        let guard = lock.lock_owned().await;
        KeyGuard { guard: Some(guard), key: Some(key), locks: self.locks.clone() }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}

/// Releases the key's lock on drop and forgets the key when nobody else refers to it.
pub(crate) struct KeyGuard<K: Eq + Hash> {
    guard: Option<OwnedMutexGuard<()>>,
    key: Option<K>,
    locks: LockMap<K>,
}

impl<K: Eq + Hash> Drop for KeyGuard<K> {
    fn drop(&mut self) {
        //the guard holds one reference to the mutex, release it first
        self.guard.take();
        if let Some(key) = self.key.take() {
            self.locks.remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        }
    }
}
