//! Exclusive-use entity registries.
//!
//! A registry maps an id to a slot guarded by its own mutex. Acquisition
//! blocks until the slot's mutex is free and returns a scoped handle; release
//! happens on every exit path when the handle drops. There is no global lock:
//! the map itself is only touched briefly during acquisition and teardown.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

struct Slot<T> {
    item: Option<T>,
    retired: bool,
}

impl<T> Slot<T> {
    const fn empty() -> Self {
        Self {
            item: None,
            retired: false,
        }
    }
}

/// Registry of live entities keyed by id, handing out exclusive-use handles.
///
/// All concurrent users of the same id are serialized by the slot mutex.
/// A slot that is still empty when its handle is released is removed again,
/// so a lookup that found nothing leaves no trace.
pub struct EntityStore<K, T> {
    entries: DashMap<K, Arc<Mutex<Slot<T>>>>,
}

impl<K, T> Default for EntityStore<K, T>
where
    K: Eq + Hash + Copy,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> EntityStore<K, T>
where
    K: Eq + Hash + Copy,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Acquire the entity for exclusive use, blocking until the slot mutex is
    /// free. The returned handle's item is `None` when the entity does not
    /// exist; callers populate it via [`EntityHandle::insert`].
    pub async fn get_for_use(&self, key: K) -> EntityHandle<'_, K, T> {
        loop {
            let cell = Arc::clone(
                self.entries
                    .entry(key)
                    .or_insert_with(|| Arc::new(Mutex::new(Slot::empty())))
                    .value(),
            );
            let guard = cell.clone().lock_owned().await;
            if guard.retired {
                // Lost the race against a teardown; the entry is gone from
                // the map, so retry against a fresh slot.
                continue;
            }
            return EntityHandle {
                store: self,
                key,
                cell,
                guard,
            };
        }
    }

    /// Number of live entries, counting slots currently being populated.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tear down every entry, waiting for in-flight users. Test fixtures only.
    pub async fn clear(&self) {
        let keys: Vec<K> = self.entries.iter().map(|entry| *entry.key()).collect();
        for key in keys {
            self.get_for_use(key).await.destroy();
        }
    }
}

/// Scoped exclusive handle to a single entity.
///
/// The slot mutex is held for the handle's lifetime and released on drop.
/// [`destroy`](Self::destroy) consumes the handle, so use-after-destroy is
/// unrepresentable.
pub struct EntityHandle<'a, K, T>
where
    K: Eq + Hash + Copy,
{
    store: &'a EntityStore<K, T>,
    key: K,
    cell: Arc<Mutex<Slot<T>>>,
    guard: OwnedMutexGuard<Slot<T>>,
}

impl<K, T> EntityHandle<'_, K, T>
where
    K: Eq + Hash + Copy,
{
    #[must_use]
    pub fn key(&self) -> K {
        self.key
    }

    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.guard.item.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.guard.item.as_mut()
    }

    pub fn insert(&mut self, item: T) {
        self.guard.item = Some(item);
    }

    /// Remove the entity so subsequent acquisitions see it absent.
    pub fn destroy(mut self) {
        self.guard.item = None;
        // Drop completes the teardown for empty slots.
    }
}

impl<K, T> Drop for EntityHandle<'_, K, T>
where
    K: Eq + Hash + Copy,
{
    fn drop(&mut self) {
        if self.guard.item.is_none() {
            self.guard.retired = true;
            self.store
                .entries
                .remove_if(&self.key, |_, cell| Arc::ptr_eq(cell, &self.cell));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn populated_entry_survives_release() {
        let store: EntityStore<i64, String> = EntityStore::new();
        {
            let mut handle = store.get_for_use(1).await;
            assert!(handle.get().is_none());
            handle.insert("room".to_string());
        }
        let handle = store.get_for_use(1).await;
        assert_eq!(handle.get().map(String::as_str), Some("room"));
    }

    #[tokio::test]
    async fn empty_slot_is_reaped_on_release() {
        let store: EntityStore<i64, String> = EntityStore::new();
        {
            let handle = store.get_for_use(1).await;
            assert!(handle.get().is_none());
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn handles_serialize_concurrent_users() {
        let store: Arc<EntityStore<i64, u32>> = Arc::new(EntityStore::new());
        let mut first = store.get_for_use(7).await;
        first.insert(0);

        let contender = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let mut handle = store.get_for_use(7).await;
                if let Some(value) = handle.get_mut() {
                    *value += 1;
                }
            })
        };

        // The contender cannot make progress while the handle is held.
        tokio::task::yield_now().await;
        assert_eq!(first.get(), Some(&0));
        drop(first);

        timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender finished")
            .unwrap();
        let handle = store.get_for_use(7).await;
        assert_eq!(handle.get(), Some(&1));
    }

    #[tokio::test]
    async fn destroy_removes_the_entry() {
        let store: EntityStore<i64, String> = EntityStore::new();
        {
            let mut handle = store.get_for_use(3).await;
            handle.insert("doomed".to_string());
        }
        store.get_for_use(3).await.destroy();

        let handle = store.get_for_use(3).await;
        assert!(handle.get().is_none());
    }

    #[tokio::test]
    async fn waiter_on_destroyed_entry_sees_it_absent() {
        let store: Arc<EntityStore<i64, String>> = Arc::new(EntityStore::new());
        let mut handle = store.get_for_use(5).await;
        handle.insert("first".to_string());

        let waiter = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let handle = store.get_for_use(5).await;
                handle.get().cloned()
            })
        };

        tokio::task::yield_now().await;
        handle.destroy();

        let observed = timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter finished")
            .unwrap();
        assert_eq!(observed, None);
    }

    #[tokio::test]
    async fn clear_tears_down_everything() {
        let store: EntityStore<i64, u32> = EntityStore::new();
        for key in 0..4 {
            store.get_for_use(key).await.insert(1);
        }
        assert_eq!(store.len(), 4);
        store.clear().await;
        assert!(store.is_empty());
    }
}
