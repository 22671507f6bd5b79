//! Keyed registry of observable collections with per-key serialization.
//!
//! Each key owns its own async gate, so mutations on unrelated keys run
//! fully in parallel while mutations on one key are strictly ordered.
//! The gate is a tokio mutex, which hands the lock out in FIFO order.

use crate::{error::CollectionError, observable::ObservableCollection};
use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Arc, Mutex as StdMutex},
};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::debug;

struct KeyEntry<T> {
    collection: ObservableCollection<T>,
    gate: Arc<AsyncMutex<()>>,
}

impl<T> Clone for KeyEntry<T> {
    fn clone(&self) -> Self {
        KeyEntry {
            collection: self.collection.clone(),
            gate: self.gate.clone(),
        }
    }
}

/// Exclusive access to one key's collection, for compound mutations that
/// must not interleave with other writers of the same key.
pub struct KeyGuard<T> {
    collection: ObservableCollection<T>,
    _permit: OwnedMutexGuard<()>,
}

impl<T> KeyGuard<T> {
    pub fn collection(&self) -> &ObservableCollection<T> {
        &self.collection
    }
}

/// Registry mapping keys to observable collections.
///
/// Cloning yields another handle to the same registry. The collection and
/// its gate are created together under the registry lock, so two callers
/// racing on a fresh key always end up with the same pair.
pub struct CollectionManager<K, T> {
    entries: Arc<StdMutex<HashMap<K, KeyEntry<T>>>>,
}

impl<K, T> Clone for CollectionManager<K, T> {
    fn clone(&self) -> Self {
        CollectionManager {
            entries: self.entries.clone(),
        }
    }
}

impl<K, T> Default for CollectionManager<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone + Send + PartialEq + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> CollectionManager<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone + Send + PartialEq + 'static,
{
    pub fn new() -> Self {
        CollectionManager {
            entries: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    fn entry(&self, key: &K) -> KeyEntry<T> {
        let mut entries = self.entries.lock().expect("registry lock poisoned");
        entries
            .entry(key.clone())
            .or_insert_with(|| KeyEntry {
                collection: ObservableCollection::new(),
                gate: Arc::new(AsyncMutex::new(())),
            })
            .clone()
    }

    /// Returns the key's collection, creating it on first access.
    pub fn collection(&self, key: &K) -> ObservableCollection<T> {
        self.entry(key).collection
    }

    /// Returns the key's collection only if it already exists.
    pub fn try_collection(&self, key: &K) -> Option<ObservableCollection<T>> {
        self.entries
            .lock()
            .expect("registry lock poisoned")
            .get(key)
            .map(|entry| entry.collection.clone())
    }

    pub fn keys(&self) -> Vec<K> {
        self.entries
            .lock()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes the key's gate for a compound mutation sequence. Writers of
    /// other keys are unaffected; writers of this key queue behind the
    /// guard in arrival order.
    pub async fn lock(
        &self,
        key: &K,
        cancel: &CancellationToken,
    ) -> Result<KeyGuard<T>, CollectionError> {
        let entry = self.entry(key);
        let permit = entry.gate.clone().lock_owned().await;
        if cancel.is_cancelled() {
            return Err(CollectionError::Cancelled);
        }
        Ok(KeyGuard {
            collection: entry.collection,
            _permit: permit,
        })
    }

    /// Replaces the key's contents wholesale, or merges in only the items
    /// not already present when `preserve_existing` is set. Subscribers
    /// see one coalesced notification either way. Returns the number of
    /// items applied.
    pub async fn update(
        &self,
        key: &K,
        new_items: Vec<T>,
        preserve_existing: bool,
        cancel: &CancellationToken,
    ) -> Result<usize, CollectionError> {
        let guard = self.lock(key, cancel).await?;
        let applied = guard.collection().batch_update(|collection| {
            if preserve_existing {
                let mut applied = 0;
                for item in new_items {
                    if !collection.contains_where(|existing| *existing == item) {
                        collection.push(item);
                        applied += 1;
                    }
                }
                applied
            } else {
                collection.clear();
                let applied = new_items.len();
                for item in new_items {
                    collection.push(item);
                }
                applied
            }
        });
        Ok(applied)
    }

    /// Appends the candidates that are not already present by value
    /// equality. Returns the count actually added.
    pub async fn add_unique(
        &self,
        key: &K,
        items: Vec<T>,
        cancel: &CancellationToken,
    ) -> Result<usize, CollectionError> {
        self.add_unique_by(key, items, |a, b| a == b, cancel).await
    }

    /// Appends the candidates not matched by `same_item` against any
    /// current element. Returns the count actually added.
    pub async fn add_unique_by(
        &self,
        key: &K,
        items: Vec<T>,
        same_item: impl Fn(&T, &T) -> bool,
        cancel: &CancellationToken,
    ) -> Result<usize, CollectionError> {
        let guard = self.lock(key, cancel).await?;
        let added = guard.collection().batch_update(|collection| {
            let mut added = 0;
            for item in items {
                if !collection.contains_where(|existing| same_item(existing, &item)) {
                    collection.push(item);
                    added += 1;
                }
            }
            added
        });
        Ok(added)
    }

    /// Removes all matching items in one batched pass. Returns the count
    /// removed.
    pub async fn remove_where(
        &self,
        key: &K,
        predicate: impl Fn(&T) -> bool,
        cancel: &CancellationToken,
    ) -> Result<usize, CollectionError> {
        let guard = self.lock(key, cancel).await?;
        Ok(guard.collection().remove_where(predicate))
    }

    /// Drops the key's collection and gate together. A no-op for keys
    /// never created. An operation already holding the old gate finishes
    /// against the detached collection; later accesses start fresh.
    pub fn remove_collection(&self, key: &K) -> bool {
        let removed = self
            .entries
            .lock()
            .expect("registry lock poisoned")
            .remove(key)
            .is_some();
        if removed {
            debug!("evicted collection for key");
        }
        removed
    }
}
