//! A mutation-safe, observable sequence for UI-facing state.
//!
//! Subscribers receive changes over their own channel, so producer threads
//! never run subscriber code inline; the task that owns the receiver is
//! the home context for notification handling.

use crate::error::CollectionError;
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// One observed change. `Reset` stands for a coalesced group of mutations;
/// subscribers should re-read the collection when they see it.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionChange<T> {
    Added { index: usize, item: T },
    Removed { index: usize, item: T },
    Replaced { index: usize, old: T, new: T },
    Cleared,
    Reset,
}

/// Handle for detaching a subscriber.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
}

struct Inner<T> {
    items: RwLock<Vec<T>>,
    subscribers: Mutex<HashMap<u64, mpsc::Sender<CollectionChange<T>>>>,
    next_subscriber: AtomicU64,
    suppress_depth: AtomicUsize,
    dirty: AtomicBool,
}

/// An ordered, indexable, growable sequence with change notification.
///
/// Structural mutators hold the exclusive lock only for the structural
/// change itself; notification dispatch happens after the lock is
/// released. Cloning yields another handle to the same collection.
pub struct ObservableCollection<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ObservableCollection<T> {
    fn clone(&self) -> Self {
        ObservableCollection {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Default for ObservableCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> ObservableCollection<T> {
    pub fn new() -> Self {
        Self::with_items(Vec::new())
    }

    pub fn with_items(items: Vec<T>) -> Self {
        ObservableCollection {
            inner: Arc::new(Inner {
                items: RwLock::new(items),
                subscribers: Mutex::new(HashMap::new()),
                next_subscriber: AtomicU64::new(0),
                suppress_depth: AtomicUsize::new(0),
                dirty: AtomicBool::new(false),
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.inner.items.read().expect("collection lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.inner.items.write().expect("collection lock poisoned")
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.read().get(index).cloned()
    }

    /// Copies the current contents out, releasing the lock before return.
    pub fn snapshot(&self) -> Vec<T> {
        self.read().clone()
    }

    pub fn contains_where(&self, predicate: impl Fn(&T) -> bool) -> bool {
        self.read().iter().any(predicate)
    }

    pub fn push(&self, item: T) {
        let index = {
            let mut items = self.write();
            items.push(item.clone());
            items.len() - 1
        };
        self.publish(CollectionChange::Added { index, item });
    }

    pub fn insert(&self, index: usize, item: T) -> Result<(), CollectionError> {
        {
            let mut items = self.write();
            if index > items.len() {
                return Err(CollectionError::IndexOutOfBounds {
                    index,
                    len: items.len(),
                });
            }
            items.insert(index, item.clone());
        }
        self.publish(CollectionChange::Added { index, item });
        Ok(())
    }

    pub fn remove_at(&self, index: usize) -> Result<T, CollectionError> {
        let item = {
            let mut items = self.write();
            if index >= items.len() {
                return Err(CollectionError::IndexOutOfBounds {
                    index,
                    len: items.len(),
                });
            }
            items.remove(index)
        };
        self.publish(CollectionChange::Removed {
            index,
            item: item.clone(),
        });
        Ok(item)
    }

    /// Replaces the element at `index`, returning the previous value.
    pub fn replace_at(&self, index: usize, item: T) -> Result<T, CollectionError> {
        let old = {
            let mut items = self.write();
            if index >= items.len() {
                return Err(CollectionError::IndexOutOfBounds {
                    index,
                    len: items.len(),
                });
            }
            std::mem::replace(&mut items[index], item.clone())
        };
        self.publish(CollectionChange::Replaced {
            index,
            old: old.clone(),
            new: item,
        });
        Ok(old)
    }

    pub fn clear(&self) {
        let was_empty = {
            let mut items = self.write();
            let was_empty = items.is_empty();
            items.clear();
            was_empty
        };
        if !was_empty {
            self.publish(CollectionChange::Cleared);
        }
    }

    /// Replaces the first element matching `predicate`. Linear scan under
    /// the exclusive lock; this is not an indexed lookup structure.
    pub fn find_and_replace(&self, predicate: impl Fn(&T) -> bool, new: T) -> bool {
        let replaced = {
            let mut items = self.write();
            items.iter().position(|item| predicate(item)).map(|index| {
                let old = std::mem::replace(&mut items[index], new.clone());
                (index, old)
            })
        };
        match replaced {
            Some((index, old)) => {
                self.publish(CollectionChange::Replaced { index, old, new });
                true
            }
            None => false,
        }
    }

    /// Removes every matching element in one pass, returning the count.
    /// Subscribers see a single coalesced `Reset`.
    pub fn remove_where(&self, predicate: impl Fn(&T) -> bool) -> usize {
        let removed = {
            let mut items = self.write();
            let before = items.len();
            items.retain(|item| !predicate(item));
            before - items.len()
        };
        if removed > 0 {
            self.publish(CollectionChange::Reset);
        }
        removed
    }

    /// Runs `action` with per-item notifications suppressed, then emits one
    /// `Reset` for the whole scope. Reentrant: nested scopes coalesce into
    /// the outermost notification. The suppression state is restored even
    /// when `action` panics.
    pub fn batch_update<R>(&self, action: impl FnOnce(&Self) -> R) -> R {
        let _guard = SuppressGuard::enter(self);
        action(self)
    }

    /// Registers a subscriber with a bounded buffer. Changes that arrive
    /// while the buffer is full are dropped for that subscriber with a
    /// warning, never blocking the mutator.
    pub fn subscribe(&self, buffer: usize) -> (Subscription, mpsc::Receiver<CollectionChange<T>>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .lock()
            .expect("subscriber registry poisoned")
            .insert(id, tx);
        debug!(subscriber_id = id, "subscribed to collection changes");
        (Subscription { id }, rx)
    }

    pub fn unsubscribe(&self, subscription: Subscription) {
        self.inner
            .subscribers
            .lock()
            .expect("subscriber registry poisoned")
            .remove(&subscription.id);
        debug!(subscriber_id = subscription.id, "unsubscribed");
    }

    fn publish(&self, change: CollectionChange<T>) {
        if self.inner.suppress_depth.load(Ordering::Acquire) > 0 {
            self.inner.dirty.store(true, Ordering::Release);
            return;
        }
        self.dispatch(change);
    }

    fn dispatch(&self, change: CollectionChange<T>) {
        let mut subscribers = self
            .inner
            .subscribers
            .lock()
            .expect("subscriber registry poisoned");
        if subscribers.is_empty() {
            return;
        }

        let mut dropped = Vec::new();
        for (id, sender) in subscribers.iter() {
            match sender.try_send(change.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        subscriber_id = id,
                        "dropped collection change for slow subscriber (channel full)"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => dropped.push(*id),
            }
        }
        for id in dropped {
            subscribers.remove(&id);
            debug!(subscriber_id = id, "pruned closed subscriber");
        }
    }
}

struct SuppressGuard<'a, T: Clone + Send + 'static> {
    collection: &'a ObservableCollection<T>,
}

impl<'a, T: Clone + Send + 'static> SuppressGuard<'a, T> {
    fn enter(collection: &'a ObservableCollection<T>) -> Self {
        collection
            .inner
            .suppress_depth
            .fetch_add(1, Ordering::AcqRel);
        SuppressGuard { collection }
    }
}

impl<T: Clone + Send + 'static> Drop for SuppressGuard<'_, T> {
    fn drop(&mut self) {
        let inner = &self.collection.inner;
        let was_outermost = inner.suppress_depth.fetch_sub(1, Ordering::AcqRel) == 1;
        if was_outermost && inner.dirty.swap(false, Ordering::AcqRel) {
            self.collection.dispatch(CollectionChange::Reset);
        }
    }
}
