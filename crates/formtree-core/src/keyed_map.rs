#![forbid(unsafe_code)]

//! Copy-on-write map keyed by field identity.
//!
//! [`KeyedMap`] is an immutable snapshot. Changes go through a
//! [`KeyedMapDraft`], which records writes and deletions on top of the
//! snapshot and produces a new map on [`commit`](KeyedMapDraft::commit).
//!
//! A draft that never observed a real change commits back to the *same*
//! snapshot (`ptr_eq` holds), which is what lets callers skip downstream
//! work when nothing moved. Values are compared by `Arc` identity, not by
//! content: writing back the exact `Arc` that is already stored is a no-op.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use thiserror::Error;

/// Lookup and update failures. Keys are rendered with `Debug`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyedMapError {
    #[error("missing key {key}")]
    MissingKey { key: String },
    #[error("cannot update unregistered key {key}")]
    CannotUpdateUnregisteredKey { key: String },
}

/// Immutable key to shared-value snapshot.
pub struct KeyedMap<K, V> {
    entries: Arc<HashMap<K, Arc<V>>>,
}

impl<K, V> Clone for KeyedMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<K, V> Default for KeyedMap<K, V> {
    fn default() -> Self {
        Self {
            entries: Arc::new(HashMap::new()),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for KeyedMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl<K: Eq + Hash + Clone, V> KeyedMap<K, V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(Arc::as_ref)
    }

    /// Like [`get`](Self::get) but a missing key is an error.
    pub fn get_or_err(&self, key: &K) -> Result<&V, KeyedMapError>
    where
        K: fmt::Debug,
    {
        self.get(key).ok_or_else(|| KeyedMapError::MissingKey {
            key: format!("{key:?}"),
        })
    }

    /// The shared handle stored for `key`.
    #[must_use]
    pub fn get_shared(&self, key: &K) -> Option<&Arc<V>> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, v)| (k, v.as_ref()))
    }

    /// True when both handles point at the same snapshot.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }

    /// Start a draft on top of this snapshot.
    #[must_use]
    pub fn draft(&self) -> KeyedMapDraft<K, V> {
        KeyedMapDraft {
            base: self.clone(),
            next: HashMap::new(),
            deleted: HashSet::new(),
            changed: false,
        }
    }
}

impl<K: Eq + Hash + Clone, V> FromIterator<(K, V)> for KeyedMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: Arc::new(iter.into_iter().map(|(k, v)| (k, Arc::new(v))).collect()),
        }
    }
}

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

/// Pending changes on top of a [`KeyedMap`] snapshot.
pub struct KeyedMapDraft<K, V> {
    base: KeyedMap<K, V>,
    next: HashMap<K, Arc<V>>,
    deleted: HashSet<K>,
    changed: bool,
}

impl<K: Eq + Hash + Clone, V> KeyedMapDraft<K, V> {
    /// Current value for `key`, including pending writes.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        if self.deleted.contains(key) {
            return None;
        }
        self.next
            .get(key)
            .or_else(|| self.base.get_shared(key))
            .cloned()
    }

    #[must_use]
    pub fn has(&self, key: &K) -> bool {
        !self.deleted.contains(key)
            && (self.next.contains_key(key) || self.base.contains_key(key))
    }

    /// Store `value`. Marks the draft changed unless `value` is the exact
    /// `Arc` already visible for `key`.
    pub fn set(&mut self, key: K, value: Arc<V>) {
        let same = self
            .get(&key)
            .is_some_and(|current| Arc::ptr_eq(&current, &value));
        if !same {
            self.changed = true;
        }
        self.deleted.remove(&key);
        self.next.insert(key, value);
    }

    pub fn delete(&mut self, key: &K) {
        if self.has(key) {
            self.changed = true;
        }
        self.next.remove(key);
        self.deleted.insert(key.clone());
    }

    /// Store `f(current)` where `current` is `None` for an absent key.
    pub fn update(&mut self, key: K, f: impl FnOnce(Option<Arc<V>>) -> Arc<V>) {
        let next = f(self.get(&key));
        self.set(key, next);
    }

    /// Replace an existing value with `f(current)`.
    pub fn update_or_err(
        &mut self,
        key: &K,
        f: impl FnOnce(Arc<V>) -> Arc<V>,
    ) -> Result<(), KeyedMapError>
    where
        K: fmt::Debug,
    {
        let current = self
            .get(key)
            .ok_or_else(|| KeyedMapError::CannotUpdateUnregisteredKey {
                key: format!("{key:?}"),
            })?;
        let next = f(current);
        self.set(key.clone(), next);
        Ok(())
    }

    /// Whether any write or delete actually changed a value.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Produce the next snapshot holding exactly the `live` keys that have a
    /// value. Returns the original snapshot if nothing changed.
    #[must_use]
    pub fn commit<I>(self, live: I) -> KeyedMap<K, V>
    where
        I: IntoIterator<Item = K>,
    {
        if !self.changed {
            return self.base;
        }
        let mut entries = HashMap::new();
        for key in live {
            if let Some(value) = self.get(&key) {
                entries.insert(key, value);
            }
        }
        KeyedMap {
            entries: Arc::new(entries),
        }
    }
}
