//! # Journaled Collections
//!
//! Ordered maps and sets that can be rolled back to a savepoint.
//!
//! Between [`Transactional::begin`] and [`Transactional::commit`], every
//! write records the previous value of the key it touched. A
//! [`Transactional::rollback`] replays that log backwards. Opening,
//! committing, and rolling back a savepoint therefore cost as much as the
//! writes made under it, never as much as the collection itself.
//!
//! Outside a savepoint nothing is recorded. Savepoints do not nest:
//! `begin` while one is open discards the older log.
//!
//! The undo log is never serialized. A collection round-trips through
//! serde exactly like the `BTreeMap` it wraps.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Savepoint protocol shared by every component that takes part in an
/// atomic pool operation.
pub trait Transactional {
    /// Opens a savepoint.
    fn begin(&mut self);

    /// Keeps every write since `begin` and closes the savepoint.
    fn commit(&mut self);

    /// Undoes every write since `begin` and closes the savepoint.
    fn rollback(&mut self);
}

// ---------------------------------------------------------------------------
// JournaledMap
// ---------------------------------------------------------------------------

/// A `BTreeMap` with an optional undo log.
#[derive(Debug, Clone)]
pub struct JournaledMap<K, V> {
    map: BTreeMap<K, V>,
    undo: Option<Vec<(K, Option<V>)>>,
}

impl<K, V> Default for JournaledMap<K, V> {
    fn default() -> Self {
        Self {
            map: BTreeMap::new(),
            undo: None,
        }
    }
}

impl<K: Ord + Clone, V: Clone> JournaledMap<K, V> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Value at `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.map.get(key)
    }

    /// `true` if `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.map.iter()
    }

    /// Keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.map.keys()
    }

    /// Writes recorded under the open savepoint. Zero when none is open.
    pub fn pending_writes(&self) -> usize {
        self.undo.as_ref().map_or(0, Vec::len)
    }

    /// Inserts `value` at `key`, returning the previous value.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let previous = match &mut self.undo {
            Some(log) => {
                let previous = self.map.insert(key.clone(), value);
                log.push((key, previous.clone()));
                previous
            }
            None => self.map.insert(key, value),
        };
        previous
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let removed = self.map.remove(key)?;
        if let Some(log) = &mut self.undo {
            log.push((key.clone(), Some(removed.clone())));
        }
        Some(removed)
    }
}

impl<K: Ord + Clone, V: Clone> Transactional for JournaledMap<K, V> {
    fn begin(&mut self) {
        self.undo = Some(Vec::new());
    }

    fn commit(&mut self) {
        self.undo = None;
    }

    fn rollback(&mut self) {
        let Some(log) = self.undo.take() else {
            return;
        };
        for (key, previous) in log.into_iter().rev() {
            match previous {
                Some(value) => {
                    self.map.insert(key, value);
                }
                None => {
                    self.map.remove(&key);
                }
            }
        }
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for JournaledMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.map == other.map
    }
}

impl<K: Eq, V: Eq> Eq for JournaledMap<K, V> {}

impl<K: Ord, V> From<BTreeMap<K, V>> for JournaledMap<K, V> {
    fn from(map: BTreeMap<K, V>) -> Self {
        Self { map, undo: None }
    }
}

impl<K: Serialize, V: Serialize> Serialize for JournaledMap<K, V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.map.serialize(serializer)
    }
}

impl<'de, K, V> Deserialize<'de> for JournaledMap<K, V>
where
    K: Deserialize<'de> + Ord,
    V: Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        BTreeMap::deserialize(deserializer).map(Self::from)
    }
}

// ---------------------------------------------------------------------------
// JournaledSet
// ---------------------------------------------------------------------------

/// An ordered set with the same savepoint behavior as [`JournaledMap`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "K: Serialize",
    deserialize = "K: Deserialize<'de> + Ord"
))]
#[serde(transparent)]
pub struct JournaledSet<K> {
    inner: JournaledMap<K, ()>,
}

impl<K> Default for JournaledSet<K> {
    fn default() -> Self {
        Self {
            inner: JournaledMap::default(),
        }
    }
}

impl<K: Ord + Clone> JournaledSet<K> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if `key` is a member.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    /// Adds `key`. Returns `false` if it was already a member.
    pub fn insert(&mut self, key: K) -> bool {
        if self.inner.contains_key(&key) {
            return false;
        }
        self.inner.insert(key, ());
        true
    }

    /// Removes `key`. Returns `false` if it was not a member.
    pub fn remove(&mut self, key: &K) -> bool {
        self.inner.remove(key).is_some()
    }

    /// Members in order.
    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.inner.keys()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// `true` if empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<K: Ord + Clone> Transactional for JournaledSet<K> {
    fn begin(&mut self) {
        self.inner.begin();
    }

    fn commit(&mut self) {
        self.inner.commit();
    }

    fn rollback(&mut self) {
        self.inner.rollback();
    }
}
