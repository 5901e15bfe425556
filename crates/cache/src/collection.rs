//! Insertion-ordered, id-unique collection.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use storefront_core::Entity;

/// Records of one resource type, unique by id, kept in insertion order.
///
/// Serializes as a plain array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    from = "Vec<T>",
    into = "Vec<T>",
    bound(serialize = "T: Serialize + Clone", deserialize = "T: Deserialize<'de>")
)]
pub struct CachedCollection<T: Entity> {
    items: Vec<T>,
    index: HashMap<T::Id, usize>,
}

impl<T: Entity> Default for CachedCollection<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Entity + PartialEq> PartialEq for CachedCollection<T> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<T: Entity> From<Vec<T>> for CachedCollection<T> {
    fn from(items: Vec<T>) -> Self {
        let mut collection = Self::default();
        for item in items {
            collection.upsert(item);
        }
        collection
    }
}

impl<T: Entity> From<CachedCollection<T>> for Vec<T> {
    fn from(collection: CachedCollection<T>) -> Self {
        collection.items
    }
}

impl<T: Entity> CachedCollection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `item` unless its id is already present. Returns `true` if added.
    pub fn insert(&mut self, item: T) -> bool {
        if self.index.contains_key(item.id()) {
            return false;
        }
        self.index.insert(item.id().clone(), self.items.len());
        self.items.push(item);
        true
    }

    /// Replace the item with the same id in place, or append it.
    ///
    /// Returns `true` if the id was new.
    pub fn upsert(&mut self, item: T) -> bool {
        match self.index.get(item.id()) {
            Some(&pos) => {
                self.items[pos] = item;
                false
            }
            None => {
                self.index.insert(item.id().clone(), self.items.len());
                self.items.push(item);
                true
            }
        }
    }

    pub fn get(&self, id: &T::Id) -> Option<&T> {
        self.index.get(id).map(|&pos| &self.items[pos])
    }

    pub fn get_mut(&mut self, id: &T::Id) -> Option<&mut T> {
        match self.index.get(id) {
            Some(&pos) => self.items.get_mut(pos),
            None => None,
        }
    }

    pub fn contains(&self, id: &T::Id) -> bool {
        self.index.contains_key(id)
    }

    pub fn remove(&mut self, id: &T::Id) -> Option<T> {
        let pos = self.index.remove(id)?;
        let item = self.items.remove(pos);
        self.reindex_from(pos);
        Some(item)
    }

    /// Keep only items matching `keep`. Returns how many were dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) -> usize {
        let before = self.items.len();
        self.items.retain(|item| keep(item));
        let dropped = before - self.items.len();
        if dropped > 0 {
            self.index.clear();
            self.reindex_from(0);
        }
        dropped
    }

    fn reindex_from(&mut self, start: usize) {
        for (pos, item) in self.items.iter().enumerate().skip(start) {
            self.index.insert(item.id().clone(), pos);
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.index.clear();
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Entity + Clone> CachedCollection<T> {
    /// The first `limit` items, cloned.
    pub fn prefix(&self, limit: usize) -> Vec<T> {
        self.items.iter().take(limit).cloned().collect()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.items.clone()
    }
}
