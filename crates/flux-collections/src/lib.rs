// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fixed-contract string-keyed and long-keyed maps with eviction callbacks.
//!
//! Mirrors Celix's `celix_string_hash_map_t` / `celix_long_hash_map_t`: two
//! concrete map kinds (never a fully generic map) that call an optional
//! `removed` callback with the evicted value whenever an entry is
//! overwritten or removed, so owners can release resources without a
//! separate teardown pass.

#![forbid(unsafe_code)]

use indexmap::IndexMap;
use std::hash::Hash;

/// Invoked with a value that just left the map, either by overwrite or by
/// explicit removal.
pub type RemovedCallback<V> = Box<dyn Fn(V) + Send + Sync>;

struct EvictingMap<K, V> {
    entries: IndexMap<K, V>,
    on_removed: Option<RemovedCallback<V>>,
}

impl<K: Eq + Hash + Clone, V> EvictingMap<K, V> {
    fn new() -> Self {
        Self { entries: IndexMap::new(), on_removed: None }
    }

    fn set_removed_callback(&mut self, callback: RemovedCallback<V>) {
        self.on_removed = Some(callback);
    }

    fn put(&mut self, key: K, value: V) -> Option<V> {
        let previous = self.entries.insert(key, value);
        if let (Some(prev), Some(cb)) = (previous, &self.on_removed) {
            cb(prev);
            return None;
        }
        previous
    }

    fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    fn remove(&mut self, key: &K) -> bool {
        match self.entries.shift_remove(key) {
            Some(value) => {
                if let Some(cb) = &self.on_removed {
                    cb(value);
                } else {
                    drop(value);
                }
                true
            }
            None => false,
        }
    }

    fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }

    fn clear(&mut self) {
        if self.on_removed.is_some() {
            let drained: Vec<V> = self.entries.drain(..).map(|(_, v)| v).collect();
            for v in drained {
                (self.on_removed.as_ref().unwrap())(v);
            }
        } else {
            self.entries.clear();
        }
    }
}

/// String-keyed map with an optional eviction callback.
pub struct StringHashMap<V>(EvictingMap<String, V>);

impl<V> Default for StringHashMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> StringHashMap<V> {
    pub fn new() -> Self {
        Self(EvictingMap::new())
    }

    pub fn with_removed_callback(callback: impl Fn(V) + Send + Sync + 'static) -> Self {
        let mut map = Self::new();
        map.0.set_removed_callback(Box::new(callback));
        map
    }

    pub fn put(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        self.0.put(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.get(&key.to_string())
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.0.remove(&key.to_string())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(&key.to_string())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// `i64`-keyed map with an optional eviction callback; used for the
/// service-id and scheduled-event-id indices.
pub struct LongHashMap<V>(EvictingMap<i64, V>);

impl<V> Default for LongHashMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> LongHashMap<V> {
    pub fn new() -> Self {
        Self(EvictingMap::new())
    }

    pub fn with_removed_callback(callback: impl Fn(V) + Send + Sync + 'static) -> Self {
        let mut map = Self::new();
        map.0.set_removed_callback(Box::new(callback));
        map
    }

    pub fn put(&mut self, key: i64, value: V) -> Option<V> {
        self.0.put(key, value)
    }

    pub fn get(&self, key: i64) -> Option<&V> {
        self.0.get(&key)
    }

    pub fn remove(&mut self, key: i64) -> bool {
        self.0.remove(&key)
    }

    pub fn contains_key(&self, key: i64) -> bool {
        self.0.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = i64> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &V)> {
        self.0.iter().map(|(k, v)| (*k, v))
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn put_and_get_round_trip() {
        let mut map = StringHashMap::new();
        map.put("a", 1);
        assert_eq!(map.get("a"), Some(&1));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn overwrite_invokes_removed_callback_with_old_value() {
        let evicted = Rc::new(RefCell::new(Vec::new()));
        let evicted_clone = evicted.clone();
        let mut map = StringHashMap::with_removed_callback(move |v: i32| evicted_clone.borrow_mut().push(v));
        map.put("a", 1);
        map.put("a", 2);
        assert_eq!(*evicted.borrow(), vec![1]);
        assert_eq!(map.get("a"), Some(&2));
    }

    #[test]
    fn remove_invokes_removed_callback() {
        let evicted = Rc::new(RefCell::new(Vec::new()));
        let evicted_clone = evicted.clone();
        let mut map = LongHashMap::with_removed_callback(move |v: &'static str| evicted_clone.borrow_mut().push(v));
        map.put(7, "seven");
        assert!(map.remove(7));
        assert_eq!(*evicted.borrow(), vec!["seven"]);
        assert!(!map.remove(7));
    }

    #[test]
    fn clear_invokes_removed_callback_for_every_entry() {
        let count = Rc::new(RefCell::new(0));
        let count_clone = count.clone();
        let mut map = StringHashMap::with_removed_callback(move |_: i32| *count_clone.borrow_mut() += 1);
        map.put("a", 1);
        map.put("b", 2);
        map.clear();
        assert_eq!(*count.borrow(), 2);
        assert!(map.is_empty());
    }
}
