use std::collections::HashMap;

use super::identifier::Key;

pub type Value = Vec<u8>;

/// In-memory value store. No eviction; last writer wins.
#[derive(Debug, Default)]
pub struct Storage {
    map: HashMap<Key, Value>,
}

impl Storage {
    pub fn new() -> Self {
        Storage { map: HashMap::new() }
    }

    pub fn insert(&mut self, key: Key, value: Value) {
        self.map.insert(key, value);
    }

    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.map.get(key)
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
