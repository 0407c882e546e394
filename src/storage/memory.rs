use std::collections::HashMap;

/// A single node's shard.
///
/// `create`, `update` and `delete` report whether the key held a value *before*
/// the call, not whether the call did anything. `update` only touches keys that
/// already exist.
#[derive(Debug, Default)]
pub struct LocalStore {
    data: HashMap<String, String>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, key: &str, value: String) -> bool {
        self.data.insert(key.to_string(), value).is_some()
    }

    pub fn read(&self, key: &str) -> Option<String> {
        self.data.get(key).cloned()
    }

    pub fn update(&mut self, key: &str, value: String) -> bool {
        match self.data.get_mut(key) {
            Some(existing) => {
                *existing = value;
                true
            }
            None => false,
        }
    }

    pub fn delete(&mut self, key: &str) -> bool {
        self.data.remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.data.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
