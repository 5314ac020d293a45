// src/bias/cache.rs
//
// Bounded digest -> label cache. Eviction is by insertion order: when full,
// exactly the single oldest-inserted entry is removed before the new insert.
// This is an approximation of LRU (no access-recency tracking); callers must
// not assume strict LRU semantics. `Unknown` is never stored, so a transient
// classifier failure is not memoized.

use std::collections::{HashMap, VecDeque};

use sha2::{Digest, Sha256};

use crate::bias::types::Bias;

pub const DEFAULT_CAPACITY: usize = 5000;

/// SHA-256 hex digest of trimmed article text, used as the cache key.
pub fn text_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.trim().as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[derive(Debug)]
pub struct BiasCache {
    capacity: usize,
    map: HashMap<String, Bias>,
    order: VecDeque<String>,
}

impl BiasCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            map: HashMap::with_capacity(capacity.min(1024)),
            order: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    pub fn get(&self, key: &str) -> Option<Bias> {
        self.map.get(key).copied()
    }

    /// Insert a conclusive label. Updating an existing key keeps its original
    /// insertion position.
    pub fn insert(&mut self, key: String, value: Bias) {
        if let Some(slot) = self.map.get_mut(&key) {
            *slot = value;
            return;
        }
        if self.map.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.map.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.map.insert(key, value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
