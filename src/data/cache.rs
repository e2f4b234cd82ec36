use crate::engines::evaluation::reward::Evaluation;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct CacheEntry {
    evaluation: Evaluation,
    hits: usize,
}

/// Evaluations keyed by canonical program key.
pub struct RewardCache {
    data: Mutex<HashMap<String, CacheEntry>>,
    capacity: Option<usize>,
}

impl RewardCache {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            data: Mutex::new(HashMap::with_capacity(capacity.unwrap_or(0).min(1 << 16))),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Look up an evaluation, counting the hit.
    pub fn get(&self, key: &str) -> Option<Evaluation> {
        let mut data = self.lock();
        data.get_mut(key).map(|entry| {
            entry.hits += 1;
            entry.evaluation.clone()
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn insert(&self, key: String, evaluation: Evaluation) {
        let mut data = self.lock();
        if let Some(capacity) = self.capacity {
            if data.len() >= capacity && !data.contains_key(&key) {
                // Full: start over rather than track recency
                data.clear();
            }
        }
        data.entry(key)
            .and_modify(|entry| entry.evaluation = evaluation.clone())
            .or_insert(CacheEntry {
                evaluation,
                hits: 0,
            });
    }

    pub fn hits(&self, key: &str) -> usize {
        self.lock().get(key).map_or(0, |entry| entry.hits)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl Default for RewardCache {
    fn default() -> Self {
        Self::new(None)
    }
}
