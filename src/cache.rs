#![cfg(feature = "cache")]

use crate::chains::ChainType;
use crate::Summary;
use dashmap::DashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(100) {
    Some(n) => n,
    None => unreachable!(),
};

struct Entry {
    summary: Summary,
    inserted: u64,
}

/// Summaries keyed by method, model and URL. Holds at most `capacity`
/// entries; inserting a new key into a full cache evicts the oldest one.
#[derive(Clone)]
pub struct Cache {
    cache: Arc<DashMap<String, Entry>>,
    capacity: usize,
    clock: Arc<AtomicU64>,
}

impl Cache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(DEFAULT_CAPACITY);
        Self {
            cache: Arc::new(DashMap::with_capacity(capacity.get())),
            capacity: capacity.get(),
            clock: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn key(method: ChainType, model: &str, url: &str) -> String {
        format!("{}:{model}:{url}", method.key())
    }

    pub async fn get(&self, key: &str) -> Option<Summary> {
        self.cache.get(key).map(|entry| entry.summary.clone())
    }

    pub async fn set(&self, key: String, value: Summary) {
        if !self.cache.contains_key(&key) {
            while self.cache.len() >= self.capacity {
                if !self.evict_oldest() {
                    break;
                }
            }
        }
        let inserted = self.clock.fetch_add(1, Ordering::Relaxed);
        self.cache.insert(
            key,
            Entry {
                summary: value,
                inserted,
            },
        );
    }

    pub async fn remove(&self, key: &str) -> Option<Summary> {
        self.cache.remove(key).map(|(_, entry)| entry.summary)
    }

    fn evict_oldest(&self) -> bool {
        let oldest = self
            .cache
            .iter()
            .min_by_key(|entry| entry.inserted)
            .map(|entry| entry.key().clone());
        match oldest {
            Some(key) => self.cache.remove(&key).is_some(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
