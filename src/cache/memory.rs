//! In-process cache backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::cache::{CacheBackend, CacheError};

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// A thread-safe TTL cache bounded by entry count.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    inner: Arc<DashMap<String, Entry>>,
    max_entries: usize,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, entry| entry.expires_at > now);
        before - self.inner.len()
    }

    fn make_room(&self) {
        if self.inner.len() < self.max_entries {
            return;
        }
        if self.purge_expired() > 0 && self.inner.len() < self.max_entries {
            return;
        }
        let oldest = self
            .inner
            .iter()
            .min_by_key(|r| r.value().expires_at)
            .map(|r| r.key().clone());
        if let Some(key) = oldest {
            self.inner.remove(&key);
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = Instant::now();
        let value = match self.inner.get(key) {
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
            Some(_) => None,
            None => return Ok(None),
        };
        // Expired: the read guard is released above before removing.
        self.inner.remove_if(key, |_, entry| entry.expires_at <= now);
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        if !self.inner.contains_key(key) {
            self.make_room();
        }
        self.inner.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}
