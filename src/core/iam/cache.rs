//! LRU cache of parsed policy statements
//!
//! Stores keep statements as JSON text and parse on read. The same
//! statements are read on nearly every decision, so parsed forms are kept
//! keyed by their raw text. Parse failures are not cached.

use super::policy::PolicyStatement;
use crate::core::error::Result;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Shared LRU cache from raw statement JSON to the parsed statement
pub struct StatementCache {
    cache: Mutex<LruCache<String, Arc<PolicyStatement>>>,
}

impl StatementCache {
    /// Create a new statement cache with given capacity (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        StatementCache {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Return the cached statement for `raw`, parsing it on a miss
    pub fn get_or_parse(&self, raw: &str) -> Result<Arc<PolicyStatement>> {
        if let Some(hit) = self.cache.lock().get(raw) {
            return Ok(Arc::clone(hit));
        }

        let parsed = Arc::new(PolicyStatement::from_json(raw)?);
        self.cache.lock().put(raw.to_string(), Arc::clone(&parsed));
        Ok(parsed)
    }

    /// Clear the cache
    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    /// Number of cached statements
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Check if cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}
