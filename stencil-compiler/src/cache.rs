//! Compiled-template cache.
//!
//! Keyed by the exact template source. Entries are shared `Arc<[Node]>`
//! slices, so a hit never copies the tree.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::ast::Node;

#[derive(Debug, Default)]
pub struct TemplateCache {
    entries: Mutex<HashMap<String, Arc<[Node]>>>,
    /// `None` never evicts.
    capacity: Option<usize>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: usize,
    pub misses: usize,
}

impl TemplateCache {
    #[must_use]
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn get(&self, template: &str) -> Option<Arc<[Node]>> {
        let found = self.lock().get(template).cloned();
        match found {
            Some(nodes) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(len = template.len(), "template cache hit");
                Some(nodes)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(len = template.len(), "template cache miss");
                None
            }
        }
    }

    /// Stores a compiled tree. When the cache is full it is emptied first.
    pub fn insert(&self, template: &str, nodes: Arc<[Node]>) {
        let mut entries = self.lock();
        if let Some(capacity) = self.capacity {
            if entries.len() >= capacity && !entries.contains_key(template) {
                debug!(capacity, "template cache full, clearing");
                entries.clear();
            }
        }
        entries.insert(template.to_string(), nodes);
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.lock().len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    // Entries are inserted whole, so a poisoned map is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<[Node]>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
