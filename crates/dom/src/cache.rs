//! Compiled selector cache
//!
//! Lint rules query the same handful of selectors on every document, so
//! compiled matchers are kept process-wide and shared by all documents.
//!
//! - Lookups and inserts are lock-sharded (`DashMap`)
//! - The shard lock is held while compiling, so a selector is compiled at
//!   most once even when many workers ask for it at the same time
//! - Bounded: the least recently used selector is evicted at capacity

use crate::error::Result;
use crate::selector::{CssCompiler, Matcher, SelectorCompiler};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static GLOBAL: Lazy<Arc<SelectorCache>> =
    Lazy::new(|| Arc::new(SelectorCache::new(Arc::new(CssCompiler))));

/// Selector cache configuration
#[derive(Debug, Clone)]
pub struct SelectorCacheConfig {
    /// Maximum number of compiled selectors kept
    pub capacity: usize,
}

impl Default for SelectorCacheConfig {
    fn default() -> Self {
        Self { capacity: 512 }
    }
}

struct CacheEntry {
    matcher: Arc<dyn Matcher>,
    last_used: AtomicU64,
}

/// Selector string → compiled matcher
pub struct SelectorCache {
    compiler: Arc<dyn SelectorCompiler>,
    entries: DashMap<String, CacheEntry>,
    capacity: usize,
    clock: AtomicU64,
}

impl SelectorCache {
    pub fn new(compiler: Arc<dyn SelectorCompiler>) -> Self {
        Self::with_config(compiler, SelectorCacheConfig::default())
    }

    pub fn with_config(compiler: Arc<dyn SelectorCompiler>, config: SelectorCacheConfig) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            compiler,
            entries: DashMap::with_capacity(capacity.min(1024)),
            capacity,
            clock: AtomicU64::new(0),
        }
    }

    /// The process-wide cache, backed by [`CssCompiler`]
    pub fn global() -> Arc<SelectorCache> {
        Arc::clone(&GLOBAL)
    }

    /// Get the compiled matcher for `selector`, compiling it on first use
    ///
    /// Compilation errors are returned to the caller and not cached.
    pub fn get_or_compile(&self, selector: &str) -> Result<Arc<dyn Matcher>> {
        let tick = self.clock.fetch_add(1, Ordering::Relaxed);

        if let Some(entry) = self.entries.get(selector) {
            entry.last_used.store(tick, Ordering::Relaxed);
            return Ok(Arc::clone(&entry.matcher));
        }

        // Evict before taking the entry lock: iterating while holding a
        // shard write lock would deadlock on that shard.
        if self.entries.len() >= self.capacity {
            self.evict_least_recent();
        }

        match self.entries.entry(selector.to_string()) {
            Entry::Occupied(entry) => {
                entry.get().last_used.store(tick, Ordering::Relaxed);
                Ok(Arc::clone(&entry.get().matcher))
            }
            Entry::Vacant(slot) => {
                tracing::debug!(selector, "Compiling selector");
                let matcher = self.compiler.compile(selector)?;
                slot.insert(CacheEntry {
                    matcher: Arc::clone(&matcher),
                    last_used: AtomicU64::new(tick),
                });
                Ok(matcher)
            }
        }
    }

    fn evict_least_recent(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().last_used.load(Ordering::Relaxed))
            .map(|entry| entry.key().clone());

        if let Some(selector) = oldest {
            tracing::debug!(selector = selector.as_str(), "Evicting compiled selector");
            self.entries.remove(&selector);
        }
    }

    pub fn contains(&self, selector: &str) -> bool {
        self.entries.contains_key(selector)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
