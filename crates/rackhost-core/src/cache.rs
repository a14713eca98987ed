//! The compiled-code cache shared by every runtime a factory creates.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::debug;

use crate::module::compute_hash;
use crate::{CompiledModule, WasmEngine};
use rackhost_common::RuntimeError;

/// Compiled modules keyed by the hash of their source.
///
/// One cache is created per factory and handed to every runtime bootstrap
/// by reference. Lookups are lock-free reads on a [`DashMap`], so runtimes on
/// different threads can share it freely. Cached modules are only valid for
/// the engine they were compiled with; a cache must not be shared across
/// engines.
#[derive(Default)]
pub struct CodeCache {
    modules: DashMap<String, Arc<CompiledModule>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Hit/miss counters of a [`CodeCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CodeCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached module for `source`, compiling it on first use.
    ///
    /// Two threads racing on the same new source may both compile it; the
    /// first insert wins and both callers get the same module back.
    pub fn get_or_compile(
        &self,
        engine: &WasmEngine,
        source: &[u8],
    ) -> Result<Arc<CompiledModule>, RuntimeError> {
        let hash = compute_hash(source);

        if let Some(module) = self.modules.get(&hash) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(content_hash = %hash, "Code cache hit");
            return Ok(module.value().clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let compiled = Arc::new(CompiledModule::from_source(engine.inner(), source)?);

        Ok(self.modules.entry(hash).or_insert(compiled).value().clone())
    }

    /// Number of cached modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether the cache holds no modules.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.modules.len(),
        }
    }
}

impl std::fmt::Debug for CodeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeCache")
            .field("stats", &self.stats())
            .finish()
    }
}
