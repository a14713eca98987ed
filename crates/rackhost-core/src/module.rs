//! WebAssembly module compilation.
//!
//! This module provides [`CompiledModule`], a wrapper around Wasmtime's
//! [`Module`] carrying the metadata the [`CodeCache`](crate::CodeCache) keys on.
//! Sources may be binary Wasm or WAT text.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::Instant;

use tracing::{info, instrument};
use wasmtime::{Engine, Module};

use rackhost_common::RuntimeError;

const WASM_MAGIC: &[u8] = b"\0asm";

/// A compiled WebAssembly module.
///
/// `CompiledModule` is thread-safe and can be instantiated by any number of
/// runtimes created from the same engine.
#[derive(Clone)]
pub struct CompiledModule {
    inner: Module,

    /// Hash of the original source.
    content_hash: String,
}

impl CompiledModule {
    /// Compile a module from either binary Wasm or WAT text.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is neither valid Wasm nor valid UTF-8
    /// WAT, or if compilation fails.
    pub fn from_source(engine: &Engine, source: &[u8]) -> Result<Self, RuntimeError> {
        if source.starts_with(WASM_MAGIC) {
            return Self::from_bytes(engine, source);
        }

        let wat = std::str::from_utf8(source).map_err(|e| {
            RuntimeError::compilation_failed(format!("Source is neither Wasm nor UTF-8 WAT: {e}"))
        })?;
        Self::from_wat(engine, wat)
    }

    /// Compile a module from WebAssembly bytes.
    #[instrument(skip(engine, bytes), fields(bytes_len = bytes.len()))]
    pub fn from_bytes(engine: &Engine, bytes: &[u8]) -> Result<Self, RuntimeError> {
        let start = Instant::now();

        Self::validate_wasm_header(bytes)?;

        let module = Module::new(engine, bytes).map_err(|e| {
            RuntimeError::compilation_failed(format!("Module compilation failed: {e}"))
        })?;

        let content_hash = compute_hash(bytes);

        info!(
            content_hash = %content_hash,
            duration_ms = start.elapsed().as_millis(),
            "Module compiled"
        );

        Ok(Self {
            inner: module,
            content_hash,
        })
    }

    /// Compile a module from WAT (WebAssembly Text Format).
    #[instrument(skip(engine, wat))]
    pub fn from_wat(engine: &Engine, wat: &str) -> Result<Self, RuntimeError> {
        let start = Instant::now();

        let module = Module::new(engine, wat).map_err(|e| {
            RuntimeError::compilation_failed(format!("WAT compilation failed: {e}"))
        })?;

        let content_hash = compute_hash(wat.as_bytes());

        info!(
            content_hash = %content_hash,
            duration_ms = start.elapsed().as_millis(),
            "WAT module compiled"
        );

        Ok(Self {
            inner: module,
            content_hash,
        })
    }

    /// Get the inner Wasmtime module.
    pub fn module(&self) -> &Module {
        &self.inner
    }

    /// Get the content hash of the original source.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Validate WebAssembly header (magic number).
    fn validate_wasm_header(bytes: &[u8]) -> Result<(), RuntimeError> {
        if bytes.len() < 8 {
            return Err(RuntimeError::compilation_failed(
                "Invalid Wasm: file too small",
            ));
        }

        if &bytes[0..4] != WASM_MAGIC {
            return Err(RuntimeError::compilation_failed(
                "Invalid Wasm: bad magic number",
            ));
        }

        Ok(())
    }
}

impl std::fmt::Debug for CompiledModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledModule")
            .field("content_hash", &self.content_hash)
            .finish_non_exhaustive()
    }
}

/// Compute a hash of the given bytes.
pub(crate) fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
