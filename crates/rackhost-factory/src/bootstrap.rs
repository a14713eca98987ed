//! Runtime bootstrap.
//!
//! Every application gets a fresh runtime wired to the factory's shared
//! code cache, with the host context bound as a global and the adapter
//! library loaded.

use std::sync::Arc;

use tracing::{debug, error, instrument};

use rackhost_common::{HostContext, RuntimeInitializationError};
use rackhost_core::{
    ADAPTER_LIBRARY, CodeCache, EmbeddedRuntime, GlobalValue, HOST_CONTEXT_GLOBAL, RuntimeEngine,
};

/// Creates ready-to-use runtimes for one deployment.
pub struct RuntimeBootstrap<E: RuntimeEngine> {
    engine: Arc<E>,
    cache: Arc<CodeCache>,
    context: Arc<dyn HostContext>,
}

impl<E: RuntimeEngine> RuntimeBootstrap<E> {
    /// Create a bootstrap sharing `cache` across every runtime it builds.
    pub fn new(engine: Arc<E>, cache: Arc<CodeCache>, context: Arc<dyn HostContext>) -> Self {
        Self {
            engine,
            cache,
            context,
        }
    }

    /// The shared compiled-code cache.
    pub fn cache(&self) -> &Arc<CodeCache> {
        &self.cache
    }

    /// Allocate a runtime with the host context bound and the adapter loaded.
    ///
    /// # Errors
    ///
    /// Fails if the engine cannot create a runtime or the adapter does not
    /// load. A runtime whose adapter failed is terminated before returning.
    #[instrument(skip(self))]
    pub fn new_runtime(&self) -> Result<E::Runtime, RuntimeInitializationError> {
        let mut runtime = self.engine.bootstrap(&self.cache)?;

        runtime.bind_global(
            HOST_CONTEXT_GLOBAL,
            GlobalValue::Context(Arc::clone(&self.context)),
        );

        if let Err(e) = runtime.require(ADAPTER_LIBRARY) {
            error!(runtime_id = %runtime.id(), error = %e, "Adapter failed to load");
            runtime.terminate();
            return Err(RuntimeInitializationError::library(ADAPTER_LIBRARY, e));
        }

        debug!(runtime_id = %runtime.id(), "Runtime ready");
        Ok(runtime)
    }
}

impl<E: RuntimeEngine> std::fmt::Debug for RuntimeBootstrap<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeBootstrap")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
