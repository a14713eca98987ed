//! Wasmtime-backed embedded runtime.
//!
//! [`WasmRuntimeEngine`] implements [`RuntimeEngine`]: every bootstrap
//! allocates a fresh [`Store`] and [`Linker`] with the host functions
//! registered. [`WasmRuntime`] implements [`EmbeddedRuntime`]:
//!
//! 1. `require` instantiates a built-in library and registers its exports
//!    as an import namespace
//! 2. `evaluate` compiles through the shared [`CodeCache`], instantiates the
//!    module and runs its optional `init` export
//! 3. `call` runs the application's `call` export against one request

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, instrument, warn};
use wasmtime::{Instance, Linker, Store, Trap, TypedFunc};

use crate::library::{builtin, verify_adapter_version};
use crate::linker::register_all;
use rackhost_common::{
    ExecutionConfig, RuntimeConfig, RuntimeError, RuntimeInitializationError, ScriptError,
};
use rackhost_core::store::{calculate_fuel_consumed, create_store, get_remaining_fuel, refuel};
use rackhost_core::{
    ADAPTER_LIBRARY, CodeCache, EmbeddedRuntime, GlobalValue, RackRequest, RackResponse,
    RuntimeContext, RuntimeEngine, RuntimeId, Script, WasmEngine,
};

/// Creates [`WasmRuntime`]s from one shared engine.
#[derive(Debug, Clone)]
pub struct WasmRuntimeEngine {
    engine: WasmEngine,
    execution: ExecutionConfig,
}

impl WasmRuntimeEngine {
    /// Build the engine from runtime configuration.
    pub fn new(config: &RuntimeConfig) -> Result<Self, RuntimeError> {
        Ok(Self::from_parts(
            WasmEngine::new(&config.engine)?,
            config.execution.clone(),
        ))
    }

    /// Wrap an existing engine.
    pub fn from_parts(engine: WasmEngine, execution: ExecutionConfig) -> Self {
        Self { engine, execution }
    }
}

impl RuntimeEngine for WasmRuntimeEngine {
    type Runtime = WasmRuntime;

    #[instrument(skip_all)]
    fn bootstrap(&self, cache: &Arc<CodeCache>) -> Result<WasmRuntime, RuntimeInitializationError> {
        let id = RuntimeId::new();

        let store = create_store(&self.engine, &self.execution, id)
            .map_err(|e| RuntimeInitializationError::engine(e.to_string()))?;

        let mut linker = Linker::new(self.engine.inner());
        register_all(&mut linker).map_err(|e| RuntimeInitializationError::engine(e.to_string()))?;

        debug!(runtime_id = %id, "Runtime created");

        Ok(WasmRuntime {
            id,
            engine: self.engine.clone(),
            cache: Arc::clone(cache),
            execution: self.execution.clone(),
            store,
            linker,
            libraries: HashSet::new(),
        })
    }
}

/// An application object: an instance exporting `call`.
pub struct WasmApplication {
    call: TypedFunc<(), ()>,
}

/// One isolated Wasmtime store with its linker.
pub struct WasmRuntime {
    id: RuntimeId,
    engine: WasmEngine,
    cache: Arc<CodeCache>,
    execution: ExecutionConfig,
    store: Store<RuntimeContext>,
    linker: Linker<RuntimeContext>,
    libraries: HashSet<String>,
}

impl WasmRuntime {
    /// The runtime's store data.
    pub fn context(&self) -> &RuntimeContext {
        self.store.data()
    }

    /// Whether `library` has been loaded.
    pub fn has_library(&self, library: &str) -> bool {
        self.libraries.contains(library)
    }

    fn source_of(script: &Script) -> Result<Cow<'static, [u8]>, ScriptError> {
        match script {
            Script::Inline(source) => Ok(Cow::Owned(source.as_bytes().to_vec())),
            Script::File(path) => {
                let bytes = std::fs::read(path).map_err(RuntimeError::from)?;
                Ok(Cow::Owned(bytes))
            }
            Script::Builtin(name) => builtin(name)
                .map(|b| Cow::Borrowed(b.source.as_bytes()))
                .ok_or_else(|| RuntimeError::unknown_library(name.as_str()).into()),
        }
    }

    fn instantiate(&mut self, script: &Script) -> Result<Instance, ScriptError> {
        let source = Self::source_of(script)?;
        let module = self.cache.get_or_compile(&self.engine, &source)?;

        refuel(&mut self.store, &self.execution)?;
        self.linker
            .instantiate(&mut self.store, module.module())
            .map_err(classify)
    }

    fn check_adapter_version(&mut self, instance: Instance) -> Result<(), ScriptError> {
        let version = instance
            .get_global(&mut self.store, "version")
            .and_then(|g| g.get(&mut self.store).i32());
        verify_adapter_version(version)
    }
}

impl EmbeddedRuntime for WasmRuntime {
    type Object = WasmApplication;

    fn id(&self) -> RuntimeId {
        self.id
    }

    fn bind_global(&mut self, name: &str, value: GlobalValue) {
        self.store.data_mut().bind_global(name, value);
    }

    fn global(&self, name: &str) -> Option<&GlobalValue> {
        self.store.data().global(name)
    }

    #[instrument(skip(self), fields(runtime_id = %self.id))]
    fn require(&mut self, library: &str) -> Result<(), ScriptError> {
        if self.libraries.contains(library) {
            return Ok(());
        }

        let Some(entry) = builtin(library) else {
            return Err(RuntimeError::unknown_library(library).into());
        };

        let instance = self.instantiate(&Script::builtin(library))?;

        if library == ADAPTER_LIBRARY {
            self.check_adapter_version(instance)?;
        }

        if let Some(namespace) = entry.namespace {
            self.linker
                .instance(&mut self.store, namespace, instance)
                .map_err(|e| {
                    RuntimeError::instantiation_failed(format!(
                        "Cannot register {library} as '{namespace}': {e}"
                    ))
                })?;
        }

        self.libraries.insert(library.to_string());
        debug!(library, "Library loaded");
        Ok(())
    }

    #[instrument(skip(self), fields(runtime_id = %self.id, script = %script))]
    fn evaluate(&mut self, script: &Script) -> Result<WasmApplication, ScriptError> {
        let start = Instant::now();
        let instance = self.instantiate(script)?;

        if let Some(init) = instance.get_func(&mut self.store, "init") {
            let init = init.typed::<(), ()>(&self.store).map_err(|e| {
                ScriptError::raised(format!("{script}: `init` has the wrong signature: {e}"))
            })?;
            init.call(&mut self.store, ()).map_err(classify)?;
        }

        let call = instance
            .get_typed_func::<(), ()>(&mut self.store, "call")
            .map_err(|_| ScriptError::raised(format!("{script} does not export a `call` function")))?;

        info!(
            duration_ms = start.elapsed().as_millis(),
            "Application object created"
        );

        Ok(WasmApplication { call })
    }

    fn call(
        &mut self,
        object: &WasmApplication,
        request: &RackRequest,
    ) -> Result<RackResponse, ScriptError> {
        let start = Instant::now();
        refuel(&mut self.store, &self.execution)?;
        let initial_fuel = get_remaining_fuel(&self.store).unwrap_or(0);

        self.store.data_mut().begin_request(request.clone());
        let result = object.call.call(&mut self.store, ());

        let fuel_consumed = calculate_fuel_consumed(initial_fuel, &self.store);
        let context = self.store.data_mut();
        context.metrics.fuel_consumed = fuel_consumed;
        context.metrics.duration = Some(start.elapsed());
        let response = context.finish_request();

        match result {
            Ok(()) => {
                debug!(
                    runtime_id = %self.id,
                    status = response.status(),
                    fuel_consumed,
                    "Request handled"
                );
                Ok(response)
            }
            Err(e) => {
                let err = classify(e);
                error!(runtime_id = %self.id, error = %err, "Application raised an error");
                Err(err)
            }
        }
    }

    fn terminate(self) {
        let metrics = &self.store.data().metrics;
        debug!(
            runtime_id = %self.id,
            requests = metrics.requests,
            "Runtime terminated"
        );
    }
}

impl std::fmt::Debug for WasmApplication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmApplication").finish_non_exhaustive()
    }
}

impl std::fmt::Debug for WasmRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WasmRuntime")
            .field("id", &self.id)
            .field("libraries", &self.libraries)
            .finish_non_exhaustive()
    }
}

/// Turn a Wasmtime error into the script-level error it represents.
///
/// Traps are errors raised by the script; running out of fuel is a resource
/// limit; anything else (link errors, bad imports) is a runtime failure.
fn classify(error: wasmtime::Error) -> ScriptError {
    match error.downcast_ref::<Trap>() {
        Some(Trap::OutOfFuel) => {
            warn!("Execution terminated: fuel exhausted");
            RuntimeError::FuelExhausted.into()
        }
        Some(_) => ScriptError::raised(format!("{error:#}")),
        None => RuntimeError::instantiation_failed(format!("{error:#}")).into(),
    }
}
