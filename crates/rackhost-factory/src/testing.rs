//! Scripted runtime and host context for lifecycle tests.
//!
//! Inline and file scripts are interpreted the same way, from the script
//! text or the path: `raise <message>` raises `<message>`; anything else
//! becomes an object answering 200 with that text as body. An object whose
//! body is `trap` raises on `call`.

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use rackhost_common::{
    HostContext, RuntimeError, RuntimeInitializationError, ScriptError, error_chain,
};
use rackhost_core::{
    ADAPTER_LIBRARY, CodeCache, ERRORS_APPLICATION, EmbeddedRuntime, GlobalValue, RackRequest,
    RackResponse, RuntimeEngine, RuntimeId, Script,
};

/// Shared counter of terminated runtimes.
#[derive(Debug, Clone, Default)]
pub(crate) struct Terminations(Arc<Mutex<Vec<RuntimeId>>>);

impl Terminations {
    pub(crate) fn count(&self) -> usize {
        self.0.lock().len()
    }

    pub(crate) fn contains(&self, id: RuntimeId) -> bool {
        self.0.lock().contains(&id)
    }

    fn record(&self, id: RuntimeId) {
        self.0.lock().push(id);
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeEngine {
    broken_engine: bool,
    broken_adapter: bool,
    broken_errors_app: bool,
    bootstrapped: AtomicUsize,
    terminated: Terminations,
}

impl FakeEngine {
    pub(crate) fn with_broken_engine(mut self) -> Self {
        self.broken_engine = true;
        self
    }

    pub(crate) fn with_broken_adapter(mut self) -> Self {
        self.broken_adapter = true;
        self
    }

    pub(crate) fn with_broken_errors_app(mut self) -> Self {
        self.broken_errors_app = true;
        self
    }

    pub(crate) fn terminated(&self) -> Terminations {
        self.terminated.clone()
    }

    pub(crate) fn bootstrapped(&self) -> usize {
        self.bootstrapped.load(Ordering::SeqCst)
    }

    /// A runtime built outside any bootstrap.
    pub(crate) fn runtime(&self) -> FakeRuntime {
        FakeRuntime {
            id: RuntimeId::new(),
            globals: HashMap::new(),
            libraries: HashSet::new(),
            broken_adapter: self.broken_adapter,
            broken_errors_app: self.broken_errors_app,
            terminated: self.terminated.clone(),
        }
    }
}

impl RuntimeEngine for FakeEngine {
    type Runtime = FakeRuntime;

    fn bootstrap(&self, _cache: &Arc<CodeCache>) -> Result<FakeRuntime, RuntimeInitializationError> {
        if self.broken_engine {
            return Err(RuntimeInitializationError::engine("engine offline"));
        }
        self.bootstrapped.fetch_add(1, Ordering::SeqCst);
        Ok(self.runtime())
    }
}

#[derive(Debug)]
pub(crate) struct FakeObject {
    pub(crate) body: String,
}

#[derive(Debug)]
pub(crate) struct FakeRuntime {
    id: RuntimeId,
    globals: HashMap<String, GlobalValue>,
    libraries: HashSet<String>,
    broken_adapter: bool,
    broken_errors_app: bool,
    terminated: Terminations,
}

impl FakeRuntime {
    pub(crate) fn has_library(&self, library: &str) -> bool {
        self.libraries.contains(library)
    }
}

impl EmbeddedRuntime for FakeRuntime {
    type Object = FakeObject;

    fn id(&self) -> RuntimeId {
        self.id
    }

    fn bind_global(&mut self, name: &str, value: GlobalValue) {
        self.globals.insert(name.to_string(), value);
    }

    fn global(&self, name: &str) -> Option<&GlobalValue> {
        self.globals.get(name)
    }

    fn require(&mut self, library: &str) -> Result<(), ScriptError> {
        if library != ADAPTER_LIBRARY {
            return Err(RuntimeError::unknown_library(library).into());
        }
        if self.broken_adapter {
            return Err(ScriptError::raised("adapter is broken"));
        }
        self.libraries.insert(library.to_string());
        Ok(())
    }

    fn evaluate(&mut self, script: &Script) -> Result<FakeObject, ScriptError> {
        match script {
            Script::Inline(source) => scripted(source),
            Script::File(path) => scripted(&path.to_string_lossy()),
            Script::Builtin(name) if name == ERRORS_APPLICATION => {
                if self.broken_errors_app {
                    Err(ScriptError::raised("errors app exploded"))
                } else {
                    Ok(FakeObject { body: name.clone() })
                }
            }
            Script::Builtin(name) => Err(RuntimeError::unknown_library(name.as_str()).into()),
        }
    }

    fn call(
        &mut self,
        object: &FakeObject,
        request: &RackRequest,
    ) -> Result<RackResponse, ScriptError> {
        if object.body == "trap" {
            return Err(ScriptError::raised(format!("trap at {}", request.path)));
        }
        Ok(RackResponse::text(200, &object.body))
    }

    fn terminate(self) {
        self.terminated.record(self.id);
    }
}

fn scripted(text: &str) -> Result<FakeObject, ScriptError> {
    match text.strip_prefix("raise ") {
        Some(message) => Err(ScriptError::raised(message)),
        None => Ok(FakeObject {
            body: text.to_string(),
        }),
    }
}

/// Host context recording every log call.
#[derive(Debug, Default)]
pub(crate) struct RecordingContext {
    params: HashMap<String, String>,
    logs: Mutex<Vec<(String, Option<String>)>>,
}

impl RecordingContext {
    pub(crate) fn with_param(mut self, name: &str, value: &str) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }

    pub(crate) fn logs(&self) -> Vec<(String, Option<String>)> {
        self.logs.lock().clone()
    }
}

impl HostContext for RecordingContext {
    fn init_parameter(&self, name: &str) -> Option<String> {
        self.params.get(name).cloned()
    }

    fn log(&self, message: &str, error: Option<&(dyn Error + 'static)>) {
        self.logs
            .lock()
            .push((message.to_string(), error.map(error_chain)));
    }
}
