//! The embedded-runtime capability boundary.
//!
//! The factory never talks to an engine directly; it works through two
//! traits:
//! - [`RuntimeEngine`]: creates independent runtimes sharing one [`CodeCache`]
//! - [`EmbeddedRuntime`]: one isolated execution environment
//!
//! `rackhost-host` implements both on top of Wasmtime. Tests implement them
//! with scripted fakes.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use uuid::Uuid;

use crate::{CodeCache, RackRequest, RackResponse};
use rackhost_common::{HostContext, RuntimeInitializationError, ScriptError};

/// Global name the host context is published under in every runtime.
pub const HOST_CONTEXT_GLOBAL: &str = "$host_context";

/// The request/response adapter library loaded into every runtime.
pub const ADAPTER_LIBRARY: &str = "rack/adapter";

/// The built-in errors application.
pub const ERRORS_APPLICATION: &str = "rack/errors";

/// Unique identity of a runtime instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuntimeId(Uuid);

impl RuntimeId {
    /// Allocate a fresh identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RuntimeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RuntimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A piece of code a runtime can evaluate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Script {
    /// Source text given inline.
    Inline(String),
    /// Source read from a file.
    File(PathBuf),
    /// A module shipped with the runtime, looked up by name.
    Builtin(String),
}

impl Script {
    /// Interpret a configured descriptor.
    ///
    /// Text starting with `(` is inline module source; anything else is a
    /// path to a module file.
    pub fn from_descriptor(descriptor: &str) -> Self {
        let trimmed = descriptor.trim();
        if trimmed.starts_with('(') {
            Self::Inline(trimmed.to_string())
        } else {
            Self::File(PathBuf::from(trimmed))
        }
    }

    /// Refer to a built-in module.
    pub fn builtin(name: &str) -> Self {
        Self::Builtin(name.to_string())
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(source) => write!(f, "<inline:{} bytes>", source.len()),
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Builtin(name) => write!(f, "<builtin:{name}>"),
        }
    }
}

/// A value bound into a runtime's global namespace.
#[derive(Clone)]
pub enum GlobalValue {
    /// The hosting environment's services.
    Context(Arc<dyn HostContext>),
    /// A plain string.
    Text(String),
}

impl fmt::Debug for GlobalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Context(_) => f.write_str("Context(..)"),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
        }
    }
}

/// One isolated scripting environment.
///
/// A runtime is owned by exactly one application and is torn down by
/// consuming it with [`terminate`](Self::terminate).
pub trait EmbeddedRuntime: Send {
    /// Handle to an application object living inside this runtime.
    type Object: Send;

    /// This runtime's identity.
    fn id(&self) -> RuntimeId;

    /// Bind `value` under `name` in the global namespace.
    fn bind_global(&mut self, name: &str, value: GlobalValue);

    /// Look up a global binding.
    fn global(&self, name: &str) -> Option<&GlobalValue>;

    /// Load a named library. Loading an already loaded library is a no-op.
    fn require(&mut self, library: &str) -> Result<(), ScriptError>;

    /// Evaluate `script` and return the application object it builds.
    fn evaluate(&mut self, script: &Script) -> Result<Self::Object, ScriptError>;

    /// Invoke an application object with one request.
    fn call(
        &mut self,
        object: &Self::Object,
        request: &RackRequest,
    ) -> Result<RackResponse, ScriptError>;

    /// Tear the runtime down, releasing everything it holds.
    fn terminate(self)
    where
        Self: Sized;
}

/// Creates runtimes.
pub trait RuntimeEngine: Send + Sync {
    /// The runtime type this engine produces.
    type Runtime: EmbeddedRuntime;

    /// Allocate a fresh, independent runtime wired to the shared `cache`.
    fn bootstrap(&self, cache: &Arc<CodeCache>)
    -> Result<Self::Runtime, RuntimeInitializationError>;
}
