//! How an application object is built inside a runtime.

use tracing::debug;

use rackhost_common::ScriptError;
use rackhost_core::{ADAPTER_LIBRARY, ERRORS_APPLICATION, EmbeddedRuntime, Script};

/// Strategy for building the application object of an [`Application`].
///
/// [`Application`]: crate::Application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicationObjectFactory {
    /// Build the deployment's own application from its descriptor.
    Primary {
        /// The configured descriptor, if the init parameter was set.
        descriptor: Option<Script>,
        /// Init parameter the descriptor was read from.
        parameter: String,
    },
    /// Build the built-in errors application.
    Error,
}

impl ApplicationObjectFactory {
    /// Strategy for the primary application.
    pub fn primary(descriptor: Option<Script>, parameter: impl Into<String>) -> Self {
        Self::Primary {
            descriptor,
            parameter: parameter.into(),
        }
    }

    /// Evaluate the application inside `runtime`.
    ///
    /// # Errors
    ///
    /// Returns the error raised while loading the adapter or evaluating the
    /// application. A primary strategy without a descriptor always fails.
    pub fn create<R: EmbeddedRuntime>(&self, runtime: &mut R) -> Result<R::Object, ScriptError> {
        runtime.require(ADAPTER_LIBRARY)?;

        match self {
            Self::Primary {
                descriptor: Some(script),
                ..
            } => {
                debug!(runtime_id = %runtime.id(), script = %script, "Creating application object");
                runtime.evaluate(script)
            }
            Self::Primary {
                descriptor: None,
                parameter,
            } => Err(ScriptError::raised(format!(
                "No application descriptor: init parameter '{parameter}' is not set"
            ))),
            Self::Error => {
                debug!(runtime_id = %runtime.id(), "Creating error application object");
                runtime.evaluate(&Script::builtin(ERRORS_APPLICATION))
            }
        }
    }
}
