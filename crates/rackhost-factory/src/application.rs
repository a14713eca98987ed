//! Applications and their lifecycle.
//!
//! An [`Application`] is either backed by an embedded runtime it owns
//! exclusively, or is the fallback that stands in for an error application
//! whose construction failed.
//!
//! ```text
//! Uninitialized ──init──▶ Initialized
//!       │                      │
//!       └──────destroy─────────┴──▶ Destroyed
//! ```

use std::sync::Arc;

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

use rackhost_common::{ApplicationError, RackInitializationError};
use rackhost_core::{EmbeddedRuntime, RackRequest, RackResponse, RuntimeId};

use crate::strategy::ApplicationObjectFactory;

/// Body prefix of every fallback response.
pub const FALLBACK_BODY_PREFIX: &str = "Application initialization failed: ";

/// A request-handling application.
#[derive(Debug)]
pub enum Application<R: EmbeddedRuntime> {
    /// Backed by an embedded runtime.
    Embedded(EmbeddedApplication<R>),
    /// Stand-in used when the error application could not be built.
    Fallback(FallbackApplication),
}

impl<R: EmbeddedRuntime> Application<R> {
    /// Wrap a freshly bootstrapped runtime. The application starts
    /// uninitialized.
    pub fn embedded(runtime: R, strategy: Arc<ApplicationObjectFactory>) -> Self {
        Self::Embedded(EmbeddedApplication::new(runtime, strategy))
    }

    /// Build the application object.
    ///
    /// # Errors
    ///
    /// Fails if the object could not be built, or the application was already
    /// initialized or destroyed. A failed `init` leaves the application
    /// uninitialized.
    pub fn init(&self) -> Result<(), RackInitializationError> {
        match self {
            Self::Embedded(app) => app.init(),
            Self::Fallback(_) => Ok(()),
        }
    }

    /// Handle one request.
    ///
    /// # Errors
    ///
    /// Returns the error raised by the application object, or a lifecycle
    /// error when the application is not initialized or already destroyed.
    pub fn call(&self, request: &RackRequest) -> Result<RackResponse, ApplicationError> {
        match self {
            Self::Embedded(app) => app.call(request),
            Self::Fallback(app) => Ok(app.call(request)),
        }
    }

    /// Tear the application down. Destroying twice is a no-op.
    pub fn destroy(&self) {
        match self {
            Self::Embedded(app) => app.destroy(),
            Self::Fallback(_) => {}
        }
    }

    /// Exclusive access to the owned runtime.
    ///
    /// # Errors
    ///
    /// Fails for the fallback, which has no runtime, and after `destroy`.
    pub fn runtime(&self) -> Result<MappedMutexGuard<'_, R>, ApplicationError> {
        match self {
            Self::Embedded(app) => app.runtime(),
            Self::Fallback(_) => Err(ApplicationError::Unsupported {
                operation: "runtime",
            }),
        }
    }

    /// Identity of the owned runtime; `None` for the fallback.
    pub fn runtime_id(&self) -> Option<RuntimeId> {
        match self {
            Self::Embedded(app) => Some(app.runtime_id()),
            Self::Fallback(_) => None,
        }
    }

    /// Whether this is the fallback application.
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

enum State<R: EmbeddedRuntime> {
    Uninitialized { runtime: R },
    Initialized { runtime: R, object: R::Object },
    Destroyed,
}

impl<R: EmbeddedRuntime> State<R> {
    fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized { .. } => "uninitialized",
            Self::Initialized { .. } => "initialized",
            Self::Destroyed => "destroyed",
        }
    }
}

/// An application owning one embedded runtime.
///
/// The runtime sits behind a mutex, so a shared application serializes
/// concurrent calls.
pub struct EmbeddedApplication<R: EmbeddedRuntime> {
    runtime_id: RuntimeId,
    strategy: Arc<ApplicationObjectFactory>,
    state: Mutex<State<R>>,
}

impl<R: EmbeddedRuntime> EmbeddedApplication<R> {
    fn new(runtime: R, strategy: Arc<ApplicationObjectFactory>) -> Self {
        Self {
            runtime_id: runtime.id(),
            strategy,
            state: Mutex::new(State::Uninitialized { runtime }),
        }
    }

    /// Identity of the owned runtime.
    pub fn runtime_id(&self) -> RuntimeId {
        self.runtime_id
    }

    #[instrument(skip(self), fields(runtime_id = %self.runtime_id))]
    fn init(&self) -> Result<(), RackInitializationError> {
        let mut state = self.state.lock();

        match std::mem::replace(&mut *state, State::Destroyed) {
            State::Uninitialized { mut runtime } => match self.strategy.create(&mut runtime) {
                Ok(object) => {
                    *state = State::Initialized { runtime, object };
                    info!("Application initialized");
                    Ok(())
                }
                Err(e) => {
                    *state = State::Uninitialized { runtime };
                    warn!(error = %e, "Application object could not be created");
                    Err(e.into())
                }
            },
            initialized @ State::Initialized { .. } => {
                *state = initialized;
                Err(RackInitializationError::AlreadyInitialized)
            }
            State::Destroyed => Err(RackInitializationError::Destroyed),
        }
    }

    fn call(&self, request: &RackRequest) -> Result<RackResponse, ApplicationError> {
        let mut state = self.state.lock();
        match &mut *state {
            State::Initialized { runtime, object } => Ok(runtime.call(object, request)?),
            State::Uninitialized { .. } => Err(ApplicationError::NotInitialized),
            State::Destroyed => Err(ApplicationError::Destroyed),
        }
    }

    fn destroy(&self) {
        let previous = std::mem::replace(&mut *self.state.lock(), State::Destroyed);
        match previous {
            State::Uninitialized { runtime } | State::Initialized { runtime, .. } => {
                runtime.terminate();
                debug!(runtime_id = %self.runtime_id, "Application destroyed");
            }
            State::Destroyed => {
                debug!(runtime_id = %self.runtime_id, "Application already destroyed");
            }
        }
    }

    fn runtime(&self) -> Result<MappedMutexGuard<'_, R>, ApplicationError> {
        MutexGuard::try_map(self.state.lock(), |state| match state {
            State::Uninitialized { runtime } | State::Initialized { runtime, .. } => Some(runtime),
            State::Destroyed => None,
        })
        .map_err(|_| ApplicationError::Destroyed)
    }
}

impl<R: EmbeddedRuntime> std::fmt::Debug for EmbeddedApplication<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedApplication")
            .field("runtime_id", &self.runtime_id)
            .field("strategy", &self.strategy)
            .field("state", &self.state.lock().name())
            .finish()
    }
}

/// Answers every request with a 500 naming why the error application
/// could not be built.
#[derive(Debug, Clone)]
pub struct FallbackApplication {
    response: RackResponse,
}

impl FallbackApplication {
    /// Build the fallback for a construction failure.
    pub fn new(cause: &dyn std::error::Error) -> Self {
        let response = RackResponse::new(
            500,
            Default::default(),
            format!("{FALLBACK_BODY_PREFIX}{cause}"),
        );
        Self { response }
    }

    fn call(&self, _request: &RackRequest) -> RackResponse {
        self.response.clone()
    }
}
