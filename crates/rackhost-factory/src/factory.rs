//! The application factory.
//!
//! A deployment owns one factory. `init` reads the application descriptor
//! from the host context, creates the code cache shared by every runtime,
//! and builds the error application. After that, applications can be
//! requested from any thread.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use rackhost_common::{FactoryConfig, HostContext, RackInitializationError};
use rackhost_core::{CodeCache, RuntimeEngine, Script};

use crate::application::{Application, FallbackApplication};
use crate::bootstrap::RuntimeBootstrap;
use crate::strategy::ApplicationObjectFactory;

/// Message logged through the host context when the error application
/// cannot be built.
pub const ERROR_APPLICATION_WARNING: &str = "Warning: error application could not be initialized";

/// Produces and retires applications for one deployment.
pub trait RackApplicationFactory: Send + Sync {
    /// Runtime type backing the applications.
    type Runtime: rackhost_core::EmbeddedRuntime;

    /// Bind the factory to its host context. Never fails.
    fn init(&mut self, context: Arc<dyn HostContext>);

    /// A new, uninitialized application with its own runtime.
    fn new_application(&self) -> Result<Application<Self::Runtime>, RackInitializationError>;

    /// A new, initialized application.
    fn get_application(&self) -> Result<Application<Self::Runtime>, RackInitializationError>;

    /// Retire an application produced by this factory.
    fn finished_with_application(&self, app: Application<Self::Runtime>);

    /// The shared error application; `None` before `init` and after `destroy`.
    fn error_application(&self) -> Option<Arc<Application<Self::Runtime>>>;

    /// Destroy the error application. The factory is unusable afterwards.
    fn destroy(&mut self);
}

struct Deployment<E: RuntimeEngine> {
    bootstrap: RuntimeBootstrap<E>,
    primary: Arc<ApplicationObjectFactory>,
}

/// Factory building applications on an embedded runtime engine.
pub struct DefaultApplicationFactory<E: RuntimeEngine> {
    engine: Arc<E>,
    config: FactoryConfig,
    deployment: Option<Deployment<E>>,
    error_application: Option<Arc<Application<E::Runtime>>>,
}

impl<E: RuntimeEngine> DefaultApplicationFactory<E> {
    /// Create an uninitialized factory.
    pub fn new(engine: E, config: FactoryConfig) -> Self {
        Self::with_engine(Arc::new(engine), config)
    }

    /// Create an uninitialized factory sharing `engine`.
    pub fn with_engine(engine: Arc<E>, config: FactoryConfig) -> Self {
        Self {
            engine,
            config,
            deployment: None,
            error_application: None,
        }
    }

    /// Pre-install the error application. `init` keeps it instead of
    /// building one.
    pub fn set_error_application(&mut self, app: Application<E::Runtime>) {
        self.error_application = Some(Arc::new(app));
    }

    /// The code cache shared by this deployment's runtimes.
    pub fn cache(&self) -> Option<&Arc<CodeCache>> {
        self.deployment.as_ref().map(|d| d.bootstrap.cache())
    }

    /// Whether `init` has run and `destroy` has not.
    pub fn is_initialized(&self) -> bool {
        self.deployment.is_some()
    }

    fn create_application(
        &self,
        strategy: Arc<ApplicationObjectFactory>,
    ) -> Result<Application<E::Runtime>, RackInitializationError> {
        let deployment = self
            .deployment
            .as_ref()
            .ok_or(RackInitializationError::NotInitialized)?;
        let runtime = deployment.bootstrap.new_runtime()?;
        Ok(Application::embedded(runtime, strategy))
    }

    fn initialized(
        app: Application<E::Runtime>,
    ) -> Result<Application<E::Runtime>, RackInitializationError> {
        match app.init() {
            Ok(()) => Ok(app),
            Err(e) => {
                app.destroy();
                Err(e)
            }
        }
    }

    /// Build the error application, degrading to the fallback on failure.
    fn new_error_application(&self, context: &dyn HostContext) -> Application<E::Runtime> {
        let built = self
            .create_application(Arc::new(ApplicationObjectFactory::Error))
            .and_then(Self::initialized);

        match built {
            Ok(app) => {
                debug!(runtime_id = ?app.runtime_id(), "Error application ready");
                app
            }
            Err(e) => {
                warn!(error = %e, "Falling back to static error application");
                context.log(ERROR_APPLICATION_WARNING, Some(&e));
                Application::Fallback(FallbackApplication::new(&e))
            }
        }
    }
}

impl<E: RuntimeEngine> RackApplicationFactory for DefaultApplicationFactory<E> {
    type Runtime = E::Runtime;

    #[instrument(skip_all)]
    fn init(&mut self, context: Arc<dyn HostContext>) {
        let parameter = self.config.descriptor_parameter.as_str();
        let descriptor = context
            .init_parameter(parameter)
            .map(|d| Script::from_descriptor(&d));
        match &descriptor {
            Some(script) => info!(parameter, descriptor = %script, "Application descriptor loaded"),
            None => warn!(parameter, "No application descriptor configured"),
        }

        let cache = Arc::new(CodeCache::new());
        self.deployment = Some(Deployment {
            bootstrap: RuntimeBootstrap::new(Arc::clone(&self.engine), cache, Arc::clone(&context)),
            primary: Arc::new(ApplicationObjectFactory::primary(descriptor, parameter)),
        });

        if self.error_application.is_none() {
            let app = self.new_error_application(context.as_ref());
            self.error_application = Some(Arc::new(app));
        }

        info!("Application factory initialized");
    }

    fn new_application(&self) -> Result<Application<E::Runtime>, RackInitializationError> {
        let deployment = self
            .deployment
            .as_ref()
            .ok_or(RackInitializationError::NotInitialized)?;
        self.create_application(Arc::clone(&deployment.primary))
    }

    fn get_application(&self) -> Result<Application<E::Runtime>, RackInitializationError> {
        self.new_application().and_then(Self::initialized)
    }

    fn finished_with_application(&self, app: Application<E::Runtime>) {
        app.destroy();
    }

    fn error_application(&self) -> Option<Arc<Application<E::Runtime>>> {
        self.error_application.clone()
    }

    fn destroy(&mut self) {
        if let Some(app) = self.error_application.take() {
            app.destroy();
        }
        self.deployment = None;
        info!("Application factory destroyed");
    }
}

impl<E: RuntimeEngine> std::fmt::Debug for DefaultApplicationFactory<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultApplicationFactory")
            .field("config", &self.config)
            .field("initialized", &self.is_initialized())
            .field("has_error_application", &self.error_application.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::thread;

    use super::*;
    use crate::testing::{FakeEngine, RecordingContext};
    use rackhost_common::{RuntimeInitializationError, ScriptError};
    use rackhost_core::{ERRORS_APPLICATION, RackRequest};

    fn factory(engine: FakeEngine) -> DefaultApplicationFactory<FakeEngine> {
        DefaultApplicationFactory::new(engine, FactoryConfig::default())
    }

    fn context(descriptor: &str) -> Arc<RecordingContext> {
        Arc::new(RecordingContext::default().with_param("rackup", descriptor))
    }

    fn request() -> RackRequest {
        RackRequest::new("GET", "/")
    }

    #[test]
    fn test_init_builds_error_application() {
        let mut factory = factory(FakeEngine::default());
        let context = context("hello");

        factory.init(context.clone());

        let error_app = factory.error_application().unwrap();
        assert!(!error_app.is_fallback());
        assert_eq!(error_app.call(&request()).unwrap().body_text(), ERRORS_APPLICATION);
        assert!(context.logs().is_empty());
    }

    #[test]
    fn test_error_application_falls_back_on_script_error() {
        let engine = FakeEngine::default().with_broken_errors_app();
        let terminated = engine.terminated();
        let mut factory = factory(engine);
        let context = context("hello");

        factory.init(context.clone());

        let error_app = factory.error_application().unwrap();
        assert!(error_app.is_fallback());
        let response = error_app.call(&request()).unwrap();
        assert_eq!(response.status(), 500);
        assert!(response.headers().is_empty());
        assert_eq!(
            response.body_text(),
            "Application initialization failed: errors app exploded"
        );

        // The half-built error application's runtime is not leaked
        assert_eq!(terminated.count(), 1);

        let logs = context.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].0, ERROR_APPLICATION_WARNING);
        assert!(logs[0].1.as_deref().unwrap().contains("errors app exploded"));
    }

    #[test]
    fn test_error_application_falls_back_without_runtime() {
        let mut factory = factory(FakeEngine::default().with_broken_engine());
        let context = context("hello");

        factory.init(context.clone());

        let error_app = factory.error_application().unwrap();
        let response = error_app.call(&request()).unwrap();
        assert_eq!(response.status(), 500);
        assert!(response.body_text().contains("engine offline"));
        assert_eq!(context.logs().len(), 1);
    }

    #[test]
    fn test_preinstalled_error_application_is_kept() {
        let engine = FakeEngine::default();
        let mut factory = factory(engine);
        let cause = ScriptError::raised("installed by hand");
        factory.set_error_application(Application::Fallback(FallbackApplication::new(&cause)));

        factory.init(context("hello"));

        let error_app = factory.error_application().unwrap();
        assert!(error_app.call(&request()).unwrap().body_text().contains("installed by hand"));
    }

    #[test]
    fn test_new_application_is_uninitialized() {
        let mut factory = factory(FakeEngine::default());
        factory.init(context("hello"));

        let app = factory.new_application().unwrap();
        assert!(matches!(
            app.call(&request()),
            Err(rackhost_common::ApplicationError::NotInitialized)
        ));

        app.init().unwrap();
        assert_eq!(app.call(&request()).unwrap().body_text(), "hello");
    }

    #[test]
    fn test_get_application_raising_descriptor() {
        let engine = FakeEngine::default();
        let terminated = engine.terminated();
        let mut factory = factory(engine);
        factory.init(context("raise syntax error near line 3"));
        let after_init = terminated.count();

        let err = factory.get_application().unwrap_err();
        assert!(matches!(
            err,
            RackInitializationError::Script(ScriptError::Raised { .. })
        ));
        assert_eq!(err.to_string(), "syntax error near line 3");
        assert_eq!(terminated.count(), after_init + 1);

        // Factory stays usable
        assert!(factory.new_application().is_ok());
        assert!(factory.error_application().is_some());
    }

    #[test]
    fn test_missing_descriptor() {
        let mut factory = factory(FakeEngine::default());
        factory.init(Arc::new(RecordingContext::default()));

        let err = factory.get_application().unwrap_err();
        assert!(err.to_string().contains("rackup"));
        // The error application does not depend on the descriptor
        assert!(!factory.error_application().unwrap().is_fallback());
    }

    #[test]
    fn test_custom_descriptor_parameter() {
        let config = FactoryConfig {
            descriptor_parameter: "app".to_string(),
        };
        let mut factory = DefaultApplicationFactory::new(FakeEngine::default(), config);
        factory.init(Arc::new(RecordingContext::default().with_param("app", "custom")));

        let app = factory.get_application().unwrap();
        assert_eq!(app.call(&request()).unwrap().body_text(), "custom");
    }

    #[test]
    fn test_bootstrap_failure() {
        let mut factory = factory(FakeEngine::default().with_broken_adapter());
        factory.init(context("hello"));

        let err = factory.new_application().unwrap_err();
        assert!(matches!(
            err,
            RackInitializationError::Runtime(RuntimeInitializationError::Library { .. })
        ));
    }

    #[test]
    fn test_finished_with_application_destroys() {
        let engine = FakeEngine::default();
        let terminated = engine.terminated();
        let mut factory = factory(engine);
        factory.init(context("hello"));

        let app = factory.get_application().unwrap();
        let id = app.runtime_id().unwrap();
        factory.finished_with_application(app);

        assert!(terminated.contains(id));
    }

    #[test]
    fn test_applications_have_distinct_runtimes() {
        let mut factory = factory(FakeEngine::default());
        factory.init(context("hello"));

        let ids: HashSet<_> = (0..5)
            .map(|_| factory.get_application().unwrap().runtime_id().unwrap())
            .collect();
        assert_eq!(ids.len(), 5);

        let error_id = factory.error_application().unwrap().runtime_id().unwrap();
        assert!(!ids.contains(&error_id));
    }

    #[test]
    fn test_concurrent_get_application() {
        let engine = FakeEngine::default();
        let mut factory = factory(engine);
        factory.init(context("hello"));
        let factory = Arc::new(factory);

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let factory = Arc::clone(&factory);
                thread::spawn(move || {
                    let app = factory.get_application().unwrap();
                    let id = app.runtime_id().unwrap();
                    assert_eq!(app.call(&request()).unwrap().body_text(), "hello");
                    id
                })
            })
            .collect();

        let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn test_destroy() {
        let engine = FakeEngine::default();
        let terminated = engine.terminated();
        let mut factory = factory(engine);
        factory.init(context("hello"));
        let error_id = factory.error_application().unwrap().runtime_id().unwrap();

        factory.destroy();

        assert!(factory.error_application().is_none());
        assert!(terminated.contains(error_id));
        assert!(matches!(
            factory.get_application(),
            Err(RackInitializationError::NotInitialized)
        ));
    }

    #[test]
    fn test_before_init() {
        let factory = factory(FakeEngine::default());

        assert!(factory.error_application().is_none());
        assert!(matches!(
            factory.new_application(),
            Err(RackInitializationError::NotInitialized)
        ));
    }

    #[test]
    fn test_one_bootstrap_per_application() {
        let engine = Arc::new(FakeEngine::default());
        let mut factory = DefaultApplicationFactory::with_engine(Arc::clone(&engine), FactoryConfig::default());
        factory.init(context("hello"));
        assert_eq!(engine.bootstrapped(), 1);

        let _app = factory.new_application().unwrap();
        assert_eq!(engine.bootstrapped(), 2);
    }
}
