//! A host context backed by configuration, logging through `tracing`.

use std::collections::HashMap;
use std::error::Error;

use tracing::{info, warn};

use rackhost_common::{ContextConfig, HostContext, error_chain};

/// Host context whose init parameters come from configuration.
#[derive(Debug, Clone)]
pub struct ConfigContext {
    name: String,
    init_params: HashMap<String, String>,
}

impl ConfigContext {
    /// Create a context without init parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            init_params: HashMap::new(),
        }
    }

    /// Create a context from the `[context]` section of a config file.
    pub fn from_config(config: &ContextConfig) -> Self {
        Self {
            name: config.name.clone(),
            init_params: config.init_params.clone(),
        }
    }

    /// Set an init parameter.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.init_params.insert(name.into(), value.into());
        self
    }

    /// The deployment name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl HostContext for ConfigContext {
    fn init_parameter(&self, name: &str) -> Option<String> {
        self.init_params.get(name).cloned()
    }

    fn log(&self, message: &str, error: Option<&(dyn Error + 'static)>) {
        match error {
            Some(e) => warn!(context = %self.name, error = %error_chain(e), "{message}"),
            None => info!(context = %self.name, "{message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_parameters() {
        let context = ConfigContext::new("shop").with_param("rackup", "./shop.wat");

        assert_eq!(context.name(), "shop");
        assert_eq!(context.init_parameter("rackup").as_deref(), Some("./shop.wat"));
        assert!(context.init_parameter("missing").is_none());
    }

    #[test]
    fn test_from_config() {
        let mut config = ContextConfig::default();
        config.init_params.insert("rackup".into(), "(module)".into());

        let context = ConfigContext::from_config(&config);

        assert_eq!(context.name(), "default");
        assert_eq!(context.init_parameter("rackup").as_deref(), Some("(module)"));
    }
}
