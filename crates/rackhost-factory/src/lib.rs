//! Application factory for rackhost.
//!
//! A [`DefaultApplicationFactory`] turns a deployment's descriptor into
//! [`Application`]s, each owning one embedded runtime, and keeps an error
//! application that is always callable, even when no runtime can be built.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use rackhost_common::RuntimeConfig;
//! use rackhost_core::RackRequest;
//! use rackhost_factory::{DefaultApplicationFactory, RackApplicationFactory};
//! use rackhost_host::{ConfigContext, WasmRuntimeEngine};
//!
//! let config = RuntimeConfig::default();
//! let engine = WasmRuntimeEngine::new(&config)?;
//! let mut factory = DefaultApplicationFactory::new(engine, config.factory);
//! factory.init(Arc::new(ConfigContext::new("app").with_param("rackup", "./app.wat")));
//!
//! let app = factory.get_application()?;
//! let response = app.call(&RackRequest::new("GET", "/"))?;
//! factory.finished_with_application(app);
//! factory.destroy();
//! ```

pub mod application;
pub mod bootstrap;
pub mod factory;
pub mod strategy;

#[cfg(test)]
mod testing;

pub use application::{Application, EmbeddedApplication, FALLBACK_BODY_PREFIX, FallbackApplication};
pub use bootstrap::RuntimeBootstrap;
pub use factory::{DefaultApplicationFactory, ERROR_APPLICATION_WARNING, RackApplicationFactory};
pub use strategy::ApplicationObjectFactory;
