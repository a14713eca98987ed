//! Common types, errors, and configuration for rackhost.
//!
//! This crate provides shared functionality used across the rackhost workspace:
//! - Error types using `thiserror` for type-safe error handling
//! - Configuration structures for engine, execution and factory settings
//! - The [`HostContext`] trait implemented by hosting environments

pub mod config;
pub mod config_file;
pub mod context;
pub mod error;

pub use config::{EngineConfig, ExecutionConfig, FactoryConfig, RuntimeConfig};
pub use config_file::{ConfigFile, ConfigFileError, ContextConfig};
pub use context::{HostContext, error_chain};
pub use error::{
    ApplicationError, RackInitializationError, RuntimeError, RuntimeInitializationError,
    ScriptError,
};
