//! Error types for rackhost.
//!
//! This module defines the error hierarchy using `thiserror`:
//! - [`RuntimeError`]: Engine-level failures (compilation, instantiation, limits)
//! - [`ScriptError`]: An error raised inside an embedded runtime
//! - [`RuntimeInitializationError`]: A runtime could not be bootstrapped
//! - [`RackInitializationError`]: An application could not be constructed
//! - [`ApplicationError`]: Misuse of, or a failure inside, a running application

use std::io;

use thiserror::Error;

/// Engine-level errors.
///
/// These represent failures of the embedding machinery itself rather than
/// errors raised by the code running inside a runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Compiling a script or module failed.
    #[error("Compilation failed: {reason}")]
    CompilationFailed {
        /// Description of the compilation failure.
        reason: String,
    },

    /// A compiled module could not be instantiated.
    #[error("Instantiation failed: {reason}")]
    InstantiationFailed {
        /// Description of the instantiation failure.
        reason: String,
    },

    /// A named library is not known to the runtime.
    #[error("Unknown library: {name}")]
    UnknownLibrary {
        /// The library name that was requested.
        name: String,
    },

    /// Execution exhausted the configured fuel limit.
    #[error("Fuel exhausted: CPU limit exceeded")]
    FuelExhausted,

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },
}

/// An error raised by code executing inside an embedded runtime.
#[derive(Error, Debug)]
pub enum ScriptError {
    /// The script raised an error (a trap or a broken contract).
    #[error("{message}")]
    Raised {
        /// The raised error's message.
        message: String,
    },

    /// The runtime failed underneath the script.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// The embedded runtime could not be bootstrapped.
#[derive(Error, Debug)]
pub enum RuntimeInitializationError {
    /// The engine refused to create a new runtime instance.
    #[error("Runtime could not be created: {reason}")]
    Engine {
        /// Description of the failure.
        reason: String,
    },

    /// Loading a library during bootstrap raised an error.
    ///
    /// The raised error is part of the message rather than a `source()`, so
    /// rendering the chain does not repeat it.
    #[error("Failed to load library '{library}': {cause}")]
    Library {
        /// The library being loaded.
        library: String,
        /// The raised error.
        cause: ScriptError,
    },
}

/// Application construction or binding failed.
///
/// Wrapped errors are transparent so the original message reaches callers
/// (and the fallback error application) unchanged.
#[derive(Error, Debug)]
pub enum RackInitializationError {
    /// The runtime backing the application could not be bootstrapped.
    #[error(transparent)]
    Runtime(#[from] RuntimeInitializationError),

    /// Building the application object raised an error.
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// The factory has not been initialized, or has been destroyed.
    #[error("Application factory is not initialized")]
    NotInitialized,

    /// `init` was called on an application that is already initialized.
    #[error("Application is already initialized")]
    AlreadyInitialized,

    /// `init` was called on a destroyed application.
    #[error("Application has been destroyed")]
    Destroyed,
}

/// Errors from calling into, or inspecting, an application.
#[derive(Error, Debug)]
pub enum ApplicationError {
    /// `call` before a successful `init`.
    #[error("Application is not initialized")]
    NotInitialized,

    /// Use after `destroy`.
    #[error("Application has been destroyed")]
    Destroyed,

    /// The operation is not available on this kind of application.
    #[error("Operation not supported: {operation}")]
    Unsupported {
        /// The unsupported operation.
        operation: &'static str,
    },

    /// The application object raised an error while handling a request.
    #[error(transparent)]
    Script(#[from] ScriptError),
}

impl RuntimeError {
    /// Create a new `CompilationFailed` error.
    pub fn compilation_failed(reason: impl Into<String>) -> Self {
        Self::CompilationFailed {
            reason: reason.into(),
        }
    }

    /// Create a new `InstantiationFailed` error.
    pub fn instantiation_failed(reason: impl Into<String>) -> Self {
        Self::InstantiationFailed {
            reason: reason.into(),
        }
    }

    /// Create a new `UnknownLibrary` error.
    pub fn unknown_library(name: impl Into<String>) -> Self {
        Self::UnknownLibrary { name: name.into() }
    }

    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

impl ScriptError {
    /// Create a new `Raised` error.
    pub fn raised(message: impl Into<String>) -> Self {
        Self::Raised {
            message: message.into(),
        }
    }
}

impl RuntimeInitializationError {
    /// Create a new `Engine` error.
    pub fn engine(reason: impl Into<String>) -> Self {
        Self::Engine {
            reason: reason.into(),
        }
    }

    /// Create a new `Library` error.
    pub fn library(library: impl Into<String>, cause: ScriptError) -> Self {
        Self::Library {
            library: library.into(),
            cause,
        }
    }
}
