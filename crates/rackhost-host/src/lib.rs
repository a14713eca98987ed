//! Host side of rackhost.
//!
//! This crate provides the Wasmtime-backed [`EmbeddedRuntime`] and
//! everything it needs: the host functions guests call, the built-in
//! adapter and errors modules, and a configuration-backed [`HostContext`].
//!
//! # Modules
//!
//! - [`linker`]: Registers host functions under the `host` namespace
//! - [`library`]: Built-in `rack/adapter` and `rack/errors` modules
//! - [`logging`]: Guest log collection and forwarding
//! - [`context`]: [`ConfigContext`], init parameters from configuration
//! - [`runtime`]: [`WasmRuntimeEngine`] and [`WasmRuntime`]
//!
//! [`EmbeddedRuntime`]: rackhost_core::EmbeddedRuntime
//! [`HostContext`]: rackhost_common::HostContext

pub mod context;
pub mod library;
pub mod linker;
pub mod logging;
pub mod runtime;

pub use context::ConfigContext;
pub use library::{ADAPTER_NAMESPACE, ADAPTER_VERSION, HOST_MODULE, verify_adapter_version};
pub use linker::register_all;
pub use logging::LoggingHost;
pub use runtime::{WasmApplication, WasmRuntime, WasmRuntimeEngine};
