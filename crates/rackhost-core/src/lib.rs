//! Embedded runtime abstractions and Wasmtime foundations for rackhost.
//!
//! This crate provides:
//! - [`EmbeddedRuntime`] / [`RuntimeEngine`]: The capability boundary the
//!   application factory is written against
//! - [`WasmEngine`]: Configured Wasmtime engine shared by all runtimes
//! - [`CodeCache`]: Compiled modules shared across runtimes
//! - [`RuntimeContext`]: Per-runtime state reachable from host functions
//! - [`RackRequest`] / [`RackResponse`]: Values crossing the application boundary
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              WasmEngine + CodeCache                     │
//! │  (One per factory, shared, thread-safe)                 │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │          Store<RuntimeContext> + Linker                 │
//! │  (One per application, owned, isolated)                 │
//! │  - Global namespace ($host_context)                     │
//! │  - rack/adapter instance                                │
//! │  - Application instance                                 │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod engine;
pub mod module;
pub mod request;
pub mod response;
pub mod runtime;
pub mod store;

pub use cache::{CacheStats, CodeCache};
pub use engine::WasmEngine;
pub use module::CompiledModule;
pub use request::RackRequest;
pub use response::{HttpWriter, RackResponse, ResponseSink};
pub use runtime::{
    ADAPTER_LIBRARY, ERRORS_APPLICATION, EmbeddedRuntime, GlobalValue, HOST_CONTEXT_GLOBAL,
    RuntimeEngine, RuntimeId, Script,
};
pub use store::{ExecutionMetrics, LogEntry, LogLevel, RuntimeContext};
