//! Per-runtime state and store management.
//!
//! This module provides:
//! - [`RuntimeContext`]: State of one runtime, reachable from host functions
//! - [`LogEntry`] and [`LogLevel`]: Structured logging from guest code
//! - [`ExecutionMetrics`]: Counters for calls into the runtime

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use wasmtime::Store;

use crate::runtime::{GlobalValue, HOST_CONTEXT_GLOBAL, RuntimeId};
use crate::{RackRequest, RackResponse, WasmEngine};
use rackhost_common::{ExecutionConfig, HostContext, RuntimeError};

/// State of one runtime instance.
///
/// This is the data of the runtime's Wasmtime [`Store`]. Host functions reach
/// it through [`wasmtime::Caller`]. It lives exactly as long as the runtime.
pub struct RuntimeContext {
    /// Identity of the owning runtime.
    pub runtime_id: RuntimeId,

    /// The global namespace.
    globals: HashMap<String, GlobalValue>,

    /// The request currently being handled.
    request: Option<RackRequest>,

    /// Response under construction.
    response: ResponseBuilder,

    /// Logs collected from guest code.
    pub logs: Vec<LogEntry>,

    /// Execution metrics.
    pub metrics: ExecutionMetrics,
}

/// A single log entry from guest code.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Log level (debug, info, warn, error).
    pub level: LogLevel,

    /// Log message content.
    pub message: String,

    /// Timestamp when the log was recorded.
    pub timestamp: Instant,
}

/// Log level for guest logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug-level messages.
    Debug,
    /// Informational messages.
    Info,
    /// Warning messages.
    Warn,
    /// Error messages.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Counters for calls into a runtime.
#[derive(Debug, Clone, Default)]
pub struct ExecutionMetrics {
    /// Fuel consumed by the most recent call.
    pub fuel_consumed: u64,

    /// Requests handled so far.
    pub requests: u64,

    /// Duration of the most recent call.
    pub duration: Option<Duration>,
}

/// Accumulates the response a guest builds through host calls.
#[derive(Debug, Default)]
struct ResponseBuilder {
    status: Option<u16>,
    headers: BTreeMap<String, String>,
    body: Vec<u8>,
}

impl RuntimeContext {
    /// Create the context for a new runtime.
    pub fn new(runtime_id: RuntimeId) -> Self {
        Self {
            runtime_id,
            globals: HashMap::new(),
            request: None,
            response: ResponseBuilder::default(),
            logs: Vec::new(),
            metrics: ExecutionMetrics::default(),
        }
    }

    /// Bind a global.
    pub fn bind_global(&mut self, name: &str, value: GlobalValue) {
        self.globals.insert(name.to_string(), value);
    }

    /// Look up a global.
    pub fn global(&self, name: &str) -> Option<&GlobalValue> {
        self.globals.get(name)
    }

    /// The host context bound under [`HOST_CONTEXT_GLOBAL`], if any.
    pub fn host_context(&self) -> Option<Arc<dyn HostContext>> {
        match self.globals.get(HOST_CONTEXT_GLOBAL) {
            Some(GlobalValue::Context(context)) => Some(Arc::clone(context)),
            _ => None,
        }
    }

    /// Add a log entry.
    pub fn log(&mut self, level: LogLevel, message: String) {
        self.logs.push(LogEntry {
            level,
            message,
            timestamp: Instant::now(),
        });
    }

    /// Start handling `request` with an empty response.
    ///
    /// Guest logs are kept for the current request only.
    pub fn begin_request(&mut self, request: RackRequest) {
        self.request = Some(request);
        self.response = ResponseBuilder::default();
        self.logs.clear();
    }

    /// The request being handled.
    pub fn request(&self) -> Option<&RackRequest> {
        self.request.as_ref()
    }

    /// Finish the current request and return the response the guest built.
    ///
    /// A guest that never set a status gets 200.
    pub fn finish_request(&mut self) -> RackResponse {
        self.request = None;
        self.metrics.requests += 1;
        let ResponseBuilder {
            status,
            headers,
            body,
        } = std::mem::take(&mut self.response);
        RackResponse::new(status.unwrap_or(200), headers, body)
    }

    /// Set the response status.
    pub fn set_status(&mut self, status: u16) {
        self.response.status = Some(status);
    }

    /// Set a response header, replacing any previous value.
    ///
    /// Returns `false` and leaves the response untouched when the name is
    /// empty or either part contains a line break.
    pub fn set_header(&mut self, name: &str, value: &str) -> bool {
        let breaks_line = |s: &str| s.contains(['\r', '\n']);
        if name.is_empty() || breaks_line(name) || breaks_line(value) {
            return false;
        }
        self.response
            .headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        true
    }

    /// Append to the response body.
    pub fn write_body(&mut self, chunk: &[u8]) {
        self.response.body.extend_from_slice(chunk);
    }
}

/// Create a new Wasmtime store for a runtime.
///
/// # Errors
///
/// Returns an error if fuel cannot be set on the store.
pub fn create_store(
    engine: &WasmEngine,
    config: &ExecutionConfig,
    runtime_id: RuntimeId,
) -> Result<Store<RuntimeContext>, RuntimeError> {
    let mut store = Store::new(engine.inner(), RuntimeContext::new(runtime_id));
    refuel(&mut store, config)?;
    Ok(store)
}

/// Reset the store's fuel to the configured budget.
pub fn refuel(store: &mut Store<RuntimeContext>, config: &ExecutionConfig) -> Result<(), RuntimeError> {
    store
        .set_fuel(config.fuel_budget())
        .map_err(|e| RuntimeError::invalid_config(format!("Failed to set fuel: {e}")))
}

/// Get remaining fuel from a store.
pub fn get_remaining_fuel(store: &Store<RuntimeContext>) -> Option<u64> {
    store.get_fuel().ok()
}

/// Calculate fuel consumed.
pub fn calculate_fuel_consumed(initial_fuel: u64, store: &Store<RuntimeContext>) -> u64 {
    let remaining = get_remaining_fuel(store).unwrap_or(0);
    initial_fuel.saturating_sub(remaining)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rackhost_common::EngineConfig;

    #[test]
    fn test_runtime_context_creation() {
        let id = RuntimeId::new();
        let ctx = RuntimeContext::new(id);

        assert_eq!(ctx.runtime_id, id);
        assert!(ctx.logs.is_empty());
        assert!(ctx.request().is_none());
        assert!(ctx.host_context().is_none());
    }

    #[test]
    fn test_runtime_context_logging() {
        let mut ctx = RuntimeContext::new(RuntimeId::new());

        ctx.log(LogLevel::Info, "Hello".into());
        ctx.log(LogLevel::Error, "World".into());

        assert_eq!(ctx.logs.len(), 2);
        assert_eq!(ctx.logs[0].level, LogLevel::Info);
        assert_eq!(ctx.logs[1].message, "World");
    }

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Debug.to_string(), "DEBUG");
        assert_eq!(LogLevel::Warn.to_string(), "WARN");
    }

    #[test]
    fn test_globals() {
        let mut ctx = RuntimeContext::new(RuntimeId::new());
        ctx.bind_global("$env", GlobalValue::Text("production".into()));

        assert!(matches!(ctx.global("$env"), Some(GlobalValue::Text(t)) if t == "production"));
        assert!(ctx.global("$missing").is_none());
        // A text value under the context name is not a host context
        ctx.bind_global(HOST_CONTEXT_GLOBAL, GlobalValue::Text("nope".into()));
        assert!(ctx.host_context().is_none());
    }

    #[test]
    fn test_request_cycle() {
        let mut ctx = RuntimeContext::new(RuntimeId::new());

        ctx.begin_request(RackRequest::new("GET", "/"));
        ctx.set_status(201);
        ctx.set_header("Content-Type", "text/plain");
        ctx.set_header("content-type", "text/html");
        ctx.write_body(b"hello ");
        ctx.write_body(b"world");
        let response = ctx.finish_request();

        assert_eq!(response.status(), 201);
        assert_eq!(response.headers().len(), 1);
        assert_eq!(response.headers()["content-type"], "text/html");
        assert_eq!(response.body(), b"hello world");
        assert!(ctx.request().is_none());
        assert_eq!(ctx.metrics.requests, 1);

        // The next request starts from a clean response
        ctx.begin_request(RackRequest::new("GET", "/"));
        let response = ctx.finish_request();
        assert_eq!(response.status(), 200);
        assert!(response.body().is_empty());
    }

    #[test]
    fn test_logs_cleared_per_request() {
        let mut ctx = RuntimeContext::new(RuntimeId::new());
        ctx.log(LogLevel::Info, "loading".to_string());

        for _ in 0..3 {
            ctx.begin_request(RackRequest::new("GET", "/"));
            ctx.log(LogLevel::Info, "handling".to_string());
            ctx.finish_request();
        }

        assert_eq!(ctx.logs.len(), 1);
        assert_eq!(ctx.logs[0].message, "handling");
    }

    #[test]
    fn test_set_header_rejects_line_breaks() {
        let mut ctx = RuntimeContext::new(RuntimeId::new());
        ctx.begin_request(RackRequest::new("GET", "/"));

        assert!(!ctx.set_header("x-evil", "a\r\nset-cookie: stolen=1"));
        assert!(!ctx.set_header("x-evil\nset-cookie", "1"));
        assert!(!ctx.set_header("", "empty"));
        assert!(ctx.set_header("X-Ok", "fine"));

        let response = ctx.finish_request();
        assert_eq!(response.headers().len(), 1);
        assert_eq!(response.headers()["x-ok"], "fine");
    }

    #[test]
    fn test_store_fuel() {
        let engine = WasmEngine::new(&EngineConfig {
            pooling_allocator: false,
            ..Default::default()
        })
        .unwrap();
        let exec_config = ExecutionConfig {
            max_fuel: 1000,
            fuel_metering: true,
        };

        let store = create_store(&engine, &exec_config, RuntimeId::new()).unwrap();

        assert_eq!(get_remaining_fuel(&store), Some(1000));
        assert_eq!(calculate_fuel_consumed(1000, &store), 0);
    }
}
