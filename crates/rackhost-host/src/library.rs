//! Modules shipped with the runtime.
//!
//! - `rack/adapter`: imports the host functions from namespace `host` and
//!   re-exports them. Once instantiated it is registered as namespace `rack`,
//!   which is what applications import from.
//! - `rack/errors`: the default errors application.

use rackhost_common::ScriptError;
use rackhost_core::{ADAPTER_LIBRARY, ERRORS_APPLICATION};

/// Namespace host functions are registered under.
pub const HOST_MODULE: &str = "host";

/// Namespace the adapter is registered under for applications.
pub const ADAPTER_NAMESPACE: &str = "rack";

/// Adapter ABI version this host speaks.
pub const ADAPTER_VERSION: i32 = 1;

const ADAPTER_WAT: &str = r#"
(module
  (import "host" "log" (func $log (param i32 i32 i32)))
  (import "host" "set_status" (func $set_status (param i32)))
  (import "host" "set_header" (func $set_header (param i32 i32 i32 i32)))
  (import "host" "write_body" (func $write_body (param i32 i32)))
  (import "host" "request_method" (func $request_method (param i32 i32) (result i32)))
  (import "host" "request_path" (func $request_path (param i32 i32) (result i32)))
  (import "host" "request_query" (func $request_query (param i32 i32) (result i32)))
  (import "host" "request_header" (func $request_header (param i32 i32 i32 i32) (result i32)))
  (import "host" "request_body" (func $request_body (param i32 i32) (result i32)))

  (global (export "version") i32 (i32.const 1))

  (export "log" (func $log))
  (export "set_status" (func $set_status))
  (export "set_header" (func $set_header))
  (export "write_body" (func $write_body))
  (export "request_method" (func $request_method))
  (export "request_path" (func $request_path))
  (export "request_query" (func $request_query))
  (export "request_header" (func $request_header))
  (export "request_body" (func $request_body))
)
"#;

const ERRORS_WAT: &str = r#"
(module
  (import "rack" "set_status" (func $set_status (param i32)))
  (import "rack" "set_header" (func $set_header (param i32 i32 i32 i32)))
  (import "rack" "write_body" (func $write_body (param i32 i32)))

  (memory (export "memory") 1)
  (data (i32.const 0) "content-type")
  (data (i32.const 16) "text/html")
  (data (i32.const 32) "<h1>Internal Server Error</h1>")

  (func (export "call")
    (call $set_status (i32.const 500))
    (call $set_header (i32.const 0) (i32.const 12) (i32.const 16) (i32.const 9))
    (call $write_body (i32.const 32) (i32.const 30)))
)
"#;

/// A module shipped with the runtime.
#[derive(Debug, Clone, Copy)]
pub struct Builtin {
    /// Name scripts refer to it by.
    pub name: &'static str,
    /// WAT source.
    pub source: &'static str,
    /// Import namespace the instance is registered under when required as a
    /// library.
    pub namespace: Option<&'static str>,
}

const BUILTINS: &[Builtin] = &[
    Builtin {
        name: ADAPTER_LIBRARY,
        source: ADAPTER_WAT,
        namespace: Some(ADAPTER_NAMESPACE),
    },
    Builtin {
        name: ERRORS_APPLICATION,
        source: ERRORS_WAT,
        namespace: None,
    },
];

/// Look up a built-in module by name.
pub fn builtin(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name == name)
}

/// Check the `version` global exported by an adapter instance.
pub fn verify_adapter_version(version: Option<i32>) -> Result<(), ScriptError> {
    match version {
        Some(ADAPTER_VERSION) => Ok(()),
        Some(other) => Err(ScriptError::raised(format!(
            "Adapter version {other} is not supported (expected {ADAPTER_VERSION})"
        ))),
        None => Err(ScriptError::raised("Adapter does not export a version")),
    }
}
