//! Host function registration for Wasmtime linkers.
//!
//! Every runtime's linker gets the functions below under the `host`
//! namespace. Applications never import them directly; they import the
//! `rack` namespace the adapter re-exports them through.
//!
//! # Memory Protocol
//!
//! Strings and buffers are `(ptr, len)` pairs into the calling module's
//! exported `memory`. Accessors take `(ptr, cap)`, copy at most `cap` bytes,
//! and return the full length so the guest can retry with a larger buffer.
//! `-1` means "absent" or "bad pointer".

use tracing::warn;
use wasmtime::{Caller, Extern, Linker, Memory};

use crate::library::HOST_MODULE;
use crate::logging::{LoggingHost, level_from_i32};
use rackhost_common::RuntimeError;
use rackhost_core::{RackRequest, RuntimeContext};

/// Register all host functions on a linker.
pub fn register_all(linker: &mut Linker<RuntimeContext>) -> Result<(), RuntimeError> {
    register_logging(linker)?;
    register_response(linker)?;
    register_request(linker)?;
    Ok(())
}

/// Register `host::log(level, ptr, len)`.
pub fn register_logging(linker: &mut Linker<RuntimeContext>) -> Result<(), RuntimeError> {
    linker
        .func_wrap(
            HOST_MODULE,
            "log",
            |mut caller: Caller<'_, RuntimeContext>, level: i32, ptr: i32, len: i32| {
                let Some(bytes) = read_guest_bytes(&mut caller, ptr, len) else {
                    return;
                };
                let message = String::from_utf8_lossy(&bytes);
                LoggingHost::log(caller.data_mut(), level_from_i32(level), &message);
            },
        )
        .map_err(|e| registration_failed("log", &e))?;

    Ok(())
}

/// Register the response builders: `set_status`, `set_header`, `write_body`.
pub fn register_response(linker: &mut Linker<RuntimeContext>) -> Result<(), RuntimeError> {
    linker
        .func_wrap(
            HOST_MODULE,
            "set_status",
            |mut caller: Caller<'_, RuntimeContext>, status: i32| match u16::try_from(status) {
                Ok(status) if (100..=999).contains(&status) => caller.data_mut().set_status(status),
                _ => warn!(status, "Ignoring invalid status code"),
            },
        )
        .map_err(|e| registration_failed("set_status", &e))?;

    linker
        .func_wrap(
            HOST_MODULE,
            "set_header",
            |mut caller: Caller<'_, RuntimeContext>,
             name_ptr: i32,
             name_len: i32,
             value_ptr: i32,
             value_len: i32| {
                let Some(name) = read_guest_bytes(&mut caller, name_ptr, name_len) else {
                    return;
                };
                let Some(value) = read_guest_bytes(&mut caller, value_ptr, value_len) else {
                    return;
                };
                let name = String::from_utf8_lossy(&name);
                let value = String::from_utf8_lossy(&value);
                if !caller.data_mut().set_header(&name, &value) {
                    warn!(header = %name.escape_debug(), "Ignoring invalid response header");
                }
            },
        )
        .map_err(|e| registration_failed("set_header", &e))?;

    linker
        .func_wrap(
            HOST_MODULE,
            "write_body",
            |mut caller: Caller<'_, RuntimeContext>, ptr: i32, len: i32| {
                if let Some(chunk) = read_guest_bytes(&mut caller, ptr, len) {
                    caller.data_mut().write_body(&chunk);
                }
            },
        )
        .map_err(|e| registration_failed("write_body", &e))?;

    Ok(())
}

/// Register the request accessors.
pub fn register_request(linker: &mut Linker<RuntimeContext>) -> Result<(), RuntimeError> {
    register_request_field(linker, "request_method", |r| Some(r.method.as_bytes().to_vec()))?;
    register_request_field(linker, "request_path", |r| Some(r.path.as_bytes().to_vec()))?;
    register_request_field(linker, "request_query", |r| {
        r.query.as_ref().map(|q| q.as_bytes().to_vec())
    })?;
    register_request_field(linker, "request_body", |r| r.body.clone())?;

    linker
        .func_wrap(
            HOST_MODULE,
            "request_header",
            |mut caller: Caller<'_, RuntimeContext>,
             name_ptr: i32,
             name_len: i32,
             ptr: i32,
             cap: i32|
             -> i32 {
                let Some(name) = read_guest_bytes(&mut caller, name_ptr, name_len) else {
                    return -1;
                };
                let name = String::from_utf8_lossy(&name);
                let value = caller
                    .data()
                    .request()
                    .and_then(|r| r.get_header(&name))
                    .map(|v| v.as_bytes().to_vec());
                match value {
                    Some(value) => write_guest_bytes(&mut caller, ptr, cap, &value),
                    None => -1,
                }
            },
        )
        .map_err(|e| registration_failed("request_header", &e))?;

    Ok(())
}

/// Register an accessor `name(ptr, cap) -> len` copying one request field.
fn register_request_field(
    linker: &mut Linker<RuntimeContext>,
    name: &'static str,
    field: fn(&RackRequest) -> Option<Vec<u8>>,
) -> Result<(), RuntimeError> {
    linker
        .func_wrap(
            HOST_MODULE,
            name,
            move |mut caller: Caller<'_, RuntimeContext>, ptr: i32, cap: i32| -> i32 {
                let value = caller.data().request().and_then(field);
                match value {
                    Some(bytes) => write_guest_bytes(&mut caller, ptr, cap, &bytes),
                    None => -1,
                }
            },
        )
        .map_err(|e| registration_failed(name, &e))?;

    Ok(())
}

fn registration_failed(name: &str, error: &wasmtime::Error) -> RuntimeError {
    RuntimeError::invalid_config(format!("Failed to register {name} function: {error}"))
}

fn guest_memory(caller: &mut Caller<'_, RuntimeContext>) -> Option<Memory> {
    let memory = caller.get_export("memory").and_then(Extern::into_memory);
    if memory.is_none() {
        warn!("Memory export not found in guest module");
    }
    memory
}

/// Copy `len` bytes at `ptr` out of guest memory.
fn read_guest_bytes(caller: &mut Caller<'_, RuntimeContext>, ptr: i32, len: i32) -> Option<Vec<u8>> {
    let (Ok(start), Ok(len)) = (usize::try_from(ptr), usize::try_from(len)) else {
        warn!(ptr, len, "Invalid pointer or length (negative value)");
        return None;
    };
    let memory = guest_memory(caller)?;
    let data = memory.data(&*caller);

    let bytes = start
        .checked_add(len)
        .and_then(|end| data.get(start..end))
        .map(<[u8]>::to_vec);
    if bytes.is_none() {
        warn!(ptr, len, memory_size = data.len(), "Memory access out of bounds");
    }
    bytes
}

/// Copy up to `cap` bytes of `bytes` into guest memory at `ptr`.
///
/// Returns the full length of `bytes`, or -1 if the destination is invalid.
fn write_guest_bytes(
    caller: &mut Caller<'_, RuntimeContext>,
    ptr: i32,
    cap: i32,
    bytes: &[u8],
) -> i32 {
    let (Ok(start), Ok(cap)) = (usize::try_from(ptr), usize::try_from(cap)) else {
        warn!(ptr, cap, "Invalid pointer or capacity (negative value)");
        return -1;
    };
    let Some(memory) = guest_memory(caller) else {
        return -1;
    };

    let n = bytes.len().min(cap);
    let data = memory.data_mut(&mut *caller);
    let Some(dest) = start.checked_add(n).and_then(|end| data.get_mut(start..end)) else {
        warn!(ptr, cap, "Memory access out of bounds");
        return -1;
    };
    dest.copy_from_slice(&bytes[..n]);

    i32::try_from(bytes.len()).unwrap_or(i32::MAX)
}
