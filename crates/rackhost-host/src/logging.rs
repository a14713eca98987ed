//! Logging host function implementation.
//!
//! Guest logs are:
//! 1. Stored in the [`RuntimeContext`] for later retrieval
//! 2. Emitted via the `tracing` crate
//! 3. Forwarded to the host context bound in the runtime (info and above)

use rackhost_core::{LogLevel, RuntimeContext};
use tracing::{debug, error, info, warn};

/// Host implementation for the logging interface.
pub struct LoggingHost;

impl LoggingHost {
    /// Log a message at the specified level.
    pub fn log(ctx: &mut RuntimeContext, level: LogLevel, message: &str) {
        ctx.log(level, message.to_string());

        let runtime_id = ctx.runtime_id.to_string();
        match level {
            LogLevel::Debug => debug!(runtime_id, guest_log = true, "{}", message),
            LogLevel::Info => info!(runtime_id, guest_log = true, "{}", message),
            LogLevel::Warn => warn!(runtime_id, guest_log = true, "{}", message),
            LogLevel::Error => error!(runtime_id, guest_log = true, "{}", message),
        }

        if level != LogLevel::Debug {
            if let Some(host) = ctx.host_context() {
                host.log(&format!("[{level}] {message}"), None);
            }
        }
    }
}

/// Convert a numeric log level to [`LogLevel`].
///
/// Levels arrive from Wasm as integers (0=debug, 1=info, 2=warn, 3=error).
/// Unknown values map to Info.
pub fn level_from_i32(level: i32) -> LogLevel {
    match level {
        0 => LogLevel::Debug,
        2 => LogLevel::Warn,
        3 => LogLevel::Error,
        _ => LogLevel::Info,
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use rackhost_common::HostContext;
    use rackhost_core::{GlobalValue, HOST_CONTEXT_GLOBAL, RuntimeId};

    #[derive(Default)]
    struct RecordingHost {
        messages: Mutex<Vec<String>>,
    }

    impl HostContext for RecordingHost {
        fn init_parameter(&self, _name: &str) -> Option<String> {
            None
        }

        fn log(&self, message: &str, _error: Option<&(dyn Error + 'static)>) {
            self.messages.lock().push(message.to_string());
        }
    }

    #[test]
    fn test_logging_stores_in_context() {
        let mut ctx = RuntimeContext::new(RuntimeId::new());

        LoggingHost::log(&mut ctx, LogLevel::Info, "Hello");
        LoggingHost::log(&mut ctx, LogLevel::Error, "World");

        assert_eq!(ctx.logs.len(), 2);
        assert_eq!(ctx.logs[0].message, "Hello");
        assert_eq!(ctx.logs[0].level, LogLevel::Info);
        assert_eq!(ctx.logs[1].level, LogLevel::Error);
    }

    #[test]
    fn test_logging_with_bound_host_context() {
        let mut ctx = RuntimeContext::new(RuntimeId::new());
        let host = Arc::new(RecordingHost::default());
        ctx.bind_global(HOST_CONTEXT_GLOBAL, GlobalValue::Context(host.clone()));

        LoggingHost::log(&mut ctx, LogLevel::Debug, "quiet");
        LoggingHost::log(&mut ctx, LogLevel::Warn, "loud");
        LoggingHost::log(&mut ctx, LogLevel::Error, "louder");

        // Debug stays local; everything is still collected
        assert_eq!(
            *host.messages.lock(),
            vec!["[WARN] loud".to_string(), "[ERROR] louder".to_string()]
        );
        assert_eq!(ctx.logs.len(), 3);
    }

    #[test]
    fn test_logging_without_host_context() {
        let mut ctx = RuntimeContext::new(RuntimeId::new());

        LoggingHost::log(&mut ctx, LogLevel::Error, "nobody listening");

        assert!(ctx.host_context().is_none());
        assert_eq!(ctx.logs.len(), 1);
    }

    #[test]
    fn test_level_from_i32() {
        assert_eq!(level_from_i32(0), LogLevel::Debug);
        assert_eq!(level_from_i32(1), LogLevel::Info);
        assert_eq!(level_from_i32(2), LogLevel::Warn);
        assert_eq!(level_from_i32(3), LogLevel::Error);
        assert_eq!(level_from_i32(99), LogLevel::Info);
    }
}
