//! The host context seen by the factory and by code inside runtimes.

use std::error::Error;
use std::fmt::Write as _;

/// Services the hosting environment provides to the factory.
///
/// A context is shared by the factory, every runtime it bootstraps (bound
/// into the runtime's global namespace) and the error application, so
/// implementations must be thread-safe.
pub trait HostContext: Send + Sync {
    /// Look up a deployment init parameter.
    fn init_parameter(&self, name: &str) -> Option<String>;

    /// Log a message, optionally with the error that caused it.
    fn log(&self, message: &str, error: Option<&(dyn Error + 'static)>);
}

/// Render an error and its `source()` chain as `outer: inner: ...`.
///
/// A source whose message already ends the rendered text (an error that
/// both displays and exposes its cause) is not repeated.
pub fn error_chain(error: &(dyn Error + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let message = cause.to_string();
        if !rendered.ends_with(&message) {
            let _ = write!(rendered, ": {message}");
        }
        source = cause.source();
    }
    rendered
}
