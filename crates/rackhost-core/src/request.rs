//! The request value handed to applications.

/// A request as seen by an application.
///
/// The host environment owns parsing; this is the already-parsed form the
/// application's `call` receives.
#[derive(Debug, Clone, Default)]
pub struct RackRequest {
    /// HTTP method (GET, POST, etc.)
    pub method: String,
    /// Request path, without the query string
    pub path: String,
    /// Raw query string, if any
    pub query: Option<String>,
    /// Request headers as key-value pairs
    pub headers: Vec<(String, String)>,
    /// Optional request body
    pub body: Option<Vec<u8>>,
}

impl RackRequest {
    /// Create a new request without headers or body.
    ///
    /// A `?` in `target` splits it into path and query string.
    pub fn new(method: &str, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (target.to_string(), None),
        };

        Self {
            method: method.to_string(),
            path,
            query,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Set the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Get a header value by name (case-insensitive).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
