//! Responses produced by applications and their rendering.
//!
//! A [`RackResponse`] is a finished value: status, headers and body. It
//! renders itself into a [`ResponseSink`] supplied by the host; the sink's
//! [`default_respond`](ResponseSink::default_respond) is the standard
//! rendering procedure.

use std::collections::BTreeMap;
use std::io::{self, Write};

use rackhost_common::HostContext;

/// A complete response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RackResponse {
    status: u16,
    headers: BTreeMap<String, String>,
    body: Vec<u8>,
}

impl RackResponse {
    /// Create a response from its parts.
    pub fn new(status: u16, headers: BTreeMap<String, String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Create a plain-text response.
    pub fn text(status: u16, body: &str) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(
            "content-type".to_string(),
            "text/plain; charset=utf-8".to_string(),
        );
        Self::new(status, headers, body)
    }

    /// The status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// The headers; keys are unique.
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// The raw body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body decoded as UTF-8, replacing invalid sequences.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Render this response into `sink`.
    ///
    /// An I/O failure is logged through `context` and swallowed: part of the
    /// response may already be on the wire, and the connection is presumed
    /// lost.
    pub fn respond(&self, sink: &mut dyn ResponseSink, context: &dyn HostContext) {
        if let Err(e) = sink.default_respond(self) {
            context.log("Error writing body", Some(&e));
        }
    }
}

/// Destination a response is rendered into.
pub trait ResponseSink {
    /// Set the status line.
    fn set_status(&mut self, status: u16) -> io::Result<()>;

    /// Emit one header.
    fn add_header(&mut self, name: &str, value: &str) -> io::Result<()>;

    /// Write body bytes. Called once the head is complete.
    fn write_body(&mut self, chunk: &[u8]) -> io::Result<()>;

    /// Finish the response.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Standard rendering: status, then headers, then body.
    fn default_respond(&mut self, response: &RackResponse) -> io::Result<()> {
        self.set_status(response.status())?;
        for (name, value) in response.headers() {
            self.add_header(name, value)?;
        }
        self.write_body(response.body())?;
        self.finish()
    }
}

/// Renders responses as HTTP/1.1 text onto any writer.
#[derive(Debug)]
pub struct HttpWriter<W: Write> {
    writer: W,
    head_done: bool,
}

impl<W: Write> HttpWriter<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            head_done: false,
        }
    }

    /// Unwrap the writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn end_head(&mut self) -> io::Result<()> {
        if !self.head_done {
            self.writer.write_all(b"\r\n")?;
            self.head_done = true;
        }
        Ok(())
    }
}

impl<W: Write> ResponseSink for HttpWriter<W> {
    fn set_status(&mut self, status: u16) -> io::Result<()> {
        write!(self.writer, "HTTP/1.1 {status} {}\r\n", reason_phrase(status))
    }

    fn add_header(&mut self, name: &str, value: &str) -> io::Result<()> {
        write!(self.writer, "{name}: {value}\r\n")
    }

    fn write_body(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.end_head()?;
        self.writer.write_all(chunk)
    }

    fn finish(&mut self) -> io::Result<()> {
        self.end_head()?;
        self.writer.flush()
    }
}

/// Canonical reason phrase for common status codes.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use support::RecordingContext;

    /// Minimal context for rendering tests.
    mod support {
        use std::error::Error;
        use std::sync::Mutex;

        use rackhost_common::HostContext;

        #[derive(Default)]
        pub struct RecordingContext {
            pub entries: Mutex<Vec<String>>,
        }

        impl HostContext for RecordingContext {
            fn init_parameter(&self, _name: &str) -> Option<String> {
                None
            }

            fn log(&self, message: &str, error: Option<&(dyn Error + 'static)>) {
                let entry = match error {
                    Some(e) => format!("{message}: {e}"),
                    None => message.to_string(),
                };
                self.entries.lock().unwrap().push(entry);
            }
        }
    }

    /// A writer that fails after accepting `budget` bytes.
    struct BrokenPipe {
        budget: usize,
    }

    impl Write for BrokenPipe {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "connection reset"));
            }
            let n = buf.len().min(self.budget);
            self.budget -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_text_response() {
        let resp = RackResponse::text(200, "Hello, World!");
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.body(), b"Hello, World!");
        assert_eq!(
            resp.headers().get("content-type").map(String::as_str),
            Some("text/plain; charset=utf-8")
        );
    }

    #[test]
    fn test_http_writer_rendering() {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "text/html".to_string());
        headers.insert("x-request-id".to_string(), "42".to_string());
        let resp = RackResponse::new(404, headers, "<h1>gone</h1>");

        let mut sink = HttpWriter::new(Vec::new());
        sink.default_respond(&resp).unwrap();
        let rendered = String::from_utf8(sink.into_inner()).unwrap();

        assert_eq!(
            rendered,
            "HTTP/1.1 404 Not Found\r\ncontent-type: text/html\r\nx-request-id: 42\r\n\r\n<h1>gone</h1>"
        );
    }

    #[test]
    fn test_empty_body_still_ends_head() {
        let resp = RackResponse::new(204, BTreeMap::new(), Vec::<u8>::new());
        let mut sink = HttpWriter::new(Vec::new());
        sink.default_respond(&resp).unwrap();

        assert_eq!(sink.into_inner(), b"HTTP/1.1 204 No Content\r\n\r\n");
    }

    #[test]
    fn test_respond_logs_io_error() {
        let context = RecordingContext::default();
        let resp = RackResponse::text(500, "failure details");
        let mut sink = HttpWriter::new(BrokenPipe { budget: 10 });

        resp.respond(&mut sink, &context);

        let entries = context.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].starts_with("Error writing body"));
        assert!(entries[0].contains("connection reset"));
    }

    #[test]
    fn test_respond_success_logs_nothing() {
        let context = RecordingContext::default();
        let resp = RackResponse::text(200, "ok");
        let mut sink = HttpWriter::new(Vec::new());

        resp.respond(&mut sink, &context);

        assert!(context.entries.lock().unwrap().is_empty());
    }

    #[test]
    fn test_reason_phrase() {
        assert_eq!(reason_phrase(200), "OK");
        assert_eq!(reason_phrase(500), "Internal Server Error");
        assert_eq!(reason_phrase(799), "Unknown");
    }
}
