//! HTTP/1.1 response.
//!
//! A [`Response`] is a mutable status/headers/body holder. Actions receive a
//! fresh one per request and mutate it; the dispatcher synthesizes its own for
//! error outcomes. [`Response::into_bytes`] serializes it for the wire.

use bytes::{BufMut, BytesMut};

use super::{Headers, StatusCode};

/// An HTTP/1.1 response, ready to be serialized and sent.
///
/// Setting a status replaces the body with a built-in status page unless the
/// status is a 2xx code or the caller asks to keep the body (see
/// [`set_status`](Self::set_status)).
///
/// # Examples
///
/// ```
/// use ninaf::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::Ok)
///     .header("Content-Type", "application/json")
///     .body(r#"{"status":"ok"}"#);
///
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.contains("Content-Length: 15\r\n"));
///
/// let missing = Response::new(StatusCode::NotFound);
/// assert!(missing.body_str().contains("404 Not Found"));
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: String,
    keep_alive: bool,
}

impl Response {
    /// Creates a response with the given status.
    ///
    /// The body is empty for 2xx codes and the status page otherwise.
    pub fn new(status: StatusCode) -> Self {
        let mut response = Self {
            status,
            headers: Headers::new(),
            body: String::new(),
            keep_alive: true,
        };
        response.set_status(status, true);
        response
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Appends a header in-place.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    /// Sets a header in-place, replacing any existing value.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.set(name, value);
        self
    }

    /// Sets the response body.
    ///
    /// The `Content-Length` header is written automatically by [`into_bytes`](Self::into_bytes).
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Replaces the body in-place.
    pub fn set_body(&mut self, body: impl Into<String>) -> &mut Self {
        self.body = body.into();
        self
    }

    /// Appends `part` to the body, separated from the existing body by `delimiter`.
    pub fn add_to_body(&mut self, part: &str, delimiter: &str) -> &mut Self {
        self.body.push_str(delimiter);
        self.body.push_str(part);
        self
    }

    /// Controls whether the `Connection: keep-alive` or `Connection: close` header is written.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Sets the status code.
    ///
    /// With `clear`, the body is replaced: 2xx codes (except `204`, which is
    /// left alone) empty it, every other code renders the status page.
    pub fn set_status(&mut self, status: StatusCode, clear: bool) -> &mut Self {
        self.status = status;
        if clear && status != StatusCode::NoContent {
            self.body = if status.is_success() {
                String::new()
            } else {
                status_page(status)
            };
        }
        self
    }

    /// Turns the response into a redirect to `url` with the given 3xx status.
    pub fn redirect(&mut self, url: impl Into<String>, status: StatusCode) -> &mut Self {
        self.set_status(status, true);
        self.set_header("Location", url);
        self
    }

    /// Returns the status code of this response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the body text.
    pub fn body_str(&self) -> &str {
        &self.body
    }

    /// Serializes the response into a `BytesMut` buffer using HTTP/1.1 wire format.
    ///
    /// Automatically adds:
    /// - `Content-Type: text/html; charset=utf-8` if the body is non-empty and no
    ///   `Content-Type` header was set.
    /// - `Content-Length: <n>` (always written).
    /// - `Connection: keep-alive` or `Connection: close`.
    pub fn into_bytes(mut self) -> BytesMut {
        let content_length = self.body.len();

        if !self.body.is_empty() && !self.headers.contains("content-type") {
            self.headers.insert("Content-Type", "text/html; charset=utf-8");
        }

        let connection = if self.keep_alive {
            "keep-alive"
        } else {
            "close"
        };
        self.headers.set("Connection", connection);

        let estimated_size = 128 + self.headers.len() * 64 + content_length;
        let mut buf = BytesMut::with_capacity(estimated_size);

        buf.put(format!("HTTP/1.1 {}\r\n", self.status).as_bytes());

        for (name, value) in self.headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }

        // Content-Length is always the last header before the blank line
        buf.put(format!("Content-Length: {content_length}\r\n").as_bytes());
        buf.put(&b"\r\n"[..]);
        buf.put(self.body.as_bytes());

        buf
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}

fn status_page(status: StatusCode) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><title>{status}</title></head>\
         <body><h1>{status}</h1></body></html>"
    )
}
