//! Incoming HTTP requests.
//!
//! A [`Request`] is either parsed from the wire with the [`httparse`] crate or
//! built directly from a URL and a verb with [`Request::new`]. Either way the
//! request target is resolved into a [`Url`] once, and is read-only afterwards.

use std::collections::HashMap;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::{Url, form_urlencoded};

use super::{Headers, Method};

/// Origin-form request targets (`/path?query`) are resolved against this base.
const BASE_URL: &str = "http://localhost/";

/// Errors that can occur while building or parsing a request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete, more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("unparseable URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// An incoming HTTP request.
///
/// # Examples
///
/// ```
/// use ninaf::http::Request;
///
/// let request = Request::new("/c/show/a%20b?sort=name", "GET").unwrap();
///
/// assert_eq!(request.verb(), "get");
/// assert_eq!(request.path(), "/c/show/a b");
/// assert_eq!(request.query_param("sort"), Some("name"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    path: String,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    body: Bytes,
    query: HashMap<String, String>,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Builds a request from a URL (absolute or origin-form) and an HTTP verb.
    ///
    /// The verb is case-insensitive; `"get"` and `"GET"` both yield
    /// [`Method::Get`].
    ///
    /// # Errors
    ///
    /// [`RequestError::InvalidUrl`] when `url` cannot be parsed.
    pub fn new(url: &str, method: &str) -> Result<Self, RequestError> {
        let Ok(method) = method.to_ascii_uppercase().parse::<Method>();
        Self::from_parts(method, url, 1, Headers::new(), Bytes::new())
    }

    /// Parse a raw HTTP/1.1 request from a byte slice.
    ///
    /// Returns the parsed `Request` and the byte offset at which the body begins
    /// in `buf` (i.e. immediately after the `\r\n\r\n` header terminator).
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`] — more data is needed to complete the request headers.
    /// - [`RequestError::Parse`] — the data is malformed and cannot be parsed.
    /// - [`RequestError::MissingField`] — a required field (method, path, version) is absent.
    /// - [`RequestError::InvalidUrl`] — the request target is not a valid URL.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let Ok(method) = raw_req
            .method
            .ok_or(RequestError::MissingField { field: "method" })?
            .parse::<Method>();

        let target = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;

        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut header_map = Headers::with_capacity(raw_req.headers.len());
        for header in raw_req.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        let body = Bytes::copy_from_slice(&buf[body_offset..]);
        let request = Self::from_parts(method, target, version, header_map, body)?;
        Ok((request, body_offset))
    }

    fn from_parts(
        method: Method,
        target: &str,
        version: u8,
        headers: Headers,
        body: Bytes,
    ) -> Result<Self, RequestError> {
        let invalid = |source| RequestError::InvalidUrl {
            url: target.to_owned(),
            source,
        };
        let url = Url::parse(BASE_URL)
            .and_then(|base| base.join(target))
            .map_err(invalid)?;

        let path = url_decode(url.path());
        let query = url
            .query()
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        Ok(Self {
            method,
            url,
            path,
            version,
            headers,
            body,
            query,
        })
    }

    /// Adds a header, returning the request. Used when building requests by hand.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replaces the body, returning the request.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the lowercased HTTP verb, e.g. `"post"`.
    pub fn verb(&self) -> String {
        self.method.to_lowercase()
    }

    /// Returns the URL-decoded request path (without the query string).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns all parsed URL components.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the HTTP minor version number (0 = HTTP/1.0, 1 = HTTP/1.1).
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the raw query string (without the leading `?`), if any.
    pub fn query_string(&self) -> Option<&str> {
        self.url.query()
    }

    /// Returns a decoded query parameter value by key.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Returns every decoded query parameter.
    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    /// Returns the request body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Decodes an `application/x-www-form-urlencoded` body.
    ///
    /// Repeated keys keep the last value.
    pub fn form(&self) -> HashMap<String, String> {
        form_urlencoded::parse(&self.body).into_owned().collect()
    }

    /// Deserializes a JSON body.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: DeserializeOwned,
    {
        serde_json::from_slice(&self.body)
    }

    /// Returns the value of the named cookie from the `Cookie` header(s).
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all("cookie")
            .flat_map(|header| header.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    /// Returns `true` if the connection should be kept alive after this request.
    ///
    /// HTTP/1.1 defaults to keep-alive. HTTP/1.0 defaults to close unless
    /// `Connection: keep-alive` is explicitly set.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.version == 1,
        }
    }

    /// Returns the value of the `Content-Length` header parsed as a `usize`, if present.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.parse().ok()
    }
}

/// Decodes `%XX` escapes and `+` the way form-encoded paths are written.
///
/// Malformed escapes are kept literally; invalid UTF-8 is replaced.
fn url_decode(input: &str) -> String {
    let mut bytes = Vec::with_capacity(input.len());
    let mut rest = input.bytes();
    while let Some(b) = rest.next() {
        match b {
            b'+' => bytes.push(b' '),
            b'%' => {
                let mut lookahead = rest.clone();
                match (
                    lookahead.next().and_then(hex_val),
                    lookahead.next().and_then(hex_val),
                ) {
                    (Some(hi), Some(lo)) => {
                        bytes.push(hi << 4 | lo);
                        rest = lookahead;
                    }
                    _ => bytes.push(b'%'),
                }
            }
            _ => bytes.push(b),
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
