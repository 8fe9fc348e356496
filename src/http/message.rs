//! HTTP message types
//!
//! This module defines the in-memory representation of HTTP requests and
//! responses. Methods and versions are kept as tokens (strings) the way they
//! appeared on the wire; header names are stored lowercased by [`Headers`].

use super::Headers;
use bytes::Bytes;

/// Canonical reason phrase for a status code
pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        411 => "Length Required",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        _ => "Unknown",
    }
}

/// HTTP request
#[derive(Debug, Clone)]
pub struct Request {
    method: String,
    path: String,
    version: String,
    headers: Headers,
    body: Bytes,
}

impl Request {
    /// Create a new request with the default version (HTTP/1.1)
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Request {
            method: method.into(),
            path: path.into(),
            version: "HTTP/1.1".to_string(),
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Create a builder for constructing requests
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// Get the request method (uppercase token by convention)
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Get the request target path, including any query string
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Replace the request target path
    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    /// Get the protocol version token, e.g. `HTTP/1.1`
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Get the headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Get mutable headers
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Get the body
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Set the body
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// Whether the peer that sent this request expects the connection to
    /// stay open after the response.
    ///
    /// `Connection: keep-alive` keeps, `Connection: close` closes; with no
    /// recognized token, HTTP/1.1 keeps and anything else closes.
    pub fn wants_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(v) if v.eq_ignore_ascii_case("keep-alive") => true,
            Some(v) if v.eq_ignore_ascii_case("close") => false,
            _ => self.version.eq_ignore_ascii_case("HTTP/1.1"),
        }
    }
}

/// Builder for HTTP requests
#[derive(Debug, Default)]
pub struct RequestBuilder {
    method: Option<String>,
    path: Option<String>,
    version: Option<String>,
    headers: Headers,
    body: Bytes,
}

impl RequestBuilder {
    /// Set the method
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Set the target path
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the protocol version token
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the body
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Build the request
    pub fn build(self) -> Request {
        Request {
            method: self.method.unwrap_or_else(|| "GET".to_string()),
            path: self.path.unwrap_or_else(|| "/".to_string()),
            version: self.version.unwrap_or_else(|| "HTTP/1.1".to_string()),
            headers: self.headers,
            body: self.body,
        }
    }
}

/// HTTP response
#[derive(Debug, Clone)]
pub struct Response {
    /// Verbatim status line when the response was parsed off the wire
    status_line: Option<String>,
    status: u16,
    reason: String,
    headers: Headers,
    body: Bytes,
}

impl Response {
    /// Create a new response with the canonical reason phrase
    pub fn new(status: u16) -> Self {
        Response {
            status_line: None,
            status,
            reason: reason_phrase(status).to_string(),
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Create a builder for constructing responses
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::default()
    }

    /// Get the status code (0 when the wire code was not an integer)
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Get the reason phrase (may be empty)
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Get the verbatim status line captured at parse time, if any
    pub fn status_line(&self) -> Option<&str> {
        self.status_line.as_deref()
    }

    /// Store a pre-formed status line, emitted verbatim at serialization
    pub fn set_status_line(&mut self, line: impl Into<String>) {
        self.status_line = Some(line.into());
    }

    /// Get the headers
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Get mutable headers
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Get the body
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Get the body as a cheaply cloneable byte sequence
    pub fn body_bytes(&self) -> Bytes {
        self.body.clone()
    }

    /// Set the body
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// Whether this is a 301 or 302 redirect
    pub fn is_redirect(&self) -> bool {
        self.status == 301 || self.status == 302
    }

    /// Whether this is a 304 Not Modified
    pub fn is_not_modified(&self) -> bool {
        self.status == 304
    }

    /// Decode the body as text.
    ///
    /// Uses the `charset` parameter of `Content-Type` when present (UTF-8
    /// and Latin-1 are understood), otherwise UTF-8; invalid UTF-8 is
    /// replaced rather than failing.
    pub fn body_as_string(&self) -> String {
        let charset = self
            .headers
            .get("content-type")
            .and_then(|ct| ct.split(';').find_map(|p| p.trim().strip_prefix("charset=")))
            .map(|cs| cs.trim_matches('"').to_ascii_lowercase());

        match charset.as_deref() {
            Some("iso-8859-1") | Some("latin-1") | Some("latin1") => {
                self.body.iter().map(|&b| b as char).collect()
            }
            _ => String::from_utf8_lossy(&self.body).into_owned(),
        }
    }
}

/// Builder for HTTP responses
#[derive(Debug, Default)]
pub struct ResponseBuilder {
    status: Option<u16>,
    reason: Option<String>,
    headers: Headers,
    body: Bytes,
}

impl ResponseBuilder {
    /// Set the status code
    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the reason phrase
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the body
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Build the response
    pub fn build(self) -> Response {
        let status = self.status.unwrap_or(200);
        let reason = self
            .reason
            .unwrap_or_else(|| reason_phrase(status).to_string());
        Response {
            status_line: None,
            status,
            reason,
            headers: self.headers,
            body: self.body,
        }
    }
}
