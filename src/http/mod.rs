//! HTTP/1.1 client and server core.
//!
//! The wire layer ([`parser`], [`writer`], [`chunked`]) turns blocking byte
//! streams into [`Request`]/[`Response`] values and back. On top of it sit
//! the client side ([`pool`], [`transport`], [`client`]) and the server side
//! ([`server`]).
//!
//! # Examples
//!
//! ```no_run
//! use minihttp::http::{HttpClient, Router, Server, ServerConfig, Response};
//!
//! let mut router = Router::new();
//! router.route("GET", "/hello", |_req| {
//!     let mut resp = Response::new(200);
//!     resp.headers_mut().set("content-type", "text/plain");
//!     resp.set_body("hello");
//!     resp
//! });
//!
//! let server = Server::bind(ServerConfig::default(), router).unwrap();
//! let addr = server.local_addr().unwrap();
//!
//! let client = HttpClient::new();
//! let fetched = client.get(&format!("http://{}/hello", addr)).unwrap();
//! assert_eq!(fetched.response.status(), 200);
//! ```

pub mod chunked;
pub mod client;
pub mod headers;
pub mod message;
pub mod parser;
pub mod pool;
pub mod server;
pub mod transport;
pub mod url;
pub mod writer;

pub use client::{ClientConfig, Fetched, HttpClient};
pub use headers::Headers;
pub use message::{Request, Response};
pub use pool::ConnectionPool;
pub use server::{Router, Server, ServerConfig};
pub use transport::Transport;
pub use url::Url;

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(String),

    #[error("Incomplete message")]
    Incomplete,

    #[error("Timeout")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Whether this error is a socket read timeout.
    ///
    /// Blocking sockets surface read timeouts as `WouldBlock` on Unix and
    /// `TimedOut` on Windows.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Timeout => true,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

/// Maximum number of headers per message
pub const MAX_HEADERS: usize = 64;

/// Default HTTP port
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// CRLF line ending
pub const CRLF: &str = "\r\n";
