//! minihttp - a minimal blocking HTTP/1.1 client and server.
//!
//! This crate implements the HTTP/1.1 wire protocol directly on top of
//! `std::net` stream sockets: message parsing and framing (Content-Length,
//! chunked transfer encoding, connection-close delimitation), a per-origin
//! keep-alive connection pool, a redirect-following and revalidating client,
//! and a threaded server loop dispatching to application handlers.

pub mod http;

pub use http::{Error, Result};
