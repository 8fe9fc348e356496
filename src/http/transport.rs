//! Single request/response exchange over a pooled connection
//!
//! The transport owns one origin's [`ConnectionPool`] and runs one exchange
//! at a time per connection: send the full request, read the full response,
//! then decide whether the connection goes back to the pool or gets closed.

use super::{parser, writer, ConnectionPool, Request, Response, Result, Url};
use log::{debug, trace};
use std::net::{Shutdown, TcpStream};

/// Exchange primitive for one origin
pub struct Transport {
    pool: ConnectionPool,
}

impl Transport {
    /// Create a transport over the given pool
    pub fn new(pool: ConnectionPool) -> Self {
        Transport { pool }
    }

    /// The underlying pool
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Run one request/response exchange.
    ///
    /// The connection is released back to the pool only when the exchange
    /// succeeded and the response did not declare `Connection: close`; any
    /// error (including a read timeout) closes it instead.
    pub fn exchange(&self, req: &Request, url: &Url) -> Result<Response> {
        let mut stream = self.pool.acquire()?;

        let result = round_trip(&mut stream, req, url);

        match &result {
            Ok(resp) if !parser::wants_close(resp.headers()) => {
                trace!("releasing connection to {}", url.origin());
                self.pool.release(stream);
            }
            Ok(_) => {
                debug!("peer asked to close connection to {}", url.origin());
                let _ = stream.shutdown(Shutdown::Both);
            }
            Err(e) => {
                debug!("exchange with {} failed: {}", url.origin(), e);
                let _ = stream.shutdown(Shutdown::Both);
            }
        }

        result
    }

    /// Close all idle connections
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }
}

fn round_trip(stream: &mut TcpStream, req: &Request, url: &Url) -> Result<Response> {
    writer::write_request(stream, req, url)?;
    parser::read_response(stream)
}
