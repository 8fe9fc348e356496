//! Keep-alive connection pool
//!
//! A per-origin bounded set of idle reusable TCP connections. The idle set
//! is a mutex-guarded queue with a condvar; acquire blocks on it for up to
//! one second before opening a fresh connection. Ownership of the
//! `TcpStream` moving in and out of the queue is the idle/in-use state:
//! a connection in the queue is held by nobody.

use super::Result;
use log::{debug, trace};
use std::collections::VecDeque;
use std::net::{Shutdown, TcpStream};
use std::os::fd::AsRawFd;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Default per-origin idle connection bound
pub const DEFAULT_MAX_POOL_SIZE: usize = 10;

/// Default read timeout applied to connections handed out by the pool
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(15_000);

/// How long acquire waits on the idle queue before opening a fresh
/// connection
const ACQUIRE_WAIT: Duration = Duration::from_secs(1);

/// Bounded pool of idle connections to one `(host, port)` origin
pub struct ConnectionPool {
    host: String,
    port: u16,
    max_pool_size: usize,
    read_timeout: Duration,
    idle: Mutex<VecDeque<TcpStream>>,
    available: Condvar,
}

impl ConnectionPool {
    /// Create a pool with the default bounds
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::with_limits(host, port, DEFAULT_MAX_POOL_SIZE, DEFAULT_READ_TIMEOUT)
    }

    /// Create a pool with explicit bounds
    pub fn with_limits(
        host: impl Into<String>,
        port: u16,
        max_pool_size: usize,
        read_timeout: Duration,
    ) -> Self {
        ConnectionPool {
            host: host.into(),
            port,
            max_pool_size,
            read_timeout,
            idle: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    /// Get a connection: an idle one if available within the bounded wait,
    /// else a fresh one.
    ///
    /// Idle connections failing the liveness probe are closed and the
    /// attempt restarts from the queue. The returned stream has the pool's
    /// read timeout set.
    pub fn acquire(&self) -> Result<TcpStream> {
        loop {
            let stream = match self.take_idle() {
                Some(stream) => {
                    if !is_alive(&stream) {
                        trace!("pooled connection to {}:{} is dead", self.host, self.port);
                        let _ = stream.shutdown(Shutdown::Both);
                        continue;
                    }
                    trace!("reusing pooled connection to {}:{}", self.host, self.port);
                    stream
                }
                None => {
                    debug!("opening new connection to {}:{}", self.host, self.port);
                    TcpStream::connect((self.host.as_str(), self.port))?
                }
            };

            stream.set_read_timeout(Some(self.read_timeout))?;
            return Ok(stream);
        }
    }

    /// Return a connection to the idle set.
    ///
    /// Dead connections are closed and discarded. The enqueue never blocks:
    /// when the idle set is already at capacity the connection is closed
    /// instead.
    pub fn release(&self, stream: TcpStream) {
        if !is_alive(&stream) {
            let _ = stream.shutdown(Shutdown::Both);
            return;
        }

        let mut idle = self.idle.lock().unwrap();
        if idle.len() < self.max_pool_size {
            idle.push_back(stream);
            drop(idle);
            self.available.notify_one();
        } else {
            drop(idle);
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    /// Number of idle connections currently pooled
    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap().len()
    }

    /// Close and drop every idle connection
    pub fn shutdown(&self) {
        let mut idle = self.idle.lock().unwrap();
        for stream in idle.drain(..) {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    /// Pop an idle connection, waiting up to [`ACQUIRE_WAIT`] for one to
    /// appear
    fn take_idle(&self) -> Option<TcpStream> {
        let deadline = Instant::now() + ACQUIRE_WAIT;
        let mut idle = self.idle.lock().unwrap();

        loop {
            if let Some(stream) = idle.pop_front() {
                return Some(stream);
            }

            let remaining = deadline.checked_duration_since(Instant::now())?;
            let (guard, timeout) = self.available.wait_timeout(idle, remaining).unwrap();
            idle = guard;
            if timeout.timed_out() && idle.is_empty() {
                return None;
            }
        }
    }
}

/// Probe a connection for liveness without consuming stream data.
///
/// A zero-timeout `poll(2)` for readability: a quiet socket is alive; a
/// readable one is at EOF or carries bytes nobody asked for, and an idle
/// HTTP connection has neither, so it is discarded either way. Probe
/// failure also counts as dead.
fn is_alive(stream: &TcpStream) -> bool {
    let mut pfd = libc::pollfd {
        fd: stream.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };

    let rc = unsafe { libc::poll(&mut pfd as *mut libc::pollfd, 1, 0) };

    rc == 0
}
