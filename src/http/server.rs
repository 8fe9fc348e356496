//! HTTP server implementation
//!
//! An accept loop handing each connection to a fixed pool of worker
//! threads. Every worker runs sequential request/response exchanges on its
//! connection under keep-alive, with an idle read timeout, dispatching to
//! application handlers through a [`Router`]. A panicking handler is
//! answered with a canned 500; parse and write failures silently end the
//! session.

use super::{parser, writer, Error, Request, Response, Result};
use log::{debug, error, info, trace};
use std::collections::HashMap;
use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default listening port
pub const DEFAULT_PORT: u16 = 8080;

/// Default per-connection idle read timeout
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Default grace period for workers at shutdown
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(5_000);

/// Server configuration knobs
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind; when the default is requested but occupied, an
    /// ephemeral port is used instead
    pub port: u16,
    /// Worker pool size
    pub worker_count: usize,
    /// Idle read timeout per connection
    pub idle_timeout: Duration,
    /// How long shutdown waits for busy workers before detaching them
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let parallelism = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        ServerConfig {
            port: DEFAULT_PORT,
            worker_count: (parallelism * 2).max(2),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

type Handler = Box<dyn Fn(&Request) -> Response + Send + Sync>;
type StaticResolver = Box<dyn Fn(&str, &Request) -> Response + Send + Sync>;

/// Request dispatch table.
///
/// Exact `(method, path)` routes are tried first, then GET requests fall
/// through to mounted prefix subtrees (static resources), then a canned
/// 404.
#[derive(Default)]
pub struct Router {
    routes: HashMap<(String, String), Handler>,
    mounts: Vec<(String, StaticResolver)>,
}

impl Router {
    /// Create an empty router
    pub fn new() -> Self {
        Router {
            routes: HashMap::new(),
            mounts: Vec::new(),
        }
    }

    /// Register a handler for an exact method and path
    pub fn route(
        &mut self,
        method: &str,
        path: &str,
        handler: impl Fn(&Request) -> Response + Send + Sync + 'static,
    ) {
        self.routes.insert(
            (method.to_ascii_uppercase(), path.to_string()),
            Box::new(handler),
        );
    }

    /// Mount a static-resource resolver under a path prefix.
    ///
    /// The resolver receives the request path relative to the prefix,
    /// without the query string. Only GET requests reach mounts.
    pub fn mount(
        &mut self,
        prefix: &str,
        resolver: impl Fn(&str, &Request) -> Response + Send + Sync + 'static,
    ) {
        self.mounts
            .push((prefix.trim_end_matches('/').to_string(), Box::new(resolver)));
    }

    /// Route a request to its handler and produce the response
    pub fn dispatch(&self, req: &Request) -> Response {
        let key = (req.method().to_ascii_uppercase(), req.path().to_string());
        if let Some(handler) = self.routes.get(&key) {
            return handler(req);
        }

        if req.method().eq_ignore_ascii_case("GET") {
            let path = req.path().split('?').next().unwrap_or("/");
            for (prefix, resolver) in &self.mounts {
                if let Some(relative) = path.strip_prefix(prefix.as_str()) {
                    if relative.is_empty() || relative.starts_with('/') {
                        return resolver(relative, req);
                    }
                }
            }
        }

        not_found()
    }
}

fn not_found() -> Response {
    canned(404, "404 Not Found")
}

fn internal_error() -> Response {
    canned(500, "500 Internal Server Error")
}

fn canned(status: u16, body: &str) -> Response {
    let mut resp = Response::new(status);
    resp.headers_mut().set("content-type", "text/plain");
    resp.set_body(body.as_bytes().to_vec());
    resp
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size worker pool fed by a channel
struct ThreadPool {
    sender: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadPool {
    fn new(size: usize) -> ThreadPool {
        let (sender, receiver) = channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..size)
            .map(|_| {
                let receiver = Arc::clone(&receiver);
                thread::spawn(move || loop {
                    let job = receiver.lock().unwrap().recv();
                    match job {
                        Ok(job) => job(),
                        Err(_) => break,
                    }
                })
            })
            .collect();

        ThreadPool {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
        }
    }

    fn execute(&self, job: impl FnOnce() + Send + 'static) {
        if let Some(sender) = self.sender.lock().unwrap().as_ref() {
            let _ = sender.send(Box::new(job));
        }
    }

    /// Stop accepting jobs and wait up to `grace` for workers to drain.
    ///
    /// Workers still busy at the deadline are detached; threads cannot be
    /// forced down.
    fn shutdown(&self, grace: Duration) {
        self.sender.lock().unwrap().take();

        let workers = std::mem::take(&mut *self.workers.lock().unwrap());
        let deadline = Instant::now() + grace;
        for worker in workers {
            while !worker.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }
            if worker.is_finished() {
                let _ = worker.join();
            }
        }
    }
}

/// HTTP server: accept loop plus per-connection exchange loops
pub struct Server {
    listener: TcpListener,
    router: Arc<Router>,
    workers: ThreadPool,
    running: AtomicBool,
    idle_timeout: Duration,
    shutdown_grace: Duration,
}

impl Server {
    /// Bind the configured port and spin up the worker pool.
    ///
    /// When the default port is requested but occupied, an ephemeral port
    /// is bound instead; any other bind failure is an error.
    pub fn bind(config: ServerConfig, router: Router) -> Result<Server> {
        let listener = match TcpListener::bind(("0.0.0.0", config.port)) {
            Ok(listener) => listener,
            Err(e) if e.kind() == io::ErrorKind::AddrInUse && config.port == DEFAULT_PORT => {
                debug!("port {} in use, falling back to an ephemeral port", config.port);
                TcpListener::bind(("0.0.0.0", 0))?
            }
            Err(e) => return Err(e.into()),
        };

        info!("listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            router: Arc::new(router),
            workers: ThreadPool::new(config.worker_count.max(1)),
            running: AtomicBool::new(true),
            idle_timeout: config.idle_timeout,
            shutdown_grace: config.shutdown_grace,
        })
    }

    /// The bound address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until [`shutdown`](Self::shutdown); blocks the
    /// calling thread.
    pub fn run(&self) -> Result<()> {
        for accepted in self.listener.incoming() {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            match accepted {
                Ok(stream) => {
                    let router = Arc::clone(&self.router);
                    let idle_timeout = self.idle_timeout;
                    self.workers
                        .execute(move || serve_connection(stream, router, idle_timeout));
                }
                Err(e) => {
                    debug!("accept failed: {}", e);
                }
            }
        }

        info!("server stopped");
        Ok(())
    }

    /// Stop the accept loop and drain the worker pool.
    pub fn shutdown(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            // Wake the blocked accept with a throwaway connection
            if let Ok(addr) = self.listener.local_addr() {
                let _ = TcpStream::connect(("127.0.0.1", addr.port()));
            }
            self.workers.shutdown(self.shutdown_grace);
        }
    }
}

/// Serve sequential exchanges on one connection until it closes.
fn serve_connection(mut stream: TcpStream, router: Arc<Router>, idle_timeout: Duration) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    trace!("connection from {}", peer);

    if stream.set_read_timeout(Some(idle_timeout)).is_err() {
        return;
    }

    loop {
        let mut req = match parser::read_request(&mut stream) {
            Ok(req) => req,
            Err(e) => {
                if e.is_timeout() {
                    debug!("{}: idle timeout, closing", peer);
                } else if matches!(e, Error::ConnectionClosed) {
                    trace!("{}: closed by peer", peer);
                } else {
                    debug!("{}: unparsable request, closing: {}", peer, e);
                }
                break;
            }
        };

        if req.path().is_empty() {
            req.set_path("/");
        }

        let resp = match catch_unwind(AssertUnwindSafe(|| router.dispatch(&req))) {
            Ok(resp) => resp,
            Err(_) => {
                error!("{}: handler panicked for {} {}", peer, req.method(), req.path());
                internal_error()
            }
        };

        let keep_alive = req.wants_keep_alive();
        if let Err(e) = writer::write_response(&mut stream, &resp, keep_alive) {
            debug!("{}: write failed: {}", peer, e);
            break;
        }

        trace!("{}: {} {} -> {}", peer, req.method(), req.path(), resp.status());

        if !keep_alive {
            break;
        }
    }

    let _ = stream.shutdown(Shutdown::Both);
}
