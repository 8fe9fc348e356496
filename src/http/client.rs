//! HTTP client engine
//!
//! High-level client behavior above the single exchange: bounded redirect
//! following with POST-to-GET coercion, a remembered-301 shortcut map, and
//! conditional revalidation of GETs against an in-memory response cache.

use super::{ConnectionPool, Request, Response, Result, Transport, Url};
use bytes::Bytes;
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const USER_AGENT: &str = concat!("minihttp/", env!("CARGO_PKG_VERSION"));

/// Client configuration knobs
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Redirects followed per request before giving up
    pub max_redirects: usize,
    /// Follow 301/302 responses automatically
    pub follow_redirects: bool,
    /// Cache 200 GET responses and revalidate with conditional requests
    pub cache_enabled: bool,
    /// Per-origin idle connection bound
    pub max_pool_size: usize,
    /// Read timeout applied to pooled connections
    pub read_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            max_redirects: 5,
            follow_redirects: true,
            cache_enabled: true,
            max_pool_size: super::pool::DEFAULT_MAX_POOL_SIZE,
            read_timeout: super::pool::DEFAULT_READ_TIMEOUT,
        }
    }
}

/// Outcome of a client request.
///
/// A response that is itself a redirect with `too_many_redirects` set means
/// the redirect bound was reached; the chain was abandoned and the last
/// received response is handed back.
#[derive(Debug)]
pub struct Fetched {
    pub response: Response,
    /// Redirects followed to produce this response
    pub redirects: usize,
    /// The redirect bound was hit and the chain abandoned
    pub too_many_redirects: bool,
}

/// HTTP client with per-origin connection pooling.
///
/// Safe for concurrent use from multiple threads; one exchange holds one
/// connection, the cache and pools are internally synchronized.
pub struct HttpClient {
    config: ClientConfig,
    transports: Mutex<HashMap<String, Arc<Transport>>>,
    cache: Mutex<HashMap<String, Response>>,
    moved_permanently: Mutex<HashMap<String, String>>,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Create a client with default configuration
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Create a client with explicit configuration
    pub fn with_config(config: ClientConfig) -> Self {
        HttpClient {
            config,
            transports: Mutex::new(HashMap::new()),
            cache: Mutex::new(HashMap::new()),
            moved_permanently: Mutex::new(HashMap::new()),
        }
    }

    /// Send a GET request
    pub fn get(&self, url: &str) -> Result<Fetched> {
        self.fetch("GET", url, None, None)
    }

    /// Send a POST request with a body
    pub fn post(&self, url: &str, body: impl Into<Bytes>, content_type: &str) -> Result<Fetched> {
        self.fetch("POST", url, Some(body.into()), Some(content_type))
    }

    /// Number of idle pooled connections for an origin (`host:port`)
    pub fn idle_connections(&self, origin: &str) -> usize {
        self.transports
            .lock()
            .unwrap()
            .get(origin)
            .map(|t| t.pool().idle_count())
            .unwrap_or(0)
    }

    /// Close all idle connections in every origin pool
    pub fn shutdown(&self) {
        for transport in self.transports.lock().unwrap().values() {
            transport.shutdown();
        }
    }

    fn fetch(
        &self,
        method: &str,
        url: &str,
        body: Option<Bytes>,
        content_type: Option<&str>,
    ) -> Result<Fetched> {
        let mut current = url.trim().to_string();
        let mut method = method.to_string();
        let mut body = body;
        let mut content_type = content_type.map(str::to_string);

        let mut original_key: Option<String> = None;
        let mut checked_hint = false;
        let mut redirects = 0usize;
        let mut saw_301 = false;

        loop {
            let parsed = Url::parse(&current)?;
            let key = parsed.to_string();
            if original_key.is_none() {
                original_key = Some(key.clone());
            }

            // A URL previously seen 301-ing can jump straight to its target
            if !checked_hint {
                checked_hint = true;
                if method == "GET" && self.config.follow_redirects {
                    let hint = self.moved_permanently.lock().unwrap().get(&key).cloned();
                    if let Some(target) = hint {
                        if target != key {
                            debug!("using remembered 301: {} -> {}", key, target);
                            current = target;
                            continue;
                        }
                    }
                }
            }

            let mut req = Request::new(method.clone(), parsed.path.clone());
            req.headers_mut().set("connection", "keep-alive");
            req.headers_mut().set("accept", "*/*");
            req.headers_mut().set("user-agent", USER_AGENT);
            if let Some(ct) = &content_type {
                req.headers_mut().set("content-type", ct.as_str());
            }
            if let Some(b) = &body {
                req.set_body(b.clone());
            }

            let revalidating = method == "GET" && self.config.cache_enabled;
            if revalidating {
                let cache = self.cache.lock().unwrap();
                if let Some(cached) = cache.get(&key) {
                    if let Some(etag) = cached.headers().get("etag") {
                        req.headers_mut().set("if-none-match", etag);
                    }
                    if let Some(modified) = cached.headers().get("last-modified") {
                        req.headers_mut().set("if-modified-since", modified);
                    }
                }
            }

            let transport = self.transport(&parsed);
            let resp = transport.exchange(&req, &parsed)?;

            if resp.is_redirect() && self.config.follow_redirects {
                let location = resp
                    .headers()
                    .get("location")
                    .unwrap_or_default()
                    .to_string();
                if location.is_empty() {
                    // Nowhere to go; the chain ends here
                    return Ok(Fetched {
                        response: resp,
                        redirects,
                        too_many_redirects: false,
                    });
                }
                if redirects >= self.config.max_redirects {
                    debug!("redirect limit reached at {}", key);
                    return Ok(Fetched {
                        response: resp,
                        redirects,
                        too_many_redirects: true,
                    });
                }

                if resp.status() == 301 {
                    saw_301 = true;
                }
                let next = parsed.resolve(&location);
                debug!("following {} redirect: {} -> {}", resp.status(), key, next);

                if method == "POST" {
                    // Browser-compatible coercion: re-issue as a bodyless GET
                    method = "GET".to_string();
                    body = None;
                    content_type = None;
                }

                current = next;
                redirects += 1;
                continue;
            }

            if resp.is_not_modified() && revalidating {
                let mut cache = self.cache.lock().unwrap();
                if let Some(entry) = cache.get_mut(&key) {
                    for (name, value) in resp.headers().iter() {
                        entry.headers_mut().set(name, value);
                    }
                    debug!("revalidated {} from cache", key);
                    let merged = entry.clone();
                    return Ok(Fetched {
                        response: merged,
                        redirects,
                        too_many_redirects: false,
                    });
                }
                // 304 with nothing cached: hand it back untouched
                return Ok(Fetched {
                    response: resp,
                    redirects,
                    too_many_redirects: false,
                });
            }

            if resp.status() == 200 {
                if revalidating {
                    self.cache.lock().unwrap().insert(key.clone(), resp.clone());
                }
                if saw_301 {
                    if let Some(original) = &original_key {
                        if *original != key {
                            debug!("remembering 301: {} -> {}", original, key);
                            self.moved_permanently
                                .lock()
                                .unwrap()
                                .insert(original.clone(), key.clone());
                        }
                    }
                }
            }

            return Ok(Fetched {
                response: resp,
                redirects,
                too_many_redirects: false,
            });
        }
    }

    fn transport(&self, url: &Url) -> Arc<Transport> {
        let mut transports = self.transports.lock().unwrap();
        transports
            .entry(url.origin())
            .or_insert_with(|| {
                Arc::new(Transport::new(ConnectionPool::with_limits(
                    url.host.clone(),
                    url.port,
                    self.config.max_pool_size,
                    self.config.read_timeout,
                )))
            })
            .clone()
    }
}
