//! URL parsing and redirect resolution
//!
//! Accepts `scheme://host[:port][/path[?query]]`. The scheme is optional
//! and defaults to `http`; a missing path becomes `/`. Only enough grammar
//! for the client engine: no userinfo, no fragments, no IPv6 literals.

use super::{Error, Result};
use std::fmt;

/// A parsed absolute URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    /// Path including the query string, always starting with `/`
    pub path: String,
    /// Query string without the leading `?`, if any
    pub query: Option<String>,
}

fn default_port(scheme: &str) -> u16 {
    if scheme.eq_ignore_ascii_case("https") {
        443
    } else {
        80
    }
}

impl Url {
    /// Parse a URL string
    pub fn parse(input: &str) -> Result<Url> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::InvalidUrl("empty URL".to_string()));
        }

        let (scheme, rest) = match input.split_once("://") {
            Some((s, r)) => (s.to_ascii_lowercase(), r),
            None => ("http".to_string(), input),
        };

        let split_at = rest.find(['/', '?']).unwrap_or(rest.len());
        let (authority, path_part) = rest.split_at(split_at);

        let (host, port) = match authority.rsplit_once(':') {
            Some((h, p)) => {
                let port = p
                    .parse::<u16>()
                    .map_err(|_| Error::InvalidUrl(format!("bad port in {}", input)))?;
                (h.to_string(), port)
            }
            None => (authority.to_string(), default_port(&scheme)),
        };

        if host.is_empty() {
            return Err(Error::InvalidUrl(format!("no host in {}", input)));
        }

        let path = if path_part.is_empty() {
            "/".to_string()
        } else if path_part.starts_with('?') {
            format!("/{}", path_part)
        } else {
            path_part.to_string()
        };

        let query = path.split_once('?').map(|(_, q)| q.to_string());

        Ok(Url {
            scheme,
            host,
            port,
            path,
            query,
        })
    }

    fn is_default_port(&self) -> bool {
        self.port == default_port(&self.scheme)
    }

    /// The pool key: `host:port`
    pub fn origin(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The `Host` header value: `host[:port]`, port elided on the scheme
    /// default
    pub fn host_header(&self) -> String {
        if self.is_default_port() {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// `scheme://host[:port]` with the port elided on the scheme default
    fn base(&self) -> String {
        if self.is_default_port() {
            format!("{}://{}", self.scheme, self.host)
        } else {
            format!("{}://{}:{}", self.scheme, self.host, self.port)
        }
    }

    /// Resolve a redirect `Location` value against this URL.
    ///
    /// Absolute locations are used verbatim; `//` gets the current scheme;
    /// `/` resolves against the origin; anything else resolves against the
    /// directory of the current path (up to and including the last `/`).
    pub fn resolve(&self, location: &str) -> String {
        if location.starts_with("http://") || location.starts_with("https://") {
            location.to_string()
        } else if let Some(rest) = location.strip_prefix("//") {
            format!("{}://{}", self.scheme, rest)
        } else if location.starts_with('/') {
            format!("{}{}", self.base(), location)
        } else {
            let path = self.path.split('?').next().unwrap_or("/");
            let dir = match path.rfind('/') {
                Some(i) => &path[..=i],
                None => "/",
            };
            format!("{}{}{}", self.base(), dir, location)
        }
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.base(), self.path)
    }
}
