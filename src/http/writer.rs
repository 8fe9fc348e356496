//! HTTP message serialization
//!
//! This module emits well-formed HTTP/1.1 messages: responses on the server
//! side and requests on the client side. Header names are re-cased to the
//! canonical hyphen-segmented title case; `Connection` and `Content-Length`
//! are injected when the caller did not set them.

use super::headers::canonical_name;
use super::parser::is_chunked;
use super::{chunked, Request, Response, Result, Url, CRLF};
use std::fmt::Write as _;
use std::io::Write;

/// Serialize a response (server side).
///
/// Uses the pre-formed status line when one was captured, else
/// `HTTP/1.1 <code> <reason>`. If `Transfer-Encoding: chunked` is present
/// the body is emitted chunked; otherwise a missing `Content-Length` is
/// injected with the exact body length. The head is flushed before the
/// body, and the body is flushed after.
pub fn write_response<W: Write>(writer: &mut W, resp: &Response, keep_alive: bool) -> Result<()> {
    let use_chunked = is_chunked(resp.headers());

    let mut head = String::new();
    match resp.status_line() {
        Some(line) => head.push_str(line),
        None => {
            let _ = write!(head, "HTTP/1.1 {} {}", resp.status(), resp.reason());
        }
    }
    head.push_str(CRLF);

    push_headers(&mut head, resp.headers().iter());

    if !resp.headers().contains("connection") {
        let _ = write!(
            head,
            "Connection: {}{}",
            if keep_alive { "keep-alive" } else { "close" },
            CRLF
        );
    }

    if !use_chunked && !resp.headers().contains("content-length") {
        let _ = write!(head, "Content-Length: {}{}", resp.body().len(), CRLF);
    }

    head.push_str(CRLF);
    writer.write_all(head.as_bytes())?;
    writer.flush()?;

    if use_chunked {
        chunked::write_chunked_body(writer, resp.body())?;
    } else {
        if !resp.body().is_empty() {
            writer.write_all(resp.body())?;
        }
        writer.flush()?;
    }

    Ok(())
}

/// Serialize a request (client side).
///
/// The request line is `METHOD path HTTP/1.1`. A `Host` header carrying
/// `host[:port]` is always present (the port is elided on the scheme
/// default). Framing follows the response rules: chunked when advertised,
/// else `Content-Length` injected for non-empty bodies.
pub fn write_request<W: Write>(writer: &mut W, req: &Request, url: &Url) -> Result<()> {
    let use_chunked = is_chunked(req.headers());

    let mut head = String::new();
    let _ = write!(head, "{} {} HTTP/1.1{}", req.method(), req.path(), CRLF);

    if !req.headers().contains("host") {
        let _ = write!(head, "Host: {}{}", url.host_header(), CRLF);
    }

    push_headers(&mut head, req.headers().iter());

    if !use_chunked && !req.body().is_empty() && !req.headers().contains("content-length") {
        let _ = write!(head, "Content-Length: {}{}", req.body().len(), CRLF);
    }

    head.push_str(CRLF);
    writer.write_all(head.as_bytes())?;
    writer.flush()?;

    if use_chunked {
        chunked::write_chunked_body(writer, req.body())?;
    } else {
        if !req.body().is_empty() {
            writer.write_all(req.body())?;
        }
        writer.flush()?;
    }

    Ok(())
}

fn push_headers<'a>(head: &mut String, headers: impl Iterator<Item = (&'a str, &'a str)>) {
    for (name, value) in headers {
        if name.is_empty() {
            continue;
        }
        let _ = write!(head, "{}: {}{}", canonical_name(name), value, CRLF);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::parser;
    use std::io::Cursor;

    fn response_wire(resp: &Response, keep_alive: bool) -> Vec<u8> {
        let mut wire = Vec::new();
        write_response(&mut wire, resp, keep_alive).unwrap();
        wire
    }

    #[test]
    fn test_content_length_injected() {
        let resp = Response::builder().status(200).body(&b"Hello"[..]).build();
        let wire = String::from_utf8(response_wire(&resp, true)).unwrap();

        assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(wire.contains("Content-Length: 5\r\n"));
        assert!(wire.ends_with("\r\n\r\nHello"));
    }

    #[test]
    fn test_existing_content_length_kept() {
        let resp = Response::builder()
            .status(200)
            .header("Content-Length", "5")
            .body(&b"Hello"[..])
            .build();
        let wire = String::from_utf8(response_wire(&resp, true)).unwrap();

        assert_eq!(wire.matches("Content-Length").count(), 1);
    }

    #[test]
    fn test_connection_injected() {
        let resp = Response::builder().status(200).build();

        let keep = String::from_utf8(response_wire(&resp, true)).unwrap();
        assert!(keep.contains("Connection: keep-alive\r\n"));

        let close = String::from_utf8(response_wire(&resp, false)).unwrap();
        assert!(close.contains("Connection: close\r\n"));
    }

    #[test]
    fn test_handler_connection_wins() {
        let resp = Response::builder()
            .status(200)
            .header("Connection", "close")
            .build();
        let wire = String::from_utf8(response_wire(&resp, true)).unwrap();

        assert!(wire.contains("Connection: close\r\n"));
        assert!(!wire.contains("keep-alive"));
    }

    #[test]
    fn test_canonical_header_casing() {
        let resp = Response::builder()
            .status(200)
            .header("content-type", "text/plain")
            .header("x-request-id", "42")
            .build();
        let wire = String::from_utf8(response_wire(&resp, true)).unwrap();

        assert!(wire.contains("Content-Type: text/plain\r\n"));
        assert!(wire.contains("X-Request-Id: 42\r\n"));
    }

    #[test]
    fn test_preformed_status_line_verbatim() {
        let mut resp = Response::new(302);
        resp.set_status_line("HTTP/1.1 302 Found");
        let wire = String::from_utf8(response_wire(&resp, true)).unwrap();

        assert!(wire.starts_with("HTTP/1.1 302 Found\r\n"));
    }

    #[test]
    fn test_chunked_emission() {
        let resp = Response::builder()
            .status(200)
            .header("Transfer-Encoding", "chunked")
            .body(&b"Hello"[..])
            .build();
        let wire = response_wire(&resp, true);
        let text = String::from_utf8(wire.clone()).unwrap();

        assert!(!text.contains("Content-Length"));
        assert!(text.ends_with("5\r\nHello\r\n0\r\n\r\n"));

        let mut input = Cursor::new(wire);
        let parsed = parser::read_response(&mut input).unwrap();
        assert_eq!(parsed.body(), b"Hello");
    }

    #[test]
    fn test_write_request_host_and_line() {
        let url = Url::parse("http://example.com/index.html").unwrap();
        let req = Request::builder().method("GET").path("/index.html").build();

        let mut wire = Vec::new();
        write_request(&mut wire, &req, &url).unwrap();
        let text = String::from_utf8(wire).unwrap();

        assert!(text.starts_with("GET /index.html HTTP/1.1\r\n"));
        assert!(text.contains("Host: example.com\r\n"));
    }

    #[test]
    fn test_write_request_host_with_nondefault_port() {
        let url = Url::parse("http://localhost:8080/").unwrap();
        let req = Request::builder().build();

        let mut wire = Vec::new();
        write_request(&mut wire, &req, &url).unwrap();
        let text = String::from_utf8(wire).unwrap();

        assert!(text.contains("Host: localhost:8080\r\n"));
    }

    #[test]
    fn test_write_request_body_and_content_length() {
        let url = Url::parse("http://localhost:8080/user/register").unwrap();
        let req = Request::builder()
            .method("POST")
            .path("/user/register")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(&b"username=alice&password=123"[..])
            .build();

        let mut wire = Vec::new();
        write_request(&mut wire, &req, &url).unwrap();
        let text = String::from_utf8(wire).unwrap();

        assert!(text.contains("Content-Length: 27\r\n"));
        assert!(text.ends_with("\r\n\r\nusername=alice&password=123"));
    }

    #[test]
    fn test_request_roundtrip_preserves_headers_and_body() {
        let wire =
            b"POST /submit HTTP/1.1\r\nHost: h:81\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nhello";
        let mut input = Cursor::new(&wire[..]);
        let first = parser::read_request(&mut input).unwrap();

        let url = Url::parse("http://h:81/submit").unwrap();
        let mut rewire = Vec::new();
        write_request(&mut rewire, &first, &url).unwrap();

        let mut input = Cursor::new(rewire);
        let second = parser::read_request(&mut input).unwrap();

        assert_eq!(second.method(), first.method());
        assert_eq!(second.path(), first.path());
        assert_eq!(second.body(), first.body());
        let first_headers: Vec<_> = first.headers().iter().collect();
        let second_headers: Vec<_> = second.headers().iter().collect();
        assert_eq!(second_headers, first_headers);
    }

    #[test]
    fn test_parse_serialize_parse_idempotent() {
        let wire = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nX-Empty:\r\nContent-Length: 5\r\n\r\nHello";
        let mut input = Cursor::new(&wire[..]);
        let first = parser::read_response(&mut input).unwrap();

        let mut rewire = Vec::new();
        write_response(&mut rewire, &first, true).unwrap();

        let mut input = Cursor::new(rewire);
        let second = parser::read_response(&mut input).unwrap();

        assert_eq!(second.status(), first.status());
        assert_eq!(second.body(), first.body());
        let first_headers: Vec<_> = first.headers().iter().collect();
        let second_headers: Vec<_> = second
            .headers()
            .iter()
            .filter(|(n, _)| *n != "connection")
            .collect();
        assert_eq!(second_headers, first_headers);
    }
}
