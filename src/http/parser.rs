//! HTTP message parsing
//!
//! This module turns a blocking byte stream into a [`Request`] (server side)
//! or a [`Response`] (client side). The head is accumulated until the
//! `\r\n\r\n` boundary; any bytes read past it are re-prepended to the
//! stream for body reading via [`std::io::Read::chain`].

use super::{chunked, Error, Headers, Request, Response, Result, CRLF};
use std::io::{Cursor, Read};

const HEAD_READ_SIZE: usize = 1024;

/// Parse one request off the stream (server side).
///
/// Body framing: chunked wins over Content-Length; with neither header the
/// request has no body.
pub fn read_request<R: Read>(stream: &mut R) -> Result<Request> {
    let (head, leftover) = read_head(stream)?;
    let mut lines = head.split(CRLF);

    let request_line = lines.next().unwrap_or("");
    let mut parts = request_line.splitn(3, ' ');
    let (method, path, version) = match (parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(p), Some(v)) if !m.is_empty() => (m, p, v),
        _ => {
            return Err(Error::Parse(format!(
                "Invalid request line: {}",
                request_line
            )))
        }
    };

    let headers = parse_header_lines(lines);

    let mut body_in = Cursor::new(leftover).chain(stream);
    let body = if is_chunked(&headers) {
        chunked::read_chunked_body(&mut body_in)?
    } else if let Some(cl) = headers.get("content-length") {
        read_exact_body(&mut body_in, parse_content_length(cl)?)?
    } else {
        Vec::new()
    };

    let mut req = Request::builder()
        .method(method)
        .path(path)
        .version(version)
        .body(body)
        .build();
    *req.headers_mut() = headers;
    Ok(req)
}

/// Parse one response off the stream (client side).
///
/// The status line is kept verbatim; a non-integer code becomes 0 and a
/// missing reason becomes the empty string. 1xx, 204 and 304 responses
/// never carry a body. Otherwise chunked wins over Content-Length, and with
/// neither, `Connection: close` means read-until-EOF.
pub fn read_response<R: Read>(stream: &mut R) -> Result<Response> {
    let (head, leftover) = read_head(stream)?;
    let mut lines = head.split(CRLF);

    let status_line = lines.next().unwrap_or("").to_string();
    let mut parts = status_line.splitn(3, ' ');
    let _version = parts.next().unwrap_or("");
    let status = parts.next().and_then(|c| c.parse::<u16>().ok()).unwrap_or(0);
    let reason = parts.next().unwrap_or("").to_string();

    let headers = parse_header_lines(lines);

    let mut resp = Response::builder().status(status).reason(reason).build();
    resp.set_status_line(status_line);
    *resp.headers_mut() = headers;

    if !body_forbidden(status) {
        let mut body_in = Cursor::new(leftover).chain(stream);
        let body = if is_chunked(resp.headers()) {
            chunked::read_chunked_body(&mut body_in)?
        } else if let Some(cl) = resp.headers().get("content-length") {
            read_exact_body(&mut body_in, parse_content_length(cl)?)?
        } else if wants_close(resp.headers()) {
            read_until_eof(&mut body_in)?
        } else {
            Vec::new()
        };
        resp.set_body(body);
    }

    Ok(resp)
}

/// Read from the stream until the four-byte `\r\n\r\n` head terminator.
///
/// Returns the head text (start line plus header lines) and any body bytes
/// that were read past the boundary.
fn read_head<R: Read>(stream: &mut R) -> Result<(String, Vec<u8>)> {
    let mut buf: Vec<u8> = Vec::with_capacity(HEAD_READ_SIZE);
    let mut chunk = [0u8; HEAD_READ_SIZE];

    loop {
        if let Some(pos) = find_head_end(&buf) {
            let head = String::from_utf8_lossy(&buf[..pos]).into_owned();
            let leftover = buf.split_off(pos + 4);
            return Ok((head, leftover));
        }

        let n = stream.read(&mut chunk)?;
        if n == 0 {
            // Clean close between requests vs. a truncated head
            return if buf.is_empty() {
                Err(Error::ConnectionClosed)
            } else {
                Err(Error::Incomplete)
            };
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Find the start of `\r\n\r\n` in a buffer
fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Parse `Name: Value` header lines.
///
/// Lines without a colon and empty names are dropped; names and values are
/// trimmed, names lowercased by the [`Headers`] store.
fn parse_header_lines<'a>(lines: impl Iterator<Item = &'a str>) -> Headers {
    let mut headers = Headers::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(colon) = line.find(':') {
            let name = line[..colon].trim();
            let value = line[colon + 1..].trim();
            if !name.is_empty() {
                headers.insert(name, value);
            }
        }
    }
    headers
}

/// Whether `Transfer-Encoding` advertises the chunked token
pub(crate) fn is_chunked(headers: &Headers) -> bool {
    headers
        .get_all("transfer-encoding")
        .iter()
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("chunked"))
}

/// Whether the peer declared `Connection: close`
pub(crate) fn wants_close(headers: &Headers) -> bool {
    headers
        .get("connection")
        .map(|v| v.eq_ignore_ascii_case("close"))
        .unwrap_or(false)
}

fn parse_content_length(value: &str) -> Result<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| Error::Parse(format!("Invalid Content-Length: {}", value)))
}

fn body_forbidden(status: u16) -> bool {
    (100..200).contains(&status) || status == 204 || status == 304
}

fn read_exact_body<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Incomplete
        } else {
            Error::Io(e)
        }
    })?;
    Ok(body)
}

fn read_until_eof<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    reader.read_to_end(&mut body)?;
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_request_simple() {
        let mut input =
            Cursor::new(&b"GET /index.html HTTP/1.1\r\nHost: localhost\r\n\r\n"[..]);
        let req = read_request(&mut input).unwrap();

        assert_eq!(req.method(), "GET");
        assert_eq!(req.path(), "/index.html");
        assert_eq!(req.version(), "HTTP/1.1");
        assert_eq!(req.headers().get("Host"), Some("localhost"));
        assert!(req.body().is_empty());
    }

    #[test]
    fn test_read_request_with_body() {
        let mut input = Cursor::new(
            &b"POST /user/register HTTP/1.1\r\nContent-Length: 27\r\n\r\nusername=alice&password=123"[..],
        );
        let req = read_request(&mut input).unwrap();

        assert_eq!(req.method(), "POST");
        assert_eq!(req.body(), b"username=alice&password=123");
    }

    #[test]
    fn test_read_request_chunked_body() {
        let mut input = Cursor::new(
            &b"POST /upload HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nHello\r\n0\r\n\r\n"[..],
        );
        let req = read_request(&mut input).unwrap();
        assert_eq!(req.body(), b"Hello");
    }

    #[test]
    fn test_chunked_preferred_over_content_length() {
        let mut input = Cursor::new(
            &b"POST / HTTP/1.1\r\nContent-Length: 99\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nHello\r\n0\r\n\r\n"[..],
        );
        let req = read_request(&mut input).unwrap();
        assert_eq!(req.body(), b"Hello");
    }

    #[test]
    fn test_request_line_too_short() {
        let mut input = Cursor::new(&b"GET /\r\n\r\n"[..]);
        assert!(matches!(
            read_request(&mut input),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_bad_content_length_is_fatal() {
        let mut input =
            Cursor::new(&b"POST / HTTP/1.1\r\nContent-Length: nope\r\n\r\n"[..]);
        assert!(matches!(read_request(&mut input), Err(Error::Parse(_))));
    }

    #[test]
    fn test_truncated_fixed_body() {
        let mut input =
            Cursor::new(&b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nshort"[..]);
        assert!(matches!(read_request(&mut input), Err(Error::Incomplete)));
    }

    #[test]
    fn test_clean_close_before_any_bytes() {
        let mut input = Cursor::new(&b""[..]);
        assert!(matches!(
            read_request(&mut input),
            Err(Error::ConnectionClosed)
        ));
    }

    #[test]
    fn test_header_without_colon_dropped() {
        let mut input = Cursor::new(
            &b"GET / HTTP/1.1\r\nGarbage line\r\nHost: here\r\n\r\n"[..],
        );
        let req = read_request(&mut input).unwrap();
        assert_eq!(req.headers().len(), 1);
        assert_eq!(req.headers().get("host"), Some("here"));
    }

    #[test]
    fn test_header_case_insensitive_access() {
        let mut input = Cursor::new(
            &b"GET / HTTP/1.1\r\nContent-Type: text/html\r\n\r\n"[..],
        );
        let req = read_request(&mut input).unwrap();
        assert_eq!(req.headers().get("Content-Type"), Some("text/html"));
        assert_eq!(req.headers().get("content-type"), Some("text/html"));
        assert_eq!(req.headers().get("CONTENT-TYPE"), Some("text/html"));
    }

    #[test]
    fn test_empty_header_value_preserved() {
        let mut input = Cursor::new(&b"GET / HTTP/1.1\r\nX-Empty:\r\n\r\n"[..]);
        let req = read_request(&mut input).unwrap();
        assert_eq!(req.headers().get("X-Empty"), Some(""));
    }

    #[test]
    fn test_read_response_simple() {
        let mut input = Cursor::new(
            &b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nHello"[..],
        );
        let resp = read_response(&mut input).unwrap();

        assert_eq!(resp.status(), 200);
        assert_eq!(resp.reason(), "OK");
        assert_eq!(resp.status_line(), Some("HTTP/1.1 200 OK"));
        assert_eq!(resp.body(), b"Hello");
    }

    #[test]
    fn test_read_response_zero_length_body() {
        let mut input = Cursor::new(&b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n"[..]);
        let resp = read_response(&mut input).unwrap();
        assert!(resp.body().is_empty());
    }

    #[test]
    fn test_read_response_tolerates_bad_status() {
        let mut input = Cursor::new(&b"HTTP/1.1 ABC\r\n\r\n"[..]);
        let resp = read_response(&mut input).unwrap();
        assert_eq!(resp.status(), 0);
        assert_eq!(resp.reason(), "");
        assert_eq!(resp.status_line(), Some("HTTP/1.1 ABC"));
    }

    #[test]
    fn test_read_response_304_ignores_framing_headers() {
        let mut input = Cursor::new(
            &b"HTTP/1.1 304 Not Modified\r\nContent-Length: 100\r\n\r\n"[..],
        );
        let resp = read_response(&mut input).unwrap();
        assert!(resp.is_not_modified());
        assert!(resp.body().is_empty());
    }

    #[test]
    fn test_read_response_connection_close_reads_to_eof() {
        let mut input = Cursor::new(
            &b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\nall the rest of the stream"[..],
        );
        let resp = read_response(&mut input).unwrap();
        assert_eq!(resp.body(), b"all the rest of the stream");
    }

    #[test]
    fn test_read_response_no_framing_no_body() {
        let mut input = Cursor::new(&b"HTTP/1.1 200 OK\r\n\r\nleftover"[..]);
        let resp = read_response(&mut input).unwrap();
        assert!(resp.body().is_empty());
    }

    #[test]
    fn test_read_response_chunked() {
        let mut input = Cursor::new(
            &b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nHello\r\n7\r\n, world\r\n0\r\n\r\n"[..],
        );
        let resp = read_response(&mut input).unwrap();
        assert_eq!(resp.body(), b"Hello, world");
        assert_eq!(resp.body().len(), 12);
    }

    #[test]
    fn test_is_chunked_token_match() {
        let mut headers = Headers::new();
        headers.insert("Transfer-Encoding", "gzip, Chunked");
        assert!(is_chunked(&headers));

        let mut plain = Headers::new();
        plain.insert("Transfer-Encoding", "gzip");
        assert!(!is_chunked(&plain));
    }

    #[test]
    fn test_leftover_prefixes_body() {
        // The whole message arrives in one read; bytes past the head
        // boundary must feed the body.
        let wire = b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nHello";
        let mut input = Cursor::new(&wire[..]);
        let req = read_request(&mut input).unwrap();
        assert_eq!(req.body(), b"Hello");
    }
}
