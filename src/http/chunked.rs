//! Chunked transfer encoding support
//!
//! This module provides encoding and decoding for HTTP chunked transfer
//! encoding. Bodies here are always fully materialized, so encoding
//! assembles the complete framing in one buffer; decoding works directly
//! against a blocking reader and consumes exactly the encoded body, leaving
//! the stream positioned after the terminating `0\r\n\r\n` so a keep-alive
//! connection stays usable.

use super::{Error, Result};
use std::io::{Read, Write};

/// Chunk size used when a body is emitted with chunked framing
pub const CHUNK_SIZE: usize = 8192;

/// Write a complete in-memory body with chunked framing.
///
/// The body is cut into [`CHUNK_SIZE`] frames, each a hex size line, the
/// payload, and a trailing CRLF, ended by the zero frame. The whole
/// encoding goes out in a single write followed by a flush.
pub fn write_chunked_body<W: Write>(writer: &mut W, body: &[u8]) -> Result<()> {
    write_chunked_frames(writer, body, CHUNK_SIZE)
}

fn write_chunked_frames<W: Write>(writer: &mut W, body: &[u8], frame_size: usize) -> Result<()> {
    // Hex size line + CRLF overhead is at most 8 bytes per frame here
    let frames = body.len() / frame_size + 1;
    let mut wire = Vec::with_capacity(body.len() + frames * 8 + 5);

    for frame in body.chunks(frame_size) {
        write!(wire, "{:x}\r\n", frame.len())?;
        wire.extend_from_slice(frame);
        wire.extend_from_slice(b"\r\n");
    }
    wire.extend_from_slice(b"0\r\n\r\n");

    writer.write_all(&wire)?;
    writer.flush()?;
    Ok(())
}

/// Decode a complete chunked body from a reader.
///
/// Reads size line, payload, and trailing CRLF per chunk until the
/// zero-length chunk; trailer lines after it are consumed and discarded up
/// to the blank line. Chunk extensions (after `;`) are ignored.
pub fn read_chunked_body<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut body = Vec::new();

    loop {
        let line = match read_line(reader)? {
            Some(line) => line,
            None => return Err(Error::Incomplete),
        };

        let size_str = line.split(';').next().unwrap_or("").trim();
        let chunk_size = usize::from_str_radix(size_str, 16)
            .map_err(|_| Error::InvalidChunkSize(size_str.to_string()))?;

        if chunk_size == 0 {
            // Trailers: discard lines until the blank one
            loop {
                match read_line(reader)? {
                    Some(trailer) if trailer.is_empty() => return Ok(body),
                    Some(_) => continue,
                    None => return Err(Error::Incomplete),
                }
            }
        }

        let start = body.len();
        body.resize(start + chunk_size, 0);
        reader.read_exact(&mut body[start..]).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::Incomplete
            } else {
                Error::Io(e)
            }
        })?;

        match read_line(reader)? {
            Some(crlf) if crlf.is_empty() => {}
            Some(other) => {
                return Err(Error::Protocol(format!(
                    "Expected CRLF after chunk, got {:?}",
                    other
                )))
            }
            None => return Err(Error::Incomplete),
        }
    }
}

/// Read one CRLF-terminated line, one byte at a time.
///
/// Returns the line without its terminator; `None` at EOF with nothing
/// read. A bare `\n` terminates too, tolerating sloppy peers. Byte-wise
/// reads keep the stream exactly positioned, which block reads could not.
fn read_line<R: Read>(reader: &mut R) -> Result<Option<String>> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        let n = reader.read(&mut byte)?;
        if n == 0 {
            if line.is_empty() {
                return Ok(None);
            }
            break;
        }
        if byte[0] == b'\n' {
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            break;
        }
        line.push(byte[0]);
    }

    Ok(Some(String::from_utf8_lossy(&line).into_owned()))
}
