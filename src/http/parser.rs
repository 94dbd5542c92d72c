use bytes::{Buf, Bytes, BytesMut};

use crate::http::request::{Method, Request};

const CONTENT_LENGTH: &[u8] = b"Content-Length: ";

/// Outcome of one parse attempt over the accumulated bytes.
#[derive(Debug, PartialEq, Eq)]
pub enum Parse {
    /// No complete request yet; nothing was consumed.
    Incomplete,
    /// A full request, and how many leading bytes it occupied.
    Complete { request: Request, consumed: usize },
}

/// Scans `buf` line by line for a complete request.
///
/// Lines end at `\n`, with an optional preceding `\r`. A line starting with
/// `Content-Length: ` sets the declared body length (the last one wins), a
/// line starting with `GET ` or `PUT ` sets the URL, and the first blank line
/// ends the header block. The request is complete once the declared number of
/// body bytes follows the blank line. Anything else, including malformed
/// input, is `Incomplete`.
pub fn parse_http_request(buf: &[u8]) -> Parse {
    let mut declared = 0usize;
    let mut method = None;
    let mut url = String::new();
    let mut pos = 0;

    while let Some(offset) = buf[pos..].iter().position(|&b| b == b'\n') {
        let line_end = pos + offset;
        let mut line = &buf[pos..line_end];
        pos = line_end + 1;

        if let Some(stripped) = line.strip_suffix(b"\r") {
            line = stripped;
        }

        if line.is_empty() {
            let body_end = match pos.checked_add(declared) {
                Some(end) if end <= buf.len() => end,
                _ => return Parse::Incomplete,
            };

            let request = Request {
                method,
                url,
                body: Bytes::copy_from_slice(&buf[pos..body_end]),
            };
            return Parse::Complete { request, consumed: body_end };
        }

        if let Some(rest) = line.strip_prefix(CONTENT_LENGTH) {
            declared = parse_decimal(rest);
        } else if let Some((m, target)) = request_line(line) {
            method = Some(m);
            url = target;
        }
    }

    Parse::Incomplete
}

/// Reads leading ASCII digits; stops at the first non-digit.
fn parse_decimal(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .fold(0usize, |n, b| {
            n.saturating_mul(10).saturating_add(usize::from(b - b'0'))
        })
}

/// `GET /path HTTP/1.1` -> (GET, "/path")
fn request_line(line: &[u8]) -> Option<(Method, String)> {
    let space = line.iter().position(|&b| b == b' ')?;
    let method = std::str::from_utf8(&line[..space])
        .ok()
        .and_then(Method::from_str)?;

    let rest = &line[space + 1..];
    let target_end = rest.iter().position(|&b| b == b' ').unwrap_or(rest.len());

    Some((method, String::from_utf8_lossy(&rest[..target_end]).into_owned()))
}

/// Append-only byte accumulator holding everything received since the last
/// complete request was taken out of it.
#[derive(Debug, Default)]
pub struct RequestBuffer {
    buf: BytesMut,
}

impl RequestBuffer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Extracts the next complete request, keeping any trailing bytes for the
    /// following attempt. Leaves the buffer untouched when incomplete.
    pub fn next_request(&mut self) -> Option<Request> {
        match parse_http_request(&self.buf) {
            Parse::Complete { request, consumed } => {
                self.buf.advance(consumed);
                Some(request)
            }
            Parse::Incomplete => None,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}
