//! HTTP/1.1 messages carried inside HTTP bodies.
//!
//! `/poll` answers with a scrape instruction serialized as a proxy-form
//! request; `/push` receives the target's response serialized the same way
//! an HTTP/1.1 server writes it.
//!
//! Decoding accepts CRLF or bare LF line endings and bodies framed by
//! `Content-Length`, `Transfer-Encoding: chunked`, or (responses only) the
//! end of input.

use axum::http::StatusCode;
use bytes::{BufMut, Bytes, BytesMut};
use pushprox_core::{Headers, ScrapeRequest, ScrapeResponse};
use thiserror::Error;
use url::{Position, Url};

const HTTP_VERSION: &str = "HTTP/1.1";

/// Wire codec errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("unexpected end of message")]
    Incomplete,

    #[error("malformed start line {0:?}")]
    InvalidStartLine(String),

    #[error("malformed header line {0:?}")]
    InvalidHeader(String),

    #[error("invalid status code {0:?}")]
    InvalidStatus(String),

    #[error("invalid request target {0:?}")]
    InvalidUrl(String),

    #[error("malformed chunked body: {0}")]
    InvalidChunk(String),

    #[error("body too short: expected {expected} bytes, got {actual}")]
    BodyTooShort { expected: usize, actual: usize },
}

/// Serialize a scrape instruction as a proxy-form HTTP/1.1 request.
pub fn encode_request(request: &ScrapeRequest) -> Bytes {
    let mut out = BytesMut::with_capacity(256 + request.body.len());
    put_line(
        &mut out,
        &format!("{} {} {HTTP_VERSION}", request.method, request.url),
    );
    if !request.headers.contains("host") {
        put_header(
            &mut out,
            "Host",
            &request.url[Position::BeforeHost..Position::AfterPort],
        );
    }
    put_tail(&mut out, &request.headers, &request.body, false);
    out.freeze()
}

/// Serialize a response the way an agent pushes it.
pub fn encode_response(response: &ScrapeResponse) -> Bytes {
    let reason = response
        .reason
        .as_deref()
        .or_else(|| {
            StatusCode::from_u16(response.status)
                .ok()
                .and_then(|s| s.canonical_reason())
        })
        .unwrap_or("");

    let mut out = BytesMut::with_capacity(128 + response.body.len());
    put_line(
        &mut out,
        &format!("{HTTP_VERSION} {} {reason}", response.status),
    );
    put_tail(&mut out, &response.headers, &response.body, true);
    out.freeze()
}

/// Parse a scrape instruction. Origin-form targets are resolved against `Host`.
pub fn decode_request(buf: &[u8]) -> Result<ScrapeRequest, WireError> {
    let Head {
        start_line,
        mut headers,
        rest,
    } = parse_head(buf)?;

    let invalid = || WireError::InvalidStartLine(start_line.to_string());
    let mut parts = start_line.split(' ');
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };
    if method.is_empty() || !version.starts_with("HTTP/1.") {
        return Err(invalid());
    }

    let url = if target.starts_with('/') {
        let host = headers
            .get("host")
            .ok_or_else(|| WireError::InvalidUrl(target.to_string()))?;
        Url::parse(&format!("http://{host}{target}"))
    } else {
        Url::parse(target)
    }
    .map_err(|_| WireError::InvalidUrl(target.to_string()))?;

    let body = read_body(&mut headers, rest, false)?;

    Ok(ScrapeRequest {
        method: method.to_string(),
        url,
        headers,
        body,
    })
}

/// Parse a pushed response.
pub fn decode_response(buf: &[u8]) -> Result<ScrapeResponse, WireError> {
    let Head {
        start_line,
        mut headers,
        rest,
    } = parse_head(buf)?;

    let (version, status_and_reason) = start_line
        .split_once(' ')
        .ok_or_else(|| WireError::InvalidStartLine(start_line.to_string()))?;
    if !version.starts_with("HTTP/1.") {
        return Err(WireError::InvalidStartLine(start_line.to_string()));
    }

    let (code, reason) = match status_and_reason.split_once(' ') {
        Some((code, reason)) => (code, Some(reason.trim())),
        None => (status_and_reason, None),
    };
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(WireError::InvalidStatus(code.to_string()));
    }
    let status = code
        .parse::<u16>()
        .ok()
        .filter(|s| *s >= 100)
        .ok_or_else(|| WireError::InvalidStatus(code.to_string()))?;

    let body = read_body(&mut headers, rest, true)?;

    Ok(ScrapeResponse {
        status,
        reason: reason.filter(|r| !r.is_empty()).map(str::to_string),
        headers,
        body,
    })
}

struct Head<'a> {
    start_line: &'a str,
    headers: Headers,
    rest: &'a [u8],
}

fn parse_head(buf: &[u8]) -> Result<Head<'_>, WireError> {
    let mut cursor = Cursor::new(buf);

    let start_line = cursor.next_line()?;
    if start_line.is_empty() {
        return Err(WireError::InvalidStartLine(String::new()));
    }

    let mut headers = Headers::new();
    loop {
        let line = cursor.next_line()?;
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .filter(|(name, _)| !name.is_empty() && name.bytes().all(is_token_byte))
            .ok_or_else(|| WireError::InvalidHeader(line.to_string()))?;
        headers.append(name, value.trim());
    }

    Ok(Head {
        start_line,
        headers,
        rest: cursor.rest(),
    })
}

fn read_body(headers: &mut Headers, rest: &[u8], until_eof: bool) -> Result<Bytes, WireError> {
    let chunked = headers
        .get_all("transfer-encoding")
        .flat_map(|v| v.split(','))
        .last()
        .is_some_and(|coding| coding.trim().eq_ignore_ascii_case("chunked"));

    if chunked {
        let body = decode_chunked(rest)?;
        // The body handed on is no longer chunked.
        headers.remove("transfer-encoding");
        return Ok(body);
    }

    if let Some(len) = headers.get("content-length") {
        let expected = len
            .trim()
            .parse::<usize>()
            .map_err(|_| WireError::InvalidHeader(format!("Content-Length: {len}")))?;
        if rest.len() < expected {
            return Err(WireError::BodyTooShort {
                expected,
                actual: rest.len(),
            });
        }
        return Ok(Bytes::copy_from_slice(&rest[..expected]));
    }

    Ok(if until_eof {
        Bytes::copy_from_slice(rest)
    } else {
        Bytes::new()
    })
}

fn decode_chunked(buf: &[u8]) -> Result<Bytes, WireError> {
    let mut cursor = Cursor::new(buf);
    let mut body = BytesMut::new();

    loop {
        let line = cursor.next_line()?;
        let size = line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size, 16)
            .map_err(|_| WireError::InvalidChunk(format!("bad chunk size {size:?}")))?;

        if size == 0 {
            // Skip trailers; a missing final empty line is tolerated.
            while let Ok(trailer) = cursor.next_line() {
                if trailer.is_empty() {
                    break;
                }
            }
            return Ok(body.freeze());
        }

        let data = cursor.take(size).ok_or(WireError::Incomplete)?;
        body.extend_from_slice(data);
        if !cursor.next_line()?.is_empty() {
            return Err(WireError::InvalidChunk(
                "chunk data longer than its size".to_string(),
            ));
        }
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Next line without its terminator. Errors if no terminator remains.
    fn next_line(&mut self) -> Result<&'a str, WireError> {
        let rest = &self.buf[self.pos..];
        let end = rest
            .iter()
            .position(|&b| b == b'\n')
            .ok_or(WireError::Incomplete)?;
        self.pos += end + 1;

        let line = &rest[..end];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        std::str::from_utf8(line)
            .map_err(|_| WireError::InvalidHeader(String::from_utf8_lossy(line).into_owned()))
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let rest = &self.buf[self.pos..];
        let data = rest.get(..n)?;
        self.pos += n;
        Some(data)
    }

    fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }
}

fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

fn put_line(out: &mut BytesMut, line: &str) {
    out.put_slice(line.as_bytes());
    out.put_slice(b"\r\n");
}

fn put_header(out: &mut BytesMut, name: &str, value: &str) {
    out.put_slice(name.as_bytes());
    out.put_slice(b": ");
    out.put_slice(value.as_bytes());
    out.put_slice(b"\r\n");
}

/// Headers (framing recomputed), blank line, body.
fn put_tail(out: &mut BytesMut, headers: &Headers, body: &Bytes, always_length: bool) {
    for (name, value) in headers.iter() {
        if name.eq_ignore_ascii_case("content-length") || name.eq_ignore_ascii_case("transfer-encoding") {
            continue;
        }
        put_header(out, name, value);
    }
    if always_length || !body.is_empty() {
        put_header(out, "Content-Length", &body.len().to_string());
    }
    out.put_slice(b"\r\n");
    out.put_slice(body);
}
