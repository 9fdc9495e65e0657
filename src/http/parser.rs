use crate::http::headers::HeaderMap;
use crate::http::request::{Method, Version};
use memchr::memmem;
use percent_encoding::percent_decode_str;
use std::collections::HashMap;

/// Errors surfaced while parsing request bytes.
#[derive(Debug, PartialEq, Eq)]
pub enum ParseError {
    /// More data is needed before a verdict is possible.
    Incomplete,
    /// The request line or a header line is malformed.
    InvalidRequest,
    /// The HTTP method is not recognized.
    InvalidMethod,
    /// The version token is not `HTTP/major.minor`.
    InvalidVersion,
    /// `Content-Length` is not a valid number.
    InvalidContentLength,
    /// A chunked body is malformed, or carries trailing headers, which
    /// are unsupported.
    InvalidChunk,
    /// The header block exceeds the configured limit.
    HeadersTooLarge,
}

/// The head of a request: everything before the body, parsed in one
/// piece once the blank line has arrived.
#[derive(Debug)]
pub struct RequestHead {
    pub method: Method,
    pub target: String,
    pub version: Version,
    pub headers: HeaderMap,
}

impl RequestHead {
    pub fn content_length(&self) -> Result<Option<u64>, ParseError> {
        match self.headers.get("Content-Length") {
            None => Ok(None),
            Some(v) => v
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|_| ParseError::InvalidContentLength),
        }
    }

    pub fn is_chunked(&self) -> bool {
        self.headers.has_token("Transfer-Encoding", "chunked")
    }
}

/// Attempts to parse a request head from the front of `buf`.
///
/// Returns the head and the number of bytes consumed (through the blank
/// line). `Incomplete` means the separator has not arrived yet;
/// `HeadersTooLarge` fires as soon as the unterminated head exceeds
/// `max_header_bytes`.
pub fn parse_request_head(
    buf: &[u8],
    max_header_bytes: usize,
) -> Result<(RequestHead, usize), ParseError> {
    let headers_end = match memmem::find(buf, b"\r\n\r\n") {
        Some(pos) => pos,
        None => {
            if buf.len() > max_header_bytes {
                return Err(ParseError::HeadersTooLarge);
            }
            return Err(ParseError::Incomplete);
        }
    };
    if headers_end + 4 > max_header_bytes {
        return Err(ParseError::HeadersTooLarge);
    }

    let head_str =
        std::str::from_utf8(&buf[..headers_end]).map_err(|_| ParseError::InvalidRequest)?;
    let mut lines = head_str.split("\r\n");

    let request_line = lines.next().ok_or(ParseError::InvalidRequest)?;
    let mut parts = request_line.split_whitespace();
    let method_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    let target = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    if parts.next().is_some() {
        return Err(ParseError::InvalidRequest);
    }

    let method = Method::from_str(method_str).ok_or(ParseError::InvalidMethod)?;
    let version = Version::parse(version_str).ok_or(ParseError::InvalidVersion)?;

    let mut headers = HeaderMap::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        // obs-fold is obsolete and rejected
        if line.starts_with(' ') || line.starts_with('\t') {
            return Err(ParseError::InvalidRequest);
        }
        let (name, value) = line.split_once(':').ok_or(ParseError::InvalidRequest)?;
        if name.is_empty() || name.contains(' ') {
            return Err(ParseError::InvalidRequest);
        }
        headers.append(name, value.trim());
    }

    let head = RequestHead {
        method,
        target: target.to_string(),
        version,
        headers,
    };
    Ok((head, headers_end + 4))
}

/// Attempts to decode a complete chunked body from the front of `buf`.
///
/// Returns the decoded payload and bytes consumed through the terminal
/// CRLF. Trailing headers after the zero-size chunk are unsupported and
/// rejected.
pub fn decode_chunked(buf: &[u8]) -> Result<(Vec<u8>, usize), ParseError> {
    let mut out = Vec::new();
    let mut pos = 0usize;

    loop {
        let line_end = memmem::find(&buf[pos..], b"\r\n").ok_or(ParseError::Incomplete)? + pos;
        let size_line =
            std::str::from_utf8(&buf[pos..line_end]).map_err(|_| ParseError::InvalidChunk)?;
        // chunk extensions after ';' are ignored
        let size_token = size_line.split(';').next().unwrap_or("").trim();
        let size =
            usize::from_str_radix(size_token, 16).map_err(|_| ParseError::InvalidChunk)?;
        pos = line_end + 2;

        if size == 0 {
            // terminal chunk: expect the final CRLF immediately
            if buf.len() < pos + 2 {
                return Err(ParseError::Incomplete);
            }
            if &buf[pos..pos + 2] != b"\r\n" {
                return Err(ParseError::InvalidChunk);
            }
            return Ok((out, pos + 2));
        }

        if buf.len() < pos + size + 2 {
            return Err(ParseError::Incomplete);
        }
        out.extend_from_slice(&buf[pos..pos + size]);
        if &buf[pos + size..pos + size + 2] != b"\r\n" {
            return Err(ParseError::InvalidChunk);
        }
        pos += size + 2;
    }
}

/// Splits a request-target into its path and decoded query parameters.
///
/// More than one `?` in the target, an invalid percent escape, or a
/// non-UTF-8 decode all count as malformed.
pub fn parse_target(target: &str) -> Result<(String, HashMap<String, Vec<String>>), ParseError> {
    let mut tokens = target.splitn(2, '?');
    let raw_path = tokens.next().ok_or(ParseError::InvalidRequest)?;
    let raw_query = tokens.next();

    let path = url_decode(raw_path).ok_or(ParseError::InvalidRequest)?;

    let mut query_params: HashMap<String, Vec<String>> = HashMap::new();
    if let Some(raw_query) = raw_query {
        if raw_query.contains('?') {
            return Err(ParseError::InvalidRequest);
        }
        for pair in raw_query.split('&') {
            if pair.is_empty() {
                continue;
            }
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            let k = url_decode_query(k).ok_or(ParseError::InvalidRequest)?;
            let v = url_decode_query(v).ok_or(ParseError::InvalidRequest)?;
            query_params.entry(k).or_default().push(v);
        }
    }

    Ok((path, query_params))
}

/// Percent-decodes a path component.
pub fn url_decode(s: &str) -> Option<String> {
    percent_decode_str(s)
        .decode_utf8()
        .ok()
        .map(|c| c.into_owned())
}

/// Query components additionally treat `+` as space.
fn url_decode_query(s: &str) -> Option<String> {
    url_decode(&s.replace('+', " "))
}
