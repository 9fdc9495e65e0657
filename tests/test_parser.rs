use portico::http::parser::{decode_chunked, parse_request_head, parse_target, ParseError};
use portico::http::request::{Method, Version};

const MAX_HEADER: usize = 64 * 1024;

#[test]
fn test_parse_simple_get_request() {
    let raw = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";
    let (head, consumed) = parse_request_head(raw, MAX_HEADER).unwrap();

    assert_eq!(head.method, Method::Get);
    assert_eq!(head.target, "/");
    assert_eq!(head.version, Version::HTTP_11);
    assert_eq!(head.headers.get("Host"), Some("example.com"));
    assert_eq!(consumed, raw.len());
}

#[test]
fn test_parse_head_stops_at_blank_line() {
    let raw = b"POST /api HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
    let (head, consumed) = parse_request_head(raw, MAX_HEADER).unwrap();

    assert_eq!(head.method, Method::Post);
    assert_eq!(head.content_length().unwrap(), Some(5));
    // the body is not part of the head
    assert_eq!(consumed, raw.len() - 5);
}

#[test]
fn test_parse_multiple_headers() {
    let raw =
        b"GET /path HTTP/1.1\r\nHost: example.com\r\nUser-Agent: test-client\r\nAccept: */*\r\n\r\n";
    let (head, _) = parse_request_head(raw, MAX_HEADER).unwrap();

    assert_eq!(head.headers.get("Host"), Some("example.com"));
    assert_eq!(head.headers.get("User-Agent"), Some("test-client"));
    assert_eq!(head.headers.get("Accept"), Some("*/*"));
}

#[test]
fn test_parse_header_lookup_is_case_insensitive() {
    let raw = b"GET / HTTP/1.1\r\nContent-Type: application/json\r\n\r\n";
    let (head, _) = parse_request_head(raw, MAX_HEADER).unwrap();

    assert_eq!(head.headers.get("content-type"), Some("application/json"));
}

#[test]
fn test_parse_incomplete_head() {
    let raw = b"GET / HTTP/1.1\r\nHost: example.com\r\n";
    assert!(matches!(
        parse_request_head(raw, MAX_HEADER),
        Err(ParseError::Incomplete)
    ));
}

#[test]
fn test_parse_invalid_method() {
    let raw = b"BREW / HTTP/1.1\r\n\r\n";
    assert!(matches!(
        parse_request_head(raw, MAX_HEADER),
        Err(ParseError::InvalidMethod)
    ));
}

#[test]
fn test_parse_all_nine_methods() {
    for (token, method) in [
        ("GET", Method::Get),
        ("HEAD", Method::Head),
        ("POST", Method::Post),
        ("PUT", Method::Put),
        ("DELETE", Method::Delete),
        ("PATCH", Method::Patch),
        ("OPTIONS", Method::Options),
        ("TRACE", Method::Trace),
        ("CONNECT", Method::Connect),
    ] {
        let raw = format!("{token} / HTTP/1.1\r\n\r\n");
        let (head, _) = parse_request_head(raw.as_bytes(), MAX_HEADER).unwrap();
        assert_eq!(head.method, method);
    }
}

#[test]
fn test_parse_malformed_header_line() {
    let raw = b"GET / HTTP/1.1\r\nBrokenHeader\r\n\r\n";
    assert!(matches!(
        parse_request_head(raw, MAX_HEADER),
        Err(ParseError::InvalidRequest)
    ));
}

#[test]
fn test_parse_invalid_version() {
    let raw = b"GET / HTTPS/1.1\r\n\r\n";
    assert!(matches!(
        parse_request_head(raw, MAX_HEADER),
        Err(ParseError::InvalidVersion)
    ));
}

#[test]
fn test_parse_http_10_version() {
    let raw = b"GET / HTTP/1.0\r\n\r\n";
    let (head, _) = parse_request_head(raw, MAX_HEADER).unwrap();
    assert_eq!(head.version, Version::HTTP_10);
}

#[test]
fn test_oversized_unterminated_head_rejected() {
    let mut raw = b"GET / HTTP/1.1\r\n".to_vec();
    raw.extend(std::iter::repeat(b'a').take(128));
    assert!(matches!(
        parse_request_head(&raw, 64),
        Err(ParseError::HeadersTooLarge)
    ));
}

#[test]
fn test_chunked_body_roundtrip() {
    let raw = b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n";
    let (data, consumed) = decode_chunked(raw).unwrap();
    assert_eq!(data, b"Wikipedia");
    assert_eq!(consumed, raw.len());
}

#[test]
fn test_chunked_trailers_unsupported() {
    let raw = b"4\r\nWiki\r\n0\r\nExpires: never\r\n\r\n";
    assert!(matches!(
        decode_chunked(raw),
        Err(ParseError::InvalidChunk)
    ));
}

#[test]
fn test_target_splits_path_and_query() {
    let (path, params) = parse_target("/search?q=rust&q=http&page=2").unwrap();
    assert_eq!(path, "/search");
    assert_eq!(params["q"], vec!["rust", "http"]);
    assert_eq!(params["page"], vec!["2"]);
}

#[test]
fn test_target_percent_decoding() {
    let (path, params) = parse_target("/files/a%20b.txt?name=caf%C3%A9").unwrap();
    assert_eq!(path, "/files/a b.txt");
    assert_eq!(params["name"], vec!["café"]);
}

#[test]
fn test_target_invalid_encoding_rejected() {
    // %ff alone is not valid UTF-8 once decoded
    assert!(parse_target("/%ff").is_err());
}
