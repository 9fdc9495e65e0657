use portico::body::{decode_request_body, Body};
use portico::{Error, Response};
use serde_json::json;

#[test]
fn test_empty_payload_is_empty_body() {
    let body = decode_request_body(Vec::new(), Some("application/json")).unwrap();
    assert!(body.is_empty());
}

#[test]
fn test_json_payload_decodes_to_dom() {
    let body = decode_request_body(br#"{"a":[1,2,3]}"#.to_vec(), Some("application/json")).unwrap();
    assert!(body.is_json());
    assert_eq!(body.as_json().unwrap(), &json!({"a": [1, 2, 3]}));
}

#[test]
fn test_json_numbers_keep_integer_precision() {
    let body = decode_request_body(
        br#"{"int":9007199254740993,"float":1.5}"#.to_vec(),
        Some("application/json"),
    )
    .unwrap();
    let doc = body.as_json().unwrap();
    assert_eq!(doc["int"].as_i64(), Some(9007199254740993));
    assert_eq!(doc["float"].as_f64(), Some(1.5));
}

#[test]
fn test_malformed_json_is_bad_request() {
    let err = decode_request_body(b"{broken".to_vec(), Some("application/json")).unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));
}

#[test]
fn test_text_payload_decodes_to_string() {
    let body = decode_request_body(b"plain text".to_vec(), Some("text/plain")).unwrap();
    assert_eq!(body.as_string().unwrap(), "plain text");
}

#[test]
fn test_non_utf8_payload_falls_back_to_bytes() {
    let body = decode_request_body(vec![0xFF, 0xFE, 0x00], None).unwrap();
    assert!(body.is_bytes());
    assert_eq!(body.as_bytes().unwrap(), &[0xFF, 0xFE, 0x00]);
}

#[test]
fn test_multipart_payload_decodes_to_form() {
    let wire = b"--B\r\nContent-Disposition: form-data; name=\"k\"\r\n\r\nv\r\n--B--\r\n";
    let body = decode_request_body(
        wire.to_vec(),
        Some("multipart/form-data; boundary=B"),
    )
    .unwrap();
    let form = body.as_form().unwrap();
    assert_eq!(form.fields[0].name, "k");
    assert_eq!(form.fields[0].text(), Some("v"));
}

#[test]
fn test_wrong_body_kind_is_reported() {
    let body = Body::Json(json!(1));
    let err = body.as_string().unwrap_err();
    match err {
        Error::WrongBodyKind { expected, actual } => {
            assert_eq!(expected, "string");
            assert_eq!(actual, "json");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.status(), Some(500));
}

#[test]
fn test_set_string_content_fills_content_type() {
    let mut resp = Response::new();
    resp.set_string_content("hi", "text/plain");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.headers.get("Content-Type"), Some("text/plain"));
}

#[test]
fn test_explicit_content_type_is_not_overwritten() {
    let mut resp = Response::new();
    resp.headers.set("Content-Type", "text/custom");
    resp.set_string_content("hi", "text/plain");
    assert_eq!(resp.headers.get("Content-Type"), Some("text/custom"));
}

#[test]
fn test_error_content_page() {
    let mut resp = Response::new();
    resp.set_error_content(404);
    assert_eq!(resp.status, 404);
    let page = resp.body.as_string().unwrap();
    assert!(page.contains("404 Not Found"));
    assert!(page.contains(portico::SERVER_IDENT));
}
