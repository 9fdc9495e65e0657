//! Request/response body representations.
//!
//! A body is exactly one of: nothing, a string, a JSON document, an
//! unparsed byte buffer, an on-disk file (optionally restricted to byte
//! ranges), or a multipart form. Accessors check the active variant and
//! surface [`Error::WrongBodyKind`] on mismatch.

pub mod form_data;

pub use form_data::{FormData, FormField};

use crate::error::{Error, Result};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub enum Body {
    #[default]
    Empty,
    String {
        data: String,
        content_type: String,
    },
    Json(Value),
    /// Unparsed payload bytes, used when no richer decode applies.
    Bytes(Vec<u8>),
    File {
        path: PathBuf,
        /// File size at the time the body was set.
        size: u64,
        /// Byte ranges to serve; empty means the whole file.
        ranges: Vec<(u64, u64)>,
    },
    Form(FormData),
}

impl Body {
    pub fn kind(&self) -> &'static str {
        match self {
            Body::Empty => "empty",
            Body::String { .. } => "string",
            Body::Json(_) => "json",
            Body::Bytes(_) => "bytes",
            Body::File { .. } => "file",
            Body::Form(_) => "form",
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Body::String { .. })
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Body::Json(_))
    }

    pub fn is_bytes(&self) -> bool {
        matches!(self, Body::Bytes(_))
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Body::File { .. })
    }

    pub fn is_form(&self) -> bool {
        matches!(self, Body::Form(_))
    }

    pub fn as_string(&self) -> Result<&str> {
        match self {
            Body::String { data, .. } => Ok(data),
            other => Err(wrong_kind("string", other)),
        }
    }

    pub fn as_json(&self) -> Result<&Value> {
        match self {
            Body::Json(value) => Ok(value),
            other => Err(wrong_kind("json", other)),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8]> {
        match self {
            Body::Bytes(data) => Ok(data),
            other => Err(wrong_kind("bytes", other)),
        }
    }

    pub fn as_form(&self) -> Result<&FormData> {
        match self {
            Body::Form(form) => Ok(form),
            other => Err(wrong_kind("form", other)),
        }
    }
}

fn wrong_kind(expected: &'static str, actual: &Body) -> Error {
    Error::WrongBodyKind {
        expected,
        actual: actual.kind(),
    }
}

/// Decodes raw request payload bytes into a body variant guided by the
/// request's `Content-Type`.
pub fn decode_request_body(data: Vec<u8>, content_type: Option<&str>) -> Result<Body> {
    if data.is_empty() {
        return Ok(Body::Empty);
    }

    let ct = content_type.unwrap_or("");
    if ct.starts_with("application/json") {
        let value = serde_json::from_slice(&data)
            .map_err(|e| Error::BadRequest(format!("invalid json body: {e}")))?;
        return Ok(Body::Json(value));
    }
    if ct.starts_with("multipart/form-data") {
        let boundary = form_data::boundary_from_content_type(ct)
            .ok_or_else(|| Error::BadRequest("missing multipart boundary".to_string()))?;
        let form = FormData::parse(&boundary, &data)?;
        return Ok(Body::Form(form));
    }

    match String::from_utf8(data) {
        Ok(text) => Ok(Body::String {
            data: text,
            content_type: if ct.is_empty() {
                "text/plain".to_string()
            } else {
                ct.to_string()
            },
        }),
        Err(err) => Ok(Body::Bytes(err.into_bytes())),
    }
}
