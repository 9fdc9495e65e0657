use crate::error::{Error, Result};
use memchr::memmem;

/// One part of a `multipart/form-data` payload.
///
/// A field with a non-empty `filename` is a file upload; otherwise it is
/// a plain text part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

impl FormField {
    pub fn is_file(&self) -> bool {
        !self.filename.is_empty()
    }

    pub fn has_data(&self) -> bool {
        !self.content.is_empty()
    }

    /// Content as text when it is valid UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }
}

/// The decoded field set of a `multipart/form-data` body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    pub boundary: String,
    pub fields: Vec<FormField>,
}

impl FormData {
    pub fn new() -> Self {
        Self {
            boundary: crate::html::generate_boundary(),
            fields: Vec::new(),
        }
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_content(&self, name: &str) -> bool {
        self.field_by_name(name).map(|f| f.has_data()).unwrap_or(false)
    }

    /// Parses `data` delimited by `boundary`.
    ///
    /// The input is scanned for `--boundary` delimiters; each part's
    /// headers are read (`Content-Disposition` carrying `name` and
    /// optional `filename`, plus an optional `Content-Type`), and the
    /// part body runs to the next delimiter. `--boundary--` terminates.
    pub fn parse(boundary: &str, data: &[u8]) -> Result<FormData> {
        let delim = format!("--{boundary}");
        let delim_bytes = delim.as_bytes();

        let mut pos = memmem::find(data, delim_bytes)
            .ok_or_else(|| bad("multipart body missing opening boundary"))?
            + delim_bytes.len();

        let mut fields = Vec::new();
        loop {
            // after a delimiter: "--" ends the stream, CRLF opens a part
            if data[pos..].starts_with(b"--") {
                break;
            }
            if !data[pos..].starts_with(b"\r\n") {
                return Err(bad("malformed multipart delimiter"));
            }
            pos += 2;

            let headers_end = memmem::find(&data[pos..], b"\r\n\r\n")
                .ok_or_else(|| bad("multipart part headers not terminated"))?
                + pos;
            let header_block = std::str::from_utf8(&data[pos..headers_end])
                .map_err(|_| bad("multipart part headers not valid utf-8"))?;

            let mut field = FormField::default();
            let mut saw_disposition = false;
            for line in header_block.split("\r\n") {
                let (name, value) = line
                    .split_once(':')
                    .ok_or_else(|| bad("malformed multipart part header"))?;
                let value = value.trim();
                if name.eq_ignore_ascii_case("Content-Disposition") {
                    saw_disposition = true;
                    field.name = disposition_param(value, "name")
                        .ok_or_else(|| bad("content-disposition missing name"))?;
                    field.filename = disposition_param(value, "filename").unwrap_or_default();
                } else if name.eq_ignore_ascii_case("Content-Type") {
                    field.content_type = value.to_string();
                }
            }
            if !saw_disposition {
                return Err(bad("multipart part missing content-disposition"));
            }

            let content_start = headers_end + 4;
            let next_delim = memmem::find(&data[content_start..], delim_bytes)
                .ok_or_else(|| bad("multipart part not terminated by boundary"))?
                + content_start;
            // the CRLF before the delimiter belongs to the framing
            if next_delim < content_start + 2
                || &data[next_delim - 2..next_delim] != b"\r\n"
            {
                return Err(bad("multipart part missing closing crlf"));
            }
            field.content = data[content_start..next_delim - 2].to_vec();
            fields.push(field);

            pos = next_delim + delim_bytes.len();
        }

        Ok(FormData {
            boundary: boundary.to_string(),
            fields,
        })
    }

    /// Serializes the field set back into wire framing. Parsing the
    /// output with the same boundary reproduces the field set.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for field in &self.fields {
            out.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
            let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", field.name);
            if !field.filename.is_empty() {
                disposition.push_str(&format!("; filename=\"{}\"", field.filename));
            }
            out.extend_from_slice(disposition.as_bytes());
            out.extend_from_slice(b"\r\n");
            if !field.content_type.is_empty() {
                out.extend_from_slice(format!("Content-Type: {}\r\n", field.content_type).as_bytes());
            }
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(&field.content);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        out
    }
}

/// Extracts the boundary parameter from a `multipart/form-data`
/// `Content-Type` value.
pub fn boundary_from_content_type(content_type: &str) -> Option<String> {
    for param in content_type.split(';').skip(1) {
        let (key, value) = param.trim().split_once('=')?;
        if key.trim().eq_ignore_ascii_case("boundary") {
            return Some(value.trim().trim_matches('"').to_string());
        }
    }
    None
}

/// Extracts a quoted or bare parameter from a `Content-Disposition`
/// value.
fn disposition_param(value: &str, param: &str) -> Option<String> {
    for part in value.split(';').skip(1) {
        let (key, val) = part.trim().split_once('=')?;
        if key.trim().eq_ignore_ascii_case(param) {
            return Some(val.trim().trim_matches('"').to_string());
        }
    }
    None
}

fn bad(msg: &str) -> Error {
    Error::BadRequest(msg.to_string())
}
