use crate::body::{Body, FormData};
use crate::error::Result;
use crate::html;
use crate::http::headers::HeaderMap;
use crate::http::request::{Request, Version};
use std::path::Path;

/// An HTTP response under construction by a handler.
#[derive(Debug)]
pub struct Response {
    /// Status code, 100..=599.
    pub status: u16,
    /// Reason-phrase override; when absent the phrase derives from
    /// `status`.
    pub reason: Option<String>,
    pub version: Version,
    pub headers: HeaderMap,
    pub body: Body,
    pub keep_alive: bool,
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: 404,
            reason: None,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: Body::Empty,
            keep_alive: true,
        }
    }

    /// The default response for an incoming request: `404` until a
    /// handler says otherwise, version and keep-alive mirrored from the
    /// request, `Server` and `Date` headers set.
    pub fn for_request(req: &Request) -> Self {
        let mut resp = Self::new();
        resp.version = req.version;
        resp.keep_alive = req.keep_alive();
        resp.headers.set("Server", crate::SERVER_IDENT);
        resp.headers.set("Date", html::format_http_date());
        resp
    }

    pub fn status(&mut self, status: u16) -> &mut Self {
        self.status = status;
        self
    }

    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.set(name, value);
        self
    }

    pub fn reason_phrase(&self) -> &str {
        self.reason
            .as_deref()
            .unwrap_or_else(|| default_reason(self.status))
    }

    /// Sets a plain string body, filling in `Content-Type` when the
    /// caller has not chosen one.
    pub fn set_string_content(&mut self, data: impl Into<String>, content_type: &str) {
        self.status = 200;
        self.headers.set_if_absent("Content-Type", content_type);
        self.body = Body::String {
            data: data.into(),
            content_type: content_type.to_string(),
        };
    }

    pub fn set_json_content(&mut self, value: serde_json::Value) {
        self.status = 200;
        self.headers.set_if_absent("Content-Type", "application/json");
        self.body = Body::Json(value);
    }

    /// Serves a whole file. The size is captured here so the payload can
    /// be prepared without reopening the file.
    pub fn set_file_content(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let meta = std::fs::metadata(path.as_ref())?;
        self.status = 200;
        self.headers
            .set_if_absent("Content-Type", html::mime_for_path(path.as_ref()));
        self.body = Body::File {
            path: path.as_ref().to_path_buf(),
            size: meta.len(),
            ranges: Vec::new(),
        };
        Ok(())
    }

    /// Serves selected byte ranges of a file as `206 Partial Content`.
    pub fn set_file_content_ranges(
        &mut self,
        path: impl AsRef<Path>,
        ranges: Vec<(u64, u64)>,
    ) -> Result<()> {
        let meta = std::fs::metadata(path.as_ref())?;
        self.status = 206;
        self.headers
            .set_if_absent("Content-Type", html::mime_for_path(path.as_ref()));
        self.body = Body::File {
            path: path.as_ref().to_path_buf(),
            size: meta.len(),
            ranges,
        };
        Ok(())
    }

    pub fn set_form_content(&mut self, form: FormData) {
        self.status = 200;
        self.headers.set_if_absent(
            "Content-Type",
            format!("multipart/form-data; boundary={}", form.boundary),
        );
        self.body = Body::Form(form);
    }

    /// Standard error page: minimal HTML with the status, reason and a
    /// centered server identifier.
    pub fn set_error_content(&mut self, status: u16) {
        self.status = status;
        let reason = default_reason(status).to_string();
        let page = html::format_error_content(status, &reason, crate::SERVER_IDENT);
        self.headers.set("Content-Type", "text/html");
        self.body = Body::String {
            data: page,
            content_type: "text/html".to_string(),
        };
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

/// Standard reason phrase for a status code.
pub fn default_reason(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        411 => "Length Required",
        413 => "Payload Too Large",
        416 => "Range Not Satisfiable",
        426 => "Upgrade Required",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}
