use crate::body::Body;
use crate::http::headers::HeaderMap;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Trace,
    Connect,
}

impl Method {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "GET" => Some(Method::Get),
            "HEAD" => Some(Method::Head),
            "POST" => Some(Method::Post),
            "PUT" => Some(Method::Put),
            "DELETE" => Some(Method::Delete),
            "PATCH" => Some(Method::Patch),
            "OPTIONS" => Some(Method::Options),
            "TRACE" => Some(Method::Trace),
            "CONNECT" => Some(Method::Connect),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
        }
    }

    /// Methods whose requests carry no body by contract.
    pub fn is_bodyless(&self) -> bool {
        matches!(
            self,
            Method::Get | Method::Head | Method::Trace | Method::Connect
        )
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP protocol version as `(major, minor)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    pub const HTTP_10: Version = Version { major: 1, minor: 0 };
    pub const HTTP_11: Version = Version { major: 1, minor: 1 };

    pub fn parse(s: &str) -> Option<Self> {
        let rest = s.strip_prefix("HTTP/")?;
        let (major, minor) = rest.split_once('.')?;
        Some(Version {
            major: major.parse().ok()?,
            minor: minor.parse().ok()?,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP/{}.{}", self.major, self.minor)
    }
}

/// A decoded HTTP request handed to handlers.
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub version: Version,
    /// Raw request-target as it appeared on the request line.
    pub target: String,
    /// Percent-decoded path component of the target.
    pub path: String,
    /// Decoded query parameters; a key may map to several values, in
    /// order of appearance.
    pub query_params: HashMap<String, Vec<String>>,
    /// Parameters bound by the matched route pattern.
    pub route_params: HashMap<String, String>,
    pub headers: HeaderMap,
    pub body: Body,
    pub local_endpoint: SocketAddr,
    pub remote_endpoint: SocketAddr,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// First value for a query key.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query_params
            .get(key)
            .and_then(|v| v.first())
            .map(|v| v.as_str())
    }

    pub fn route_param(&self, name: &str) -> Option<&str> {
        self.route_params.get(name).map(|v| v.as_str())
    }

    /// Keep-alive derived from version and the `Connection` header.
    /// HTTP/1.1 defaults to keep-alive; HTTP/1.0 requires an explicit
    /// `Connection: keep-alive`.
    pub fn keep_alive(&self) -> bool {
        if self.headers.has_token("Connection", "close") {
            return false;
        }
        if self.version == Version::HTTP_10 {
            return self.headers.has_token("Connection", "keep-alive");
        }
        true
    }

    /// Whether the headers ask for a WebSocket upgrade.
    pub fn is_websocket_upgrade(&self) -> bool {
        self.headers.has_token("Connection", "upgrade")
            && self
                .headers
                .get("Upgrade")
                .map(|v| v.trim().eq_ignore_ascii_case("websocket"))
                .unwrap_or(false)
            && self.headers.contains("Sec-WebSocket-Key")
    }

    pub fn expects_continue(&self) -> bool {
        self.headers
            .get("Expect")
            .map(|v| v.trim().eq_ignore_ascii_case("100-continue"))
            .unwrap_or(false)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("Content-Type")
    }
}
