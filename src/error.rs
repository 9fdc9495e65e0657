use std::io;

/// Error kinds for a single connection.
///
/// Everything here is contained at the session level: transport-class
/// errors close the connection, protocol-class errors map to a status
/// code, and none of them ever reach the accept loop.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Connection-level read/write/shutdown failure.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// A deadline elapsed while an operation was pending.
    #[error("operation timed out")]
    Timeout,

    /// Malformed HTTP, query string, `Range` header or multipart body.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Request headers exceeded the configured limit.
    #[error("request header fields too large")]
    HeadersTooLarge,

    /// No route and no mount-point file matched.
    #[error("not found")]
    NotFound,

    /// A well-formed `Range` header targeting positions outside the file.
    #[error("range not satisfiable")]
    RangeNotSatisfiable,

    /// A handler asked for a body variant other than the decoded one.
    #[error("wrong body kind: expected {expected}, got {actual}")]
    WrongBodyKind {
        expected: &'static str,
        actual: &'static str,
    },

    /// A handler or aspect returned failure.
    #[error("handler failed: {0}")]
    Handler(#[from] anyhow::Error),

    /// Server-side TLS handshake failure.
    #[error("tls handshake failed: {0}")]
    TlsHandshake(String),
}

impl Error {
    /// Status code to answer with, for errors that map to a response.
    ///
    /// Transport-class errors have no response; callers close instead.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Transport(_) | Error::Timeout | Error::TlsHandshake(_) => None,
            Error::BadRequest(_) => Some(400),
            Error::HeadersTooLarge => Some(431),
            Error::NotFound => Some(404),
            Error::RangeNotSatisfiable => Some(416),
            Error::WrongBodyKind { .. } | Error::Handler(_) => Some(500),
        }
    }

    /// Whether the connection must be torn down without a response.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Transport(_) | Error::Timeout | Error::TlsHandshake(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
