//! Polymorphic byte stream over plain TCP or server-side TLS.
//!
//! All HTTP, WebSocket and tunnel I/O goes through [`HttpStream`]. The
//! variant is chosen once per connection by [`detect`], which peeks the
//! first bytes without consuming them so the TLS engine performs its
//! handshake against the untouched socket.

pub mod tls;

use crate::error::{Error, Result};
use bytes::BytesMut;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

enum StreamKind {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

/// A byte stream with deadline-aware read/write helpers.
///
/// The deadline is sticky: `expires_after` replaces any prior deadline
/// and applies to every subsequent operation until `expires_never`
/// clears it. An expired operation fails with [`Error::Timeout`].
pub struct HttpStream {
    kind: StreamKind,
    deadline: Option<Duration>,
    local: SocketAddr,
    remote: SocketAddr,
}

impl HttpStream {
    fn new(kind: StreamKind, local: SocketAddr, remote: SocketAddr) -> Self {
        Self {
            kind,
            deadline: None,
            local,
            remote,
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self.kind, StreamKind::Tls(_))
    }

    pub fn local_endpoint(&self) -> SocketAddr {
        self.local
    }

    pub fn remote_endpoint(&self) -> SocketAddr {
        self.remote
    }

    /// Replaces the operation deadline.
    pub fn expires_after(&mut self, deadline: Duration) {
        self.deadline = Some(deadline);
    }

    /// Clears the operation deadline.
    pub fn expires_never(&mut self) {
        self.deadline = None;
    }

    /// Reads some bytes into `buf`, returning the count (0 on EOF).
    pub async fn read_some(&mut self, buf: &mut BytesMut) -> Result<usize> {
        let deadline = self.deadline;
        let op = async {
            match &mut self.kind {
                StreamKind::Plain(s) => s.read_buf(buf).await,
                StreamKind::Tls(s) => s.read_buf(buf).await,
            }
        };
        match deadline {
            Some(deadline) => match tokio::time::timeout(deadline, op).await {
                Ok(result) => Ok(result?),
                Err(_) => Err(Error::Timeout),
            },
            None => Ok(op.await?),
        }
    }

    /// Writes the whole of `data`.
    pub async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let deadline = self.deadline;
        let op = async {
            match &mut self.kind {
                StreamKind::Plain(s) => s.write_all(data).await,
                StreamKind::Tls(s) => s.write_all(data).await,
            }
        };
        match deadline {
            Some(deadline) => match tokio::time::timeout(deadline, op).await {
                Ok(result) => Ok(result?),
                Err(_) => Err(Error::Timeout),
            },
            None => Ok(op.await?),
        }
    }

    /// Half-closes the write direction.
    pub async fn shutdown_write(&mut self) -> Result<()> {
        match &mut self.kind {
            StreamKind::Plain(s) => s.shutdown().await?,
            StreamKind::Tls(s) => s.shutdown().await?,
        }
        Ok(())
    }
}

impl AsyncRead for HttpStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut self.kind {
            StreamKind::Plain(s) => Pin::new(s).poll_read(cx, buf),
            StreamKind::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for HttpStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut self.kind {
            StreamKind::Plain(s) => Pin::new(s).poll_write(cx, buf),
            StreamKind::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.kind {
            StreamKind::Plain(s) => Pin::new(s).poll_flush(cx),
            StreamKind::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.kind {
            StreamKind::Plain(s) => Pin::new(s).poll_shutdown(cx),
            StreamKind::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Classifies a freshly accepted socket as TLS or plain and wraps it.
///
/// The first bytes are peeked, never consumed: a TLS handshake record
/// (content type `0x16`, record version major `3`) selects the TLS
/// variant, whose handshake then reads the socket from the start.
/// Without an acceptor the stream is always plain.
pub async fn detect(
    sock: TcpStream,
    acceptor: Option<&TlsAcceptor>,
    handshake_timeout: Duration,
) -> Result<HttpStream> {
    let local = sock.local_addr()?;
    let remote = sock.peer_addr()?;

    let acceptor = match acceptor {
        Some(acceptor) => acceptor,
        None => return Ok(HttpStream::new(StreamKind::Plain(sock), local, remote)),
    };

    let mut probe = [0u8; 3];
    let n = tokio::time::timeout(handshake_timeout, sock.peek(&mut probe))
        .await
        .map_err(|_| Error::Timeout)??;

    // content type 0x16 (handshake); record version major 3 when the
    // peek saw that far
    let looks_tls = n >= 1 && probe[0] == 0x16 && (n < 2 || probe[1] == 0x03);
    if !looks_tls {
        return Ok(HttpStream::new(StreamKind::Plain(sock), local, remote));
    }

    let tls = tokio::time::timeout(handshake_timeout, acceptor.accept(sock))
        .await
        .map_err(|_| Error::Timeout)?
        .map_err(|e| Error::TlsHandshake(e.to_string()))?;
    Ok(HttpStream::new(
        StreamKind::Tls(Box::new(tls)),
        local,
        remote,
    ))
}
