//! Per-connection session: protocol detection, the keep-alive
//! request/response loop, and hand-off to the WebSocket and tunnel
//! paths.

use crate::body;
use crate::error::{Error, Result};
use crate::html;
use crate::http::encoding;
use crate::http::parser::{self, ParseError};
use crate::http::request::{Method, Request};
use crate::http::response::Response;
use crate::http::writer;
use crate::proxy;
use crate::server::Shared;
use crate::stream::{self, HttpStream};
use crate::websocket;
use bytes::BytesMut;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpStream;

pub struct Session {
    shared: Arc<Shared>,
    // taken when the session starts; the struct stays borrowable for
    // the helpers below
    sock: Option<TcpStream>,
}

impl Session {
    pub fn new(sock: TcpStream, shared: Arc<Shared>) -> Self {
        Self {
            shared,
            sock: Some(sock),
        }
    }

    /// Drives one accepted socket to completion. All errors are
    /// terminal for the connection and contained here.
    pub async fn run(mut self) -> Result<()> {
        let sock = match self.sock.take() {
            Some(sock) => sock,
            None => return Ok(()),
        };
        let timeout = self.shared.config.timeout();

        let mut stream =
            stream::detect(sock, self.shared.tls.as_ref(), timeout).await?;
        let mut buffer = BytesMut::with_capacity(8 * 1024);

        loop {
            let head = match self.read_head(&mut stream, &mut buffer).await {
                Ok(Some(head)) => head,
                // peer closed between requests
                Ok(None) => return Ok(()),
                Err(e) => {
                    if let Some(status) = e.status() {
                        self.respond_error(&mut stream, status).await?;
                    }
                    return Err(e);
                }
            };

            let mut req = self.build_request(&stream, head)?;

            if req.is_websocket_upgrade() {
                return websocket::run(stream, &req, self.shared.ws_handlers.clone()).await;
            }
            if req.method == Method::Connect {
                return self.handle_connect(stream, &req).await;
            }

            let (path, query_params) = match parser::parse_target(&req.target) {
                Ok(parsed) => parsed,
                Err(_) => {
                    self.respond_error(&mut stream, 400).await?;
                    return Ok(());
                }
            };
            req.path = path;
            req.query_params = query_params;

            let has_handler = self.shared.router.has_handler(req.method, &req.path);
            let body_expected = !req.method.is_bodyless()
                && (req.headers.contains("Content-Length")
                    || req.headers.has_token("Transfer-Encoding", "chunked"));

            if has_handler && body_expected {
                if let Err(e) = self.read_body(&mut stream, &mut buffer, &mut req).await {
                    if let Some(status) = e.status() {
                        self.respond_error(&mut stream, status).await?;
                        return Ok(());
                    }
                    return Err(e);
                }
            }

            let mut resp = Response::for_request(&req);

            if !has_handler {
                resp.set_error_content(404);
            } else {
                let start = Instant::now();
                match self.shared.router.dispatch(&mut req, &mut resp).await {
                    Ok(()) => {}
                    Err(e) if e.is_transport() => return Err(e),
                    Err(e) => {
                        let status = e.status().unwrap_or(500);
                        tracing::debug!(
                            method = %req.method,
                            path = %req.path,
                            error = %e,
                            "request refused"
                        );
                        resp.set_error_content(status);
                        if status == 400 {
                            resp.keep_alive = false;
                        }
                    }
                }
                tracing::info!(
                    method = %req.method,
                    target = %req.target,
                    peer = %req.remote_endpoint,
                    status = resp.status,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "request completed"
                );
            }

            let chosen = encoding::negotiate(
                req.headers.get("Accept-Encoding"),
                &self.shared.config.compression,
            );

            // an unread request body poisons the framing of whatever
            // comes next on this connection
            if body_expected && !has_handler {
                resp.keep_alive = false;
            }

            stream.expires_after(timeout);
            writer::write_response(&mut stream, &mut resp, req.method == Method::Head, chosen)
                .await?;
            stream.expires_never();

            if !resp.keep_alive {
                let _ = stream.shutdown_write().await;
                return Ok(());
            }
        }
    }

    /// Header phase: accumulate until the parser sees the blank line.
    /// `Ok(None)` is a clean close between requests.
    async fn read_head(
        &self,
        stream: &mut HttpStream,
        buffer: &mut BytesMut,
    ) -> Result<Option<parser::RequestHead>> {
        let timeout = self.shared.config.timeout();
        let max_header = self.shared.config.limits.max_header_bytes;

        loop {
            match parser::parse_request_head(buffer, max_header) {
                Ok((head, consumed)) => {
                    let _ = buffer.split_to(consumed);
                    return Ok(Some(head));
                }
                Err(ParseError::Incomplete) => {}
                Err(ParseError::HeadersTooLarge) => return Err(Error::HeadersTooLarge),
                Err(e) => {
                    return Err(Error::BadRequest(format!("invalid request head: {e:?}")))
                }
            }

            stream.expires_after(timeout);
            let n = stream.read_some(buffer).await?;
            stream.expires_never();
            if n == 0 {
                if buffer.is_empty() {
                    return Ok(None);
                }
                return Err(Error::Transport(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "peer closed mid-request",
                )));
            }
        }
    }

    fn build_request(&self, stream: &HttpStream, head: parser::RequestHead) -> Result<Request> {
        Ok(Request {
            method: head.method,
            version: head.version,
            path: head.target.clone(),
            target: head.target,
            query_params: HashMap::new(),
            route_params: HashMap::new(),
            headers: head.headers,
            body: body::Body::Empty,
            local_endpoint: stream.local_endpoint(),
            remote_endpoint: stream.remote_endpoint(),
        })
    }

    /// Body phase: reads per `Content-Length` or chunked framing, each
    /// read refreshing the idle deadline, then decodes into the body
    /// variant implied by `Content-Type`.
    async fn read_body(
        &self,
        stream: &mut HttpStream,
        buffer: &mut BytesMut,
        req: &mut Request,
    ) -> Result<()> {
        let timeout = self.shared.config.timeout();

        if req.expects_continue() {
            stream.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await?;
        }

        let raw = if req.headers.has_token("Transfer-Encoding", "chunked") {
            loop {
                match parser::decode_chunked(buffer) {
                    Ok((data, consumed)) => {
                        let _ = buffer.split_to(consumed);
                        break data;
                    }
                    Err(ParseError::Incomplete) => {
                        stream.expires_after(timeout);
                        let n = stream.read_some(buffer).await?;
                        stream.expires_never();
                        if n == 0 {
                            return Err(Error::Transport(std::io::Error::new(
                                std::io::ErrorKind::UnexpectedEof,
                                "peer closed mid-body",
                            )));
                        }
                    }
                    Err(e) => {
                        return Err(Error::BadRequest(format!("invalid chunked body: {e:?}")))
                    }
                }
            }
        } else {
            let length = req
                .headers
                .get("Content-Length")
                .and_then(|v| v.trim().parse::<usize>().ok())
                .ok_or_else(|| Error::BadRequest("invalid content-length".to_string()))?;
            while buffer.len() < length {
                stream.expires_after(timeout);
                let n = stream.read_some(buffer).await?;
                stream.expires_never();
                if n == 0 {
                    return Err(Error::Transport(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "peer closed mid-body",
                    )));
                }
            }
            buffer.split_to(length).to_vec()
        };

        let content_type = req.content_type().map(|ct| ct.to_string());
        req.body = body::decode_request_body(raw, content_type.as_deref())?;
        Ok(())
    }

    /// `CONNECT`: resolve and dial the upstream, confirm the tunnel,
    /// then relay bytes until both directions drain.
    async fn handle_connect(&self, mut stream: HttpStream, req: &Request) -> Result<()> {
        let (host, port) = proxy::parse_connect_target(&req.target)?;
        tracing::debug!(host, port, "establishing tunnel");

        let upstream = match TcpStream::connect((host, port)).await {
            Ok(upstream) => upstream,
            Err(e) => {
                tracing::debug!(host, port, error = %e, "tunnel connect failed");
                self.respond_error(&mut stream, 502).await?;
                return Ok(());
            }
        };

        let head = format!(
            "HTTP/1.1 200 Connection Established\r\nServer: {}\r\nDate: {}\r\n\r\n",
            crate::SERVER_IDENT,
            html::format_http_date()
        );
        stream.expires_never();
        stream.write_all(head.as_bytes()).await?;

        proxy::tunnel(stream, upstream).await
    }

    /// Writes a standard error page outside the normal dispatch path
    /// and marks the connection for closing.
    async fn respond_error(&self, stream: &mut HttpStream, status: u16) -> Result<()> {
        let mut resp = Response::new();
        resp.headers.set("Server", crate::SERVER_IDENT);
        resp.headers.set("Date", html::format_http_date());
        resp.set_error_content(status);
        resp.keep_alive = false;
        stream.expires_after(self.shared.config.timeout());
        writer::write_response(stream, &mut resp, false, None).await?;
        stream.expires_never();
        let _ = stream.shutdown_write().await;
        Ok(())
    }
}
