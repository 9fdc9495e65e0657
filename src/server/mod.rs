//! Server lifecycle: bind, accept, spawn sessions, shut down.

pub mod session;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::router::Router;
use crate::stream::tls;
use crate::websocket::{CloseHandler, MessageHandler, OpenHandler, WsHandlers};
use session::Session;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::watch;
use tokio_rustls::TlsAcceptor;

/// State shared by every session: frozen once the accept loop starts.
pub(crate) struct Shared {
    pub router: Router,
    pub config: Config,
    pub ws_handlers: WsHandlers,
    pub tls: Option<TlsAcceptor>,
}

/// Triggers a graceful stop: the acceptor closes and every session is
/// cancelled at its next yield point.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// The HTTP server: owns the router, configuration and listener.
///
/// Routes and mount points are registered through [`Server::router_mut`]
/// before [`Server::run`] consumes the server; after that the table is
/// immutable and shared read-only across connections.
pub struct Server {
    config: Config,
    router: Router,
    ws_handlers: WsHandlers,
    listener: Option<TcpListener>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            config,
            router: Router::new(),
            ws_handlers: WsHandlers::default(),
            listener: None,
            shutdown_tx: Arc::new(tx),
            shutdown_rx: rx,
        }
    }

    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fallback WebSocket handlers for upgraded connections.
    pub fn set_websocket_open_handler(&mut self, handler: OpenHandler) {
        self.ws_handlers.open = Some(handler);
    }

    pub fn set_websocket_close_handler(&mut self, handler: CloseHandler) {
        self.ws_handlers.close = Some(handler);
    }

    pub fn set_websocket_message_handler(&mut self, handler: MessageHandler) {
        self.ws_handlers.message = Some(handler);
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: Arc::clone(&self.shutdown_tx),
        }
    }

    /// Binds the listener with the configured backlog. Separate from
    /// [`Server::run`] so callers can learn the bound address first
    /// (port 0 picks a free one).
    pub async fn bind(&mut self) -> Result<()> {
        let addr: SocketAddr = tokio::net::lookup_host(self.config.listen_addr())
            .await?
            .next()
            .ok_or_else(|| {
                Error::Transport(std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    format!("cannot resolve {}", self.config.listen_addr()),
                ))
            })?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.bind(addr)?;
        let listener = socket.listen(self.config.server.backlog)?;
        tracing::info!(addr = %listener.local_addr()?, "listening");
        self.listener = Some(listener);
        Ok(())
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Accepts connections until shut down. Per-accept errors are
    /// logged and tolerated; per-connection errors never reach here.
    pub async fn run(mut self) -> Result<()> {
        if self.listener.is_none() {
            self.bind().await?;
        }
        let listener = self.listener.take().expect("bound above");

        let tls = match &self.config.ssl {
            Some(ssl) => Some(tls::build_acceptor(ssl)?),
            None => None,
        };

        let shared = Arc::new(Shared {
            router: self.router,
            config: self.config,
            ws_handlers: self.ws_handlers,
            tls,
        });

        let mut shutdown_rx = self.shutdown_rx.clone();
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (sock, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    tracing::trace!(peer = %peer, "accepted connection");

                    let shared = Arc::clone(&shared);
                    let mut session_shutdown = self.shutdown_rx.clone();
                    tokio::spawn(async move {
                        let session = Session::new(sock, shared);
                        tokio::select! {
                            result = session.run() => {
                                if let Err(e) = result {
                                    tracing::debug!(peer = %peer, error = %e, "session ended with error");
                                }
                            }
                            _ = session_shutdown.changed() => {
                                tracing::trace!(peer = %peer, "session cancelled by shutdown");
                            }
                        }
                        tracing::trace!(peer = %peer, "connection closed");
                    });
                }
                _ = shutdown_rx.changed() => {
                    tracing::info!("shutdown signal received, closing acceptor");
                    return Ok(());
                }
            }
        }
    }

    /// Builds a multi-threaded runtime sized by `num_threads` and runs
    /// the server on it until shutdown.
    pub fn run_blocking(self) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.server.num_threads)
            .enable_all()
            .build()?;
        runtime.block_on(self.run())
    }
}
