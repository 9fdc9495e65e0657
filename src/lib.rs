//! portico - HTTP/1.1 server core
//!
//! A single TCP listener multiplexing three wire behaviors: plain or
//! TLS-wrapped HTTP exchanges, WebSocket upgrades, and `CONNECT`
//! tunneling. Routing supports parameterized patterns, filesystem mount
//! points with generated directory indexes, and before/after aspect
//! middleware.

pub mod body;
pub mod config;
pub mod error;
pub mod html;
pub mod http;
pub mod proxy;
pub mod router;
pub mod server;
pub mod stream;
pub mod websocket;

pub use body::{Body, FormData, FormField};
pub use config::Config;
pub use error::{Error, Result};
pub use http::request::{Method, Request, Version};
pub use http::response::Response;
pub use router::{Aspect, HandlerFuture, HttpHandler, Router};
pub use server::Server;
pub use websocket::{Message, MessageKind, WebSocketConnection};

/// Identifier sent in the `Server` response header.
pub const SERVER_IDENT: &str = concat!("portico/", env!("CARGO_PKG_VERSION"));
