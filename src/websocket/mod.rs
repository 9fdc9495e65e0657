//! WebSocket connections: the RFC 6455 server handshake, a reader that
//! dispatches complete messages concurrently, and a serialized send
//! queue guaranteeing at most one in-flight socket write.

pub mod frame;

use crate::error::{Error, Result};
use crate::http::request::Request;
use crate::stream::HttpStream;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::BytesMut;
use frame::{close_payload, encode_frame, parse_frame, Opcode};
use futures_util::future::BoxFuture;
use sha1::{Digest, Sha1};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, Weak};
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};

const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Binary,
}

/// One complete WebSocket message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub payload: Vec<u8>,
    pub kind: MessageKind,
}

impl Message {
    pub fn text(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into().into_bytes(),
            kind: MessageKind::Text,
        }
    }

    pub fn binary(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            kind: MessageKind::Binary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsState {
    Handshaking,
    Open,
    Closing,
    Closed,
}

/// Handlers receive a weak handle: upgrading fails once the connection
/// has been destroyed, so late tasks observe that instead of keeping
/// the socket alive.
pub type OpenHandler =
    Arc<dyn Fn(Weak<WebSocketConnection>) -> BoxFuture<'static, ()> + Send + Sync>;
pub type CloseHandler =
    Arc<dyn Fn(Weak<WebSocketConnection>) -> BoxFuture<'static, ()> + Send + Sync>;
pub type MessageHandler =
    Arc<dyn Fn(Weak<WebSocketConnection>, Message) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Clone, Default)]
pub struct WsHandlers {
    pub open: Option<OpenHandler>,
    pub close: Option<CloseHandler>,
    pub message: Option<MessageHandler>,
}

enum Outbound {
    Message(Message),
    Pong(Vec<u8>),
    Close,
}

struct SendState {
    queue: VecDeque<Outbound>,
    /// Whether a drain task currently owns the writer.
    writer_active: bool,
}

/// A live WebSocket connection.
///
/// All sends funnel through a FIFO queue drained by at most one task at
/// a time, so outbound frame order matches `send` call order and the
/// socket never sees interleaved writes.
pub struct WebSocketConnection {
    writer: tokio::sync::Mutex<WriteHalf<HttpStream>>,
    send_state: Mutex<SendState>,
    state: Mutex<WsState>,
    remote: SocketAddr,
}

impl WebSocketConnection {
    pub fn remote_endpoint(&self) -> SocketAddr {
        self.remote
    }

    pub fn state(&self) -> WsState {
        *self.state.lock().unwrap()
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state(), WsState::Open)
    }

    /// Queues a message for sending. Returns immediately; the message
    /// goes out in FIFO order relative to other sends.
    pub fn send(self: &Arc<Self>, msg: Message) {
        self.enqueue(Outbound::Message(msg));
    }

    /// Posts a close intent; the drain task emits a graceful close
    /// frame (code 1000, reason `"normal"`) when it reaches it.
    pub fn close(self: &Arc<Self>) {
        self.enqueue(Outbound::Close);
    }

    fn enqueue(self: &Arc<Self>, item: Outbound) {
        if matches!(self.state(), WsState::Closed) {
            return;
        }
        let spawn_drain = {
            let mut s = self.send_state.lock().unwrap();
            s.queue.push_back(item);
            if s.writer_active {
                false
            } else {
                s.writer_active = true;
                true
            }
        };
        if spawn_drain {
            let conn = Arc::clone(self);
            tokio::spawn(async move { conn.drain().await });
        }
    }

    /// Pops queued items and writes them one frame at a time; exits when
    /// the queue is empty or the socket fails.
    async fn drain(self: Arc<Self>) {
        loop {
            let item = {
                let mut s = self.send_state.lock().unwrap();
                match s.queue.pop_front() {
                    Some(item) => item,
                    None => {
                        s.writer_active = false;
                        return;
                    }
                }
            };

            let wire = match item {
                Outbound::Message(msg) => {
                    let opcode = match msg.kind {
                        MessageKind::Text => Opcode::Text,
                        MessageKind::Binary => Opcode::Binary,
                    };
                    encode_frame(opcode, &msg.payload, true)
                }
                Outbound::Pong(payload) => encode_frame(Opcode::Pong, &payload, true),
                Outbound::Close => {
                    *self.state.lock().unwrap() = WsState::Closing;
                    encode_frame(Opcode::Close, &close_payload(1000, "normal"), true)
                }
            };

            let mut writer = self.writer.lock().await;
            if let Err(e) = writer.write_all(&wire).await {
                tracing::debug!(peer = %self.remote, error = %e, "websocket write failed");
                *self.state.lock().unwrap() = WsState::Closed;
                let mut s = self.send_state.lock().unwrap();
                s.queue.clear();
                s.writer_active = false;
                return;
            }
        }
    }

    fn mark_closed(&self) {
        *self.state.lock().unwrap() = WsState::Closed;
    }
}

/// `Sec-WebSocket-Accept` for a client key.
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Performs the server handshake over `stream` and runs the connection
/// until the peer closes or the transport fails. The initiating HTTP
/// session ends here; keep-alive does not resume.
pub async fn run(mut stream: HttpStream, req: &Request, handlers: WsHandlers) -> Result<()> {
    let key = req
        .headers
        .get("Sec-WebSocket-Key")
        .ok_or_else(|| Error::BadRequest("missing Sec-WebSocket-Key".to_string()))?;

    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\r\n",
        accept_key(key)
    );
    stream.expires_never();
    stream.write_all(response.as_bytes()).await?;

    let remote = stream.remote_endpoint();
    let (mut reader, writer) = tokio::io::split(stream);
    let conn = Arc::new(WebSocketConnection {
        writer: tokio::sync::Mutex::new(writer),
        send_state: Mutex::new(SendState {
            queue: VecDeque::new(),
            writer_active: false,
        }),
        state: Mutex::new(WsState::Open),
        remote,
    });

    tracing::debug!(peer = %remote, "websocket connection open");
    if let Some(open) = &handlers.open {
        open(Arc::downgrade(&conn)).await;
    }

    let result = read_loop(&mut reader, &conn, &handlers).await;

    conn.mark_closed();
    if let Some(close) = &handlers.close {
        close(Arc::downgrade(&conn)).await;
    }
    tracing::debug!(peer = %remote, "websocket connection closed");
    result
}

/// Reads frames, reassembles fragmented messages, and dispatches each
/// complete message concurrently. Control frames are handled inline.
async fn read_loop(
    reader: &mut ReadHalf<HttpStream>,
    conn: &Arc<WebSocketConnection>,
    handlers: &WsHandlers,
) -> Result<()> {
    let mut buf = BytesMut::with_capacity(8 * 1024);
    // opcode and accumulated payload of an in-flight fragmented message
    let mut pending: Option<(MessageKind, Vec<u8>)> = None;

    loop {
        let (frame, consumed) = loop {
            match parse_frame(&buf) {
                Ok(Some(parsed)) => break parsed,
                Ok(None) => {
                    let n = reader.read_buf(&mut buf).await?;
                    if n == 0 {
                        return Ok(());
                    }
                }
                Err(e) => {
                    tracing::debug!(peer = %conn.remote, error = ?e, "websocket protocol error");
                    return Ok(());
                }
            }
        };
        let _ = buf.split_to(consumed);

        match frame.opcode {
            Opcode::Text | Opcode::Binary => {
                let kind = if frame.opcode == Opcode::Text {
                    MessageKind::Text
                } else {
                    MessageKind::Binary
                };
                if frame.fin && pending.is_none() {
                    dispatch_message(conn, handlers, Message { payload: frame.payload, kind });
                } else if pending.is_none() {
                    pending = Some((kind, frame.payload));
                } else {
                    // a new data frame while a fragmented message is
                    // still open is a protocol violation
                    tracing::debug!(peer = %conn.remote, "interleaved websocket data frames");
                    return Ok(());
                }
            }
            Opcode::Continuation => {
                let Some((kind, mut acc)) = pending.take() else {
                    tracing::debug!(peer = %conn.remote, "continuation without initial frame");
                    return Ok(());
                };
                acc.extend_from_slice(&frame.payload);
                if frame.fin {
                    dispatch_message(conn, handlers, Message { payload: acc, kind });
                } else {
                    pending = Some((kind, acc));
                }
            }
            Opcode::Ping => {
                conn.enqueue(Outbound::Pong(frame.payload));
            }
            Opcode::Pong => {}
            Opcode::Close => {
                conn.close();
                return Ok(());
            }
        }
    }
}

/// Message handlers run concurrently with the reader and each other;
/// they get a weak handle so a finished connection is observed as gone.
fn dispatch_message(conn: &Arc<WebSocketConnection>, handlers: &WsHandlers, msg: Message) {
    if let Some(handler) = &handlers.message {
        let fut = handler(Arc::downgrade(conn), msg);
        tokio::spawn(fut);
    }
}
