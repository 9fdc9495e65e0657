//! `CONNECT` tunneling: an opaque bidirectional byte relay between the
//! client stream and a freshly connected upstream.

use crate::error::{Error, Result};
use crate::stream::HttpStream;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

const PUMP_BUF: usize = 16 * 1024;

/// Splits a `CONNECT` request-target into host and port.
pub fn parse_connect_target(target: &str) -> Result<(&str, u16)> {
    let (host, port) = target
        .rsplit_once(':')
        .ok_or_else(|| Error::BadRequest(format!("connect target missing port: {target}")))?;
    let port = port
        .parse()
        .map_err(|_| Error::BadRequest(format!("invalid connect port: {target}")))?;
    if host.is_empty() {
        return Err(Error::BadRequest(format!("empty connect host: {target}")));
    }
    Ok((host, port))
}

/// Relays bytes both ways until each direction reaches EOF or fails.
///
/// Each pump copies in bounded blocks and half-closes its peer's write
/// side when its source dries up, so the opposite pump can still drain
/// before both streams drop.
pub async fn tunnel(client: HttpStream, upstream: TcpStream) -> Result<()> {
    let (mut client_rd, mut client_wr) = tokio::io::split(client);
    let (mut upstream_rd, mut upstream_wr) = upstream.into_split();

    let client_to_upstream = async {
        let copied = pump(&mut client_rd, &mut upstream_wr).await;
        let _ = upstream_wr.shutdown().await;
        copied
    };
    let upstream_to_client = async {
        let copied = pump(&mut upstream_rd, &mut client_wr).await;
        let _ = client_wr.shutdown().await;
        copied
    };

    let (up, down) = tokio::join!(client_to_upstream, upstream_to_client);
    tracing::debug!(
        bytes_up = up.unwrap_or(0),
        bytes_down = down.unwrap_or(0),
        "tunnel finished"
    );
    Ok(())
}

async fn pump<R, W>(reader: &mut R, writer: &mut W) -> Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; PUMP_BUF];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) => {
                tracing::trace!(error = %e, "tunnel read ended");
                return Ok(total);
            }
        };
        writer.write_all(&buf[..n]).await?;
        total += n as u64;
    }
}
