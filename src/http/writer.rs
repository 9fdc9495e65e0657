//! Response serialization: status line, headers, then the body either
//! verbatim with a computed `Content-Length` or chunked through a
//! negotiated compressor. File bodies stream in bounded blocks; ranged
//! file bodies emit `Content-Range` framing.

use crate::body::Body;
use crate::error::Result;
use crate::http::encoding::{Compressor, ContentEncoding};
use crate::http::response::Response;
use crate::http::request::Version;
use crate::stream::HttpStream;
use std::io::SeekFrom;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

const FILE_BLOCK: usize = 64 * 1024;

/// How the body will be put on the wire.
enum Payload {
    None,
    Buffer(Vec<u8>),
    /// Contiguous spans of one file, each `(start, len)`.
    File {
        path: PathBuf,
        spans: Vec<(u64, u64)>,
    },
    /// `multipart/byteranges`: per-part header bytes preceding each span,
    /// then a closing delimiter.
    FileMultipart {
        path: PathBuf,
        parts: Vec<(Vec<u8>, u64, u64)>,
        trailer: Vec<u8>,
    },
}

impl Payload {
    fn len(&self) -> u64 {
        match self {
            Payload::None => 0,
            Payload::Buffer(data) => data.len() as u64,
            Payload::File { spans, .. } => spans.iter().map(|(_, len)| len).sum(),
            Payload::FileMultipart { parts, trailer, .. } => {
                parts
                    .iter()
                    .map(|(head, _, len)| head.len() as u64 + len + 2)
                    .sum::<u64>()
                    + trailer.len() as u64
            }
        }
    }
}

/// Serializes `resp` onto `stream`.
///
/// When `encoding` is set the transfer is chunked, `Content-Length` is
/// dropped and every body byte goes through the compressor. `HEAD`
/// responses emit headers only, with the same payload accounting.
pub async fn write_response(
    stream: &mut HttpStream,
    resp: &mut Response,
    is_head: bool,
    encoding: Option<ContentEncoding>,
) -> Result<()> {
    let payload = prepare_payload(resp)?;

    // compressing an empty body would be pure framing overhead
    let encoding = match (&payload, encoding) {
        (Payload::None, _) => None,
        (_, enc) => enc,
    };

    if let Some(enc) = encoding {
        resp.headers.set("Content-Encoding", enc.as_str());
        resp.headers.set("Transfer-Encoding", "chunked");
        resp.headers.remove("Content-Length");
    } else if !resp.headers.contains("Content-Length") {
        resp.headers.set("Content-Length", payload.len().to_string());
    }

    if !resp.keep_alive {
        resp.headers.set("Connection", "close");
    } else if resp.version == Version::HTTP_10 {
        resp.headers.set("Connection", "keep-alive");
    }

    let mut head = format!(
        "{} {} {}\r\n",
        resp.version,
        resp.status,
        resp.reason_phrase()
    );
    for (name, value) in resp.headers.iter() {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");
    stream.write_all(head.as_bytes()).await?;

    if is_head {
        return Ok(());
    }

    let mut emitter = match encoding {
        Some(enc) => Emitter::Chunked(Compressor::new(enc)),
        None => Emitter::Plain,
    };

    match payload {
        Payload::None => {}
        Payload::Buffer(data) => emitter.write(stream, &data).await?,
        Payload::File { path, spans } => {
            let mut file = File::open(&path).await?;
            for (start, len) in spans {
                emit_file_span(stream, &mut emitter, &mut file, start, len).await?;
            }
        }
        Payload::FileMultipart {
            path,
            parts,
            trailer,
        } => {
            let mut file = File::open(&path).await?;
            for (part_head, start, len) in parts {
                emitter.write(stream, &part_head).await?;
                emit_file_span(stream, &mut emitter, &mut file, start, len).await?;
                emitter.write(stream, b"\r\n").await?;
            }
            emitter.write(stream, &trailer).await?;
        }
    }

    emitter.finish(stream).await
}

/// Resolves the body into a wire payload, setting the range headers a
/// `206` needs. Runs before `Content-Length` accounting so the length
/// always matches what is emitted.
fn prepare_payload(resp: &mut Response) -> Result<Payload> {
    let body = std::mem::take(&mut resp.body);
    Ok(match body {
        Body::Empty => Payload::None,
        Body::String { data, .. } => Payload::Buffer(data.into_bytes()),
        Body::Json(value) => Payload::Buffer(serde_json::to_vec(&value).map_err(|e| {
            crate::error::Error::Handler(anyhow::anyhow!("json serialization failed: {e}"))
        })?),
        Body::Bytes(data) => Payload::Buffer(data),
        Body::Form(form) => Payload::Buffer(form.serialize()),
        Body::File { path, size, ranges } => {
            if ranges.is_empty() {
                let spans = if size == 0 { Vec::new() } else { vec![(0, size)] };
                Payload::File { path, spans }
            } else if ranges.len() == 1 {
                let (start, end) = ranges[0];
                resp.headers
                    .set("Content-Range", format!("bytes {start}-{end}/{size}"));
                Payload::File {
                    path,
                    spans: vec![(start, end - start + 1)],
                }
            } else {
                let boundary = crate::html::generate_boundary();
                let part_type = resp
                    .headers
                    .get("Content-Type")
                    .unwrap_or("application/octet-stream")
                    .to_string();
                resp.headers.set(
                    "Content-Type",
                    format!("multipart/byteranges; boundary={boundary}"),
                );
                let parts = ranges
                    .iter()
                    .map(|&(start, end)| {
                        let head = format!(
                            "--{boundary}\r\nContent-Type: {part_type}\r\nContent-Range: bytes {start}-{end}/{size}\r\n\r\n"
                        );
                        (head.into_bytes(), start, end - start + 1)
                    })
                    .collect();
                let trailer = format!("--{boundary}--\r\n").into_bytes();
                Payload::FileMultipart {
                    path,
                    parts,
                    trailer,
                }
            }
        }
    })
}

async fn emit_file_span(
    stream: &mut HttpStream,
    emitter: &mut Emitter,
    file: &mut File,
    start: u64,
    len: u64,
) -> Result<()> {
    file.seek(SeekFrom::Start(start)).await?;
    let mut remaining = len;
    let mut block = vec![0u8; FILE_BLOCK];
    while remaining > 0 {
        let want = (remaining as usize).min(FILE_BLOCK);
        let n = file.read(&mut block[..want]).await?;
        if n == 0 {
            return Err(crate::error::Error::Transport(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "file shrank while serving",
            )));
        }
        emitter.write(stream, &block[..n]).await?;
        remaining -= n as u64;
    }
    Ok(())
}

/// Plain writes, or compressed chunked transfer.
enum Emitter {
    Plain,
    Chunked(Compressor),
}

impl Emitter {
    async fn write(&mut self, stream: &mut HttpStream, data: &[u8]) -> Result<()> {
        match self {
            Emitter::Plain => stream.write_all(data).await,
            Emitter::Chunked(compressor) => {
                let produced = compressor.write(data)?;
                write_chunk(stream, &produced).await
            }
        }
    }

    async fn finish(self, stream: &mut HttpStream) -> Result<()> {
        match self {
            Emitter::Plain => Ok(()),
            Emitter::Chunked(compressor) => {
                let tail = compressor.finish()?;
                write_chunk(stream, &tail).await?;
                stream.write_all(b"0\r\n\r\n").await
            }
        }
    }
}

async fn write_chunk(stream: &mut HttpStream, data: &[u8]) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }
    let framed = format!("{:x}\r\n", data.len());
    stream.write_all(framed.as_bytes()).await?;
    stream.write_all(data).await?;
    stream.write_all(b"\r\n").await
}
