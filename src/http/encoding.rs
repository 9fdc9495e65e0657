//! `Accept-Encoding` negotiation and streaming response compression.

use flate2::write::{DeflateEncoder, GzEncoder};
use flate2::Compression;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Gzip,
    Deflate,
}

impl ContentEncoding {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            t if t.eq_ignore_ascii_case("gzip") => Some(ContentEncoding::Gzip),
            t if t.eq_ignore_ascii_case("deflate") => Some(ContentEncoding::Deflate),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentEncoding::Gzip => "gzip",
            ContentEncoding::Deflate => "deflate",
        }
    }
}

/// Picks the response encoding: the client's `Accept-Encoding` list is
/// scanned in order and the first entry the server has enabled wins.
pub fn negotiate(accept_encoding: Option<&str>, enabled: &[String]) -> Option<ContentEncoding> {
    let accept = accept_encoding?;
    for entry in accept.split(',') {
        let token = entry.split(';').next().unwrap_or("").trim();
        if let Some(encoding) = ContentEncoding::from_token(token) {
            if enabled.iter().any(|e| e.eq_ignore_ascii_case(token)) {
                return Some(encoding);
            }
        }
    }
    None
}

/// A streaming compressor over an in-memory sink, drained in bounded
/// chunks so large bodies never accumulate fully compressed in memory.
pub enum Compressor {
    Gzip(GzEncoder<Vec<u8>>),
    Deflate(DeflateEncoder<Vec<u8>>),
}

impl Compressor {
    pub fn new(encoding: ContentEncoding) -> Self {
        match encoding {
            ContentEncoding::Gzip => {
                Compressor::Gzip(GzEncoder::new(Vec::new(), Compression::default()))
            }
            ContentEncoding::Deflate => {
                Compressor::Deflate(DeflateEncoder::new(Vec::new(), Compression::default()))
            }
        }
    }

    /// Feeds input and takes whatever output the codec has produced so
    /// far.
    pub fn write(&mut self, input: &[u8]) -> std::io::Result<Vec<u8>> {
        match self {
            Compressor::Gzip(enc) => {
                enc.write_all(input)?;
                Ok(std::mem::take(enc.get_mut()))
            }
            Compressor::Deflate(enc) => {
                enc.write_all(input)?;
                Ok(std::mem::take(enc.get_mut()))
            }
        }
    }

    /// Flushes the codec and returns the final output block.
    pub fn finish(self) -> std::io::Result<Vec<u8>> {
        match self {
            Compressor::Gzip(enc) => enc.finish(),
            Compressor::Deflate(enc) => enc.finish(),
        }
    }
}
