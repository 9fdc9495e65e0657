//! HTTP/1.1 protocol implementation.
//!
//! - **`parser`**: incremental request-head parsing plus chunked body
//!   and target/query decoding
//! - **`request`** / **`response`**: the message types handlers see
//! - **`headers`**: case-insensitive header multimap
//! - **`ranges`**: `Range` header parsing
//! - **`encoding`**: `Accept-Encoding` negotiation and compression
//! - **`writer`**: response serialization

pub mod encoding;
pub mod headers;
pub mod parser;
pub mod ranges;
pub mod request;
pub mod response;
pub mod writer;
