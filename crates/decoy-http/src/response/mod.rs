//! Response definitions and their rendering onto the wire.
//!
//! # Module Structure
//!
//! - `head` - Status, headers, content type and delay shared by all variants
//! - `definition` - Simple, chunk-stream and SSE response definitions
//! - `stream` - Bounded producer/consumer pump behind streaming bodies
//! - `sse` - Server-sent event records and their wire encoding
//! - `builder` - Plain text responses for server-generated replies

mod builder;
mod definition;
mod head;
mod sse;
mod stream;

pub use builder::PlainResponseBuilder;
pub use definition::{ChunkSource, ResponseDefinition, SimpleResponse, SseResponse, StreamResponse};
pub use head::{HeadersFn, ResponseHead, WithResponseHead};
pub use sse::SseEvent;
pub use stream::SEND_BUFFER_CAPACITY;

use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use std::convert::Infallible;

/// Body type of every response the server writes.
pub type ResponseBody = UnsyncBoxBody<Bytes, Infallible>;
