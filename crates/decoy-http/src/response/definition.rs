//! Response definitions returned by responders.
//!
//! A definition is either buffered, streamed chunk by chunk, or a sequence
//! of server-sent events.

use super::head::{ResponseHead, WithResponseHead};
use super::sse::SseEvent;
use super::stream::pump;
use super::ResponseBody;
use crate::error::{BoxError, SseEventError};
use crate::format::format_response;
use bytes::Bytes;
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderValue, CACHE_CONTROL, CONNECTION};
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::fmt::{self, Display};
use std::time::Duration;
use tracing::debug;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const APPLICATION_JSON: &str = "application/json";
const EVENT_STREAM_UTF8: &str = "text/event-stream; charset=utf-8";
const EVENT_STREAM: &str = "text/event-stream";

/// Elements of a streamed body: a fixed list or a fallible async stream.
pub enum ChunkSource<T> {
    List(Vec<T>),
    Stream(BoxStream<'static, Result<T, BoxError>>),
}

impl<T: Send + 'static> ChunkSource<T> {
    pub fn from_stream<S>(source: S) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
    {
        ChunkSource::Stream(source.map(|item| Ok(item)).boxed())
    }

    /// An `Err` item ends the body early; chunks already sent stay sent.
    pub fn from_try_stream<S, E>(source: S) -> Self
    where
        S: Stream<Item = Result<T, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        ChunkSource::Stream(
            source
                .map(|item| item.map_err(|e| -> BoxError { e.into() }))
                .boxed(),
        )
    }

    fn into_stream(self) -> BoxStream<'static, Result<T, BoxError>> {
        match self {
            ChunkSource::List(items) => stream::iter(items.into_iter().map(Ok)).boxed(),
            ChunkSource::Stream(source) => source,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ChunkSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkSource::List(items) => f.debug_tuple("List").field(items).finish(),
            ChunkSource::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// A single-shot body.
#[derive(Debug, Clone)]
pub struct SimpleResponse {
    pub head: ResponseHead,
    pub body: Option<Bytes>,
}

impl SimpleResponse {
    pub fn new(body: Option<Bytes>) -> Self {
        Self {
            head: ResponseHead::new(APPLICATION_JSON),
            body,
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Replaces the body with `f(body)`.
    pub fn map_body<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Option<Bytes>) -> Option<Bytes>,
    {
        self.body = f(self.body.take());
        self
    }

    pub async fn into_response(self, verbose: bool) -> Response<ResponseBody> {
        if !self.head.delay.is_zero() {
            tokio::time::sleep(self.head.delay).await;
        }
        let body = self.body.unwrap_or_default();
        let mut response = Response::new(Full::new(body.clone()).boxed_unsync());
        *response.status_mut() = self.head.status;
        self.head.apply(response.headers_mut());
        if verbose {
            debug!(
                "Sending response:\n---\n{}---",
                format_response(response.status(), response.headers(), Some(&body[..]))
            );
        }
        response
    }
}

/// A body written as a sequence of text chunks.
#[derive(Debug)]
pub struct StreamResponse {
    pub head: ResponseHead,
    pub chunks: ChunkSource<String>,
    pub chunk_delay: Duration,
}

impl StreamResponse {
    pub fn new(chunks: ChunkSource<String>) -> Self {
        Self {
            head: ResponseHead::new(EVENT_STREAM_UTF8),
            chunks,
            chunk_delay: Duration::ZERO,
        }
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    pub async fn into_response(self, verbose: bool) -> Response<ResponseBody> {
        let body = pump(
            self.chunks.into_stream(),
            Bytes::from,
            self.head.delay,
            self.chunk_delay,
            verbose,
        );
        let mut response = Response::new(body);
        *response.status_mut() = self.head.status;
        let headers = response.headers_mut();
        self.head.apply(headers);
        if !headers.contains_key(CACHE_CONTROL) {
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        }
        if verbose {
            debug!(
                "Sending stream response:\n---\n{}---",
                format_response(response.status(), response.headers(), None)
            );
        }
        response
    }
}

/// A body of server-sent events.
#[derive(Debug)]
pub struct SseResponse {
    pub head: ResponseHead,
    pub events: ChunkSource<SseEvent>,
    pub chunk_delay: Duration,
}

impl SseResponse {
    pub fn new(events: ChunkSource<SseEvent>) -> Self {
        Self {
            head: ResponseHead::new(EVENT_STREAM),
            events,
            chunk_delay: Duration::ZERO,
        }
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    pub async fn into_response(self, verbose: bool) -> Response<ResponseBody> {
        let body = pump(
            self.events.into_stream(),
            |event: SseEvent| Bytes::from(event.encode()),
            self.head.delay,
            self.chunk_delay,
            verbose,
        );
        let mut response = Response::new(body);
        *response.status_mut() = self.head.status;
        let headers = response.headers_mut();
        self.head.apply(headers);
        headers
            .entry(CACHE_CONTROL)
            .or_insert(HeaderValue::from_static("no-store"));
        headers
            .entry(CONNECTION)
            .or_insert(HeaderValue::from_static("keep-alive"));
        headers
            .entry("x-accel-buffering")
            .or_insert(HeaderValue::from_static("no"));
        if verbose {
            debug!(
                "Sending SSE response:\n---\n{}---",
                format_response(response.status(), response.headers(), None)
            );
        }
        response
    }
}

/// What a stub answers with.
#[derive(Debug)]
pub enum ResponseDefinition {
    Simple(SimpleResponse),
    Stream(StreamResponse),
    Sse(SseResponse),
}

impl ResponseDefinition {
    /// `text/plain` body.
    pub fn text(body: impl Into<String>) -> SimpleResponse {
        SimpleResponse::new(Some(Bytes::from(body.into()))).with_content_type(TEXT_PLAIN)
    }

    /// `application/json` body serialized from `value`.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<SimpleResponse, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(SimpleResponse::new(Some(Bytes::from(body))))
    }

    pub fn bytes(body: impl Into<Bytes>) -> SimpleResponse {
        SimpleResponse::new(Some(body.into()))
    }

    /// No body, just a status.
    pub fn status(status: StatusCode) -> SimpleResponse {
        SimpleResponse::new(None).with_status(status)
    }

    pub fn stream<I>(chunks: I) -> StreamResponse
    where
        I: IntoIterator,
        I::Item: Display,
    {
        let chunks = chunks.into_iter().map(|c| c.to_string()).collect();
        StreamResponse::new(ChunkSource::List(chunks))
    }

    pub fn stream_from<S>(chunks: S) -> StreamResponse
    where
        S: Stream + Send + 'static,
        S::Item: Display,
    {
        StreamResponse::new(ChunkSource::from_stream(chunks.map(|c| c.to_string())))
    }

    pub fn try_stream_from<S, T, E>(chunks: S) -> StreamResponse
    where
        S: Stream<Item = Result<T, E>> + Send + 'static,
        T: Display,
        E: Into<BoxError>,
    {
        StreamResponse::new(ChunkSource::from_try_stream(
            chunks.map(|c| c.map(|c| c.to_string())),
        ))
    }

    pub fn sse<I>(events: I) -> SseResponse
    where
        I: IntoIterator<Item = SseEvent>,
    {
        SseResponse::new(ChunkSource::List(events.into_iter().collect()))
    }

    pub fn sse_from<S>(events: S) -> SseResponse
    where
        S: Stream<Item = SseEvent> + Send + 'static,
    {
        SseResponse::new(ChunkSource::from_stream(events))
    }

    /// Like [`ResponseDefinition::sse`], rejecting the first invalid event.
    pub fn try_sse<I>(events: I) -> Result<SseResponse, SseEventError>
    where
        I: IntoIterator<Item = SseEvent>,
    {
        let events = events
            .into_iter()
            .map(|event| event.validate().map(|()| event))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SseResponse::new(ChunkSource::List(events)))
    }

    /// An `Err` item or an invalid event ends the body early.
    pub fn try_sse_from<S, E>(events: S) -> SseResponse
    where
        S: Stream<Item = Result<SseEvent, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        SseResponse::new(ChunkSource::from_try_stream(events.map(|item| {
            let event = item.map_err(|e| -> BoxError { e.into() })?;
            event.validate()?;
            Ok::<_, BoxError>(event)
        })))
    }

    pub fn head(&self) -> &ResponseHead {
        match self {
            ResponseDefinition::Simple(r) => &r.head,
            ResponseDefinition::Stream(r) => &r.head,
            ResponseDefinition::Sse(r) => &r.head,
        }
    }

    pub async fn into_response(self, verbose: bool) -> Response<ResponseBody> {
        match self {
            ResponseDefinition::Simple(r) => r.into_response(verbose).await,
            ResponseDefinition::Stream(r) => r.into_response(verbose).await,
            ResponseDefinition::Sse(r) => r.into_response(verbose).await,
        }
    }
}

impl WithResponseHead for SimpleResponse {
    fn head_mut(&mut self) -> &mut ResponseHead {
        &mut self.head
    }
}

impl WithResponseHead for StreamResponse {
    fn head_mut(&mut self) -> &mut ResponseHead {
        &mut self.head
    }
}

impl WithResponseHead for SseResponse {
    fn head_mut(&mut self) -> &mut ResponseHead {
        &mut self.head
    }
}

impl WithResponseHead for ResponseDefinition {
    fn head_mut(&mut self) -> &mut ResponseHead {
        match self {
            ResponseDefinition::Simple(r) => &mut r.head,
            ResponseDefinition::Stream(r) => &mut r.head,
            ResponseDefinition::Sse(r) => &mut r.head,
        }
    }
}

impl From<SimpleResponse> for ResponseDefinition {
    fn from(r: SimpleResponse) -> Self {
        ResponseDefinition::Simple(r)
    }
}

impl From<StreamResponse> for ResponseDefinition {
    fn from(r: StreamResponse) -> Self {
        ResponseDefinition::Stream(r)
    }
}

impl From<SseResponse> for ResponseDefinition {
    fn from(r: SseResponse) -> Self {
        ResponseDefinition::Sse(r)
    }
}
