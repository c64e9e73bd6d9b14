use crate::error::{BodyError, BoxError};
use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::Body;
use hyper::http::request::Parts;
use hyper::{HeaderMap, Method, Request, Uri, Version};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;

use super::decoder::BodyDecoder;

type RawBody = UnsyncBoxBody<Bytes, BoxError>;

enum BodyState {
    Pending(RawBody),
    /// Taken by a reader that has not finished; stays here if that reader is cancelled.
    Reading,
    Done,
    Failed(String),
}

struct Inner {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    body: Mutex<BodyState>,
    cached: OnceLock<Bytes>,
}

/// A live inbound request.
///
/// Method, URI and headers are available synchronously. The body is read from
/// the connection at most once, on first demand, and cached for every later
/// reader. Cloning is cheap and clones share the cache.
#[derive(Clone)]
pub struct CapturedRequest {
    inner: Arc<Inner>,
}

impl CapturedRequest {
    pub fn new<B>(request: Request<B>) -> Self
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = request.into_parts();
        let body = body.map_err(|e| -> BoxError { e.into() }).boxed_unsync();
        Self::with_state(parts, BodyState::Pending(body), None)
    }

    /// Builds a request whose body is already in memory.
    pub fn from_parts(method: Method, uri: Uri, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let mut request = Request::new(Empty::<Bytes>::new());
        *request.method_mut() = method;
        *request.uri_mut() = uri;
        *request.headers_mut() = headers;
        let (parts, _) = request.into_parts();
        Self::with_state(parts, BodyState::Done, Some(body.into()))
    }

    fn with_state(parts: Parts, state: BodyState, cached: Option<Bytes>) -> Self {
        let cell = OnceLock::new();
        if let Some(bytes) = cached {
            let _ = cell.set(bytes);
        }
        Self {
            inner: Arc::new(Inner {
                method: parts.method,
                uri: parts.uri,
                version: parts.version,
                headers: parts.headers,
                body: Mutex::new(state),
                cached: cell,
            }),
        }
    }

    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    pub fn uri(&self) -> &Uri {
        &self.inner.uri
    }

    pub fn path(&self) -> &str {
        self.inner.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.inner.uri.query()
    }

    pub fn version(&self) -> Version {
        self.inner.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    /// First value of the named header, if it is valid visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body bytes if a reader has already pulled them off the connection.
    pub fn cached_body(&self) -> Option<&Bytes> {
        self.inner.cached.get()
    }

    /// Reads the body, or returns the cached copy.
    ///
    /// Concurrent callers serialize on the body lock; exactly one of them
    /// drains the connection.
    pub async fn body_bytes(&self) -> Result<Bytes, BodyError> {
        if let Some(bytes) = self.inner.cached.get() {
            return Ok(bytes.clone());
        }
        let mut state = self.inner.body.lock().await;
        if let Some(bytes) = self.inner.cached.get() {
            return Ok(bytes.clone());
        }
        match std::mem::replace(&mut *state, BodyState::Reading) {
            BodyState::Pending(body) => match body.collect().await {
                Ok(collected) => {
                    let bytes = collected.to_bytes();
                    let _ = self.inner.cached.set(bytes.clone());
                    *state = BodyState::Done;
                    Ok(bytes)
                }
                Err(e) => {
                    let message = e.to_string();
                    *state = BodyState::Failed(message.clone());
                    Err(BodyError::Read(message))
                }
            },
            BodyState::Failed(message) => {
                *state = BodyState::Failed(message.clone());
                Err(BodyError::Read(message))
            }
            BodyState::Reading => Err(BodyError::Read(
                "a previous read of the body was interrupted".to_string(),
            )),
            BodyState::Done => {
                *state = BodyState::Done;
                Ok(self.inner.cached.get().cloned().unwrap_or_default())
            }
        }
    }

    /// Body as UTF-8 text (lossy). `None` when the body is empty.
    pub async fn body_text(&self) -> Result<Option<String>, BodyError> {
        let bytes = self.body_bytes().await?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    pub async fn body_as<P>(&self, decoder: &BodyDecoder<P>) -> Result<P, BodyError> {
        let bytes = self.body_bytes().await?;
        decoder
            .decode(&bytes)
            .map_err(|e| BodyError::Decode(decoder.name(), e.to_string()))
    }

    pub async fn body_json<P: DeserializeOwned + 'static>(&self) -> Result<P, BodyError> {
        self.body_as(&BodyDecoder::<P>::json()).await
    }

    /// Reassembles an owned `Request` carrying the body read so far.
    pub async fn to_request(&self) -> Result<Request<Full<Bytes>>, BodyError> {
        let body = self.body_bytes().await?;
        let mut request = Request::new(Full::new(body));
        *request.method_mut() = self.inner.method.clone();
        *request.uri_mut() = self.inner.uri.clone();
        *request.version_mut() = self.inner.version;
        *request.headers_mut() = self.inner.headers.clone();
        Ok(request)
    }
}

impl fmt::Debug for CapturedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedRequest")
            .field("method", &self.inner.method)
            .field("uri", &self.inner.uri)
            .field("body_cached", &self.inner.cached.get().is_some())
            .finish()
    }
}
