//! Request specifications: the matcher set a stub applies to each request.
//!
//! Built with [`RequestSpecification::text`] or one of the typed-body
//! constructors. Every matcher must accept the request for the stub to match.

use super::captured::CapturedRequest;
use super::decoder::BodyDecoder;
use super::matcher::{body_contains, method_eq, path_eq, Matcher};
use crate::error::MatchError;
use async_trait::async_trait;
use hyper::{HeaderMap, Method};
use serde::de::DeserializeOwned;
use std::fmt::{self, Write as _};
use tracing::debug;

/// Priority given to stubs that do not set one; lower values win.
pub const DEFAULT_STUB_PRIORITY: i32 = i32::MAX;

/// Type-erased view of a specification, as held by stubs in the registry.
#[async_trait]
pub trait RequestMatch: Send + Sync {
    /// `Ok(true)` when every criterion holds. Criteria are checked in order
    /// (method, path, headers, typed body, body text) and checking stops at
    /// the first one that fails.
    async fn matches(&self, request: &CapturedRequest) -> Result<bool, MatchError>;

    fn priority(&self) -> i32;

    /// Multi-line human readable form used in logs and verification errors.
    fn describe(&self) -> String;
}

/// Conjunction of request criteria, with a body payload type `P` for typed
/// body matchers.
pub struct RequestSpecification<P> {
    method: Option<Matcher<Method>>,
    path: Option<Matcher<str>>,
    headers: Vec<Matcher<HeaderMap>>,
    body: Vec<Matcher<P>>,
    body_text: Vec<Matcher<str>>,
    priority: Option<i32>,
    decoder: BodyDecoder<P>,
}

impl RequestSpecification<String> {
    /// Builder whose typed body is the raw text.
    pub fn text() -> RequestSpecificationBuilder<String> {
        RequestSpecificationBuilder::new(BodyDecoder::text())
    }
}

impl<P: DeserializeOwned + 'static> RequestSpecification<P> {
    /// Builder whose typed body is decoded from JSON.
    pub fn json() -> RequestSpecificationBuilder<P> {
        RequestSpecificationBuilder::new(BodyDecoder::json())
    }
}

impl<P> RequestSpecification<P> {
    pub fn builder(decoder: BodyDecoder<P>) -> RequestSpecificationBuilder<P> {
        RequestSpecificationBuilder::new(decoder)
    }

    pub fn priority(&self) -> i32 {
        self.priority.unwrap_or(DEFAULT_STUB_PRIORITY)
    }

    pub async fn matches(&self, request: &CapturedRequest) -> Result<bool, MatchError> {
        Ok(self.match_method(request)?
            && self.match_path(request)?
            && all(&self.headers, request.headers())?
            && self.match_body(request).await?
            && self.match_body_text(request).await?)
    }

    fn match_method(&self, request: &CapturedRequest) -> Result<bool, MatchError> {
        match &self.method {
            Some(m) => m.test(request.method()),
            None => Ok(true),
        }
    }

    fn match_path(&self, request: &CapturedRequest) -> Result<bool, MatchError> {
        match &self.path {
            Some(m) => m.test(request.path()),
            None => Ok(true),
        }
    }

    async fn match_body(&self, request: &CapturedRequest) -> Result<bool, MatchError> {
        if self.body.is_empty() {
            return Ok(true);
        }
        let bytes = request.body_bytes().await?;
        let payload = match self.decoder.decode(&bytes) {
            Ok(payload) => payload,
            Err(cause) => {
                debug!(
                    "Request body: {}. Cause: not decodable as {}: {}",
                    String::from_utf8_lossy(&bytes),
                    self.decoder.name(),
                    cause
                );
                return Ok(false);
            }
        };
        all(&self.body, &payload)
    }

    async fn match_body_text(&self, request: &CapturedRequest) -> Result<bool, MatchError> {
        if self.body_text.is_empty() {
            return Ok(true);
        }
        let bytes = request.body_bytes().await?;
        let text = String::from_utf8_lossy(&bytes);
        all(&self.body_text, &*text)
    }

    pub fn describe(&self) -> String {
        let mut out = String::new();
        if let Some(method) = &self.method {
            let _ = writeln!(out, "method: {method}");
        }
        if let Some(path) = &self.path {
            let _ = writeln!(out, "path: {path}");
        }
        if !self.headers.is_empty() {
            let _ = writeln!(out, "headers: {}", join(&self.headers));
        }
        if !self.body.is_empty() {
            let _ = writeln!(out, "body ({}): {}", self.decoder.name(), join(&self.body));
        }
        if !self.body_text.is_empty() {
            let _ = writeln!(out, "bodyText: {}", join(&self.body_text));
        }
        if let Some(priority) = self.priority {
            let _ = writeln!(out, "priority: {priority}");
        }
        out
    }
}

fn all<T: ?Sized>(matchers: &[Matcher<T>], value: &T) -> Result<bool, MatchError> {
    for matcher in matchers {
        if !matcher.test(value)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn join<T: ?Sized>(matchers: &[Matcher<T>]) -> String {
    let parts: Vec<&str> = matchers.iter().map(Matcher::description).collect();
    format!("[{}]", parts.join(", "))
}

#[async_trait]
impl<P: Send + 'static> RequestMatch for RequestSpecification<P> {
    async fn matches(&self, request: &CapturedRequest) -> Result<bool, MatchError> {
        RequestSpecification::matches(self, request).await
    }

    fn priority(&self) -> i32 {
        RequestSpecification::priority(self)
    }

    fn describe(&self) -> String {
        RequestSpecification::describe(self)
    }
}

impl<P> fmt::Debug for RequestSpecification<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSpecification")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("body_text", &self.body_text)
            .field("priority", &self.priority)
            .field("decoder", &self.decoder)
            .finish()
    }
}

/// Accumulates criteria for a `RequestSpecification`.
pub struct RequestSpecificationBuilder<P> {
    spec: RequestSpecification<P>,
}

impl<P> RequestSpecificationBuilder<P> {
    pub fn new(decoder: BodyDecoder<P>) -> Self {
        Self {
            spec: RequestSpecification {
                method: None,
                path: None,
                headers: Vec::new(),
                body: Vec::new(),
                body_text: Vec::new(),
                priority: None,
                decoder,
            },
        }
    }

    pub fn method(self, method: Method) -> Self {
        self.method_matcher(method_eq(method))
    }

    pub fn method_matcher(mut self, matcher: Matcher<Method>) -> Self {
        self.spec.method = Some(matcher);
        self
    }

    pub fn path(self, path: impl Into<String>) -> Self {
        self.path_matcher(path_eq(path))
    }

    pub fn path_matcher(mut self, matcher: Matcher<str>) -> Self {
        self.spec.path = Some(matcher);
        self
    }

    pub fn header_matcher(mut self, matcher: Matcher<HeaderMap>) -> Self {
        self.spec.headers.push(matcher);
        self
    }

    /// Adds a predicate over the decoded body.
    pub fn body<F>(self, description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&P) -> bool + Send + Sync + 'static,
    {
        self.body_matcher(Matcher::new(description, predicate))
    }

    pub fn body_matcher(mut self, matcher: Matcher<P>) -> Self {
        self.spec.body.push(matcher);
        self
    }

    /// Requires the raw body text to contain every one of `needles`.
    pub fn body_contains<I, S>(mut self, needles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec
            .body_text
            .extend(needles.into_iter().map(|needle| body_contains(needle)));
        self
    }

    pub fn body_text_matcher(mut self, matcher: Matcher<str>) -> Self {
        self.spec.body_text.push(matcher);
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.spec.priority = Some(priority);
        self
    }

    pub fn build(self) -> RequestSpecification<P> {
        self.spec
    }
}
