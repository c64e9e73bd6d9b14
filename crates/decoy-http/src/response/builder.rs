use super::ResponseBody;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::CONTENT_TYPE;
use hyper::http::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Response, StatusCode};
use std::str::FromStr;

/// Builds responses the server itself originates (no match, responder
/// failure). Always `text/plain` unless overridden.
pub struct PlainResponseBuilder {
    status: StatusCode,
    body: Option<String>,
    headers: HeaderMap,
}

impl PlainResponseBuilder {
    pub fn new(status: StatusCode) -> Self {
        PlainResponseBuilder {
            status,
            body: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Invalid names or values are dropped.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (HeaderName::from_str(name), HeaderValue::from_str(value)) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn build(self) -> Response<ResponseBody> {
        let payload = self.body.map(Bytes::from).unwrap_or_default();
        let mut response = Response::new(Full::new(payload).boxed_unsync());
        *response.status_mut() = self.status;
        let headers = response.headers_mut();
        headers.extend(self.headers);
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
        }
        response
    }
}
