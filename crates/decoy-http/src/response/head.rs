use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::{HeaderMap, StatusCode};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Callback that edits response headers before they are sent.
pub type HeadersFn = Arc<dyn Fn(&mut HeaderMap) + Send + Sync>;

/// Everything about a response except its body.
#[derive(Clone)]
pub struct ResponseHead {
    pub status: StatusCode,
    /// Applied only when no `Content-Type` header was set another way.
    pub content_type: String,
    /// Appended in order, so repeated names produce repeated headers.
    pub headers: Vec<(String, String)>,
    pub headers_fn: Option<HeadersFn>,
    /// Wait before the first byte of the body.
    pub delay: Duration,
}

impl ResponseHead {
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: content_type.into(),
            headers: Vec::new(),
            headers_fn: None,
            delay: Duration::ZERO,
        }
    }

    /// Callback first, then the header list, then the default content type.
    pub fn apply(&self, headers: &mut HeaderMap) {
        if let Some(edit) = &self.headers_fn {
            edit(headers);
        }
        for (name, value) in &self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => warn!("Skipping invalid response header {}: {}", name, value),
            }
        }
        if !headers.contains_key(CONTENT_TYPE) {
            match HeaderValue::from_str(&self.content_type) {
                Ok(value) => {
                    headers.insert(CONTENT_TYPE, value);
                }
                Err(_) => warn!("Skipping invalid content type {}", self.content_type),
            }
        }
    }
}

impl fmt::Debug for ResponseHead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseHead")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("headers", &self.headers)
            .field("headers_fn", &self.headers_fn.is_some())
            .field("delay", &self.delay)
            .finish()
    }
}

/// Fluent setters shared by every response definition.
pub trait WithResponseHead: Sized {
    fn head_mut(&mut self) -> &mut ResponseHead;

    fn with_status(mut self, status: StatusCode) -> Self {
        self.head_mut().status = status;
        self
    }

    fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.head_mut().headers.push((name.into(), value.into()));
        self
    }

    fn with_headers<F>(mut self, edit: F) -> Self
    where
        F: Fn(&mut HeaderMap) + Send + Sync + 'static,
    {
        self.head_mut().headers_fn = Some(Arc::new(edit));
        self
    }

    fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.head_mut().content_type = content_type.into();
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.head_mut().delay = delay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_order_and_default_content_type() {
        let mut head = ResponseHead::new("application/json");
        head.headers.push(("x-tag".to_string(), "b".to_string()));
        head.headers_fn = Some(Arc::new(|h: &mut HeaderMap| {
            h.insert("x-tag", HeaderValue::from_static("a"));
        }));

        let mut headers = HeaderMap::new();
        head.apply(&mut headers);

        let tags: Vec<_> = headers.get_all("x-tag").iter().collect();
        assert_eq!(tags, vec!["a", "b"]);
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn test_explicit_content_type_wins() {
        let mut head = ResponseHead::new("application/json");
        head.headers
            .push(("Content-Type".to_string(), "text/csv".to_string()));

        let mut headers = HeaderMap::new();
        head.apply(&mut headers);
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "text/csv");
        assert_eq!(headers.get_all(CONTENT_TYPE).iter().count(), 1);
    }
}
