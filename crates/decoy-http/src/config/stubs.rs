//! Declarative stubs, loadable from YAML or JSON.
//!
//! ```yaml
//! stubs:
//!   - name: ping
//!     request:
//!       method: POST
//!       path: /ping
//!       body:
//!         - contains: Ping
//!     response:
//!       body: Pong
//!       content_type: text/plain
//! ```

use crate::error::{BoxError, ConfigError};
use crate::predicate::StringMatcher;
use crate::request::{
    body_text_matches, header_eq, header_matches, path_matches, CapturedRequest,
    RequestSpecification,
};
use crate::response::{
    ResponseDefinition, SimpleResponse, SseEvent, WithResponseHead,
};
use crate::stub::{Responder, Stub, StubConfiguration};
use async_trait::async_trait;
use hyper::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StubDefinition {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub remove_after_match: bool,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub request: RequestDefinition,
    #[serde(default)]
    pub response: ResponseTemplate,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestDefinition {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub path: Option<PathDefinition>,
    #[serde(default)]
    pub headers: Vec<HeaderDefinition>,
    /// Matchers over the body text; all must hold.
    #[serde(default)]
    pub body: Vec<StringMatcher>,
    #[serde(default = "default_case_sensitive")]
    pub case_sensitive: bool,
}

fn default_case_sensitive() -> bool {
    true
}

impl Default for RequestDefinition {
    fn default() -> Self {
        Self {
            method: None,
            path: None,
            headers: Vec::new(),
            body: Vec::new(),
            case_sensitive: true,
        }
    }
}

/// `path: /ping` or `path: { startsWith: /api }`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum PathDefinition {
    Exact(String),
    Matcher(StringMatcher),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum HeaderDefinition {
    /// `{ name: X-Api-Key, value: secret }`
    Exact { name: String, value: String },
    /// `{ name: X-Trace, exists: true }`
    Matcher {
        name: String,
        #[serde(flatten)]
        matcher: StringMatcher,
    },
}

/// Response half of a declarative stub.
///
/// `events` makes an SSE response, `chunks` a chunked stream; otherwise the
/// response is simple. A string `body` is sent as text, any other JSON value
/// is serialized as JSON.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResponseTemplate {
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
    #[serde(default)]
    pub chunks: Vec<String>,
    #[serde(default)]
    pub events: Vec<SseEvent>,
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default)]
    pub chunk_delay_ms: u64,
}

fn default_status() -> u16 {
    200
}

impl Default for ResponseTemplate {
    fn default() -> Self {
        Self {
            status: default_status(),
            headers: BTreeMap::new(),
            content_type: None,
            body: None,
            chunks: Vec::new(),
            events: Vec::new(),
            delay_ms: 0,
            chunk_delay_ms: 0,
        }
    }
}

impl ResponseTemplate {
    pub fn validate(&self) -> Result<(), ConfigError> {
        StatusCode::from_u16(self.status)
            .map_err(|_| ConfigError::Invalid(format!("invalid status code {}", self.status)))?;
        let shapes = [
            self.body.is_some(),
            !self.chunks.is_empty(),
            !self.events.is_empty(),
        ];
        if shapes.iter().filter(|set| **set).count() > 1 {
            return Err(ConfigError::Invalid(
                "a response may set only one of body, chunks or events".to_string(),
            ));
        }
        for (index, event) in self.events.iter().enumerate() {
            event
                .validate()
                .map_err(|e| ConfigError::Invalid(format!("events[{index}]: {e}")))?;
        }
        Ok(())
    }

    pub fn render(&self) -> Result<ResponseDefinition, ConfigError> {
        let status = StatusCode::from_u16(self.status)
            .map_err(|_| ConfigError::Invalid(format!("invalid status code {}", self.status)))?;
        let chunk_delay = Duration::from_millis(self.chunk_delay_ms);

        let mut definition: ResponseDefinition = if !self.events.is_empty() {
            ResponseDefinition::try_sse(self.events.iter().cloned())
                .map_err(|e| ConfigError::Invalid(e.to_string()))?
                .with_chunk_delay(chunk_delay)
                .into()
        } else if !self.chunks.is_empty() {
            ResponseDefinition::stream(self.chunks.iter())
                .with_chunk_delay(chunk_delay)
                .into()
        } else {
            match &self.body {
                None => SimpleResponse::new(None).into(),
                Some(serde_json::Value::String(text)) => ResponseDefinition::text(text.clone()).into(),
                Some(value) => ResponseDefinition::json(value)?.into(),
            }
        };

        definition = definition
            .with_status(status)
            .with_delay(Duration::from_millis(self.delay_ms));
        if let Some(content_type) = &self.content_type {
            definition = definition.with_content_type(content_type.clone());
        }
        for (name, value) in &self.headers {
            definition = definition.with_header(name.clone(), value.clone());
        }
        Ok(definition)
    }
}

/// Renders a fresh definition from the template on every match.
struct TemplateResponder {
    template: ResponseTemplate,
}

#[async_trait]
impl Responder for TemplateResponder {
    async fn respond(&self, _request: CapturedRequest) -> Result<ResponseDefinition, BoxError> {
        Ok(self.template.render()?)
    }
}

impl StubDefinition {
    /// Compiles the definition into a registrable stub.
    pub fn build(&self) -> Result<Stub, ConfigError> {
        let request = &self.request;
        let case_sensitive = request.case_sensitive;
        let mut spec = RequestSpecification::text();

        if let Some(method) = &request.method {
            let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                .map_err(|_| ConfigError::Invalid(format!("invalid method {method:?}")))?;
            spec = spec.method(method);
        }
        match &request.path {
            Some(PathDefinition::Exact(path)) => spec = spec.path(path.clone()),
            Some(PathDefinition::Matcher(matcher)) => {
                spec = spec.path_matcher(path_matches(matcher, case_sensitive)?)
            }
            None => {}
        }
        for header in &request.headers {
            let matcher = match header {
                HeaderDefinition::Exact { name, value } => header_eq(name, value.clone())
                    .map_err(|e| ConfigError::Invalid(format!("header {name:?}: {e}")))?,
                HeaderDefinition::Matcher { name, matcher } => {
                    header_matches(name, matcher, case_sensitive)?
                }
            };
            spec = spec.header_matcher(matcher);
        }
        for matcher in &request.body {
            spec = spec.body_text_matcher(body_text_matches(matcher, case_sensitive)?);
        }
        if let Some(priority) = self.priority {
            spec = spec.priority(priority);
        }

        self.response.validate()?;
        let configuration = StubConfiguration {
            name: self.name.clone(),
            remove_after_match: self.remove_after_match,
            verbose: self.verbose,
        };
        Ok(Stub::new(
            configuration,
            spec.build(),
            TemplateResponder {
                template: self.response.clone(),
            },
        ))
    }
}
