//! Error types shared across the crate.

use std::time::Duration;

/// Boxed error accepted from user callbacks (responders, fallible predicates,
/// body decoders, chunk streams).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by stub registry mutations.
#[derive(Debug, thiserror::Error)]
pub enum StubError {
    #[error("Duplicate stub detected: {0}")]
    Duplicate(String),
}

/// Errors raised while reading or decoding a request body.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BodyError {
    #[error("Failed to read request body: {0}")]
    Read(String),
    #[error("Failed to decode request body as {0}: {1}")]
    Decode(&'static str, String),
}

/// A matcher could not produce a verdict.
///
/// The registry treats this as a non-match for the stub being evaluated.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("Matcher '{0}' failed: {1}")]
    Failed(String, String),
    #[error("Matcher '{0}' panicked: {1}")]
    Panicked(String, String),
    #[error(transparent)]
    Body(#[from] BodyError),
}

/// An SSE event that cannot be encoded faithfully.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SseEventError {
    #[error("SSE {0} field must be a single line")]
    MultiLine(&'static str),
    #[error("SSE id field must not contain NUL")]
    NulInId,
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid regex: {0}")]
    Regex(#[from] regex::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised by the server lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {0}: {1}")]
    Bind(String, #[source] std::io::Error),
    #[error("Shutdown grace period must not be negative, got {0}ms")]
    NegativeGracePeriod(i64),
    #[error("Shutdown timeout must not be negative, got {0}ms")]
    NegativeTimeout(i64),
    #[error("Shutdown timeout {timeout:?} is shorter than grace period {grace_period:?}")]
    TimeoutBeforeGrace {
        grace_period: Duration,
        timeout: Duration,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Stub(#[from] StubError),
}

/// Verification failures, carrying the offending stubs or requests.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("The following stubs were not matched: {}", .0.join(", "))]
    UnmatchedStubs(Vec<String>),
    #[error("The following requests were unexpected: {}", .0.join(", "))]
    UnexpectedRequests(Vec<String>),
}
