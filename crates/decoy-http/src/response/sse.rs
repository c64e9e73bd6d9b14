use crate::error::SseEventError;
use serde::{Deserialize, Serialize};

/// One server-sent event.
///
/// Encoded as `field: value` lines terminated by a blank line. Multi-line
/// values become one line per field occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SseEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Reconnection time in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl SseEvent {
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            data: Some(data.into()),
            ..Self::default()
        }
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_retry(mut self, millis: u64) -> Self {
        self.retry = Some(millis);
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Checks that `event` and `id` survive encoding as one field each.
    ///
    /// `data` and `comment` may span lines. Clients drop ids containing NUL.
    pub fn validate(&self) -> Result<(), SseEventError> {
        if self.event.as_deref().is_some_and(is_multi_line) {
            return Err(SseEventError::MultiLine("event"));
        }
        if let Some(id) = &self.id {
            if is_multi_line(id) {
                return Err(SseEventError::MultiLine("id"));
            }
            if id.contains('\0') {
                return Err(SseEventError::NulInId);
            }
        }
        Ok(())
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        if let Some(data) = &self.data {
            push_field(&mut out, "data", data);
        }
        if let Some(event) = &self.event {
            push_field(&mut out, "event", event);
        }
        if let Some(id) = &self.id {
            push_field(&mut out, "id", id);
        }
        if let Some(retry) = self.retry {
            push_field(&mut out, "retry", &retry.to_string());
        }
        if let Some(comment) = &self.comment {
            push_field(&mut out, "", comment);
        }
        out.push('\n');
        out
    }
}

fn is_multi_line(value: &str) -> bool {
    value.contains(['\r', '\n'])
}

fn push_field(out: &mut String, name: &str, value: &str) {
    for line in value.split('\n') {
        out.push_str(name);
        out.push_str(": ");
        out.push_str(line.strip_suffix('\r').unwrap_or(line));
        out.push('\n');
    }
}
