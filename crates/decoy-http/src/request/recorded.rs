use super::captured::CapturedRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Immutable snapshot of an inbound request, as kept in the journal.
///
/// Holds no reference to the connection or body. Displays as `METHOD uri`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedRequest {
    pub method: String,
    pub uri: String,
    /// Header name (lowercase) to every value received for it.
    pub headers: BTreeMap<String, Vec<String>>,
    pub timestamp: DateTime<Utc>,
}

impl RecordedRequest {
    pub fn from_captured(request: &CapturedRequest) -> Self {
        let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in request.headers() {
            headers
                .entry(name.as_str().to_string())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }
        Self {
            method: request.method().as_str().to_string(),
            uri: request.uri().to_string(),
            headers,
            timestamp: Utc::now(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

impl fmt::Display for RecordedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::{HeaderMap, Method, Uri};

    #[test]
    fn test_snapshot_keeps_repeated_headers() {
        let mut headers = HeaderMap::new();
        headers.append("Accept", "text/plain".parse().unwrap());
        headers.append("accept", "application/json".parse().unwrap());
        let request = CapturedRequest::from_parts(
            Method::GET,
            Uri::from_static("/search?q=rust"),
            headers,
            "",
        );

        let recorded = RecordedRequest::from_captured(&request);
        assert_eq!(recorded.to_string(), "GET /search?q=rust");
        assert_eq!(
            recorded.headers["accept"],
            vec!["text/plain".to_string(), "application/json".to_string()]
        );
        assert_eq!(recorded.header("ACCEPT"), Some("text/plain"));
    }

    #[test]
    fn test_serializes_camel_case_with_rfc3339_timestamp() {
        let request = CapturedRequest::from_parts(
            Method::POST,
            Uri::from_static("/x"),
            HeaderMap::new(),
            "",
        );
        let json = serde_json::to_value(RecordedRequest::from_captured(&request)).unwrap();
        assert_eq!(json["method"], "POST");
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }
}
