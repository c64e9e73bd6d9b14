use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-stub settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct StubConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Unregister the stub the first time it is selected.
    #[serde(default)]
    pub remove_after_match: bool,
    /// Log request/response detail for this stub even when the server is quiet.
    #[serde(default)]
    pub verbose: bool,
}

impl StubConfiguration {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn remove_after_match(mut self, remove: bool) -> Self {
        self.remove_after_match = remove;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl fmt::Display for StubConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StubConfiguration(name={}, remove_after_match={}, verbose={})",
            self.name.as_deref().unwrap_or("-"),
            self.remove_after_match,
            self.verbose
        )
    }
}
