//! Request journal for matched and unmatched requests.

use super::recorded::RecordedRequest;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// Which requests the journal keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    /// Only requests that matched no stub
    #[default]
    Lean,
    /// Matched and unmatched requests alike
    Full,
}

impl FromStr for JournalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lean" => Ok(JournalMode::Lean),
            "full" => Ok(JournalMode::Full),
            other => Err(format!("unknown journal mode '{other}' (expected lean or full)")),
        }
    }
}

type Entries = Arc<Vec<RecordedRequest>>;

/// Append-only record of requests seen by the server.
///
/// Appends are lock-free copy-on-write swaps; readers get an `Arc` snapshot
/// that later appends never touch.
#[derive(Debug)]
pub struct RequestJournal {
    mode: JournalMode,
    matched: ArcSwap<Vec<RecordedRequest>>,
    unmatched: ArcSwap<Vec<RecordedRequest>>,
}

impl RequestJournal {
    pub fn new(mode: JournalMode) -> Self {
        Self {
            mode,
            matched: ArcSwap::from_pointee(Vec::new()),
            unmatched: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn mode(&self) -> JournalMode {
        self.mode
    }

    /// No-op in `Lean` mode.
    pub fn record_matched(&self, request: RecordedRequest) {
        if self.mode == JournalMode::Full {
            append(&self.matched, request);
        }
    }

    pub fn record_unmatched(&self, request: RecordedRequest) {
        append(&self.unmatched, request);
    }

    /// Always empty in `Lean` mode.
    pub fn matched(&self) -> Entries {
        self.matched.load_full()
    }

    pub fn unmatched(&self) -> Entries {
        self.unmatched.load_full()
    }

    pub fn clear(&self) {
        self.matched.store(Arc::new(Vec::new()));
        self.unmatched.store(Arc::new(Vec::new()));
    }
}

impl Default for RequestJournal {
    fn default() -> Self {
        Self::new(JournalMode::default())
    }
}

fn append(list: &ArcSwap<Vec<RecordedRequest>>, request: RecordedRequest) {
    list.rcu(|current| {
        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(request.clone());
        next
    });
}
