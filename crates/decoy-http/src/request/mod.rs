//! Request-side types: the captured live request, matchers over it, the
//! specification a stub matches with, and the journal of observed requests.
//!
//! # Module Structure
//!
//! - `captured` - Live request with a lazily read, cached body
//! - `matcher` - Described predicates and the stock constructors
//! - `decoder` - Body decoders (JSON, text)
//! - `specification` - Conjunctive request specification and its builder
//! - `recorded` - Immutable request snapshots
//! - `journal` - Matched/unmatched request journal

mod captured;
mod decoder;
mod journal;
mod matcher;
mod recorded;
mod specification;

pub use captured::CapturedRequest;
pub use decoder::BodyDecoder;
pub use journal::{JournalMode, RequestJournal};
pub use matcher::{
    body_contains, body_predicate, body_text_matches, body_text_predicate, header_eq,
    header_exists, header_matches, method_eq, path_eq, path_matches, Matcher,
};
pub(crate) use matcher::panic_message;
pub use recorded::RecordedRequest;
pub use specification::{
    RequestMatch, RequestSpecification, RequestSpecificationBuilder, DEFAULT_STUB_PRIORITY,
};
