//! Stubs and the registry that selects among them.
//!
//! # Module Structure
//!
//! - `config` - Per-stub settings (name, remove-after-match, verbose)
//! - `responder` - Produces a response definition for a matched request
//! - `core` - The stub itself: identity, ordering, match counter
//! - `registry` - Ordered, concurrently readable stub collection

mod config;
mod core;
mod registry;
mod responder;

pub use self::core::Stub;
pub use config::StubConfiguration;
pub use registry::StubRegistry;
pub use responder::{respond_with, FnResponder, Responder};
