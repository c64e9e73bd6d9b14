//! Declarative string predicates.
//!
//! `StringMatcher` is the serializable form used by configuration files;
//! `CompiledStringMatcher` is what request matchers evaluate at runtime.

mod string_matcher;

pub use string_matcher::{CompiledStringMatcher, StringMatcher};
