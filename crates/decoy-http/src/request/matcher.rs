//! Individual request matchers and the helpers that build them.

use crate::error::{BoxError, MatchError};
use crate::predicate::{CompiledStringMatcher, StringMatcher};
use hyper::header::HeaderName;
use hyper::{HeaderMap, Method};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

type TestFn<T> = dyn Fn(&T) -> Result<bool, BoxError> + Send + Sync;

/// A described predicate over one facet of a request.
///
/// Evaluation never unwinds into the caller: an `Err` from a fallible
/// predicate or a panic inside it comes back as a `MatchError` naming the
/// matcher.
pub struct Matcher<T: ?Sized> {
    description: String,
    test: Arc<TestFn<T>>,
}

impl<T: ?Sized> Matcher<T> {
    pub fn new<F>(description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self::fallible(description, move |value: &T| Ok(predicate(value)))
    }

    pub fn fallible<F>(description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&T) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            test: Arc::new(predicate),
        }
    }

    pub fn test(&self, value: &T) -> Result<bool, MatchError> {
        match panic::catch_unwind(AssertUnwindSafe(|| (self.test)(value))) {
            Ok(Ok(passed)) => Ok(passed),
            Ok(Err(e)) => Err(MatchError::Failed(self.description.clone(), e.to_string())),
            Err(payload) => Err(MatchError::Panicked(
                self.description.clone(),
                panic_message(&*payload),
            )),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl<T: ?Sized> Clone for Matcher<T> {
    fn clone(&self) -> Self {
        Self {
            description: self.description.clone(),
            test: Arc::clone(&self.test),
        }
    }
}

impl<T: ?Sized> fmt::Display for Matcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

impl<T: ?Sized> fmt::Debug for Matcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Matcher").field(&self.description).finish()
    }
}

pub fn method_eq(method: Method) -> Matcher<Method> {
    let description = format!("method == {method}");
    Matcher::new(description, move |m: &Method| *m == method)
}

pub fn path_eq(path: impl Into<String>) -> Matcher<str> {
    let path = path.into();
    Matcher::new(format!("path == {path:?}"), move |p: &str| p == path)
}

pub fn path_matches(
    matcher: &StringMatcher,
    case_sensitive: bool,
) -> Result<Matcher<str>, regex::Error> {
    let compiled = CompiledStringMatcher::compile(matcher, case_sensitive)?;
    Ok(Matcher::new(format!("path {compiled}"), move |p: &str| {
        compiled.matches(Some(p))
    }))
}

/// Any value of the header equals `value`. Names compare case-insensitively.
pub fn header_eq(name: &str, value: impl Into<String>) -> Result<Matcher<HeaderMap>, hyper::http::Error> {
    let header = HeaderName::from_bytes(name.as_bytes())?;
    let value = value.into();
    Ok(Matcher::new(
        format!("header {header} == {value:?}"),
        move |headers: &HeaderMap| {
            headers
                .get_all(&header)
                .iter()
                .any(|v| v.to_str().map(|s| s == value).unwrap_or(false))
        },
    ))
}

pub fn header_exists(name: &str) -> Result<Matcher<HeaderMap>, hyper::http::Error> {
    let header = HeaderName::from_bytes(name.as_bytes())?;
    Ok(Matcher::new(
        format!("header {header} exists"),
        move |headers: &HeaderMap| headers.contains_key(&header),
    ))
}

/// Header-level `StringMatcher`. A missing header is evaluated as an absent
/// value, so `exists: false` matches it.
pub fn header_matches(
    name: &str,
    matcher: &StringMatcher,
    case_sensitive: bool,
) -> Result<Matcher<HeaderMap>, crate::error::ConfigError> {
    let header = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| crate::error::ConfigError::Invalid(format!("header name {name:?}: {e}")))?;
    let compiled = CompiledStringMatcher::compile(matcher, case_sensitive)?;
    Ok(Matcher::new(
        format!("header {header} {compiled}"),
        move |headers: &HeaderMap| {
            let mut values = headers
                .get_all(&header)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .peekable();
            if values.peek().is_none() {
                compiled.matches(None)
            } else {
                values.any(|v| compiled.matches(Some(v)))
            }
        },
    ))
}

pub fn body_predicate<P, F>(description: impl Into<String>, predicate: F) -> Matcher<P>
where
    F: Fn(&P) -> bool + Send + Sync + 'static,
{
    Matcher::new(description, predicate)
}

pub fn body_text_predicate<F>(description: impl Into<String>, predicate: F) -> Matcher<str>
where
    F: Fn(&str) -> bool + Send + Sync + 'static,
{
    Matcher::new(description, predicate)
}

pub fn body_contains(needle: impl Into<String>) -> Matcher<str> {
    let needle = needle.into();
    Matcher::new(format!("body contains {needle:?}"), move |body: &str| {
        body.contains(needle.as_str())
    })
}

/// Body-text `StringMatcher`. An empty body counts as absent.
pub fn body_text_matches(
    matcher: &StringMatcher,
    case_sensitive: bool,
) -> Result<Matcher<str>, regex::Error> {
    let compiled = CompiledStringMatcher::compile(matcher, case_sensitive)?;
    Ok(Matcher::new(format!("body {compiled}"), move |body: &str| {
        compiled.matches((!body.is_empty()).then_some(body))
    }))
}
