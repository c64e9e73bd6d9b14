//! String comparison operators used by path, header and body matchers.

use regex::{Regex, RegexBuilder};
use serde::de::{self, IgnoredAny, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// String comparison operator, as written in stub definitions.
///
/// Written as a single-key map in every format: `{"equals": "/ping"}`,
/// `contains: Ping`, `{"exists": true}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringMatcher {
    Equals(String),
    Contains(String),
    StartsWith(String),
    EndsWith(String),
    /// Regular expression, unanchored unless the pattern anchors itself.
    Matches(String),
    /// Whether the value must be present at all.
    Exists(bool),
}

impl Default for StringMatcher {
    fn default() -> Self {
        StringMatcher::Exists(true)
    }
}

const OPERATORS: &[&str] = &["equals", "contains", "startsWith", "endsWith", "matches", "exists"];

impl StringMatcher {
    fn operator(&self) -> &'static str {
        match self {
            StringMatcher::Equals(_) => "equals",
            StringMatcher::Contains(_) => "contains",
            StringMatcher::StartsWith(_) => "startsWith",
            StringMatcher::EndsWith(_) => "endsWith",
            StringMatcher::Matches(_) => "matches",
            StringMatcher::Exists(_) => "exists",
        }
    }
}

impl Serialize for StringMatcher {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        match self {
            StringMatcher::Equals(v)
            | StringMatcher::Contains(v)
            | StringMatcher::StartsWith(v)
            | StringMatcher::EndsWith(v)
            | StringMatcher::Matches(v) => map.serialize_entry(self.operator(), v)?,
            StringMatcher::Exists(v) => map.serialize_entry(self.operator(), v)?,
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for StringMatcher {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(StringMatcherVisitor)
    }
}

struct StringMatcherVisitor;

impl<'de> Visitor<'de> for StringMatcherVisitor {
    type Value = StringMatcher;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map with exactly one of equals, contains, startsWith, endsWith, matches, exists")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let Some(operator) = map.next_key::<String>()? else {
            return Err(de::Error::invalid_length(0, &self));
        };
        let matcher = match operator.as_str() {
            "equals" => StringMatcher::Equals(map.next_value()?),
            "contains" => StringMatcher::Contains(map.next_value()?),
            "startsWith" => StringMatcher::StartsWith(map.next_value()?),
            "endsWith" => StringMatcher::EndsWith(map.next_value()?),
            "matches" => StringMatcher::Matches(map.next_value()?),
            "exists" => StringMatcher::Exists(map.next_value()?),
            other => return Err(de::Error::unknown_variant(other, OPERATORS)),
        };
        if map.next_key::<IgnoredAny>()?.is_some() {
            return Err(de::Error::invalid_length(2, &self));
        }
        Ok(matcher)
    }
}

impl fmt::Display for StringMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StringMatcher::Equals(v) => write!(f, "equals {v:?}"),
            StringMatcher::Contains(v) => write!(f, "contains {v:?}"),
            StringMatcher::StartsWith(v) => write!(f, "startsWith {v:?}"),
            StringMatcher::EndsWith(v) => write!(f, "endsWith {v:?}"),
            StringMatcher::Matches(v) => write!(f, "matches /{v}/"),
            StringMatcher::Exists(true) => f.write_str("exists"),
            StringMatcher::Exists(false) => f.write_str("absent"),
        }
    }
}

/// Literal operand with its comparison form fixed at compile time.
#[derive(Debug, Clone, PartialEq)]
struct Operand {
    text: String,
    case_sensitive: bool,
}

impl Operand {
    fn new(text: &str, case_sensitive: bool) -> Self {
        let text = if case_sensitive {
            text.to_string()
        } else {
            text.to_lowercase()
        };
        Self {
            text,
            case_sensitive,
        }
    }

    #[inline]
    fn test(&self, value: &str, op: impl Fn(&str, &str) -> bool) -> bool {
        if self.case_sensitive {
            op(value, &self.text)
        } else {
            op(&value.to_lowercase(), &self.text)
        }
    }
}

/// A `StringMatcher` prepared for repeated evaluation.
///
/// Case sensitivity is decided once when compiling; regex patterns honour it
/// through the regex builder rather than by lowercasing input.
#[derive(Debug, Clone)]
pub struct CompiledStringMatcher {
    kind: Compiled,
    source: StringMatcher,
}

#[derive(Debug, Clone)]
enum Compiled {
    Equals(Operand),
    Contains(Operand),
    StartsWith(Operand),
    EndsWith(Operand),
    Matches(Arc<Regex>),
    Exists(bool),
}

impl CompiledStringMatcher {
    pub fn compile(matcher: &StringMatcher, case_sensitive: bool) -> Result<Self, regex::Error> {
        let kind = match matcher {
            StringMatcher::Equals(v) => Compiled::Equals(Operand::new(v, case_sensitive)),
            StringMatcher::Contains(v) => Compiled::Contains(Operand::new(v, case_sensitive)),
            StringMatcher::StartsWith(v) => Compiled::StartsWith(Operand::new(v, case_sensitive)),
            StringMatcher::EndsWith(v) => Compiled::EndsWith(Operand::new(v, case_sensitive)),
            StringMatcher::Matches(pattern) => Compiled::Matches(Arc::new(
                RegexBuilder::new(pattern)
                    .case_insensitive(!case_sensitive)
                    .build()?,
            )),
            StringMatcher::Exists(exists) => Compiled::Exists(*exists),
        };
        Ok(Self {
            kind,
            source: matcher.clone(),
        })
    }

    /// Evaluates the matcher. `None` means the value is absent.
    pub fn matches(&self, value: Option<&str>) -> bool {
        match (&self.kind, value) {
            (Compiled::Exists(should_exist), v) => *should_exist == v.is_some(),
            (_, None) => false,
            (Compiled::Equals(op), Some(v)) => op.test(v, |a, b| a == b),
            (Compiled::Contains(op), Some(v)) => op.test(v, |a, b| a.contains(b)),
            (Compiled::StartsWith(op), Some(v)) => op.test(v, |a, b| a.starts_with(b)),
            (Compiled::EndsWith(op), Some(v)) => op.test(v, |a, b| a.ends_with(b)),
            (Compiled::Matches(regex), Some(v)) => regex.is_match(v),
        }
    }

    pub fn source(&self) -> &StringMatcher {
        &self.source
    }
}

impl fmt::Display for CompiledStringMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.source.fmt(f)
    }
}
