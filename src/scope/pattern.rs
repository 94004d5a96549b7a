//! Search patterns used by every exclusion scope
//!
//! A pattern is written as `<prefix>:<value>`:
//!
//! - `gl:app*` / `glob:app*`: shell-style wildcard (`*`, `?`, `[a-z]`)
//! - `pl:app` / `plain:app`: exact match
//! - `re:^app.*$` / `regex:^app.*$`: regular expression, matches anywhere
//!   unless it anchors itself
//! - `:app*` or `app*`: no prefix means glob
//!
//! Glob and plain values are lower-cased on construction. Regex values keep
//! their case and are compiled with the inline `(?i)` flag instead.

use std::fmt;
use std::hash::{Hash, Hasher};

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{AuditError, AuditResult};

/// How a pattern value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Glob,
    Plain,
    Regex,
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternKind::Glob => write!(f, "glob"),
            PatternKind::Plain => write!(f, "plain"),
            PatternKind::Regex => write!(f, "regex"),
        }
    }
}

#[derive(Debug, Clone)]
enum Compiled {
    Glob(glob::Pattern),
    Plain,
    Regex(Regex),
}

/// An immutable, pre-compiled search pattern
#[derive(Debug, Clone)]
pub struct SearchPattern {
    kind: PatternKind,
    value: String,
    compiled: Compiled,
}

impl SearchPattern {
    /// Parse a `<prefix>:<value>` pattern string
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Pattern`] for globs or regular expressions that
    /// do not compile.
    pub fn parse(raw: &str) -> AuditResult<Self> {
        if let Some((prefix, value)) = raw.split_once(':') {
            match prefix.to_lowercase().as_str() {
                "" | "gl" | "glob" => return Self::glob(value),
                "pl" | "plain" => return Self::plain(value),
                "re" | "regex" => return Self::regex(value),
                _ => {}
            }
        }

        Self::glob(raw)
    }

    /// Build a glob pattern
    pub fn glob(value: &str) -> AuditResult<Self> {
        let value = value.to_lowercase();
        let pattern =
            glob::Pattern::new(&value).map_err(|e| AuditError::pattern(format!("glob:{}", value), e))?;

        Ok(Self {
            kind: PatternKind::Glob,
            value,
            compiled: Compiled::Glob(pattern),
        })
    }

    /// Build an exact-match pattern
    pub fn plain(value: &str) -> AuditResult<Self> {
        Ok(Self {
            kind: PatternKind::Plain,
            value: value.to_lowercase(),
            compiled: Compiled::Plain,
        })
    }

    /// Build a case-insensitive regular expression pattern
    pub fn regex(value: &str) -> AuditResult<Self> {
        let regex = Regex::new(&format!("(?i){}", value))
            .map_err(|e| AuditError::pattern(format!("regex:{}", value), e))?;

        Ok(Self {
            kind: PatternKind::Regex,
            value: value.to_string(),
            compiled: Compiled::Regex(regex),
        })
    }

    /// The pattern kind
    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    /// The stored pattern value
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Check a candidate against this pattern, ignoring case
    pub fn is_match(&self, candidate: &str) -> bool {
        self.matches_lowered(&candidate.to_lowercase())
    }

    /// Check an already lower-cased candidate
    pub(crate) fn matches_lowered(&self, candidate: &str) -> bool {
        match &self.compiled {
            Compiled::Glob(pattern) => pattern.matches(candidate),
            Compiled::Plain => self.value == candidate,
            Compiled::Regex(regex) => regex.is_match(candidate),
        }
    }
}

impl PartialEq for SearchPattern {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.value == other.value
    }
}

impl Eq for SearchPattern {}

impl Hash for SearchPattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.value.hash(state);
    }
}

impl fmt::Display for SearchPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

impl std::str::FromStr for SearchPattern {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for SearchPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Accepted input shapes: `"gl:app*"` or `{type: glob, value: "app*"}`
#[derive(Deserialize)]
#[serde(untagged)]
enum RawPattern {
    Text(String),
    Map {
        #[serde(rename = "type")]
        kind: String,
        value: String,
    },
}

impl<'de> Deserialize<'de> for SearchPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = match RawPattern::deserialize(deserializer)? {
            RawPattern::Text(text) => text,
            RawPattern::Map { kind, value } => format!("{}:{}", kind, value),
        };

        SearchPattern::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Parse a list of pattern strings, failing on the first invalid one
pub fn parse_patterns<I, S>(raw: I) -> AuditResult<Vec<SearchPattern>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter().map(|p| SearchPattern::parse(p.as_ref())).collect()
}
