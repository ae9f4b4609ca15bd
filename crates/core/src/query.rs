//! Search queries.
//!
//! A query combines up to three independent filters — a regex pattern, an
//! inclusive integer range, and a kind filter — with OR semantics: an entry
//! matches if any specified filter matches it. A query specifying none of
//! the three is rejected at construction rather than silently matching
//! everything (or nothing).

use crate::error::{Error, Result};
use crate::value::{Value, ValueKind};
use regex::Regex;

/// A validated search query. Build one with [`Query::builder`].
#[derive(Debug, Clone)]
pub struct Query {
    pattern: Option<Regex>,
    min: Option<i64>,
    max: Option<i64>,
    kind: Option<ValueKind>,
}

impl Query {
    /// Start building a query.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::default()
    }

    /// The compiled pattern filter, if any.
    pub fn pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }

    /// Whether a range bound was specified.
    pub fn has_range(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    /// The kind filter, if any.
    pub fn kind_filter(&self) -> Option<ValueKind> {
        self.kind
    }

    /// Whether an integer falls within the (inclusive) range filter.
    pub fn in_range(&self, i: i64) -> bool {
        self.min.map_or(true, |min| i >= min) && self.max.map_or(true, |max| i <= max)
    }

    /// Whether an entry matches this query.
    ///
    /// The pattern filter matches against the key, or against the payload of
    /// string-typed values.
    pub fn matches(&self, key: &str, value: &Value) -> bool {
        if let Some(re) = &self.pattern {
            if re.is_match(key) {
                return true;
            }
            if let Some(s) = value.as_str() {
                if re.is_match(s) {
                    return true;
                }
            }
        }
        if self.has_range() {
            if let Some(i) = value.as_integer() {
                if self.in_range(i) {
                    return true;
                }
            }
        }
        if let Some(kind) = self.kind {
            if value.kind() == kind {
                return true;
            }
        }
        false
    }
}

/// Builder for [`Query`].
#[derive(Debug, Default)]
pub struct QueryBuilder {
    pattern: Option<String>,
    min: Option<i64>,
    max: Option<i64>,
    kind: Option<ValueKind>,
}

impl QueryBuilder {
    /// Match keys (or string payloads) against a regular expression.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Match integer values within an inclusive range. Either bound may be
    /// open.
    pub fn with_range(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Match values of a specific kind.
    pub fn with_kind(mut self, kind: ValueKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Validate and build the query.
    ///
    /// Fails with [`Error::EmptyQuery`] if no filter was specified, and with
    /// [`Error::InvalidPattern`] if the pattern does not compile.
    pub fn build(self) -> Result<Query> {
        if self.pattern.is_none() && self.min.is_none() && self.max.is_none() && self.kind.is_none()
        {
            return Err(Error::EmptyQuery);
        }
        let pattern = match self.pattern {
            Some(p) => Some(Regex::new(&p).map_err(|e| Error::InvalidPattern(e.to_string()))?),
            None => None,
        };
        Ok(Query {
            pattern,
            min: self.min,
            max: self.max,
            kind: self.kind,
        })
    }
}
