//! Value model and text codec.
//!
//! A [`Value`] is an immutable, type-tagged container carrying a version
//! number. A new version of a key is always a new `Value` instance; equality
//! is by content (kind, payload, and version), never by reference.
//!
//! The wire form is `KIND:version:payload`, with the payload percent-encoded
//! so that the `:` field separator (and, for lists, the `,` element
//! separator) can never appear unescaped. Lists encode each element
//! individually and join them with `,`.

use crate::error::{Error, Result};
use std::borrow::Cow;

/// Serialized payload of a zero-element list. Distinct from the payload of
/// `[""]` (which is the empty string).
const EMPTY_LIST: &str = "[]";

/// Discriminates the five supported value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// UTF-8 string
    String,
    /// 64-bit signed integer
    Integer,
    /// Boolean
    Boolean,
    /// List of strings
    List,
    /// Explicit null
    Null,
}

impl ValueKind {
    /// The tag used in the serialized form.
    pub fn tag(&self) -> &'static str {
        match self {
            ValueKind::String => "STRING",
            ValueKind::Integer => "INTEGER",
            ValueKind::Boolean => "BOOLEAN",
            ValueKind::List => "LIST",
            ValueKind::Null => "NULL",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "STRING" => Some(ValueKind::String),
            "INTEGER" => Some(ValueKind::Integer),
            "BOOLEAN" => Some(ValueKind::Boolean),
            "LIST" => Some(ValueKind::List),
            "NULL" => Some(ValueKind::Null),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Payload {
    String(String),
    Integer(i64),
    Boolean(bool),
    List(Vec<String>),
    Null,
}

/// An immutable, versioned, type-tagged value.
///
/// Version 0 means "assign at commit": the commit path replaces it with
/// `previous + 1` (or 1 for a fresh key). A nonzero version is honored
/// verbatim by commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    version: u64,
    payload: Payload,
}

impl Value {
    /// Construct a string value.
    pub fn string(version: u64, s: impl Into<String>) -> Self {
        Value {
            version,
            payload: Payload::String(s.into()),
        }
    }

    /// Construct an integer value.
    pub fn integer(version: u64, i: i64) -> Self {
        Value {
            version,
            payload: Payload::Integer(i),
        }
    }

    /// Construct a boolean value.
    pub fn boolean(version: u64, b: bool) -> Self {
        Value {
            version,
            payload: Payload::Boolean(b),
        }
    }

    /// Construct a list value.
    pub fn list(version: u64, items: Vec<String>) -> Self {
        Value {
            version,
            payload: Payload::List(items),
        }
    }

    /// Construct an explicit null value.
    pub fn null(version: u64) -> Self {
        Value {
            version,
            payload: Payload::Null,
        }
    }

    /// The value's version.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The value's kind tag.
    pub fn kind(&self) -> ValueKind {
        match self.payload {
            Payload::String(_) => ValueKind::String,
            Payload::Integer(_) => ValueKind::Integer,
            Payload::Boolean(_) => ValueKind::Boolean,
            Payload::List(_) => ValueKind::List,
            Payload::Null => ValueKind::Null,
        }
    }

    /// A copy of this value carrying a different version.
    pub fn with_version(&self, version: u64) -> Self {
        Value {
            version,
            payload: self.payload.clone(),
        }
    }

    /// Get as `&str` if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match &self.payload {
            Payload::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as `i64` if this is an integer value.
    pub fn as_integer(&self) -> Option<i64> {
        match self.payload {
            Payload::Integer(i) => Some(i),
            _ => None,
        }
    }

    /// Get as `bool` if this is a boolean value.
    pub fn as_boolean(&self) -> Option<bool> {
        match self.payload {
            Payload::Boolean(b) => Some(b),
            _ => None,
        }
    }

    /// Get as a slice of elements if this is a list value.
    pub fn as_list(&self) -> Option<&[String]> {
        match &self.payload {
            Payload::List(items) => Some(items),
            _ => None,
        }
    }

    /// Check if this is an explicit null.
    pub fn is_null(&self) -> bool {
        matches!(self.payload, Payload::Null)
    }

    /// Serialize to the `KIND:version:payload` text form.
    pub fn serialize(&self) -> String {
        let encoded = match &self.payload {
            Payload::String(s) => encode(s),
            Payload::Integer(i) => encode(&i.to_string()),
            Payload::Boolean(b) => encode(if *b { "true" } else { "false" }),
            // The empty list needs a marker: joining zero encoded elements
            // and joining one empty element both yield "". Brackets are
            // always percent-escaped inside elements, so "[]" cannot be
            // produced by any element join.
            Payload::List(items) if items.is_empty() => EMPTY_LIST.to_string(),
            Payload::List(items) => items
                .iter()
                .map(|item| encode(item))
                .collect::<Vec<_>>()
                .join(","),
            Payload::Null => "null".to_string(),
        };
        format!("{}:{}:{}", self.kind().tag(), self.version, encoded)
    }

    /// Decode the `KIND:version:payload` text form.
    pub fn deserialize(text: &str) -> Result<Self> {
        let mut fields = text.splitn(3, ':');
        let (tag, version, payload) = match (fields.next(), fields.next(), fields.next()) {
            (Some(tag), Some(version), Some(payload)) => (tag, version, payload),
            _ => {
                return Err(Error::MalformedValue(format!(
                    "expected KIND:version:payload, got {text:?}"
                )))
            }
        };

        let kind = ValueKind::from_tag(tag)
            .ok_or_else(|| Error::MalformedValue(format!("unknown kind {tag:?}")))?;
        let version: u64 = version
            .parse()
            .map_err(|_| Error::MalformedValue(format!("non-integer version {version:?}")))?;

        let payload = match kind {
            ValueKind::Null => Payload::Null,
            ValueKind::String => Payload::String(decode(payload)?),
            ValueKind::Integer => {
                let text = decode(payload)?;
                let i = text.parse::<i64>().map_err(|_| {
                    Error::MalformedValue(format!("non-integer payload {text:?}"))
                })?;
                Payload::Integer(i)
            }
            ValueKind::Boolean => match decode(payload)?.as_str() {
                "true" => Payload::Boolean(true),
                "false" => Payload::Boolean(false),
                other => {
                    return Err(Error::MalformedValue(format!(
                        "non-boolean payload {other:?}"
                    )))
                }
            },
            ValueKind::List => {
                if payload == EMPTY_LIST {
                    Payload::List(Vec::new())
                } else {
                    let items = payload
                        .split(',')
                        .map(decode)
                        .collect::<Result<Vec<_>>>()?;
                    Payload::List(items)
                }
            }
        };

        Ok(Value { version, payload })
    }
}

/// Percent-encode a field so separators cannot appear unescaped.
pub fn encode(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

/// Decode a percent-encoded field.
pub fn decode(encoded: &str) -> Result<String> {
    match urlencoding::decode(encoded) {
        Ok(Cow::Borrowed(s)) => Ok(s.to_string()),
        Ok(Cow::Owned(s)) => Ok(s),
        Err(_) => Err(Error::MalformedValue(format!(
            "undecodable payload {encoded:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_round_trip_each_kind() {
        let values = vec![
            Value::string(1, "hello"),
            Value::integer(2, -42),
            Value::boolean(3, true),
            Value::list(4, vec!["a".into(), "b".into(), "c".into()]),
            Value::null(5),
        ];
        for v in values {
            let text = v.serialize();
            assert_eq!(Value::deserialize(&text).unwrap(), v);
        }
    }

    #[test]
    fn test_payload_may_contain_separators() {
        let v = Value::string(1, "a:b=c,d\ne");
        let text = v.serialize();
        // Exactly three fields regardless of payload content
        assert_eq!(text.splitn(3, ':').count(), 3);
        assert_eq!(Value::deserialize(&text).unwrap(), v);
    }

    #[test]
    fn test_list_elements_may_contain_commas() {
        let v = Value::list(7, vec!["x,y".into(), "z".into()]);
        let round = Value::deserialize(&v.serialize()).unwrap();
        assert_eq!(round.as_list().unwrap(), &["x,y".to_string(), "z".to_string()]);
    }

    #[test]
    fn test_empty_list_round_trips() {
        let v = Value::list(1, Vec::new());
        assert_eq!(Value::deserialize(&v.serialize()).unwrap(), v);
    }

    #[test]
    fn test_empty_string_elements_survive() {
        let values = vec![
            Value::list(1, vec![String::new()]),
            Value::list(1, vec![String::new(), String::new()]),
            Value::list(1, vec!["a".into(), String::new()]),
        ];
        for v in values {
            assert_eq!(Value::deserialize(&v.serialize()).unwrap(), v);
        }
    }

    #[test]
    fn test_empty_list_is_distinct_from_list_of_empty_string() {
        let empty = Value::list(1, Vec::new());
        let one_blank = Value::list(1, vec![String::new()]);
        assert_ne!(empty.serialize(), one_blank.serialize());
    }

    #[test]
    fn test_bracket_elements_do_not_collide_with_empty_marker() {
        let v = Value::list(1, vec!["[]".into()]);
        let round = Value::deserialize(&v.serialize()).unwrap();
        assert_eq!(round.as_list().unwrap(), &["[]".to_string()]);
    }

    #[test]
    fn test_deserialize_rejects_short_input() {
        assert!(matches!(
            Value::deserialize("STRING:1"),
            Err(Error::MalformedValue(_))
        ));
    }

    #[test]
    fn test_deserialize_rejects_unknown_kind() {
        assert!(matches!(
            Value::deserialize("FLOAT:1:x"),
            Err(Error::MalformedValue(_))
        ));
    }

    #[test]
    fn test_deserialize_rejects_bad_version() {
        assert!(matches!(
            Value::deserialize("STRING:one:x"),
            Err(Error::MalformedValue(_))
        ));
    }

    #[test]
    fn test_equality_is_by_content() {
        assert_eq!(Value::integer(1, 5), Value::integer(1, 5));
        assert_ne!(Value::integer(1, 5), Value::integer(2, 5));
        assert_ne!(Value::integer(1, 5), Value::string(1, "5"));
    }

    #[test]
    fn test_with_version_preserves_payload() {
        let v = Value::string(0, "x").with_version(9);
        assert_eq!(v.version(), 9);
        assert_eq!(v.as_str(), Some("x"));
    }

    proptest! {
        #[test]
        fn prop_string_round_trip(s in ".{0,64}", version in 0u64..1_000_000) {
            let v = Value::string(version, s);
            prop_assert_eq!(Value::deserialize(&v.serialize()).unwrap(), v);
        }

        #[test]
        fn prop_list_round_trip(
            items in prop::collection::vec(".{0,16}", 0..5),
            version in 0u64..1_000_000,
        ) {
            let v = Value::list(version, items);
            prop_assert_eq!(Value::deserialize(&v.serialize()).unwrap(), v);
        }
    }
}
