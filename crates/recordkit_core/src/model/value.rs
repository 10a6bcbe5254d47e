//! Scalar field values shared by every entity type.
//!
//! # Responsibility
//! - Define the closed set of scalar values a field can hold.
//! - Provide strict parsing for persisted text and lenient conversions for
//!   setters.
//! - Define a total order so any field can be used as a sort key.
//!
//! # Invariants
//! - `Value::Null` sorts before every other value.
//! - `FieldKind::parse` never guesses: unparsable text is an error.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Storage kind of one field, used for defaults, parsing and coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Bool,
    Int,
    Text,
    Guid,
}

impl FieldKind {
    /// Value a freshly initialized field of this kind holds.
    pub fn default_value(self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::Int => Value::Int(0),
            Self::Text => Value::Text(String::new()),
            Self::Guid => Value::Guid(Uuid::nil()),
        }
    }

    /// Parses persisted text into a value of this kind.
    ///
    /// # Errors
    /// - Returns `ValueParseError` when `raw` is not valid for this kind.
    pub fn parse(self, raw: &str) -> Result<Value, ValueParseError> {
        let invalid = || ValueParseError {
            kind: self,
            raw: raw.to_string(),
        };

        match self {
            Self::Bool => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            Self::Int => raw
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| invalid()),
            Self::Text => Ok(Value::Text(raw.to_string())),
            Self::Guid => Uuid::parse_str(raw.trim())
                .map(Value::Guid)
                .map_err(|_| invalid()),
        }
    }

    /// Converts any value into this kind using lenient conversion rules.
    ///
    /// `Null` stays `Null` so callers can still express "blank".
    pub fn coerce(self, value: Value) -> Value {
        if value.is_null() {
            return Value::Null;
        }
        match self {
            Self::Bool => Value::Bool(value.to_bool()),
            Self::Int => Value::Int(value.to_int()),
            Self::Text => match value {
                Value::Text(text) => Value::Text(text),
                other => Value::Text(other.to_string()),
            },
            Self::Guid => Value::Guid(value.to_guid()),
        }
    }
}

/// One scalar field value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Guid(Uuid),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns whether the value carries no user-visible content.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(text) => text.trim().is_empty(),
            Self::Guid(guid) => guid.is_nil(),
            Self::Bool(_) | Self::Int(_) => false,
        }
    }

    /// Lenient integer view: `Null` and unparsable text become `0`.
    pub fn to_int(&self) -> i64 {
        match self {
            Self::Null | Self::Guid(_) => 0,
            Self::Bool(value) => i64::from(*value),
            Self::Int(value) => *value,
            Self::Text(text) => text.trim().parse().unwrap_or(0),
        }
    }

    /// Lenient boolean view: only `true` (any case) and non-zero ints are true.
    pub fn to_bool(&self) -> bool {
        match self {
            Self::Bool(value) => *value,
            Self::Int(value) => *value != 0,
            Self::Text(text) => text.trim().eq_ignore_ascii_case("true"),
            Self::Null | Self::Guid(_) => false,
        }
    }

    /// Text view; `Null` becomes an empty string.
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    /// Guid view; anything that is not a guid becomes the nil guid.
    pub fn to_guid(&self) -> Uuid {
        match self {
            Self::Guid(guid) => *guid,
            Self::Text(text) => Uuid::parse_str(text.trim()).unwrap_or_else(|_| Uuid::nil()),
            _ => Uuid::nil(),
        }
    }

    /// Text written to persisted data, `None` for `Null`.
    pub fn to_persisted_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            other => Some(other.to_string()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) => 2,
            Self::Text(_) => 3,
            Self::Guid(_) => 4,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Bool(left), Self::Bool(right)) => left.cmp(right),
            (Self::Int(left), Self::Int(right)) => left.cmp(right),
            (Self::Text(left), Self::Text(right)) => left
                .to_lowercase()
                .cmp(&right.to_lowercase())
                .then_with(|| left.cmp(right)),
            (Self::Guid(left), Self::Guid(right)) => left.cmp(right),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(text) => f.write_str(text),
            Self::Guid(guid) => write!(f, "{}", guid.hyphenated()),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Self::Guid(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Null-safe inequality check used by every setter.
pub fn check_value_modified<T: PartialEq + ?Sized>(old: &T, new: &T) -> bool {
    old != new
}

/// Persisted text could not be parsed as the declared field kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueParseError {
    pub kind: FieldKind,
    pub raw: String,
}

impl Display for ValueParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "`{}` is not a valid {:?} value", self.raw, self.kind)
    }
}

impl Error for ValueParseError {}
