use std::collections::BTreeMap;
use std::fmt;

use zeroize::Zeroize;

use crate::access_control::AccessControl;
use crate::config::AuthContextRef;

/// A single value in a [`Query`].
#[derive(Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// Text value.
    String(String),
    /// Binary value. Redacted from `Debug` output.
    Data(Vec<u8>),
    /// Boolean flag.
    Bool(bool),
    /// Integer value.
    Integer(i64),
    /// Access-control object for insert/update queries.
    AccessControl(AccessControl),
    /// Reference to a caller-owned authentication context.
    AuthContext(AuthContextRef),
}

impl AttributeValue {
    /// Short name of the value's shape, used in error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Data(_) => "data",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::AccessControl(_) => "access control",
            Self::AuthContext(_) => "authentication context",
        }
    }

    /// Returns the text if this is a [`AttributeValue::String`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the bytes if this is a [`AttributeValue::Data`].
    #[must_use]
    pub fn as_data(&self) -> Option<&[u8]> {
        match self {
            Self::Data(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the flag if this is a [`AttributeValue::Bool`].
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(value) => f.debug_tuple("String").field(value).finish(),
            Self::Data(value) => write!(f, "Data(<{} bytes>)", value.len()),
            Self::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            Self::Integer(value) => f.debug_tuple("Integer").field(value).finish(),
            Self::AccessControl(value) => {
                f.debug_tuple("AccessControl").field(value).finish()
            }
            Self::AuthContext(value) => f.debug_tuple("AuthContext").field(value).finish(),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Data(value)
    }
}

impl From<&[u8]> for AttributeValue {
    fn from(value: &[u8]) -> Self {
        Self::Data(value.to_vec())
    }
}

/// Criteria mapping handed to the store for a single operation.
///
/// Keys are store attribute names (see [`crate::query::attr`]). Iteration
/// order is deterministic. Payload bytes are zeroized when the query is
/// dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query(BTreeMap<String, AttributeValue>);

impl Query {
    /// Creates an empty query.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Inserts or overwrites an attribute.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Removes an attribute, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<AttributeValue> {
        self.0.remove(key)
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.0.get(key)
    }

    /// Returns `true` if `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the query has no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over attributes in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl Drop for Query {
    fn drop(&mut self) {
        for value in self.0.values_mut() {
            if let AttributeValue::Data(bytes) = value {
                bytes.zeroize();
            }
        }
    }
}

impl From<BTreeMap<String, AttributeValue>> for Query {
    fn from(attributes: BTreeMap<String, AttributeValue>) -> Self {
        Self(attributes)
    }
}

impl<K: Into<String>, V: Into<AttributeValue>> FromIterator<(K, V)> for Query {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<AttributeValue>> Extend<(K, V)> for Query {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.0
            .extend(iter.into_iter().map(|(key, value)| (key.into(), value.into())));
    }
}
