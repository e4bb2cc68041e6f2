//! Secondary-index descriptors and their composition into queries.
//!
//! A [`PartitionKey`] names one indexed field of a partition together with
//! its declared [`KeyType`]. Binding a value to a key with
//! [`PartitionKey::with_obj`] produces a [`QueryKey`]; a list of those,
//! combined with logical AND, is a [`QueryKeys`] request.

use std::collections::BTreeSet;
use std::fmt;

use prov_types::Uid;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};

/// Declared type of an indexed field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// A JSON string.
    Str,
    /// A single UID.
    Uid,
    /// A list of UIDs; each element is indexed separately and a query with
    /// a single UID matches every document whose list contains it.
    UidSet,
    /// A signed 64-bit integer.
    Int,
    /// A boolean.
    Bool,
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str => write!(f, "str"),
            Self::Uid => write!(f, "uid"),
            Self::UidSet => write!(f, "set<uid>"),
            Self::Int => write!(f, "int"),
            Self::Bool => write!(f, "bool"),
        }
    }
}

/// One secondary index over a partition: a field name and its declared type.
///
/// Keys are usually declared as constants next to the stash that uses them:
///
/// ```rust
/// use prov_store::{KeyType, PartitionKey};
///
/// const NAME_KEY: PartitionKey = PartitionKey::new("name", KeyType::Str).unique();
/// assert!(NAME_KEY.unique);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    pub key: &'static str,
    pub kind: KeyType,
    /// At most one document per index value.
    pub unique: bool,
}

impl PartitionKey {
    pub const fn new(key: &'static str, kind: KeyType) -> Self {
        Self {
            key,
            kind,
            unique: false,
        }
    }

    /// Mark the key as uniqueness-constrained.
    pub const fn unique(self) -> Self {
        Self {
            key: self.key,
            kind: self.kind,
            unique: true,
        }
    }

    /// Bind a value to this key.
    pub fn with_obj(&self, value: impl Into<QueryValue>) -> QueryKey {
        QueryKey {
            key: *self,
            value: value.into(),
        }
    }

    /// Extract the index values this key contributes for a document body.
    ///
    /// A missing or `null` field contributes nothing. A field of the wrong
    /// JSON type is a [`StoreError::TypeMismatch`].
    pub fn extract(&self, body: &Value) -> StoreResult<Vec<QueryValue>> {
        let field = match body.get(self.key) {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(field) => field,
        };
        let mismatch = || {
            StoreError::type_mismatch(
                format!("{} for key '{}'", self.kind, self.key),
                json_type_name(field),
            )
        };

        match self.kind {
            KeyType::Str => field
                .as_str()
                .map(|s| vec![QueryValue::Str(s.to_string())])
                .ok_or_else(mismatch),
            KeyType::Uid => {
                let raw = field.as_str().ok_or_else(mismatch)?;
                let uid = Uid::parse_str(raw).map_err(|_| mismatch())?;
                Ok(vec![QueryValue::Uid(uid)])
            }
            KeyType::UidSet => {
                let items = field.as_array().ok_or_else(mismatch)?;
                let mut seen = BTreeSet::new();
                for item in items {
                    let raw = item.as_str().ok_or_else(mismatch)?;
                    seen.insert(Uid::parse_str(raw).map_err(|_| mismatch())?);
                }
                Ok(seen.into_iter().map(QueryValue::Uid).collect())
            }
            KeyType::Int => field
                .as_i64()
                .map(|n| vec![QueryValue::Int(n)])
                .ok_or_else(mismatch),
            KeyType::Bool => field
                .as_bool()
                .map(|b| vec![QueryValue::Bool(b)])
                .ok_or_else(mismatch),
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.kind)
    }
}

/// A value bound to a [`PartitionKey`] in a query or stored in an index.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryValue {
    Str(String),
    Uid(Uid),
    Int(i64),
    Bool(bool),
}

impl QueryValue {
    /// Returns `true` if this value may be looked up under a key of `kind`.
    pub fn fits(&self, kind: KeyType) -> bool {
        matches!(
            (self, kind),
            (Self::Str(_), KeyType::Str)
                | (Self::Uid(_), KeyType::Uid | KeyType::UidSet)
                | (Self::Int(_), KeyType::Int)
                | (Self::Bool(_), KeyType::Bool)
        )
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "str",
            Self::Uid(_) => "uid",
            Self::Int(_) => "int",
            Self::Bool(_) => "bool",
        }
    }
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Uid(u) => write!(f, "{u}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<Uid> for QueryValue {
    fn from(uid: Uid) -> Self {
        Self::Uid(uid)
    }
}

impl From<i64> for QueryValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<bool> for QueryValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// A single `(PartitionKey, value)` binding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryKey {
    pub key: PartitionKey,
    pub value: QueryValue,
}

/// AND-composed query over a partition's secondary indexes.
///
/// An empty `QueryKeys` matches every document in the partition.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryKeys {
    qks: Vec<QueryKey>,
}

impl QueryKeys {
    pub fn new(qks: Vec<QueryKey>) -> Self {
        Self { qks }
    }

    /// A query matching every document.
    pub fn all() -> Self {
        Self::default()
    }

    /// A query with exactly one binding.
    pub fn single(qk: QueryKey) -> Self {
        Self { qks: vec![qk] }
    }

    /// Add another binding (AND).
    pub fn and(mut self, qk: QueryKey) -> Self {
        self.qks.push(qk);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryKey> {
        self.qks.iter()
    }

    pub fn len(&self) -> usize {
        self.qks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.qks.is_empty()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
