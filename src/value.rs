use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{btree_map, BTreeMap};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A 12-byte document identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "fuzz", derive(arbitrary::Arbitrary))]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid object id {0:?}: expected 24 hexadecimal characters")]
pub struct ParseObjectIdError(String);

impl FromStr for ObjectId {
    type Err = ParseObjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| ParseObjectIdError(s.to_owned()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A replication timestamp: seconds since the epoch plus an ordinal within
/// that second. Distinct from [`Value::DateTime`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "fuzz", derive(arbitrary::Arbitrary))]
pub struct Timestamp {
    pub time: u32,
    pub increment: u32,
}

/// A stored regular expression value. It is data, not a compiled matcher.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct RegularExpression {
    pub pattern: String,
    pub options: String,
}

/// An instance or schema value.
///
/// Generic JSON converts into the first seven variants. Native documents may
/// additionally carry the extended scalar types, and may use
/// [`Value::Document`] when key order is meaningful to the caller.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    Document(IndexMap<String, Value>),
    ObjectId(ObjectId),
    RegularExpression(RegularExpression),
    DateTime(DateTime<Utc>),
    Decimal(Decimal),
    Timestamp(Timestamp),
}

/// The closed set of value classes the rest of the engine dispatches on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Null,
    Bool,
    Integer,
    Double,
    String,
    Array,
    Object,
    ObjectId,
    RegularExpression,
    DateTime,
    Decimal,
    Timestamp,
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Value {
    /// Builds an ordered-key document from `(key, value)` pairs.
    pub fn document<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Document(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Int32(_) | Value::Int64(_) => Kind::Integer,
            Value::Double(_) => Kind::Double,
            Value::String(_) => Kind::String,
            Value::Array(_) => Kind::Array,
            Value::Object(_) | Value::Document(_) => Kind::Object,
            Value::ObjectId(_) => Kind::ObjectId,
            Value::RegularExpression(_) => Kind::RegularExpression,
            Value::DateTime(_) => Kind::DateTime,
            Value::Decimal(_) => Kind::Decimal,
            Value::Timestamp(_) => Kind::Timestamp,
        }
    }

    /// The descriptive type name used in validation errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int32(_) => "int",
            Value::Int64(_) => "long",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) | Value::Document(_) => "object",
            Value::ObjectId(_) => "objectId",
            Value::RegularExpression(_) => "regex",
            Value::DateTime(_) => "date",
            Value::Decimal(_) => "decimal",
            Value::Timestamp(_) => "timestamp",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_object(&self) -> bool {
        self.kind() == Kind::Object
    }

    pub fn is_number(&self) -> bool {
        matches!(self.kind(), Kind::Integer | Kind::Double | Kind::Decimal)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(i) => Some(i64::from(*i)),
            Value::Int64(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric coercion used for bound comparisons.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int32(i) => Some(f64::from(*i)),
            Value::Int64(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            Value::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    /// Exact decimal coercion, when the value fits.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Int32(i) => Some(Decimal::from(*i)),
            Value::Int64(i) => Some(Decimal::from(*i)),
            Value::Double(d) => decimal_from_f64(*d),
            Value::Decimal(d) => Some(*d),
            _ => None,
        }
    }

    /// Looks up a property. `None` means absent; a present `null` is
    /// `Some(&Value::Null)`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(name),
            Value::Document(map) => map.get(name),
            _ => None,
        }
    }

    /// Iterates the properties of an object in its natural order: sorted for
    /// [`Value::Object`], insertion order for [`Value::Document`].
    pub fn entries(&self) -> Option<Entries<'_>> {
        match self {
            Value::Object(map) => Some(Entries::Object(map.iter())),
            Value::Document(map) => Some(Entries::Document(map.iter())),
            _ => None,
        }
    }

    /// Number of properties or items; `None` for scalars.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Object(map) => Some(map.len()),
            Value::Document(map) => Some(map.len()),
            Value::Array(items) => Some(items.len()),
            _ => None,
        }
    }

    /// Structural equality as JSON Schema sees it: numbers compare by value
    /// across representations, and objects compare by their key sets
    /// regardless of order or map flavour.
    pub fn deep_eq(&self, other: &Value) -> bool {
        if self.is_number() && other.is_number() {
            return match (self.as_decimal(), other.as_decimal()) {
                (Some(a), Some(b)) => a == b,
                _ => self.as_f64() == other.as_f64(),
            };
        }

        match (self, other) {
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.deep_eq(y))
            }
            (a, b) if a.is_object() && b.is_object() => {
                a.len() == b.len()
                    && a.entries()
                        .into_iter()
                        .flatten()
                        .all(|(key, x)| b.get(key).map_or(false, |y| x.deep_eq(y)))
            }
            (a, b) => a == b,
        }
    }
}

/// Property iterator over either object flavour.
pub enum Entries<'a> {
    Object(btree_map::Iter<'a, String, Value>),
    Document(indexmap::map::Iter<'a, String, Value>),
}

impl<'a> Iterator for Entries<'a> {
    type Item = (&'a str, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Entries::Object(iter) => iter.next().map(|(k, v)| (k.as_str(), v)),
            Entries::Document(iter) => iter.next().map(|(k, v)| (k.as_str(), v)),
        }
    }
}

// Shortest round-trip rendering keeps 0.1 as 0.1 rather than its binary
// expansion. Values outside Decimal's range or precision yield None, so a
// tiny double is never rounded to zero.
pub(crate) fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }

    let rendered = value.to_string();
    let decimal: Decimal = rendered.parse().ok()?;
    if decimal.to_string() == rendered {
        Some(decimal)
    } else {
        None
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int32(i) => write!(f, "{}", i),
            Value::Int64(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{}", d),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Object(_) | Value::Document(_) => {
                f.write_str("{")?;
                for (i, (key, value)) in self.entries().into_iter().flatten().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{:?}: {}", key, value)?;
                }
                f.write_str("}")
            }
            Value::ObjectId(id) => write!(f, "ObjectId({:?})", id.to_hex()),
            Value::RegularExpression(re) => write!(f, "/{}/{}", re.pattern, re.options),
            Value::DateTime(dt) => write!(
                f,
                "Date({:?})",
                dt.to_rfc3339_opts(SecondsFormat::Millis, true)
            ),
            Value::Decimal(d) => write!(f, "Decimal({:?})", d.to_string()),
            Value::Timestamp(ts) => write!(f, "Timestamp({}, {})", ts.time, ts.increment),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => from_json_number(&n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&serde_json::Value> for Value {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => from_json_number(n),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::Array(items.iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

// Integers keep the narrowest native width; everything else is a double.
fn from_json_number(n: &serde_json::Number) -> Value {
    match n.as_i64() {
        Some(i) => match i32::try_from(i) {
            Ok(i) => Value::Int32(i),
            Err(_) => Value::Int64(i),
        },
        None => n.as_f64().map(Value::Double).unwrap_or(Value::Null),
    }
}

macro_rules! impl_from {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for Value {
                fn from(value: $source) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i32 => Int32,
    i64 => Int64,
    f64 => Double,
    String => String,
    Vec<Value> => Array,
    BTreeMap<String, Value> => Object,
    IndexMap<String, Value> => Document,
    ObjectId => ObjectId,
    RegularExpression => RegularExpression,
    DateTime<Utc> => DateTime,
    Decimal => Decimal,
    Timestamp => Timestamp,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}
