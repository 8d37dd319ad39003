use crate::value::{Kind, Value};
use std::fmt;
use std::str::FromStr;

/// A primitive type name accepted by the `type` keyword.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "fuzz", derive(arbitrary::Arbitrary))]
pub enum JsonType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl JsonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JsonType::Null => "null",
            JsonType::Boolean => "boolean",
            JsonType::Integer => "integer",
            JsonType::Number => "number",
            JsonType::String => "string",
            JsonType::Array => "array",
            JsonType::Object => "object",
        }
    }

    /// Integer-ness is a property of the representation: a double holding
    /// `1.0` is a number but not an integer.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value.kind()) {
            (JsonType::Null, Kind::Null) => true,
            (JsonType::Boolean, Kind::Bool) => true,
            (JsonType::Integer, Kind::Integer) => true,
            (JsonType::Number, Kind::Integer) | (JsonType::Number, Kind::Double) => true,
            (JsonType::String, Kind::String) => true,
            (JsonType::Array, Kind::Array) => true,
            (JsonType::Object, Kind::Object) => true,
            _ => false,
        }
    }
}

impl FromStr for JsonType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "null" => Ok(Self::Null),
            "boolean" => Ok(Self::Boolean),
            "integer" => Ok(Self::Integer),
            "number" => Ok(Self::Number),
            "string" => Ok(Self::String),
            "array" => Ok(Self::Array),
            "object" => Ok(Self::Object),
            _ => Err(()),
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A type name accepted by the `bsonType` keyword.
///
/// `int` and `long` are both "any integer": the taxonomy does not
/// distinguish native widths. `number` spans integers, doubles and
/// decimals. `bool` is also spelled `boolean`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "fuzz", derive(arbitrary::Arbitrary))]
pub enum BsonType {
    ObjectId,
    Double,
    String,
    Object,
    Array,
    Bool,
    Date,
    Null,
    Regex,
    Int,
    Long,
    Decimal,
    Timestamp,
    Number,
}

impl BsonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BsonType::ObjectId => "objectId",
            BsonType::Double => "double",
            BsonType::String => "string",
            BsonType::Object => "object",
            BsonType::Array => "array",
            BsonType::Bool => "bool",
            BsonType::Date => "date",
            BsonType::Null => "null",
            BsonType::Regex => "regex",
            BsonType::Int => "int",
            BsonType::Long => "long",
            BsonType::Decimal => "decimal",
            BsonType::Timestamp => "timestamp",
            BsonType::Number => "number",
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        let kind = value.kind();
        match self {
            BsonType::ObjectId => kind == Kind::ObjectId,
            BsonType::Double => kind == Kind::Double,
            BsonType::String => kind == Kind::String,
            BsonType::Object => kind == Kind::Object,
            BsonType::Array => kind == Kind::Array,
            BsonType::Bool => kind == Kind::Bool,
            BsonType::Date => kind == Kind::DateTime,
            BsonType::Null => kind == Kind::Null,
            BsonType::Regex => kind == Kind::RegularExpression,
            BsonType::Int | BsonType::Long => kind == Kind::Integer,
            BsonType::Decimal => kind == Kind::Decimal,
            // A replication timestamp is its own type, never an integer.
            BsonType::Timestamp => kind == Kind::Timestamp,
            BsonType::Number => matches!(kind, Kind::Integer | Kind::Double | Kind::Decimal),
        }
    }
}

impl FromStr for BsonType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "objectId" => Ok(Self::ObjectId),
            "double" => Ok(Self::Double),
            "string" => Ok(Self::String),
            "object" => Ok(Self::Object),
            "array" => Ok(Self::Array),
            "bool" | "boolean" => Ok(Self::Bool),
            "date" => Ok(Self::Date),
            "null" => Ok(Self::Null),
            "regex" => Ok(Self::Regex),
            "int" => Ok(Self::Int),
            "long" => Ok(Self::Long),
            "decimal" => Ok(Self::Decimal),
            "timestamp" => Ok(Self::Timestamp),
            "number" => Ok(Self::Number),
            _ => Err(()),
        }
    }
}

impl fmt::Display for BsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
