use crate::resolver::{self, Fetcher, ResolveError};
use crate::value::{ObjectId, RegularExpression, Timestamp, Value};
use chrono::{DateTime, TimeZone, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use std::borrow::Cow;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid extended JSON at {path:?}: {reason}")]
    ExtendedJson { path: String, reason: String },

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Produces the root value of a schema or instance document.
pub trait Loader {
    fn load(&self) -> Result<Cow<'_, Value>, LoadError>;

    /// Base URI for references made by the loaded document.
    fn base_uri(&self) -> Option<Url> {
        None
    }

    /// The whole enclosing document plus the JSON pointer of the loaded value
    /// within it. Internal references resolve against that document.
    fn load_document(&self) -> Result<(Cow<'_, Value>, String), LoadError> {
        Ok((self.load()?, String::new()))
    }
}

impl Loader for Value {
    fn load(&self) -> Result<Cow<'_, Value>, LoadError> {
        Ok(Cow::Borrowed(self))
    }
}

impl Loader for serde_json::Value {
    fn load(&self) -> Result<Cow<'_, Value>, LoadError> {
        Ok(Cow::Owned(Value::from(self)))
    }
}

/// JSON text.
impl Loader for str {
    fn load(&self) -> Result<Cow<'_, Value>, LoadError> {
        let json: serde_json::Value = serde_json::from_str(self)?;
        Ok(Cow::Owned(Value::from(json)))
    }
}

/// MongoDB Extended JSON, canonical or relaxed. Wrapper objects such as
/// `{"$oid": "..."}` decode to the native extended types and every other
/// object becomes an ordered [`Value::Document`].
///
/// ```
/// use bsonschema::{ExtendedJson, Loader, Value};
/// use serde_json::json;
///
/// let doc = json!({ "n": { "$numberLong": "42" } });
/// let loader = ExtendedJson(&doc);
/// let value = loader.load().unwrap();
/// assert_eq!(Some(&Value::Int64(42)), value.get("n"));
/// ```
#[derive(Clone, Copy, Debug)]
pub struct ExtendedJson<'a>(pub &'a serde_json::Value);

impl Loader for ExtendedJson<'_> {
    fn load(&self) -> Result<Cow<'_, Value>, LoadError> {
        let mut path = Vec::new();
        decode_extended(self.0, &mut path).map(Cow::Owned)
    }
}

/// A document named by URL and retrieved through a [`Fetcher`]. A fragment,
/// if any, is a JSON pointer selecting part of the document.
pub struct ReferenceLoader<'f> {
    url: Url,
    fetcher: &'f dyn Fetcher,
}

impl<'f> ReferenceLoader<'f> {
    pub fn new(url: Url, fetcher: &'f dyn Fetcher) -> Self {
        Self { url, fetcher }
    }

    pub fn parse(url: &str, fetcher: &'f dyn Fetcher) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(url)?, fetcher))
    }
}

impl Loader for ReferenceLoader<'_> {
    fn load(&self) -> Result<Cow<'_, Value>, LoadError> {
        let (document, pointer) = self.load_document()?;
        match resolver::pointer(&document, &pointer) {
            Some(value) => Ok(Cow::Owned(value.clone())),
            None => Err(self.not_found(&pointer)),
        }
    }

    fn base_uri(&self) -> Option<Url> {
        let mut url = self.url.clone();
        url.set_fragment(None);
        Some(url)
    }

    fn load_document(&self) -> Result<(Cow<'_, Value>, String), LoadError> {
        let mut url = self.url.clone();
        url.set_fragment(None);

        let resource = self.fetcher.fetch(&url).map_err(|source| ResolveError::Fetch {
            url: url.clone(),
            source,
        })?;
        let document = resource
            .into_value()
            .map_err(|source| ResolveError::Parse {
                url: url.clone(),
                source,
            })?;

        let pointer = self.url.fragment().map(resolver::percent_decode).unwrap_or_default();
        if resolver::pointer(&document, &pointer).is_none() {
            return Err(self.not_found(&pointer));
        }

        Ok((Cow::Owned(document), pointer))
    }
}

impl ReferenceLoader<'_> {
    fn not_found(&self, pointer: &str) -> LoadError {
        LoadError::Resolve(ResolveError::NotFound {
            url: self.url.clone(),
            reference: pointer.to_owned(),
        })
    }
}

fn decode_extended(json: &serde_json::Value, path: &mut Vec<String>) -> Result<Value, LoadError> {
    let map = match json {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                path.push(i.to_string());
                out.push(decode_extended(item, path)?);
                path.pop();
            }
            return Ok(Value::Array(out));
        }
        _ => return Ok(Value::from(json)),
    };

    if let Some(value) = decode_wrapper(map).map_err(|reason| LoadError::ExtendedJson {
        path: format!("/{}", path.join("/")),
        reason,
    })? {
        return Ok(value);
    }

    let mut out = IndexMap::with_capacity(map.len());
    for (key, item) in map {
        path.push(key.clone());
        out.insert(key.clone(), decode_extended(item, path)?);
        path.pop();
    }
    Ok(Value::Document(out))
}

// Ok(None) when the object is an ordinary document rather than a wrapper.
fn decode_wrapper(map: &serde_json::Map<String, serde_json::Value>) -> Result<Option<Value>, String> {
    if map.len() == 2 {
        if let (Some(pattern), Some(options)) = (map.get("$regex"), map.get("$options")) {
            return Ok(Some(Value::RegularExpression(RegularExpression {
                pattern: string(pattern, "$regex")?.to_owned(),
                options: string(options, "$options")?.to_owned(),
            })));
        }
    }

    let (key, inner) = match map.iter().next() {
        Some((key, inner)) if map.len() == 1 && key.starts_with('$') => (key.as_str(), inner),
        _ => return Ok(None),
    };

    let value = match key {
        "$oid" => Value::ObjectId(
            string(inner, key)?
                .parse::<ObjectId>()
                .map_err(|err| err.to_string())?,
        ),
        "$numberInt" => Value::Int32(
            string(inner, key)?
                .parse()
                .map_err(|_| format!("{} is not a 32-bit integer", inner))?,
        ),
        "$numberLong" => Value::Int64(parse_long(inner, key)?),
        "$numberDouble" => Value::Double(parse_double(string(inner, key)?)?),
        "$numberDecimal" => Value::Decimal(parse_decimal(string(inner, key)?)?),
        "$date" => Value::DateTime(parse_date(inner)?),
        "$timestamp" => Value::Timestamp(Timestamp {
            time: u32_field(inner, "t")?,
            increment: u32_field(inner, "i")?,
        }),
        "$regularExpression" => Value::RegularExpression(RegularExpression {
            pattern: string(field(inner, "pattern")?, "pattern")?.to_owned(),
            options: string(field(inner, "options")?, "options")?.to_owned(),
        }),
        _ => return Ok(None),
    };

    Ok(Some(value))
}

fn string<'j>(json: &'j serde_json::Value, key: &str) -> Result<&'j str, String> {
    json.as_str()
        .ok_or_else(|| format!("{} must be a string, got {}", key, json))
}

fn field<'j>(json: &'j serde_json::Value, key: &str) -> Result<&'j serde_json::Value, String> {
    json.get(key)
        .ok_or_else(|| format!("missing field {:?} in {}", key, json))
}

fn u32_field(json: &serde_json::Value, key: &str) -> Result<u32, String> {
    field(json, key)?
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| format!("{} must be an unsigned 32-bit integer", key))
}

fn parse_long(json: &serde_json::Value, key: &str) -> Result<i64, String> {
    string(json, key)?
        .parse()
        .map_err(|_| format!("{} is not a 64-bit integer", json))
}

fn parse_double(s: &str) -> Result<f64, String> {
    match s {
        "Infinity" => Ok(f64::INFINITY),
        "-Infinity" => Ok(f64::NEG_INFINITY),
        "NaN" => Ok(f64::NAN),
        _ => s.parse().map_err(|_| format!("{:?} is not a double", s)),
    }
}

fn parse_decimal(s: &str) -> Result<Decimal, String> {
    s.parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(s))
        .map_err(|_| format!("{:?} is not a decimal", s))
}

// Relaxed form is an ISO-8601 string or epoch milliseconds; canonical form
// wraps the milliseconds in $numberLong.
fn parse_date(json: &serde_json::Value) -> Result<DateTime<Utc>, String> {
    let millis = match json {
        serde_json::Value::String(s) => {
            return DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|err| format!("{:?} is not an RFC 3339 date: {}", s, err));
        }
        serde_json::Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| format!("{} is not a millisecond count", n))?,
        serde_json::Value::Object(_) => parse_long(field(json, "$numberLong")?, "$numberLong")?,
        _ => return Err(format!("{} is not a date", json)),
    };

    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| format!("{} milliseconds is out of range", millis))
}
