use crate::schema::Draft;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Base URI given to schemas loaded from memory.
pub const DEFAULT_BASE_URI: &str = "json-schema:///";

/// A document returned by a [`Fetcher`].
#[derive(Clone, Debug)]
pub enum Resource {
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    Value(Value),
}

impl Resource {
    pub fn into_value(self) -> Result<Value, serde_json::Error> {
        match self {
            Resource::Bytes(bytes) => serde_json::from_slice::<serde_json::Value>(&bytes).map(Value::from),
            Resource::Json(json) => Ok(Value::from(json)),
            Resource::Value(value) => Ok(value),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct FetchError(String);

impl FetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Retrieves documents named by remote references. Network and filesystem
/// access live behind this trait, never inside the compiler.
pub trait Fetcher {
    fn fetch(&self, url: &Url) -> Result<Resource, FetchError>;
}

impl<F> Fetcher for F
where
    F: Fn(&Url) -> Result<Resource, FetchError>,
{
    fn fetch(&self, url: &Url) -> Result<Resource, FetchError> {
        self(url)
    }
}

/// Refuses every remote reference.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoFetcher;

impl Fetcher for NoFetcher {
    fn fetch(&self, url: &Url) -> Result<Resource, FetchError> {
        Err(FetchError::new(format!(
            "remote references are disabled, cannot fetch {}",
            url
        )))
    }
}

/// Serves documents registered up front, keyed by URL without fragment.
#[derive(Clone, Debug, Default)]
pub struct MapFetcher {
    documents: HashMap<Url, Value>,
}

impl MapFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mut url: Url, document: impl Into<Value>) {
        url.set_fragment(None);
        self.documents.insert(url, document.into());
    }

    pub fn with_document(
        mut self,
        url: &str,
        document: impl Into<Value>,
    ) -> Result<Self, url::ParseError> {
        self.insert(Url::parse(url)?, document);
        Ok(self)
    }
}

impl Fetcher for MapFetcher {
    fn fetch(&self, url: &Url) -> Result<Resource, FetchError> {
        self.documents
            .get(url)
            .cloned()
            .map(Resource::Value)
            .ok_or_else(|| FetchError::new(format!("no document registered for {}", url)))
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid reference {reference:?}: {source}")]
    InvalidUrl {
        reference: String,
        #[source]
        source: url::ParseError,
    },

    #[error("cannot fetch {url}: {source}")]
    Fetch {
        url: Url,
        #[source]
        source: FetchError,
    },

    #[error("{url} is not valid JSON: {source}")]
    Parse {
        url: Url,
        #[source]
        source: serde_json::Error,
    },

    #[error("{reference:?} does not point into {url}")]
    NotFound { url: Url, reference: String },
}

/// Where a raw schema lives: a document plus a JSON pointer into it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct Location {
    pub document: Url,
    pub pointer: String,
}

impl Location {
    pub fn root(document: Url) -> Self {
        Self {
            document,
            pointer: String::new(),
        }
    }

    pub fn join(&self, token: &str) -> Self {
        Self {
            document: self.document.clone(),
            pointer: format!("{}/{}", self.pointer, escape_token(token)),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.document, self.pointer)
    }
}

/// Per-compilation reference state: fetched documents (each fetched at most
/// once) and the locations named by `$id`.
pub(crate) struct Resolver<'f> {
    fetcher: &'f dyn Fetcher,
    draft: Draft,
    documents: HashMap<Url, Arc<Value>>,
    ids: HashMap<Url, Location>,
}

impl<'f> Resolver<'f> {
    pub fn new(fetcher: &'f dyn Fetcher, draft: Draft) -> Self {
        Self {
            fetcher,
            draft,
            documents: HashMap::new(),
            ids: HashMap::new(),
        }
    }

    pub fn add_document(&mut self, url: Url, document: Arc<Value>) {
        let mut ids = Vec::new();
        collect_ids(
            &document,
            self.draft.id_keyword(),
            &url,
            &Location::root(url.clone()),
            &mut ids,
        );
        for (id, location) in ids {
            self.ids.entry(id).or_insert(location);
        }
        self.documents.insert(url, document);
    }

    pub fn document(&mut self, url: &Url) -> Result<Arc<Value>, ResolveError> {
        if let Some(document) = self.documents.get(url) {
            return Ok(Arc::clone(document));
        }

        debug!(%url, "fetching remote schema document");
        let resource = self.fetcher.fetch(url).map_err(|source| ResolveError::Fetch {
            url: url.clone(),
            source,
        })?;
        let document = Arc::new(resource.into_value().map_err(|source| ResolveError::Parse {
            url: url.clone(),
            source,
        })?);

        self.add_document(url.clone(), Arc::clone(&document));
        Ok(document)
    }

    /// Resolves `reference` against `base` to a location whose value exists.
    pub fn resolve(&mut self, reference: &str, base: &Url) -> Result<Location, ResolveError> {
        let mut url = join(base, reference)?;
        if url.fragment() == Some("") {
            url.set_fragment(None);
        }

        if let Some(location) = self.ids.get(&url) {
            return Ok(location.clone());
        }

        let fragment = url.fragment().map(percent_decode).unwrap_or_default();
        let mut document_url = url.clone();
        document_url.set_fragment(None);

        let scope = match self.ids.get(&document_url) {
            Some(location) => location.clone(),
            None => {
                self.document(&document_url)?;
                Location::root(document_url)
            }
        };

        let not_found = || ResolveError::NotFound {
            url: url.clone(),
            reference: reference.to_owned(),
        };

        // Plain-name fragments are only reachable through a registered $id.
        if !fragment.is_empty() && !fragment.starts_with('/') {
            return Err(not_found());
        }

        let location = Location {
            document: scope.document,
            pointer: format!("{}{}", scope.pointer, fragment),
        };
        let document = self.document(&location.document)?;
        if pointer(&document, &location.pointer).is_none() {
            return Err(not_found());
        }

        Ok(location)
    }

    /// The base URI in effect for the schema at `location`, excluding that
    /// schema's own `$id`.
    pub fn base_of(&mut self, location: &Location) -> Result<Url, ResolveError> {
        let document = self.document(&location.document)?;
        let id_keyword = self.draft.id_keyword();
        let mut base = location.document.clone();
        let mut current: &Value = &document;

        for token in pointer_tokens(&location.pointer) {
            if let Some(id) = current.get(id_keyword).and_then(Value::as_str) {
                base = join(&base, id)?;
            }
            current = match child(current, &token) {
                Some(next) => next,
                None => break,
            };
        }

        Ok(base)
    }
}

pub(crate) fn join(base: &Url, reference: &str) -> Result<Url, ResolveError> {
    base.join(reference).map_err(|source| ResolveError::InvalidUrl {
        reference: reference.to_owned(),
        source,
    })
}

fn collect_ids(
    value: &Value,
    id_keyword: &str,
    base: &Url,
    location: &Location,
    out: &mut Vec<(Url, Location)>,
) {
    let mut base = base.clone();
    if let Some(id) = value.get(id_keyword).and_then(Value::as_str) {
        if let Ok(mut url) = base.join(id) {
            if url.fragment() == Some("") {
                url.set_fragment(None);
            }
            out.push((url.clone(), location.clone()));
            base = url;
        }
    }

    if let Some(entries) = value.entries() {
        for (key, child) in entries {
            // Literal data, not subschemas.
            if key == "enum" || key == "const" {
                continue;
            }
            collect_ids(child, id_keyword, &base, &location.join(key), out);
        }
    } else if let Some(items) = value.as_array() {
        for (i, child) in items.iter().enumerate() {
            collect_ids(child, id_keyword, &base, &location.join(&i.to_string()), out);
        }
    }
}

/// Evaluates a JSON pointer (`""` is the whole document).
pub fn pointer<'v>(value: &'v Value, pointer: &str) -> Option<&'v Value> {
    if !pointer.is_empty() && !pointer.starts_with('/') {
        return None;
    }

    pointer_tokens(pointer).try_fold(value, |current, token| child(current, &token))
}

fn child<'v>(value: &'v Value, token: &str) -> Option<&'v Value> {
    match value {
        Value::Array(items) => token.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => value.get(token),
    }
}

fn pointer_tokens(pointer: &str) -> impl Iterator<Item = String> + '_ {
    pointer
        .split('/')
        .skip(1)
        .map(|token| token.replace("~1", "/").replace("~0", "~"))
}

fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

pub(crate) fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(high), Some(low)) = (hex_digit(bytes[i + 1]), hex_digit(bytes[i + 2])) {
                out.push(high << 4 | low);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn hex_digit(byte: u8) -> Option<u8> {
    char::from(byte).to_digit(16).map(|digit| digit as u8)
}
