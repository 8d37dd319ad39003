use crate::loader::{LoadError, Loader};
use crate::resolver::{self, Fetcher, Location, NoFetcher, ResolveError, Resolver, DEFAULT_BASE_URI};
use crate::schema::{Additional, Dependency, Draft, Items, Node, NodeId, Schema};
use crate::types::{BsonType, JsonType};
use crate::value::Value;
use indexmap::IndexMap;
use regex::Regex;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to load schema: {0}")]
    Load(#[from] LoadError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("{location}: not a schema")]
    NotASchema { location: String },

    #[error("{location}: invalid {keyword}: {reason}")]
    InvalidKeyword {
        location: String,
        keyword: &'static str,
        reason: String,
    },

    #[error("{location}: unknown type {name:?} in {keyword}")]
    UnknownType {
        location: String,
        keyword: &'static str,
        name: String,
    },

    #[error("{location}: invalid regular expression in {keyword}: {source}")]
    InvalidRegex {
        location: String,
        keyword: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("{location}: schema refers back to itself without consuming any input")]
    ReferenceCycle { location: String },
}

#[derive(Default)]
pub struct CompileOptions<'a> {
    draft: Option<Draft>,
    fetcher: Option<&'a dyn Fetcher>,
}

impl<'a> CompileOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draft used when the root `$schema` names none this crate knows.
    pub fn with_draft(mut self, draft: Draft) -> Self {
        self.draft = Some(draft);
        self
    }

    pub fn with_fetcher(mut self, fetcher: &'a dyn Fetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }
}

/// Compiles a schema with default options: draft 7 unless `$schema` says
/// otherwise, and no remote references.
pub fn compile<L: Loader + ?Sized>(loader: &L) -> Result<Schema, CompileError> {
    Schema::compile(loader, CompileOptions::new())
}

impl Schema {
    pub fn compile<L: Loader + ?Sized>(
        loader: &L,
        options: CompileOptions<'_>,
    ) -> Result<Schema, CompileError> {
        let (document, pointer) = loader.load_document()?;
        let document = Arc::new(document.into_owned());
        let mut base = match loader.base_uri() {
            Some(url) => url,
            None => Url::parse(DEFAULT_BASE_URI).map_err(|source| ResolveError::InvalidUrl {
                reference: DEFAULT_BASE_URI.to_owned(),
                source,
            })?,
        };
        base.set_fragment(None);

        let draft = document
            .get("$schema")
            .and_then(Value::as_str)
            .and_then(Draft::from_url)
            .or(options.draft)
            .unwrap_or_default();
        debug!(%base, ?draft, "compiling schema");

        let mut compiler = Compiler {
            draft,
            resolver: Resolver::new(options.fetcher.unwrap_or(&NoFetcher), draft),
            nodes: Vec::new(),
            table: HashMap::new(),
        };
        compiler.resolver.add_document(base.clone(), Arc::clone(&document));

        let location = Location {
            document: base.clone(),
            pointer,
        };
        let value = resolver::pointer(&document, &location.pointer).ok_or_else(|| {
            ResolveError::NotFound {
                url: base.clone(),
                reference: location.pointer.clone(),
            }
        })?;
        let root_base = compiler.resolver.base_of(&location)?;
        let root = compiler.compile_at(value, location, &root_base)?;
        compiler.check_cycles()?;

        debug!(nodes = compiler.nodes.len(), "schema compiled");
        Ok(Schema {
            nodes: compiler.nodes,
            root,
            draft,
        })
    }
}

struct Compiler<'f> {
    draft: Draft,
    resolver: Resolver<'f>,
    nodes: Vec<Node>,
    // Reference table: one node per distinct schema location.
    table: HashMap<Location, NodeId>,
}

impl Compiler<'_> {
    fn compile_at(
        &mut self,
        value: &Value,
        location: Location,
        base: &Url,
    ) -> Result<NodeId, CompileError> {
        if let Some(&id) = self.table.get(&location) {
            return Ok(id);
        }

        // Reserve the slot first so recursive references find it.
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::default());
        self.table.insert(location.clone(), id);

        let node = self.build(value, &location, base)?;
        self.nodes[id.0] = node;
        Ok(id)
    }

    fn build(&mut self, value: &Value, location: &Location, base: &Url) -> Result<Node, CompileError> {
        let mut node = Node {
            location: location.to_string(),
            ..Node::default()
        };

        if let Value::Bool(b) = value {
            if self.draft != Draft::Draft4 {
                node.constant = Some(*b);
                return Ok(node);
            }
        }

        if !value.is_object() {
            return Err(CompileError::NotASchema {
                location: location.to_string(),
            });
        }

        let base = match value.get(self.draft.id_keyword()).and_then(Value::as_str) {
            Some(id) => resolver::join(base, id)?,
            None => base.clone(),
        };
        let cx = Context {
            location,
            base: &base,
        };

        if let Some(definitions) = value.get("definitions") {
            let entries = object(definitions, location, "definitions")?;
            for (name, definition) in entries {
                self.compile_at(definition, location.join("definitions").join(name), &base)?;
            }
        }

        if let Some(reference) = value.get("$ref") {
            let reference = reference
                .as_str()
                .ok_or_else(|| invalid(location, "$ref", "expected a string"))?;
            node.reference = Some(self.reference(reference, &base)?);
            return Ok(node);
        }

        for (keyword, raw) in value.entries().into_iter().flatten() {
            self.keyword(&mut node, &cx, value, keyword, raw)?;
        }

        if self.draft == Draft::Draft4 {
            apply_draft4_exclusive(&mut node, value, location)?;
        }

        Ok(node)
    }

    fn keyword(
        &mut self,
        node: &mut Node,
        cx: &Context<'_>,
        schema: &Value,
        keyword: &str,
        raw: &Value,
    ) -> Result<(), CompileError> {
        let location = cx.location;
        let draft6 = self.draft != Draft::Draft4;
        let draft7 = self.draft == Draft::Draft7;

        match keyword {
            "type" => node.types = type_names::<JsonType>(raw, location, "type")?,
            "bsonType" => node.bson_types = type_names::<BsonType>(raw, location, "bsonType")?,
            "enum" => {
                let values = raw
                    .as_array()
                    .ok_or_else(|| invalid(location, "enum", "expected an array"))?;
                if values.is_empty() {
                    return Err(invalid(location, "enum", "must have at least one value"));
                }
                if has_duplicates(values) {
                    return Err(invalid(location, "enum", "values must be unique"));
                }
                node.enum_ = Some(values.to_vec());
            }
            "const" if draft6 => node.const_ = Some(raw.clone()),

            "properties" => {
                for (name, child) in object(raw, location, "properties")? {
                    let id = self.child(child, cx, &["properties", name])?;
                    node.properties.insert(name.to_owned(), id);
                }
            }
            "patternProperties" => {
                for (pattern, child) in object(raw, location, "patternProperties")? {
                    let regex = regex(pattern, location, "patternProperties")?;
                    let id = self.child(child, cx, &["patternProperties", pattern])?;
                    node.pattern_properties.push((regex, id));
                }
            }
            "additionalProperties" => {
                node.additional_properties = self.additional(raw, cx, "additionalProperties")?
            }
            "propertyNames" if draft6 => {
                node.property_names = Some(self.child(raw, cx, &["propertyNames"])?)
            }
            "required" => {
                let names = string_array(raw, location, "required")?;
                if names.is_empty() && !draft6 {
                    return Err(invalid(location, "required", "must have at least one name"));
                }
                node.required = names;
            }
            "minProperties" => node.min_properties = Some(count(raw, location, "minProperties")?),
            "maxProperties" => node.max_properties = Some(count(raw, location, "maxProperties")?),
            "dependencies" => {
                let mut dependencies = IndexMap::new();
                for (name, dependency) in object(raw, location, "dependencies")? {
                    let dependency = match dependency {
                        Value::Array(_) => {
                            Dependency::Properties(string_array(dependency, location, "dependencies")?)
                        }
                        _ => Dependency::Schema(self.child(dependency, cx, &["dependencies", name])?),
                    };
                    dependencies.insert(name.to_owned(), dependency);
                }
                node.dependencies = dependencies;
            }

            "items" => {
                node.items = Some(match raw {
                    Value::Array(schemas) => Items::Positional(
                        schemas
                            .iter()
                            .enumerate()
                            .map(|(i, child)| self.child(child, cx, &["items", i.to_string().as_str()]))
                            .collect::<Result<_, _>>()?,
                    ),
                    _ => Items::Uniform(self.child(raw, cx, &["items"])?),
                })
            }
            "additionalItems" => node.additional_items = self.additional(raw, cx, "additionalItems")?,
            "contains" if draft6 => node.contains = Some(self.child(raw, cx, &["contains"])?),
            "minItems" => node.min_items = Some(count(raw, location, "minItems")?),
            "maxItems" => node.max_items = Some(count(raw, location, "maxItems")?),
            "uniqueItems" => {
                node.unique_items = raw
                    .as_bool()
                    .ok_or_else(|| invalid(location, "uniqueItems", "expected a boolean"))?
            }

            "minimum" => node.minimum = Some(number(raw, location, "minimum")?),
            "maximum" => node.maximum = Some(number(raw, location, "maximum")?),
            "exclusiveMinimum" if draft6 => {
                node.exclusive_minimum = Some(number(raw, location, "exclusiveMinimum")?)
            }
            "exclusiveMaximum" if draft6 => {
                node.exclusive_maximum = Some(number(raw, location, "exclusiveMaximum")?)
            }
            "multipleOf" => {
                let divisor = number(raw, location, "multipleOf")?;
                if divisor <= 0.0 {
                    return Err(invalid(location, "multipleOf", "must be strictly greater than 0"));
                }
                node.multiple_of = Some(divisor);
            }

            "minLength" => node.min_length = Some(count(raw, location, "minLength")?),
            "maxLength" => node.max_length = Some(count(raw, location, "maxLength")?),
            "pattern" => {
                let pattern = raw
                    .as_str()
                    .ok_or_else(|| invalid(location, "pattern", "expected a string"))?;
                node.pattern = Some(regex(pattern, location, "pattern")?);
            }
            "format" => {
                node.format = Some(
                    raw.as_str()
                        .ok_or_else(|| invalid(location, "format", "expected a string"))?
                        .to_owned(),
                )
            }

            "allOf" => node.all_of = self.schema_list(raw, cx, "allOf")?,
            "anyOf" => node.any_of = self.schema_list(raw, cx, "anyOf")?,
            "oneOf" => node.one_of = self.schema_list(raw, cx, "oneOf")?,
            "not" => node.not = Some(self.child(raw, cx, &["not"])?),
            "if" if draft7 => node.if_ = Some(self.child(raw, cx, &["if"])?),
            // then/else without if are inert.
            "then" if draft7 && schema.get("if").is_some() => {
                node.then = Some(self.child(raw, cx, &["then"])?)
            }
            "else" if draft7 && schema.get("if").is_some() => {
                node.else_ = Some(self.child(raw, cx, &["else"])?)
            }

            "validate" => node.validate = Some(raw.clone()),
            _ => {}
        }

        Ok(())
    }

    fn child(&mut self, value: &Value, cx: &Context<'_>, path: &[&str]) -> Result<NodeId, CompileError> {
        let location = path
            .iter()
            .fold(cx.location.clone(), |location, token| location.join(token));
        self.compile_at(value, location, cx.base)
    }

    fn schema_list(
        &mut self,
        raw: &Value,
        cx: &Context<'_>,
        keyword: &'static str,
    ) -> Result<Vec<NodeId>, CompileError> {
        let schemas = raw
            .as_array()
            .ok_or_else(|| invalid(cx.location, keyword, "expected an array of schemas"))?;
        if schemas.is_empty() {
            return Err(invalid(cx.location, keyword, "must have at least one schema"));
        }

        schemas
            .iter()
            .enumerate()
            .map(|(i, child)| self.child(child, cx, &[keyword, i.to_string().as_str()]))
            .collect()
    }

    fn additional(
        &mut self,
        raw: &Value,
        cx: &Context<'_>,
        keyword: &'static str,
    ) -> Result<Additional, CompileError> {
        match raw {
            Value::Bool(true) => Ok(Additional::Allowed),
            Value::Bool(false) => Ok(Additional::Forbidden),
            _ => Ok(Additional::Schema(self.child(raw, cx, &[keyword])?)),
        }
    }

    fn reference(&mut self, reference: &str, base: &Url) -> Result<NodeId, CompileError> {
        let location = self.resolver.resolve(reference, base)?;
        debug!(reference, target = %location, "linking reference");

        if let Some(&id) = self.table.get(&location) {
            return Ok(id);
        }

        let document = self.resolver.document(&location.document)?;
        let target = resolver::pointer(&document, &location.pointer).ok_or_else(|| {
            ResolveError::NotFound {
                url: location.document.clone(),
                reference: reference.to_owned(),
            }
        })?;
        let target_base = self.resolver.base_of(&location)?;
        self.compile_at(target, location, &target_base)
    }

    // A cycle along in-place edges would re-validate the same value forever.
    fn check_cycles(&self) -> Result<(), CompileError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Active,
            Done,
        }

        fn visit(nodes: &[Node], marks: &mut [Mark], id: NodeId) -> Result<(), CompileError> {
            match marks[id.0] {
                Mark::Done => return Ok(()),
                Mark::Active => {
                    return Err(CompileError::ReferenceCycle {
                        location: nodes[id.0].location.clone(),
                    })
                }
                Mark::New => {}
            }

            marks[id.0] = Mark::Active;
            for child in nodes[id.0].in_place_children() {
                visit(nodes, marks, child)?;
            }
            marks[id.0] = Mark::Done;
            Ok(())
        }

        let mut marks = vec![Mark::New; self.nodes.len()];
        for i in 0..self.nodes.len() {
            visit(&self.nodes, &mut marks, NodeId(i))?;
        }
        Ok(())
    }
}

struct Context<'a> {
    location: &'a Location,
    base: &'a Url,
}

fn invalid(location: &Location, keyword: &'static str, reason: impl Into<String>) -> CompileError {
    CompileError::InvalidKeyword {
        location: location.to_string(),
        keyword,
        reason: reason.into(),
    }
}

fn object<'v>(
    raw: &'v Value,
    location: &Location,
    keyword: &'static str,
) -> Result<Vec<(&'v str, &'v Value)>, CompileError> {
    raw.entries()
        .map(|entries| entries.collect())
        .ok_or_else(|| invalid(location, keyword, "expected an object"))
}

fn type_names<T: FromStr>(
    raw: &Value,
    location: &Location,
    keyword: &'static str,
) -> Result<Vec<T>, CompileError> {
    let names: Vec<&str> = match raw {
        Value::String(name) => vec![name.as_str()],
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .ok_or_else(|| invalid(location, keyword, "type names must be strings"))
            })
            .collect::<Result<_, _>>()?,
        _ => return Err(invalid(location, keyword, "expected a string or an array of strings")),
    };

    names
        .into_iter()
        .map(|name| {
            name.parse().map_err(|_| CompileError::UnknownType {
                location: location.to_string(),
                keyword,
                name: name.to_owned(),
            })
        })
        .collect()
}

fn string_array(raw: &Value, location: &Location, keyword: &'static str) -> Result<Vec<String>, CompileError> {
    let items = raw
        .as_array()
        .ok_or_else(|| invalid(location, keyword, "expected an array of strings"))?;

    let names = items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_owned)
                .ok_or_else(|| invalid(location, keyword, "expected an array of strings"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if has_duplicates(items) {
        return Err(invalid(location, keyword, "names must be unique"));
    }
    Ok(names)
}

fn has_duplicates(values: &[Value]) -> bool {
    values
        .iter()
        .enumerate()
        .any(|(i, a)| values[i + 1..].iter().any(|b| a.deep_eq(b)))
}

fn number(raw: &Value, location: &Location, keyword: &'static str) -> Result<f64, CompileError> {
    raw.as_f64()
        .filter(|n| n.is_finite())
        .ok_or_else(|| invalid(location, keyword, format!("expected a number, got {}", raw)))
}

// Whole doubles such as 2.0 are accepted as counts.
fn count(raw: &Value, location: &Location, keyword: &'static str) -> Result<usize, CompileError> {
    let n = raw
        .as_f64()
        .filter(|n| *n >= 0.0 && n.fract() == 0.0 && *n <= usize::MAX as f64)
        .ok_or_else(|| invalid(location, keyword, format!("expected a non-negative integer, got {}", raw)))?;
    Ok(n as usize)
}

fn regex(pattern: &str, location: &Location, keyword: &'static str) -> Result<Regex, CompileError> {
    Regex::new(pattern).map_err(|source| CompileError::InvalidRegex {
        location: location.to_string(),
        keyword,
        source,
    })
}

// Draft 4 spells exclusive bounds as booleans qualifying minimum/maximum.
fn apply_draft4_exclusive(node: &mut Node, schema: &Value, location: &Location) -> Result<(), CompileError> {
    let bounds = [
        ("exclusiveMinimum", "minimum"),
        ("exclusiveMaximum", "maximum"),
    ];

    for (keyword, bound) in bounds {
        let exclusive = match schema.get(keyword) {
            Some(raw) => raw
                .as_bool()
                .ok_or_else(|| invalid(location, keyword, "expected a boolean"))?,
            None => continue,
        };
        if schema.get(bound).is_none() {
            return Err(invalid(location, keyword, format!("requires {}", bound)));
        }
        if exclusive {
            if bound == "minimum" {
                node.exclusive_minimum = node.minimum.take();
            } else {
                node.exclusive_maximum = node.maximum.take();
            }
        }
    }

    Ok(())
}
