use crate::types::{BsonType, JsonType};
use crate::value::Value;
use indexmap::IndexMap;
use regex::Regex;
use std::ops::Index;

/// Handle to a node inside a compiled [`Schema`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// The JSON Schema draft whose keyword set is in effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "fuzz", derive(arbitrary::Arbitrary))]
pub enum Draft {
    Draft4,
    Draft6,
    Draft7,
}

impl Default for Draft {
    fn default() -> Self {
        Draft::Draft7
    }
}

impl Draft {
    /// Recognises the draft from a `$schema` URI.
    pub fn from_url(url: &str) -> Option<Self> {
        let url = url.trim_end_matches('#');
        let url = url
            .strip_prefix("http://")
            .or_else(|| url.strip_prefix("https://"))?;

        match url {
            "json-schema.org/draft-04/schema" => Some(Draft::Draft4),
            "json-schema.org/draft-06/schema" => Some(Draft::Draft6),
            "json-schema.org/draft-07/schema" => Some(Draft::Draft7),
            _ => None,
        }
    }

    pub(crate) fn id_keyword(self) -> &'static str {
        match self {
            Draft::Draft4 => "id",
            Draft::Draft6 | Draft::Draft7 => "$id",
        }
    }
}

/// Policy for `additionalProperties` and `additionalItems`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Additional {
    Allowed,
    Forbidden,
    Schema(NodeId),
}

impl Default for Additional {
    fn default() -> Self {
        Additional::Allowed
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Items {
    /// One schema applied to every element.
    Uniform(NodeId),
    /// One schema per position; the rest fall to `additionalItems`.
    Positional(Vec<NodeId>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dependency {
    Properties(Vec<String>),
    Schema(NodeId),
}

/// One compiled schema (sub-)unit. Children are [`NodeId`] handles into the
/// owning [`Schema`], so shared and recursive references stay single nodes.
#[derive(Debug, Default)]
pub struct Node {
    /// `document#pointer` of the raw schema this node was built from.
    pub location: String,
    /// `Some` for the boolean schemas `true` and `false`.
    pub constant: Option<bool>,
    /// When set, every other keyword is ignored.
    pub reference: Option<NodeId>,

    pub types: Vec<JsonType>,
    pub bson_types: Vec<BsonType>,
    pub enum_: Option<Vec<Value>>,
    pub const_: Option<Value>,

    pub properties: IndexMap<String, NodeId>,
    pub pattern_properties: Vec<(Regex, NodeId)>,
    pub additional_properties: Additional,
    pub property_names: Option<NodeId>,
    pub required: Vec<String>,
    pub min_properties: Option<usize>,
    pub max_properties: Option<usize>,
    pub dependencies: IndexMap<String, Dependency>,

    pub items: Option<Items>,
    pub additional_items: Additional,
    pub contains: Option<NodeId>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    pub unique_items: bool,

    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
    pub multiple_of: Option<f64>,

    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Regex>,
    pub format: Option<String>,

    pub all_of: Vec<NodeId>,
    pub any_of: Vec<NodeId>,
    pub one_of: Vec<NodeId>,
    pub not: Option<NodeId>,
    pub if_: Option<NodeId>,
    pub then: Option<NodeId>,
    pub else_: Option<NodeId>,

    /// Opaque payload of the `validate` keyword, handed to the evaluator.
    pub validate: Option<Value>,
}

impl Node {
    /// Children that are validated against the same instance value as this
    /// node, rather than against one of its properties or items.
    pub(crate) fn in_place_children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.reference
            .iter()
            .chain(&self.all_of)
            .chain(&self.any_of)
            .chain(&self.one_of)
            .chain(&self.not)
            .chain(&self.if_)
            .chain(&self.then)
            .chain(&self.else_)
            .copied()
            .chain(self.dependencies.values().filter_map(|dependency| match dependency {
                Dependency::Schema(id) => Some(*id),
                Dependency::Properties(_) => None,
            }))
    }
}

/// An immutable, compiled schema. Safe to share between threads and to
/// validate any number of instances.
#[derive(Debug)]
pub struct Schema {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
    pub(crate) draft: Draft,
}

impl Schema {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn draft(&self) -> Draft {
        self.draft
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Number of distinct compiled nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Index<NodeId> for Schema {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        self.node(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_from_url() {
        assert_eq!(
            Some(Draft::Draft4),
            Draft::from_url("http://json-schema.org/draft-04/schema#")
        );
        assert_eq!(
            Some(Draft::Draft6),
            Draft::from_url("https://json-schema.org/draft-06/schema")
        );
        assert_eq!(
            Some(Draft::Draft7),
            Draft::from_url("http://json-schema.org/draft-07/schema#")
        );
        assert_eq!(None, Draft::from_url("http://json-schema.org/draft/2020-12/schema"));
        assert_eq!(None, Draft::from_url("draft-07"));
    }

    #[test]
    fn schema_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Schema>();
    }
}
