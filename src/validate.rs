use crate::evaluator::{Evaluator, NoopEvaluator};
use crate::format::is_valid_format;
use crate::loader::{LoadError, Loader};
use crate::schema::{Additional, Dependency, Items, Node, NodeId, Schema};
use crate::value::{decimal_from_f64, Value};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::trace;

#[derive(Default)]
pub struct ValidateOptions<'a> {
    evaluator: Option<&'a dyn Evaluator>,
    max_depth: usize,
    max_errors: usize,
}

impl<'a> ValidateOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hook called for every node declaring `validate`. Defaults to
    /// [`NoopEvaluator`].
    pub fn with_evaluator(mut self, evaluator: &'a dyn Evaluator) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Maximum number of nested schema nodes entered at once. Zero means no
    /// limit.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Stop after this many errors. Zero means report everything.
    pub fn with_max_errors(mut self, max_errors: usize) -> Self {
        self.max_errors = max_errors;
        self
    }
}

/// Failure to run a validation at all, as opposed to an instance that does
/// not conform.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("failed to load instance: {0}")]
    Load(#[from] LoadError),

    #[error("max depth exceeded")]
    MaxDepthExceeded,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    /// Path from the instance root to the offending value.
    pub instance_path: Vec<String>,
    /// Location of the failing keyword within the schema.
    pub schema_path: String,
    pub keyword: &'static str,
    pub description: String,
    /// Type name of the offending value, e.g. `"objectId"` or `"int"`.
    pub value_type: &'static str,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "(root): {}", self.description)
        } else {
            write!(f, "{}: {}", self.instance_path.join("."), self.description)
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<ValidationError> {
        self.errors
    }
}

pub fn validate<L: Loader + ?Sized>(
    schema: &Schema,
    instance: &L,
    options: ValidateOptions<'_>,
) -> Result<ValidationResult, ValidateError> {
    let instance = instance.load()?;

    let mut vm = Vm {
        schema,
        evaluator: options.evaluator.unwrap_or(&NoopEvaluator),
        max_depth: options.max_depth,
        max_errors: options.max_errors,
        depth: 0,
        instance_tokens: vec![],
        errors: vec![],
    };

    match vm.validate(schema.root(), &instance) {
        Ok(()) | Err(VmValidateError::MaxErrorsReached) => Ok(ValidationResult { errors: vm.errors }),
        Err(VmValidateError::MaxDepthExceeded) => Err(ValidateError::MaxDepthExceeded),
    }
}

impl Schema {
    pub fn validate<L: Loader + ?Sized>(
        &self,
        instance: &L,
        options: ValidateOptions<'_>,
    ) -> Result<ValidationResult, ValidateError> {
        validate(self, instance, options)
    }

    pub fn is_valid(&self, instance: &Value) -> bool {
        validate(self, instance, ValidateOptions::new()).map_or(false, |result| result.is_valid())
    }
}

struct Vm<'a> {
    schema: &'a Schema,
    evaluator: &'a dyn Evaluator,
    max_depth: usize,
    max_errors: usize,
    depth: usize,
    instance_tokens: Vec<String>,
    errors: Vec<ValidationError>,
}

enum VmValidateError {
    MaxErrorsReached,
    MaxDepthExceeded,
}

impl<'a> Vm<'a> {
    fn validate(&mut self, id: NodeId, instance: &Value) -> Result<(), VmValidateError> {
        if self.max_depth != 0 && self.depth == self.max_depth {
            return Err(VmValidateError::MaxDepthExceeded);
        }

        let schema = self.schema;
        self.depth += 1;
        let result = self.validate_node(&schema[id], instance);
        self.depth -= 1;
        result
    }

    fn validate_node(&mut self, node: &'a Node, instance: &Value) -> Result<(), VmValidateError> {
        if let Some(constant) = node.constant {
            if !constant {
                self.push_error(node, "false", instance, "no value is allowed here")?;
            }
            return Ok(());
        }

        if let Some(target) = node.reference {
            return self.validate(target, instance);
        }

        self.validate_types(node, instance)?;

        if let Some(values) = &node.enum_ {
            if !values.iter().any(|value| value.deep_eq(instance)) {
                self.push_error(node, "enum", instance, "must be one of the enumerated values")?;
            }
        }

        if let Some(expected) = &node.const_ {
            if !expected.deep_eq(instance) {
                self.push_error(node, "const", instance, format!("must be equal to {}", expected))?;
            }
        }

        if instance.is_object() {
            self.validate_object(node, instance)?;
        }

        if let Some(items) = instance.as_array() {
            self.validate_array(node, instance, items)?;
        }

        if instance.is_number() {
            self.validate_number(node, instance)?;
        }

        if let Some(s) = instance.as_str() {
            self.validate_string(node, instance, s)?;
        }

        self.validate_combinators(node, instance)?;

        if let Some(expression) = &node.validate {
            trace!(path = ?self.instance_tokens, "calling evaluator");
            if let Err(err) = self.evaluator.evaluate(expression, &self.instance_tokens) {
                self.push_error(node, "validate", instance, err.message())?;
            }
        }

        Ok(())
    }

    fn validate_types(&mut self, node: &Node, instance: &Value) -> Result<(), VmValidateError> {
        if !node.types.is_empty() && !node.types.iter().any(|t| t.matches(instance)) {
            let expected: Vec<_> = node.types.iter().map(|t| t.as_str()).collect();
            self.push_error(
                node,
                "type",
                instance,
                format!("expected {}, found {}", expected.join(" or "), instance.type_name()),
            )?;
        }

        if !node.bson_types.is_empty() && !node.bson_types.iter().any(|t| t.matches(instance)) {
            let expected: Vec<_> = node.bson_types.iter().map(|t| t.as_str()).collect();
            self.push_error(
                node,
                "bsonType",
                instance,
                format!("expected {}, found {}", expected.join(" or "), instance.type_name()),
            )?;
        }

        Ok(())
    }

    fn validate_object(&mut self, node: &Node, instance: &Value) -> Result<(), VmValidateError> {
        for (name, &child) in &node.properties {
            if let Some(sub_instance) = instance.get(name) {
                self.push_instance_token(name);
                self.validate(child, sub_instance)?;
                self.pop_instance_token();
            }
        }

        for (key, sub_instance) in instance.entries().into_iter().flatten() {
            let mut matched = node.properties.contains_key(key);

            for (pattern, child) in &node.pattern_properties {
                if pattern.is_match(key) {
                    matched = true;
                    self.push_instance_token(key);
                    self.validate(*child, sub_instance)?;
                    self.pop_instance_token();
                }
            }

            if matched {
                continue;
            }

            match node.additional_properties {
                Additional::Allowed => {}
                Additional::Forbidden => {
                    self.push_instance_token(key);
                    self.push_error(
                        node,
                        "additionalProperties",
                        sub_instance,
                        format!("additional property {:?} is not allowed", key),
                    )?;
                    self.pop_instance_token();
                }
                Additional::Schema(child) => {
                    self.push_instance_token(key);
                    self.validate(child, sub_instance)?;
                    self.pop_instance_token();
                }
            }
        }

        for name in &node.required {
            if instance.get(name).is_none() {
                self.push_error(
                    node,
                    "required",
                    instance,
                    format!("missing required property {:?}", name),
                )?;
            }
        }

        let len = instance.len().unwrap_or_default();
        if let Some(min) = node.min_properties {
            if len < min {
                self.push_error(
                    node,
                    "minProperties",
                    instance,
                    format!("must have at least {} properties", min),
                )?;
            }
        }
        if let Some(max) = node.max_properties {
            if len > max {
                self.push_error(
                    node,
                    "maxProperties",
                    instance,
                    format!("must have at most {} properties", max),
                )?;
            }
        }

        if let Some(child) = node.property_names {
            for (key, _) in instance.entries().into_iter().flatten() {
                self.validate(child, &Value::String(key.to_owned()))?;
            }
        }

        for (name, dependency) in &node.dependencies {
            if instance.get(name).is_none() {
                continue;
            }

            match dependency {
                Dependency::Properties(names) => {
                    for required in names {
                        if instance.get(required).is_none() {
                            self.push_error(
                                node,
                                "dependencies",
                                instance,
                                format!("property {:?} is required when {:?} is present", required, name),
                            )?;
                        }
                    }
                }
                Dependency::Schema(child) => self.validate(*child, instance)?,
            }
        }

        Ok(())
    }

    fn validate_array(&mut self, node: &Node, instance: &Value, items: &[Value]) -> Result<(), VmValidateError> {
        match &node.items {
            Some(Items::Uniform(child)) => {
                for (i, item) in items.iter().enumerate() {
                    self.push_instance_token(&i.to_string());
                    self.validate(*child, item)?;
                    self.pop_instance_token();
                }
            }
            Some(Items::Positional(children)) => {
                for (i, item) in items.iter().enumerate() {
                    self.push_instance_token(&i.to_string());
                    match children.get(i) {
                        Some(child) => self.validate(*child, item)?,
                        None => match node.additional_items {
                            Additional::Allowed => {}
                            Additional::Forbidden => self.push_error(
                                node,
                                "additionalItems",
                                item,
                                format!("no more than {} items are allowed", children.len()),
                            )?,
                            Additional::Schema(child) => self.validate(child, item)?,
                        },
                    }
                    self.pop_instance_token();
                }
            }
            None => {}
        }

        if let Some(child) = node.contains {
            let mut found = false;
            for (i, item) in items.iter().enumerate() {
                self.push_instance_token(&i.to_string());
                let errors = self.probe(child, item)?;
                self.pop_instance_token();
                if errors.is_empty() {
                    found = true;
                    break;
                }
            }
            if !found {
                self.push_error(node, "contains", instance, "does not contain a matching item")?;
            }
        }

        if let Some(min) = node.min_items {
            if items.len() < min {
                self.push_error(node, "minItems", instance, format!("must have at least {} items", min))?;
            }
        }
        if let Some(max) = node.max_items {
            if items.len() > max {
                self.push_error(node, "maxItems", instance, format!("must have at most {} items", max))?;
            }
        }

        if node.unique_items {
            let duplicate = items.iter().enumerate().find_map(|(i, a)| {
                items[i + 1..]
                    .iter()
                    .position(|b| a.deep_eq(b))
                    .map(|offset| (i, i + 1 + offset))
            });
            if let Some((i, j)) = duplicate {
                self.push_error(
                    node,
                    "uniqueItems",
                    instance,
                    format!("items at index {} and {} are equal", i, j),
                )?;
            }
        }

        Ok(())
    }

    fn validate_number(&mut self, node: &Node, instance: &Value) -> Result<(), VmValidateError> {
        let n = match instance.as_f64() {
            Some(n) => n,
            None => return Ok(()),
        };

        if let Some(min) = node.minimum {
            if n < min {
                self.push_error(node, "minimum", instance, format!("must be greater than or equal to {}", min))?;
            }
        }
        if let Some(min) = node.exclusive_minimum {
            if n <= min {
                self.push_error(node, "exclusiveMinimum", instance, format!("must be greater than {}", min))?;
            }
        }
        if let Some(max) = node.maximum {
            if n > max {
                self.push_error(node, "maximum", instance, format!("must be less than or equal to {}", max))?;
            }
        }
        if let Some(max) = node.exclusive_maximum {
            if n >= max {
                self.push_error(node, "exclusiveMaximum", instance, format!("must be less than {}", max))?;
            }
        }

        if let Some(divisor) = node.multiple_of {
            if !is_multiple_of(instance, n, divisor) {
                self.push_error(node, "multipleOf", instance, format!("must be a multiple of {}", divisor))?;
            }
        }

        Ok(())
    }

    fn validate_string(&mut self, node: &Node, instance: &Value, s: &str) -> Result<(), VmValidateError> {
        if node.min_length.is_some() || node.max_length.is_some() {
            let len = s.chars().count();
            if let Some(min) = node.min_length {
                if len < min {
                    self.push_error(
                        node,
                        "minLength",
                        instance,
                        format!("must be at least {} characters long", min),
                    )?;
                }
            }
            if let Some(max) = node.max_length {
                if len > max {
                    self.push_error(
                        node,
                        "maxLength",
                        instance,
                        format!("must be at most {} characters long", max),
                    )?;
                }
            }
        }

        if let Some(pattern) = &node.pattern {
            if !pattern.is_match(s) {
                self.push_error(
                    node,
                    "pattern",
                    instance,
                    format!("does not match pattern {:?}", pattern.as_str()),
                )?;
            }
        }

        if let Some(format) = &node.format {
            if !is_valid_format(format, s) {
                self.push_error(node, "format", instance, format!("is not a valid {}", format))?;
            }
        }

        Ok(())
    }

    fn validate_combinators(&mut self, node: &Node, instance: &Value) -> Result<(), VmValidateError> {
        for &child in &node.all_of {
            self.validate(child, instance)?;
        }

        if !node.any_of.is_empty() {
            let mut failures = Vec::new();
            let mut matched = false;
            for &child in &node.any_of {
                let errors = self.probe(child, instance)?;
                if errors.is_empty() {
                    matched = true;
                    break;
                }
                failures.extend(errors);
            }

            if !matched {
                self.push_error(node, "anyOf", instance, "must match at least one schema in anyOf")?;
                self.extend_errors(failures)?;
            }
        }

        if !node.one_of.is_empty() {
            let mut failures = Vec::new();
            let mut matched = None;
            for (i, &child) in node.one_of.iter().enumerate() {
                let errors = self.probe(child, instance)?;
                if !errors.is_empty() {
                    failures.extend(errors);
                    continue;
                }

                if let Some(first) = matched {
                    self.push_error(
                        node,
                        "oneOf",
                        instance,
                        format!("matches more than one schema in oneOf (indices {} and {})", first, i),
                    )?;
                    break;
                }
                matched = Some(i);
            }

            if matched.is_none() {
                self.push_error(node, "oneOf", instance, "must match exactly one schema in oneOf")?;
                self.extend_errors(failures)?;
            }
        }

        if let Some(child) = node.not {
            if self.probe(child, instance)?.is_empty() {
                self.push_error(node, "not", instance, "must not match the schema in not")?;
            }
        }

        if let Some(condition) = node.if_ {
            let branch = if self.probe(condition, instance)?.is_empty() {
                node.then
            } else {
                node.else_
            };
            if let Some(child) = branch {
                self.validate(child, instance)?;
            }
        }

        Ok(())
    }

    /// Validates `instance` against `id` on the side, returning its errors
    /// without recording them.
    fn probe(&mut self, id: NodeId, instance: &Value) -> Result<Vec<ValidationError>, VmValidateError> {
        let errors = std::mem::take(&mut self.errors);
        let max_errors = std::mem::replace(&mut self.max_errors, 0);

        let result = self.validate(id, instance);

        self.max_errors = max_errors;
        let probed = std::mem::replace(&mut self.errors, errors);

        match result {
            Ok(()) | Err(VmValidateError::MaxErrorsReached) => Ok(probed),
            Err(VmValidateError::MaxDepthExceeded) => Err(VmValidateError::MaxDepthExceeded),
        }
    }

    fn push_error(
        &mut self,
        node: &Node,
        keyword: &'static str,
        instance: &Value,
        description: impl Into<String>,
    ) -> Result<(), VmValidateError> {
        self.record(ValidationError {
            instance_path: self.instance_tokens.clone(),
            schema_path: format!("{}/{}", node.location, keyword),
            keyword,
            description: description.into(),
            value_type: instance.type_name(),
        })
    }

    fn extend_errors(&mut self, errors: Vec<ValidationError>) -> Result<(), VmValidateError> {
        errors.into_iter().try_for_each(|error| self.record(error))
    }

    fn record(&mut self, error: ValidationError) -> Result<(), VmValidateError> {
        self.errors.push(error);

        if self.max_errors == self.errors.len() {
            Err(VmValidateError::MaxErrorsReached)
        } else {
            Ok(())
        }
    }

    fn push_instance_token(&mut self, token: &str) {
        self.instance_tokens.push(token.to_owned());
    }

    fn pop_instance_token(&mut self) {
        self.instance_tokens.pop();
    }
}

// Exact decimal arithmetic when both sides have one, so 0.3 is a multiple of
// 0.1.
fn is_multiple_of(instance: &Value, n: f64, divisor: f64) -> bool {
    if let (Some(value), Some(divisor)) = (instance.as_decimal(), decimal_from_f64(divisor)) {
        if let Some(remainder) = value.checked_rem(divisor) {
            return remainder.is_zero();
        }
    }

    let quotient = n / divisor;
    quotient.is_finite() && quotient.fract() == 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn errors(schema: serde_json::Value, instance: serde_json::Value) -> Vec<(Vec<String>, &'static str)> {
        let schema = compile(&schema).unwrap();
        validate(&schema, &instance, ValidateOptions::new())
            .unwrap()
            .into_errors()
            .into_iter()
            .map(|err| (err.instance_path, err.keyword))
            .collect()
    }

    fn path(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn max_depth() {
        let schema = compile(&json!({
            "properties": { "next": { "$ref": "#" } }
        }))
        .unwrap();

        let instance = json!({ "next": { "next": { "next": { "next": null } } } });

        assert!(matches!(
            validate(&schema, &instance, ValidateOptions::new().with_max_depth(3)),
            Err(ValidateError::MaxDepthExceeded)
        ));
        assert!(validate(&schema, &instance, ValidateOptions::new().with_max_depth(32))
            .unwrap()
            .is_valid());
    }

    #[test]
    fn max_errors() {
        let schema = compile(&json!({
            "items": { "bsonType": "string" }
        }))
        .unwrap();

        assert_eq!(
            3,
            validate(
                &schema,
                &json!([null, null, null, null, null]),
                ValidateOptions::new().with_max_errors(3)
            )
            .unwrap()
            .errors()
            .len()
        );
        assert_eq!(
            5,
            validate(&schema, &json!([null, null, null, null, null]), ValidateOptions::new())
                .unwrap()
                .errors()
                .len()
        );
    }

    #[test]
    fn error_records() {
        let schema = compile(&json!({
            "properties": { "age": { "bsonType": "int" } }
        }))
        .unwrap();

        let result = schema
            .validate(&json!({ "age": "ten" }), ValidateOptions::new())
            .unwrap();
        assert!(!result.is_valid());

        let error = &result.errors()[0];
        assert_eq!(path(&["age"]), error.instance_path);
        assert_eq!("json-schema:///#/properties/age/bsonType", error.schema_path);
        assert_eq!("string", error.value_type);
        assert_eq!("age: expected int, found string", error.to_string());

        assert_eq!(
            json!({
                "errors": [{
                    "instancePath": ["age"],
                    "schemaPath": "json-schema:///#/properties/age/bsonType",
                    "keyword": "bsonType",
                    "description": "expected int, found string",
                    "valueType": "string",
                }]
            }),
            serde_json::to_value(&result).unwrap()
        );
    }

    #[test]
    fn loader_failures_are_not_results() {
        let schema = compile(&json!({})).unwrap();
        assert!(matches!(
            validate(&schema, "{ not json", ValidateOptions::new()),
            Err(ValidateError::Load(_))
        ));
    }

    #[test]
    fn both_type_keywords_must_hold() {
        let schema = json!({ "type": "number", "bsonType": "long" });
        assert_eq!(Vec::<(Vec<String>, &str)>::new(), errors(schema.clone(), json!(3)));
        assert_eq!(vec![(path(&[]), "bsonType")], errors(schema.clone(), json!(3.5)));
        assert_eq!(
            vec![(path(&[]), "type"), (path(&[]), "bsonType")],
            errors(schema, json!("3"))
        );
    }

    #[test]
    fn absent_versus_null() {
        let schema = json!({
            "required": ["a"],
            "properties": { "a": { "bsonType": "null" } }
        });
        assert!(errors(schema.clone(), json!({ "a": null })).is_empty());
        assert_eq!(vec![(path(&[]), "required")], errors(schema, json!({})));
    }

    #[test]
    fn additional_properties() {
        let schema = json!({
            "properties": { "foo": {} },
            "patternProperties": { "^v": {} },
            "additionalProperties": false,
        });
        assert!(errors(schema.clone(), json!({ "foo": 1, "vroom": 2 })).is_empty());
        assert_eq!(
            vec![(path(&["bar"]), "additionalProperties"), (path(&["quux"]), "additionalProperties")],
            errors(schema, json!({ "quux": 1, "foo": 2, "bar": 3 }))
        );

        let schema = json!({ "additionalProperties": { "bsonType": "bool" } });
        assert_eq!(
            vec![(path(&["b"]), "bsonType")],
            errors(schema, json!({ "a": true, "b": 1 }))
        );
    }

    #[test]
    fn document_order_is_preserved() {
        let schema = compile(&json!({ "additionalProperties": false })).unwrap();
        let instance = Value::document(vec![("zeta", Value::Int32(1)), ("alpha", Value::Int32(2))]);

        let paths: Vec<_> = validate(&schema, &instance, ValidateOptions::new())
            .unwrap()
            .into_errors()
            .into_iter()
            .map(|err| err.instance_path)
            .collect();
        assert_eq!(vec![path(&["zeta"]), path(&["alpha"])], paths);
    }

    #[test]
    fn positional_items() {
        let schema = json!({ "items": [{}], "additionalItems": { "bsonType": "bool" } });
        assert!(errors(schema.clone(), json!([null, true, false])).is_empty());
        assert_eq!(vec![(path(&["2"]), "bsonType")], errors(schema, json!([null, true, "hello"])));

        let schema = json!({ "items": [{}, {}], "additionalItems": false });
        assert!(errors(schema.clone(), json!([1, 2])).is_empty());
        assert_eq!(vec![(path(&["2"]), "additionalItems")], errors(schema, json!([1, 2, 3])));

        // additionalItems does nothing next to a uniform items schema.
        let schema = json!({ "items": {}, "additionalItems": false });
        assert!(errors(schema, json!([1, 2, 3])).is_empty());
    }

    #[test]
    fn array_keywords() {
        let schema = json!({ "minItems": 1, "maxItems": 2, "uniqueItems": true, "contains": { "bsonType": "string" } });
        assert!(errors(schema.clone(), json!(["a", 1])).is_empty());
        assert_eq!(
            vec![(path(&[]), "contains"), (path(&[]), "minItems")],
            errors(schema.clone(), json!([]))
        );
        assert_eq!(vec![(path(&[]), "uniqueItems")], errors(schema, json!(["a", "a"])));
        assert_eq!(
            vec![(path(&[]), "uniqueItems")],
            errors(json!({ "uniqueItems": true }), json!([1.0, 1]))
        );
        assert!(errors(json!({ "uniqueItems": true }), json!([0, 1e-30])).is_empty());
    }

    #[test]
    fn numeric_keywords() {
        let schema = json!({ "minimum": 1, "exclusiveMaximum": 10, "multipleOf": 0.5 });
        assert!(errors(schema.clone(), json!(1)).is_empty());
        assert!(errors(schema.clone(), json!(9.5)).is_empty());
        assert_eq!(vec![(path(&[]), "minimum")], errors(schema.clone(), json!(0.5)));
        assert_eq!(vec![(path(&[]), "exclusiveMaximum")], errors(schema.clone(), json!(10)));
        assert_eq!(vec![(path(&[]), "multipleOf")], errors(schema, json!(2.25)));

        assert!(errors(json!({ "multipleOf": 0.1 }), json!(0.3)).is_empty());
        assert!(errors(json!({ "multipleOf": 0.0001 }), json!(0.0075)).is_empty());
        // Too small for an exact decimal, so the float path decides.
        assert_eq!(vec![(path(&[]), "multipleOf")], errors(json!({ "multipleOf": 0.5 }), json!(1e-30)));
        assert_eq!(vec![(path(&[]), "enum")], errors(json!({ "enum": [0] }), json!(1e-30)));
        assert_eq!(vec![(path(&[]), "const")], errors(json!({ "const": 0 }), json!(1e-30)));
        // Strings are not numbers, so numeric bounds do not apply.
        assert!(errors(json!({ "minimum": 5 }), json!("1")).is_empty());
    }

    #[test]
    fn decimal_instances() {
        let schema = compile(&json!({ "minimum": 1, "multipleOf": 0.01 })).unwrap();
        let ok = Value::Decimal("12.34".parse().unwrap());
        let small = Value::Decimal("0.5".parse().unwrap());
        let fine = Value::Decimal("1.001".parse().unwrap());

        assert!(schema.is_valid(&ok));
        assert!(!schema.is_valid(&small));
        assert!(!schema.is_valid(&fine));
    }

    #[test]
    fn string_keywords() {
        let schema = json!({ "minLength": 2, "maxLength": 3, "pattern": "b", "format": "ipv4" });
        assert_eq!(
            vec![(path(&[]), "minLength"), (path(&[]), "pattern"), (path(&[]), "format")],
            errors(schema, json!("a"))
        );

        // Characters, not bytes.
        assert!(errors(json!({ "maxLength": 2 }), json!("\u{1F600}\u{1F600}")).is_empty());
        // Search, not full match.
        assert!(errors(json!({ "pattern": "b" }), json!("abc")).is_empty());
        assert!(errors(json!({ "format": "no-such-format" }), json!("x")).is_empty());
    }

    #[test]
    fn any_of_reports_every_branch() {
        let schema = json!({ "anyOf": [{ "bsonType": "string" }, { "bsonType": "int", "minimum": 2 }] });
        assert!(errors(schema.clone(), json!("x")).is_empty());
        assert!(errors(schema.clone(), json!(3)).is_empty());
        assert_eq!(
            vec![(path(&[]), "anyOf"), (path(&[]), "bsonType"), (path(&[]), "minimum")],
            errors(schema, json!(1))
        );
    }

    #[test]
    fn one_of_outcomes() {
        let schema = compile(&json!({ "oneOf": [{ "bsonType": "int" }, { "minimum": 2 }] })).unwrap();
        let descriptions = |instance: serde_json::Value| -> Vec<String> {
            validate(&schema, &instance, ValidateOptions::new())
                .unwrap()
                .into_errors()
                .into_iter()
                .filter(|err| err.keyword == "oneOf")
                .map(|err| err.description)
                .collect()
        };

        assert!(descriptions(json!(1)).is_empty());
        assert!(descriptions(json!(2.5)).is_empty());
        assert_eq!(
            vec!["matches more than one schema in oneOf (indices 0 and 1)"],
            descriptions(json!(3))
        );
        assert_eq!(vec!["must match exactly one schema in oneOf"], descriptions(json!(1.5)));
    }

    #[test]
    fn not_and_conditionals() {
        assert_eq!(vec![(path(&[]), "not")], errors(json!({ "not": { "bsonType": "int" } }), json!(1)));
        assert!(errors(json!({ "not": { "bsonType": "int" } }), json!("1")).is_empty());

        let schema = json!({
            "if": { "bsonType": "int" },
            "then": { "minimum": 10 },
            "else": { "bsonType": "string" },
        });
        assert!(errors(schema.clone(), json!(10)).is_empty());
        assert_eq!(vec![(path(&[]), "minimum")], errors(schema.clone(), json!(5)));
        assert!(errors(schema.clone(), json!("x")).is_empty());
        assert_eq!(vec![(path(&[]), "bsonType")], errors(schema, json!(1.5)));
    }

    #[test]
    fn dependencies_and_property_names() {
        let schema = json!({
            "dependencies": {
                "card": ["billing"],
                "gift": { "required": ["to"] },
            },
            "propertyNames": { "maxLength": 7 },
        });
        assert!(errors(schema.clone(), json!({ "card": 1, "billing": 2 })).is_empty());
        assert_eq!(vec![(path(&[]), "dependencies")], errors(schema.clone(), json!({ "card": 1 })));
        assert_eq!(vec![(path(&[]), "required")], errors(schema.clone(), json!({ "gift": 1 })));
        assert_eq!(vec![(path(&[]), "maxLength")], errors(schema, json!({ "toolongname": 1 })));
    }

    #[test]
    fn enum_and_const() {
        let schema = json!({ "enum": [1, "a", { "x": [true] }] });
        assert!(errors(schema.clone(), json!(1.0)).is_empty());
        assert!(errors(schema.clone(), json!({ "x": [true] })).is_empty());
        assert_eq!(vec![(path(&[]), "enum")], errors(schema, json!({ "x": [false] })));

        assert!(errors(json!({ "const": null }), json!(null)).is_empty());
        assert_eq!(vec![(path(&[]), "const")], errors(json!({ "const": null }), json!(false)));
    }

    #[test]
    fn boolean_schemas() {
        assert!(errors(json!({ "properties": { "a": true } }), json!({ "a": 1 })).is_empty());
        assert_eq!(
            vec![(path(&["a"]), "false")],
            errors(json!({ "properties": { "a": false } }), json!({ "a": 1 }))
        );
    }

    #[test]
    fn compiled_schemas_are_reusable() {
        let raw = json!({
            "properties": { "tags": { "items": { "bsonType": "string" }, "uniqueItems": true } },
            "required": ["tags"],
        });
        let first = compile(&raw).unwrap();
        let second = compile(&raw).unwrap();

        for instance in [json!({}), json!({ "tags": ["a", 1, "a"] }), json!({ "tags": [] })] {
            let a = first.validate(&instance, ValidateOptions::new()).unwrap();
            let b = second.validate(&instance, ValidateOptions::new()).unwrap();
            let again = first.validate(&instance, ValidateOptions::new()).unwrap();
            assert_eq!(a, b);
            assert_eq!(a, again);
        }
    }
}
