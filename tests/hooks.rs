use bsonschema::{compile, EvaluationError, Evaluator, ObjectId, RegularExpression, ValidateOptions, Value};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::cell::RefCell;
use std::sync::atomic::{AtomicUsize, Ordering};

fn expression() -> serde_json::Value {
    json!({ "%function": { "name": "func0", "arguments": ["%%value"] } })
}

/// Checks every call against the expected expression and path, records the
/// paths it saw, and answers with a fixed outcome.
struct VerifyingEvaluator {
    expression: Value,
    field_path: Vec<String>,
    pass: bool,
    calls: RefCell<Vec<Vec<String>>>,
}

impl VerifyingEvaluator {
    fn new(field_path: &[&str], pass: bool) -> Self {
        Self {
            expression: Value::from(expression()),
            field_path: field_path.iter().map(|s| s.to_string()).collect(),
            pass,
            calls: RefCell::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl Evaluator for VerifyingEvaluator {
    fn evaluate(&self, expression: &Value, field_path: &[String]) -> Result<(), EvaluationError> {
        assert_eq!(&self.expression, expression);
        assert_eq!(self.field_path.as_slice(), field_path);
        self.calls.borrow_mut().push(field_path.to_vec());

        if self.pass {
            Ok(())
        } else {
            Err(EvaluationError::new("validation error"))
        }
    }
}

fn object_id() -> Value {
    Value::ObjectId("5f1d7f3c9d1e8a2b3c4d5e6f".parse::<ObjectId>().unwrap())
}

fn regex() -> Value {
    Value::RegularExpression(RegularExpression::default())
}

fn is_valid(schema: &bsonschema::Schema, instance: &Value, evaluator: &VerifyingEvaluator) -> bool {
    schema
        .validate(instance, ValidateOptions::new().with_evaluator(evaluator))
        .unwrap()
        .is_valid()
}

#[test]
fn validate_on_base_level() {
    let schema = compile(&json!({ "bsonType": "string", "validate": expression() })).unwrap();
    let instance = Value::from("haley");

    let evaluator = VerifyingEvaluator::new(&[], true);
    assert!(is_valid(&schema, &instance, &evaluator));
    assert_eq!(1, evaluator.calls());

    let evaluator = VerifyingEvaluator::new(&[], false);
    let result = schema
        .validate(&instance, ValidateOptions::new().with_evaluator(&evaluator))
        .unwrap();
    assert_eq!(1, result.errors().len());
    assert_eq!("validate", result.errors()[0].keyword);
    assert_eq!("validation error", result.errors()[0].description);
    assert_eq!("string", result.errors()[0].value_type);
}

#[test]
fn validate_runs_even_when_structure_fails() {
    let schema = compile(&json!({ "bsonType": "string", "validate": expression() })).unwrap();
    let evaluator = VerifyingEvaluator::new(&[], false);

    let result = schema
        .validate(&Value::Int32(1), ValidateOptions::new().with_evaluator(&evaluator))
        .unwrap();
    let keywords: Vec<_> = result.errors().iter().map(|e| e.keyword).collect();
    assert_eq!(vec!["bsonType", "validate"], keywords);
}

#[test]
fn validate_on_multiple_levels() {
    let schema = compile(&json!({
        "properties": {
            "name": { "bsonType": "string" },
            "info": {
                "bsonType": "object",
                "properties": {
                    "id": { "bsonType": "objectId" },
                    "school": { "bsonType": "string", "validate": expression() },
                }
            }
        }
    }))
    .unwrap();

    let object = {
        let mut info = std::collections::BTreeMap::new();
        info.insert("id".to_owned(), object_id());
        info.insert("school".to_owned(), Value::from("UT Austin"));
        let mut root = std::collections::BTreeMap::new();
        root.insert("name".to_owned(), Value::from("haley"));
        root.insert("info".to_owned(), Value::Object(info));
        Value::Object(root)
    };
    let document = Value::document(vec![
        ("name", Value::from("haley")),
        (
            "info",
            Value::document(vec![("id", object_id()), ("school", Value::from("UT Austin"))]),
        ),
    ]);

    for instance in [&object, &document] {
        let evaluator = VerifyingEvaluator::new(&["info", "school"], true);
        assert!(is_valid(&schema, instance, &evaluator));
        assert_eq!(1, evaluator.calls());

        let evaluator = VerifyingEvaluator::new(&["info", "school"], false);
        let result = schema
            .validate(instance, ValidateOptions::new().with_evaluator(&evaluator))
            .unwrap();
        assert_eq!(1, result.errors().len());
        assert_eq!(vec!["info", "school"], result.errors()[0].instance_path);
    }
}

#[test]
fn validate_inside_all_of() {
    let schema = compile(&json!({
        "allOf": [
            { "properties": { "bar": { "bsonType": "int" } } },
            { "properties": { "foo": { "bsonType": "regex", "validate": expression() } } },
        ]
    }))
    .unwrap();

    let matching = Value::document(vec![("foo", regex()), ("bar", Value::Int32(2))]);
    let wrong_bar = Value::document(vec![("foo", regex()), ("bar", Value::from("hello"))]);

    assert!(is_valid(&schema, &matching, &VerifyingEvaluator::new(&["foo"], true)));
    assert!(!is_valid(&schema, &matching, &VerifyingEvaluator::new(&["foo"], false)));
    assert!(!is_valid(&schema, &wrong_bar, &VerifyingEvaluator::new(&["foo"], true)));

    let matching = Value::from(json!({ "bar": 2 }));
    let evaluator = VerifyingEvaluator::new(&["foo"], true);
    assert!(is_valid(&schema, &matching, &evaluator));
    assert_eq!(0, evaluator.calls());
}

#[test]
fn validate_inside_any_of() {
    let schema = compile(&json!({
        "anyOf": [
            { "bsonType": "objectId" },
            { "bsonType": "array", "validate": expression() },
        ]
    }))
    .unwrap();

    assert!(is_valid(&schema, &object_id(), &VerifyingEvaluator::new(&[], true)));

    // The first branch already matched, so the hook is never consulted.
    let evaluator = VerifyingEvaluator::new(&[], false);
    assert!(is_valid(&schema, &object_id(), &evaluator));
    assert_eq!(0, evaluator.calls());

    let evaluator = VerifyingEvaluator::new(&[], false);
    assert!(!is_valid(&schema, &Value::Array(vec![]), &evaluator));
    assert_eq!(1, evaluator.calls());
}

#[test]
fn validate_inside_one_of() {
    let schema = compile(&json!({
        "oneOf": [
            { "bsonType": "int" },
            { "minimum": 2, "validate": expression() },
        ]
    }))
    .unwrap();

    assert!(is_valid(&schema, &Value::Int32(1), &VerifyingEvaluator::new(&[], true)));
    assert!(is_valid(&schema, &Value::Double(2.5), &VerifyingEvaluator::new(&[], true)));
    assert!(!is_valid(&schema, &Value::Double(2.5), &VerifyingEvaluator::new(&[], false)));
    assert!(!is_valid(&schema, &Value::Int32(3), &VerifyingEvaluator::new(&[], true)));
}

#[test]
fn validate_per_array_item() {
    let schema = compile(&json!({
        "items": { "validate": expression() }
    }))
    .unwrap();

    let seen = RefCell::new(Vec::new());
    let evaluator = |_: &Value, path: &[String]| -> Result<(), EvaluationError> {
        seen.borrow_mut().push(path.join("."));
        Ok(())
    };

    schema
        .validate(&json!(["a", "b", "c"]), ValidateOptions::new().with_evaluator(&evaluator))
        .unwrap();
    assert_eq!(vec!["0", "1", "2"], *seen.borrow());
}

#[test]
fn validate_through_references() {
    let schema = compile(&json!({
        "definitions": { "checked": { "validate": expression() } },
        "properties": {
            "a": { "$ref": "#/definitions/checked" },
            "b": { "$ref": "#/definitions/checked" },
        }
    }))
    .unwrap();

    let seen = RefCell::new(Vec::new());
    let evaluator = |expr: &Value, path: &[String]| -> Result<(), EvaluationError> {
        assert_eq!(&Value::from(expression()), expr);
        seen.borrow_mut().push(path.to_vec());
        Err(EvaluationError::new(format!("{} rejected", path.join("."))))
    };

    let result = schema
        .validate(&json!({ "a": 1, "b": 2, "c": 3 }), ValidateOptions::new().with_evaluator(&evaluator))
        .unwrap();

    assert_eq!(vec![vec!["a".to_owned()], vec!["b".to_owned()]], *seen.borrow());
    let descriptions: Vec<_> = result.errors().iter().map(|e| e.description.as_str()).collect();
    assert_eq!(vec!["a rejected", "b rejected"], descriptions);
}

#[test]
fn shared_schema_across_threads() {
    struct Counting(AtomicUsize);

    impl Evaluator for Counting {
        fn evaluate(&self, _: &Value, _: &[String]) -> Result<(), EvaluationError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    let schema = compile(&json!({
        "items": { "bsonType": "int", "validate": expression() }
    }))
    .unwrap();

    let evaluator = Counting(AtomicUsize::new(0));
    std::thread::scope(|scope| {
        for i in 0..4 {
            let schema = &schema;
            let evaluator = &evaluator;
            scope.spawn(move || {
                let instance = json!([i, i + 1, "x"]);
                let result = schema
                    .validate(&instance, ValidateOptions::new().with_evaluator(evaluator))
                    .unwrap();
                assert_eq!(1, result.errors().len());
                assert_eq!(vec!["2"], result.errors()[0].instance_path);
            });
        }
    });

    assert_eq!(12, evaluator.0.load(Ordering::SeqCst));
}
