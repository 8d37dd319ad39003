#![no_main]
use libfuzzer_sys::fuzz_target;

use bsonschema::{CompileOptions, Draft, Schema, ValidateOptions};

fuzz_target!(|input: (Draft, Vec<u8>, Vec<u8>)| {
    let (draft, schema, instance) = input;

    let schema: serde_json::Value = match serde_json::from_slice(&schema) {
        Ok(schema) => schema,
        Err(_) => return,
    };

    // We're only interested in fuzzing against valid schemas.
    let schema = match Schema::compile(&schema, CompileOptions::new().with_draft(draft)) {
        Ok(schema) => schema,
        Err(_) => return,
    };

    if let Ok(instance) = serde_json::from_slice::<serde_json::Value>(&instance) {
        let _ = schema.validate(&instance, ValidateOptions::new().with_max_depth(64));
    }
});
