//! Validation of JSON and BSON-shaped values against JSON Schema documents
//! extended with the `bsonType` keyword.
//!
//! A schema is compiled once into a [`Schema`] and can then validate any
//! number of instances, from any number of threads:
//!
//! ```
//! use bsonschema::{compile, ValidateOptions};
//! use serde_json::json;
//!
//! let schema = compile(&json!({
//!     "bsonType": "object",
//!     "required": ["name"],
//!     "properties": { "name": { "bsonType": "string" } },
//! }))
//! .unwrap();
//!
//! let result = schema.validate(&json!({ "name": 7 }), ValidateOptions::new()).unwrap();
//! assert!(!result.is_valid());
//! assert_eq!(vec!["name"], result.errors()[0].instance_path);
//! ```

mod compile;
mod evaluator;
mod format;
mod loader;
mod resolver;
mod schema;
mod types;
mod validate;
mod value;

pub use compile::*;
pub use evaluator::*;
pub use format::*;
pub use loader::*;
pub use resolver::*;
pub use schema::*;
pub use types::*;
pub use validate::*;
pub use value::*;
