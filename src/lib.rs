//! Setter Schema
//!
//! Declarative field setters for structured configuration documents.
//!
//! A setter is a named value written into every document field matching a
//! field path, and recorded, with its type and description, in a schema
//! registry file. Paths match by suffix, so `image` reaches
//! `spec.template.spec.containers[*].image` as well as a top-level `image`.
//!
//! # Example
//!
//! ```
//! use setter_schema::{apply, Document, FieldMatchSpec, FieldPath, Mutation};
//! use serde_json::json;
//!
//! let mut documents = vec![Document::new(json!({
//!     "kind": "SomeKind",
//!     "spec": { "resourceRef": { "external": "projects/whatever" } }
//! }))];
//!
//! let spec = FieldMatchSpec::new(FieldPath::parse("spec/resourceRef/external"));
//! let result = apply(&mut documents, &spec, &Mutation::set("valueAdded").position(2)).unwrap();
//!
//! assert_eq!(result.count, 1);
//! assert_eq!(
//!     documents[0].content["spec"]["resourceRef"]["external"],
//!     "projects/valueAdded/whatever"
//! );
//! ```
//!
//! # Splice Positions
//!
//! | Position | `projects/whatever` becomes |
//! |----------|-----------------------------|
//! | `0` | `valueAdded` |
//! | `1` | `valueAdded/projects/whatever` |
//! | `2` | `projects/valueAdded/whatever` |
//! | `3` or more | `projects/whatever/valueAdded` |
//!
//! # Type Tags
//!
//! Setter schemas may only declare one of `object`, `array`, `string`,
//! `integer`, `number`, `boolean`, `file` or `null`, at any nesting depth
//! of their array items.

mod creator;
mod document;
mod error;
mod loader;
mod path;
mod pipeline;
mod registry;
mod splice;
mod types;
mod validator;

pub use creator::{CreateOutcome, SetterCreator};
pub use document::{Document, SETTER_REFS_KEY};
pub use error::{SchemaTypeError, SetterError, StoreError};
pub use loader::{
    load_documents, load_value, parse_documents, render_documents, save_documents, save_value,
    DocumentStore, InMemoryDocuments, LocalPackage,
};
pub use path::{match_fields, scalar_text, to_pointer, FieldHandle, FieldMatches, FieldPath, Step};
pub use pipeline::{apply, run, MissingFieldPolicy, Mutation};
pub use registry::{
    check_registry_location, read_registry, validate_definition, KnownSetters, SchemaCache, SchemaRegistrar,
};
pub use splice::{ordinal_position, splice};
pub use types::{
    json_type_name, setter_name_from_ref, setter_ref, FieldMatchSpec, MatchResult,
    SetterDefinition, SpliceRequest, TypeTag, CLI_EXTENSION_KEY, DEFAULT_DELIMITER,
    DEFINITIONS_PREFIX, SETTER_DEFINITION_PREFIX,
};
pub use validator::{parse_schema, validate_schema, validate_type, Items, SchemaNode};
