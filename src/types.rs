//! Core types for setter creation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::FieldPath;

/// Prefix of every OpenAPI reference written into documents.
pub const DEFINITIONS_PREFIX: &str = "#/definitions/";

/// Reserved namespace for setter definitions in the registry.
pub const SETTER_DEFINITION_PREFIX: &str = "io.k8s.cli.setters.";

/// Vendor extension key holding setter metadata on a definition.
pub const CLI_EXTENSION_KEY: &str = "x-k8s-cli";

/// Default delimiter for positional splicing.
pub const DEFAULT_DELIMITER: &str = "/";

const VALID_TYPES: &[&str] = &[
    "object", "array", "string", "integer", "number", "boolean", "file", "null",
];

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The closed vocabulary of type tags a setter may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    Object,
    Array,
    String,
    Integer,
    Number,
    Boolean,
    File,
    Null,
}

impl TypeTag {
    /// Parse a type tag. Returns `None` for anything outside the vocabulary.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "object" => Some(TypeTag::Object),
            "array" => Some(TypeTag::Array),
            "string" => Some(TypeTag::String),
            "integer" => Some(TypeTag::Integer),
            "number" => Some(TypeTag::Number),
            "boolean" => Some(TypeTag::Boolean),
            "file" => Some(TypeTag::File),
            "null" => Some(TypeTag::Null),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Object => "object",
            TypeTag::Array => "array",
            TypeTag::String => "string",
            TypeTag::Integer => "integer",
            TypeTag::Number => "number",
            TypeTag::Boolean => "boolean",
            TypeTag::File => "file",
            TypeTag::Null => "null",
        }
    }

    /// All valid tags, in declaration order.
    pub fn allowed() -> &'static [&'static str] {
        VALID_TYPES
    }
}

/// A named setter as persisted in the schema registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetterDefinition {
    /// Unique key within the registry.
    pub name: String,
    /// Scalar value; cleared once `list_values` is known.
    pub value: Option<String>,
    /// Element values for a list-valued setter, first-seen order.
    pub list_values: Vec<String>,
    pub set_by: String,
    pub description: String,
    /// Declared type tag (empty when undeclared).
    pub setter_type: String,
    /// Structural schema keywords merged into the registry entry.
    pub schema: Option<Value>,
    /// Whether the package consumer must set this setter before apply.
    pub required: bool,
}

impl SetterDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Registry key for this setter, e.g. `io.k8s.cli.setters.image`.
    pub fn definition_key(&self) -> String {
        format!("{}{}", SETTER_DEFINITION_PREFIX, self.name)
    }

    /// Reference written into documents governed by this setter.
    pub fn setter_ref(&self) -> String {
        setter_ref(&self.name)
    }

    /// Switch to list-valued form. The scalar value is dropped.
    pub fn with_list_values(mut self, values: Vec<String>) -> Self {
        if !values.is_empty() {
            self.value = None;
        }
        self.list_values = values;
        self
    }
}

/// Reference string for a setter name.
pub fn setter_ref(name: &str) -> String {
    format!("{}{}{}", DEFINITIONS_PREFIX, SETTER_DEFINITION_PREFIX, name)
}

/// Setter name referenced by `reference`, if it points into the setter namespace.
pub fn setter_name_from_ref(reference: &str) -> Option<&str> {
    reference
        .strip_prefix(DEFINITIONS_PREFIX)?
        .strip_prefix(SETTER_DEFINITION_PREFIX)
        .filter(|name| !name.is_empty())
}

/// Selects target fields across a document collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMatchSpec {
    /// Suffix-matched path. Empty matches every location.
    pub field_path: FieldPath,
    /// Terminal key filter.
    pub field_name: Option<String>,
    /// Current scalar value filter.
    pub field_value: Option<String>,
}

impl FieldMatchSpec {
    pub fn new(field_path: FieldPath) -> Self {
        Self {
            field_path,
            ..Default::default()
        }
    }

    pub fn field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = Some(name.into());
        self
    }

    pub fn field_value(mut self, value: impl Into<String>) -> Self {
        self.field_value = Some(value.into());
        self
    }
}

/// Inputs to a single splice.
///
/// `position` is a 0-based segment index: `None` replaces the whole value,
/// `Some(0)` prefixes, anything at or past the segment count appends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpliceRequest {
    pub target_value: Option<String>,
    pub insert_value: String,
    pub delimiter: String,
    pub position: Option<usize>,
}

impl SpliceRequest {
    /// Full replacement of `target_value` with `insert_value`.
    pub fn new(target_value: Option<String>, insert_value: impl Into<String>) -> Self {
        Self {
            target_value,
            insert_value: insert_value.into(),
            delimiter: DEFAULT_DELIMITER.to_string(),
            position: None,
        }
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }
}

/// Outcome of a mutation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    /// Number of fields mutated or tagged.
    pub count: usize,
    /// Distinct element values of matched lists, first-seen order.
    pub list_values: Vec<String>,
}

impl MatchResult {
    pub(crate) fn record_list_value(&mut self, value: String) {
        if !self.list_values.contains(&value) {
            self.list_values.push(value);
        }
    }
}
