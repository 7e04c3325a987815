//! Type validation for setter schemas.
//!
//! A setter schema is reduced to a tagged tree holding only what validation
//! looks at: the declared type tags and the array item schemas. Every node
//! must declare at most one tag, and that tag must belong to the closed
//! vocabulary in [`TypeTag`].

use serde_json::Value;

use crate::error::SchemaTypeError;
use crate::types::{json_type_name, TypeTag};

/// Array item schemas of a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Items {
    /// `items: {...}`: every element shares one schema.
    Single(Box<SchemaNode>),
    /// `items: [...]`: tuple-style, one schema per position.
    Tuple(Vec<SchemaNode>),
}

/// The part of a schema the type validator cares about.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaNode {
    pub types: Vec<String>,
    pub items: Option<Items>,
}

impl SchemaNode {
    /// Build the tagged tree from a raw JSON schema.
    ///
    /// # Errors
    ///
    /// Returns `SchemaTypeError::Malformed` if `type` or `items` have a shape
    /// no schema can have.
    pub fn from_value(schema: &Value) -> Result<Self, SchemaTypeError> {
        let map = match schema {
            Value::Object(map) => map,
            // boolean schemas accept or reject everything and declare no type
            Value::Bool(_) => return Ok(SchemaNode::default()),
            other => {
                return Err(SchemaTypeError::Malformed {
                    message: format!("expected object, got {}", json_type_name(other)),
                })
            }
        };

        let types = match map.get("type") {
            None => Vec::new(),
            Some(Value::String(t)) => vec![t.clone()],
            Some(Value::Array(tags)) => tags
                .iter()
                .map(|t| {
                    t.as_str().map(str::to_string).ok_or_else(|| SchemaTypeError::Malformed {
                        message: format!("type entries must be strings, got {}", json_type_name(t)),
                    })
                })
                .collect::<Result<_, _>>()?,
            Some(other) => {
                return Err(SchemaTypeError::Malformed {
                    message: format!(
                        "type must be a string or an array of strings, got {}",
                        json_type_name(other)
                    ),
                })
            }
        };

        let items = match map.get("items") {
            None => None,
            Some(Value::Array(schemas)) => Some(Items::Tuple(
                schemas
                    .iter()
                    .map(SchemaNode::from_value)
                    .collect::<Result<_, _>>()?,
            )),
            Some(item) => Some(Items::Single(Box::new(SchemaNode::from_value(item)?))),
        };

        Ok(SchemaNode { types, items })
    }

    /// Check this node and every nested item schema.
    pub fn validate(&self) -> Result<(), SchemaTypeError> {
        if self.types.len() > 1 {
            return Err(SchemaTypeError::MultipleTypes {
                types: self.types.clone(),
            });
        }
        if let Some(tag) = self.types.first() {
            validate_type(tag)?;
        }

        match &self.items {
            None => Ok(()),
            Some(Items::Single(node)) => node.validate(),
            Some(Items::Tuple(nodes)) => nodes.iter().try_for_each(SchemaNode::validate),
        }
    }
}

/// Validate a raw JSON schema.
///
/// # Errors
///
/// Returns the first violation found in a depth-first walk.
pub fn validate_schema(schema: &Value) -> Result<(), SchemaTypeError> {
    SchemaNode::from_value(schema)?.validate()
}

/// Validate a single declared type tag.
pub fn validate_type(tag: &str) -> Result<(), SchemaTypeError> {
    match TypeTag::parse(tag) {
        Some(_) => Ok(()),
        None => Err(SchemaTypeError::UnsupportedType {
            type_name: tag.to_string(),
        }),
    }
}

/// Parse schema text given on the command line or in a setter request.
///
/// Blank text means "no schema".
pub fn parse_schema(text: &str) -> Result<Option<Value>, SchemaTypeError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let schema: Value = serde_json::from_str(text).map_err(|e| SchemaTypeError::Malformed {
        message: e.to_string(),
    })?;
    validate_schema(&schema)?;
    Ok(Some(schema))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_every_allowed_type() {
        for tag in TypeTag::allowed() {
            assert!(validate_schema(&json!({ "type": tag })).is_ok(), "{tag}");
        }
    }

    #[test]
    fn accepts_schema_without_type() {
        assert!(validate_schema(&json!({ "description": "anything" })).is_ok());
        assert!(validate_schema(&json!(true)).is_ok());
    }

    #[test]
    fn rejects_multiple_types() {
        let err = validate_schema(&json!({ "type": ["string", "null"] })).unwrap_err();
        match err {
            SchemaTypeError::MultipleTypes { types } => assert_eq!(types, vec!["string", "null"]),
            other => panic!("expected MultipleTypes, got {other:?}"),
        }
    }

    #[test]
    fn single_element_type_array_is_fine() {
        assert!(validate_schema(&json!({ "type": ["integer"] })).is_ok());
    }

    #[test]
    fn rejects_unsupported_type() {
        let err = validate_schema(&json!({ "type": "int" })).unwrap_err();
        assert!(matches!(err, SchemaTypeError::UnsupportedType { ref type_name } if type_name == "int"));
    }

    #[test]
    fn rejects_nested_item_violation() {
        let schema = json!({
            "type": "array",
            "items": {
                "type": "array",
                "items": { "type": "array", "items": { "type": "bool" } }
            }
        });
        let err = validate_schema(&schema).unwrap_err();
        assert!(matches!(err, SchemaTypeError::UnsupportedType { ref type_name } if type_name == "bool"));
    }

    #[test]
    fn rejects_tuple_item_violation() {
        let schema = json!({
            "type": "array",
            "items": [
                { "type": "string" },
                { "type": ["integer", "string"] }
            ]
        });
        let err = validate_schema(&schema).unwrap_err();
        assert!(matches!(err, SchemaTypeError::MultipleTypes { .. }));
    }

    #[test]
    fn accepts_valid_tuple_items() {
        let schema = json!({
            "type": "array",
            "items": [{ "type": "string" }, { "type": "array", "items": { "type": "file" } }]
        });
        assert!(validate_schema(&schema).is_ok());
    }

    #[test]
    fn malformed_type_keyword() {
        let err = validate_schema(&json!({ "type": 3 })).unwrap_err();
        assert!(matches!(err, SchemaTypeError::Malformed { .. }));
        let err = validate_schema(&json!("string")).unwrap_err();
        assert!(matches!(err, SchemaTypeError::Malformed { .. }));
    }

    #[test]
    fn parse_schema_text() {
        assert_eq!(parse_schema("  ").unwrap(), None);
        assert_eq!(
            parse_schema(r#"{"type":"integer"}"#).unwrap(),
            Some(json!({ "type": "integer" }))
        );
        assert!(matches!(
            parse_schema("{not json").unwrap_err(),
            SchemaTypeError::Malformed { .. }
        ));
        assert!(matches!(
            parse_schema(r#"{"type":"int"}"#).unwrap_err(),
            SchemaTypeError::UnsupportedType { .. }
        ));
    }

    #[test]
    fn validate_type_tag() {
        assert!(validate_type("array").is_ok());
        assert!(validate_type("list").is_err());
    }
}
