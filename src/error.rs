//! Error types for setter creation, schema validation and document storage.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::TypeTag;

/// Errors raised while validating a setter schema or declared type.
#[derive(Debug, Error)]
pub enum SchemaTypeError {
    #[error("only one type is supported: {}", types.join(", "))]
    MultipleTypes { types: Vec<String> },

    #[error(
        "type \"{type_name}\" is not supported. Must be one of: {}",
        TypeTag::allowed().join(", ")
    )]
    UnsupportedType { type_name: String },

    #[error("unable to parse schema: {message}")]
    Malformed { message: String },
}

/// IO and parse failures from the document and registry collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid YAML in {path}: {source}")]
    InvalidYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("cannot serialize {path}: {message}")]
    Serialize { path: PathBuf, message: String },
}

/// Errors from creating a setter or mutating documents.
#[derive(Debug, Error)]
pub enum SetterError {
    #[error("invalid schema: {0}")]
    Validation(#[from] SchemaTypeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("cannot set {pointer}: {message}")]
    PathConflict { pointer: String, message: String },

    #[error("invalid registry {path}: {message}")]
    InvalidRegistry { path: PathBuf, message: String },

    #[error("invalid setter: {message}")]
    InvalidSetter { message: String },
}

impl StoreError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        3
    }
}

impl SetterError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            SetterError::Store(e) => e.exit_code(),
            _ => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setter_error_exit_codes() {
        let err = SetterError::from(StoreError::FileNotFound {
            path: PathBuf::from("Kptfile"),
        });
        assert_eq!(err.exit_code(), 3);

        let err = SetterError::from(SchemaTypeError::UnsupportedType {
            type_name: "int".into(),
        });
        assert_eq!(err.exit_code(), 2);

        let err = SetterError::PathConflict {
            pointer: "/spec/0".into(),
            message: "index out of range".into(),
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn multiple_types_lists_offenders() {
        let err = SchemaTypeError::MultipleTypes {
            types: vec!["string".into(), "integer".into()],
        };
        assert_eq!(
            err.to_string(),
            "only one type is supported: string, integer"
        );
    }

    #[test]
    fn unsupported_type_lists_allowed_set() {
        let err = SchemaTypeError::UnsupportedType {
            type_name: "int".into(),
        };
        assert_eq!(
            err.to_string(),
            "type \"int\" is not supported. Must be one of: object, array, string, integer, number, boolean, file, null"
        );
    }

    #[test]
    fn validation_error_is_prefixed() {
        let err = SetterError::from(SchemaTypeError::Malformed {
            message: "expected value".into(),
        });
        assert_eq!(
            err.to_string(),
            "invalid schema: unable to parse schema: expected value"
        );
    }
}
