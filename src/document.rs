//! Documents and their setter reference markers.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::types::setter_name_from_ref;

/// Reserved root key holding the setter markers of a stored document.
///
/// Maps a JSON Pointer to the setter reference governing that field.
pub const SETTER_REFS_KEY: &str = "$setters";

/// A document tree plus the setter markers attached to its fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub content: Value,
    /// JSON Pointer -> setter reference.
    pub setter_refs: BTreeMap<String, String>,
    /// File the document was read from, if any.
    pub source: Option<PathBuf>,
}

impl Document {
    /// Wrap stored content, lifting the marker table out of the tree.
    pub fn new(mut content: Value) -> Self {
        let mut setter_refs = BTreeMap::new();
        if let Some(Value::Object(markers)) = content
            .as_object_mut()
            .and_then(|root| root.remove(SETTER_REFS_KEY))
        {
            for (pointer, reference) in markers {
                if let Value::String(reference) = reference {
                    setter_refs.insert(pointer, reference);
                }
            }
        }
        Self {
            content,
            setter_refs,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Content with the marker table embedded again, ready to serialize.
    pub fn to_stored(&self) -> Value {
        let mut stored = self.content.clone();
        if self.setter_refs.is_empty() {
            return stored;
        }
        if let Value::Object(root) = &mut stored {
            let markers: Map<String, Value> = self
                .setter_refs
                .iter()
                .map(|(pointer, reference)| (pointer.clone(), Value::String(reference.clone())))
                .collect();
            root.insert(SETTER_REFS_KEY.to_string(), Value::Object(markers));
        }
        stored
    }

    /// Mark the field at `pointer` as governed by `reference`.
    pub fn set_setter_ref(&mut self, pointer: impl Into<String>, reference: impl Into<String>) {
        self.setter_refs.insert(pointer.into(), reference.into());
    }

    pub fn setter_ref(&self, pointer: &str) -> Option<&str> {
        self.setter_refs.get(pointer).map(String::as_str)
    }

    /// Pointers of the fields governed by the setter `name`.
    pub fn governed_by<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.setter_refs
            .iter()
            .filter(move |(_, reference)| setter_name_from_ref(reference) == Some(name))
            .map(|(pointer, _)| pointer.as_str())
    }
}
