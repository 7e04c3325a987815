//! Applying a value to every matching field of a document collection.

use serde_json::{Map, Value};

use crate::document::Document;
use crate::error::SetterError;
use crate::loader::DocumentStore;
use crate::path::{match_fields, scalar_text, to_pointer, Step};
use crate::splice::{ordinal_position, splice};
use crate::types::{json_type_name, FieldMatchSpec, MatchResult, SpliceRequest, DEFAULT_DELIMITER};

/// What to do with a document in which nothing matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingFieldPolicy {
    /// Leave the document untouched.
    #[default]
    Skip,
    /// Create the field path from the document root and set the value there.
    Create,
}

/// How matched fields are changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    /// New value to splice in. `None` only tags matched fields.
    pub value: Option<String>,
    pub delimiter: String,
    /// Ordinal splice position: 0 replaces, 1 prefixes, `k` inserts before
    /// the k-th segment, past the end appends.
    pub file_path_position: usize,
    /// Setter reference recorded on every matched field.
    pub setter_ref: Option<String>,
    pub missing: MissingFieldPolicy,
}

impl Default for Mutation {
    fn default() -> Self {
        Self {
            value: None,
            delimiter: DEFAULT_DELIMITER.to_string(),
            file_path_position: 0,
            setter_ref: None,
            missing: MissingFieldPolicy::Skip,
        }
    }
}

impl Mutation {
    /// Replace or splice `value` into matched fields.
    pub fn set(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Default::default()
        }
    }

    /// Only record the setter reference; leave values alone.
    pub fn tag(setter_ref: impl Into<String>) -> Self {
        Self {
            setter_ref: Some(setter_ref.into()),
            ..Default::default()
        }
    }

    pub fn position(mut self, file_path_position: usize) -> Self {
        self.file_path_position = file_path_position;
        self
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn setter_ref(mut self, setter_ref: impl Into<String>) -> Self {
        self.setter_ref = Some(setter_ref.into());
        self
    }

    pub fn create_missing(mut self) -> Self {
        self.missing = MissingFieldPolicy::Create;
        self
    }

    fn splice_into(&self, current: &Value, value: &str) -> Value {
        let request = SpliceRequest {
            target_value: scalar_text(current),
            insert_value: value.to_string(),
            delimiter: self.delimiter.clone(),
            position: ordinal_position(self.file_path_position),
        };
        typed_like(current, splice(&request))
    }
}

/// Keep numbers and booleans as such when the new text still parses as one.
fn typed_like(current: &Value, text: String) -> Value {
    match current {
        Value::Number(_) => match text.parse::<serde_json::Number>() {
            Ok(n) => Value::Number(n),
            Err(_) => Value::String(text),
        },
        Value::Bool(_) => match text.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(text),
        },
        _ => Value::String(text),
    }
}

fn element_text(element: &Value) -> Option<String> {
    match element {
        Value::Null => None,
        Value::Array(_) | Value::Object(_) => Some(element.to_string()),
        scalar => scalar_text(scalar),
    }
}

/// Apply `mutation` to every field matching `spec`, in place.
///
/// Matched lists are not spliced: their element values are collected into
/// the result and the list is only tagged with the setter reference.
/// Fields nested in a matched object are updated too, unless the object
/// itself was replaced by the new value.
///
/// # Errors
///
/// Returns `SetterError::PathConflict` if a missing field can't be created
/// because the path runs through a scalar or a missing list element.
pub fn apply(
    documents: &mut [Document],
    spec: &FieldMatchSpec,
    mutation: &Mutation,
) -> Result<MatchResult, SetterError> {
    let mut result = MatchResult::default();

    for document in documents.iter_mut() {
        let matched: Vec<(String, Value)> = match_fields(&document.content, spec)
            .map(|handle| (handle.pointer(), handle.value.clone()))
            .collect();

        if matched.is_empty() {
            if mutation.missing == MissingFieldPolicy::Create {
                if let Some(pointer) = create_field(document, spec, mutation)? {
                    tracing::debug!(%pointer, "created field");
                    result.count += 1;
                }
            }
            continue;
        }

        let mut replaced: Vec<String> = Vec::new();
        for (pointer, current) in matched {
            // matches are in pre-order, so an object replaced by a scalar
            // comes before the fields that were nested in it
            if replaced.iter().any(|outer| is_within(&pointer, outer)) {
                continue;
            }
            match (&current, &mutation.value) {
                (Value::Array(items), _) => {
                    for value in items.iter().filter_map(element_text) {
                        result.record_list_value(value);
                    }
                }
                (_, Some(value)) => {
                    let field = document.content.pointer_mut(&pointer).ok_or_else(|| {
                        SetterError::PathConflict {
                            pointer: pointer.clone(),
                            message: "field disappeared during update".to_string(),
                        }
                    })?;
                    *field = mutation.splice_into(&current, value);
                    if current.is_object() {
                        replaced.push(pointer.clone());
                    }
                }
                (_, None) => {}
            }
            if let Some(reference) = &mutation.setter_ref {
                document.set_setter_ref(pointer.as_str(), reference.as_str());
            }
            tracing::debug!(%pointer, "matched field");
            result.count += 1;
        }
    }

    Ok(result)
}

fn is_within(pointer: &str, outer: &str) -> bool {
    pointer
        .strip_prefix(outer)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Read every document from `store`, apply `mutation`, and write them back.
///
/// Nothing is written when no field matched.
pub fn run(
    store: &mut dyn DocumentStore,
    spec: &FieldMatchSpec,
    mutation: &Mutation,
) -> Result<MatchResult, SetterError> {
    let mut documents = store.read()?;
    let result = apply(&mut documents, spec, mutation)?;
    if result.count > 0 {
        store.write(&documents)?;
    }
    Ok(result)
}

fn create_field(
    document: &mut Document,
    spec: &FieldMatchSpec,
    mutation: &Mutation,
) -> Result<Option<String>, SetterError> {
    let Some(value) = &mutation.value else {
        return Ok(None);
    };
    if spec.field_path.is_empty() {
        return Ok(None);
    }

    let (field, location) = create_path(&mut document.content, spec.field_path.segments())?;
    let current = field.clone();
    *field = mutation.splice_into(&current, value);

    let pointer = to_pointer(&location);
    if let Some(reference) = &mutation.setter_ref {
        document.set_setter_ref(pointer.as_str(), reference.as_str());
    }
    Ok(Some(pointer))
}

/// Walk `segments` from the root, creating missing objects along the way.
fn create_path<'v>(
    root: &'v mut Value,
    segments: &[String],
) -> Result<(&'v mut Value, Vec<Step>), SetterError> {
    let mut current = root;
    let mut location = Vec::new();

    for segment in segments {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => {
                location.push(Step::Key(segment.clone()));
                map.entry(segment.clone()).or_insert(Value::Null)
            }
            Value::Array(items) => {
                let index = segment
                    .parse::<usize>()
                    .ok()
                    .filter(|index| *index < items.len())
                    .ok_or_else(|| SetterError::PathConflict {
                        pointer: to_pointer(&location),
                        message: format!("list has no element {}", segment),
                    })?;
                location.push(Step::Index(index));
                &mut items[index]
            }
            other => {
                return Err(SetterError::PathConflict {
                    pointer: to_pointer(&location),
                    message: format!("expected object or list, found {}", json_type_name(other)),
                })
            }
        };
    }

    Ok((current, location))
}
