//! The schema registry: persisted setter definitions and their cache.
//!
//! Setter definitions live under `openAPI.definitions` in a single
//! registry file, keyed `io.k8s.cli.setters.<name>`:
//!
//! ```json
//! {
//!   "openAPI": {
//!     "definitions": {
//!       "io.k8s.cli.setters.replicas": {
//!         "type": "integer",
//!         "description": "number of replicas",
//!         "x-k8s-cli": {
//!           "setter": { "name": "replicas", "value": "3", "setBy": "ops" }
//!         }
//!       }
//!     }
//!   }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

use crate::error::SetterError;
use crate::loader::{load_value, save_value};
use crate::path::scalar_text;
use crate::types::{json_type_name, SetterDefinition, CLI_EXTENSION_KEY, SETTER_DEFINITION_PREFIX};
use crate::validator::{validate_schema, validate_type};

/// Setter metadata stored under the `x-k8s-cli` extension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetterExtension {
    name: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "scalar_as_text"
    )]
    value: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "scalars_as_text"
    )]
    list_values: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    set_by: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    required: bool,
}

/// Hand-written YAML registries often leave values unquoted (`value: 3`).
fn scalar_as_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(scalar_text))
}

fn scalars_as_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let values = Vec::<Value>::deserialize(deserializer)?;
    Ok(values.iter().filter_map(scalar_text).collect())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CliExtension {
    setter: SetterExtension,
}

/// Shape every setter entry must have when the registry is loaded.
fn entry_schema() -> Value {
    json!({
        "type": "object",
        "required": [CLI_EXTENSION_KEY],
        "properties": {
            "description": { "type": "string" },
            "type": { "type": "string" },
            CLI_EXTENSION_KEY: {
                "type": "object",
                "required": ["setter"],
                "properties": {
                    "setter": {
                        "type": "object",
                        "required": ["name"],
                        "properties": {
                            "name": { "type": "string", "minLength": 1 },
                            "value": { "type": ["string", "number", "boolean", "null"] },
                            "listValues": {
                                "type": "array",
                                "items": { "type": ["string", "number", "boolean"] }
                            },
                            "setBy": { "type": "string" },
                            "required": { "type": "boolean" }
                        }
                    }
                }
            }
        }
    })
}

fn invalid_registry(path: &Path, message: impl Into<String>) -> SetterError {
    SetterError::InvalidRegistry {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

/// Load the registry document. A missing or empty file is an empty registry.
///
/// # Errors
///
/// Returns a store error if the file can't be read or parsed, or
/// `SetterError::InvalidRegistry` if its root isn't an object.
pub fn read_registry(path: &Path) -> Result<Value, SetterError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }
    match load_value(path)? {
        Value::Null => Ok(Value::Object(Map::new())),
        registry @ Value::Object(_) => Ok(registry),
        other => Err(invalid_registry(
            path,
            format!("expected an object at the root, got {}", json_type_name(&other)),
        )),
    }
}

/// Check that the registry at `path` can be written, before anything else is.
///
/// # Errors
///
/// Returns `SetterError::InvalidRegistry` if `path` is a directory or its
/// parent isn't an existing directory.
pub fn check_registry_location(path: &Path) -> Result<(), SetterError> {
    if path.is_dir() {
        return Err(invalid_registry(path, "registry path is a directory"));
    }
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => Err(invalid_registry(
            path,
            format!("{} is not a directory", parent.display()),
        )),
        _ => Ok(()),
    }
}

fn child_object<'v>(
    parent: &'v mut Map<String, Value>,
    key: &str,
    path: &Path,
) -> Result<&'v mut Map<String, Value>, SetterError> {
    let child = parent
        .entry(key)
        .or_insert_with(|| Value::Object(Map::new()));
    if child.is_null() {
        *child = Value::Object(Map::new());
    }
    match child {
        Value::Object(map) => Ok(map),
        other => Err(invalid_registry(
            path,
            format!("{} must be an object, got {}", key, json_type_name(other)),
        )),
    }
}

fn definitions_mut<'v>(
    registry: &'v mut Value,
    path: &Path,
) -> Result<&'v mut Map<String, Value>, SetterError> {
    let root = registry
        .as_object_mut()
        .ok_or_else(|| invalid_registry(path, "expected an object at the root"))?;
    let open_api = child_object(root, "openAPI", path)?;
    child_object(open_api, "definitions", path)
}

fn definitions(registry: &Value) -> Option<&Map<String, Value>> {
    registry.get("openAPI")?.get("definitions")?.as_object()
}

/// Check a definition before anything is written.
pub fn validate_definition(def: &SetterDefinition) -> Result<(), SetterError> {
    if def.name.trim().is_empty() {
        return Err(SetterError::InvalidSetter {
            message: "setter name must not be empty".to_string(),
        });
    }
    if let Some(schema) = &def.schema {
        validate_schema(schema)?;
    }
    if !def.setter_type.is_empty() {
        validate_type(&def.setter_type)?;
    }
    Ok(())
}

/// Build the registry entry for `def`.
///
/// An explicit schema replaces the previous entry; otherwise the previous
/// entry's keywords are kept and only the setter fields are overwritten.
fn build_entry(
    def: &SetterDefinition,
    existing: Option<&Value>,
    path: &Path,
) -> Result<Value, SetterError> {
    let mut entry = match (&def.schema, existing) {
        (Some(Value::Object(schema)), _) => schema.clone(),
        (None, Some(Value::Object(previous))) => previous.clone(),
        _ => Map::new(),
    };
    if !def.description.is_empty() {
        entry.insert("description".to_string(), Value::String(def.description.clone()));
    }
    if !def.setter_type.is_empty() {
        entry.insert("type".to_string(), Value::String(def.setter_type.clone()));
    }

    let extension = CliExtension {
        setter: SetterExtension {
            name: def.name.clone(),
            value: if def.list_values.is_empty() {
                def.value.clone()
            } else {
                None
            },
            list_values: def.list_values.clone(),
            set_by: def.set_by.clone(),
            required: def.required,
        },
    };
    let extension =
        serde_json::to_value(extension).map_err(|e| invalid_registry(path, e.to_string()))?;
    entry.insert(CLI_EXTENSION_KEY.to_string(), extension);
    Ok(Value::Object(entry))
}

/// Read a definition back from its registry entry.
fn parse_entry(entry: &Value) -> Option<SetterDefinition> {
    let extension = entry.get(CLI_EXTENSION_KEY)?.clone();
    let CliExtension { setter } = serde_json::from_value(extension).ok()?;

    let mut schema = entry.as_object()?.clone();
    schema.remove(CLI_EXTENSION_KEY);
    let description = match schema.remove("description") {
        Some(Value::String(d)) => d,
        _ => String::new(),
    };
    let setter_type = schema
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Some(SetterDefinition {
        name: setter.name,
        value: setter.value,
        list_values: setter.list_values,
        set_by: setter.set_by,
        description,
        setter_type,
        schema: (!schema.is_empty()).then_some(Value::Object(schema)),
        required: setter.required,
    })
}

/// The setters currently recorded in one registry file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnownSetters {
    setters: BTreeMap<String, SetterDefinition>,
}

impl KnownSetters {
    /// Collect and check every setter entry of a registry document.
    ///
    /// # Errors
    ///
    /// Returns `SetterError::InvalidRegistry` listing the entries that don't
    /// have the setter extension shape.
    pub fn from_registry(path: &Path, registry: &Value) -> Result<Self, SetterError> {
        let validator = jsonschema::validator_for(&entry_schema())
            .map_err(|e| invalid_registry(path, e.to_string()))?;

        let mut setters = BTreeMap::new();
        let mut problems = Vec::new();
        for (key, entry) in definitions(registry).into_iter().flatten() {
            if !key.starts_with(SETTER_DEFINITION_PREFIX) {
                continue;
            }
            let errors: Vec<String> = validator
                .iter_errors(entry)
                .map(|e| format!("{}{}: {}", key, e.instance_path, e))
                .collect();
            if !errors.is_empty() {
                problems.extend(errors);
                continue;
            }
            if let Some(def) = parse_entry(entry) {
                setters.insert(def.name.clone(), def);
            }
        }

        if problems.is_empty() {
            Ok(Self { setters })
        } else {
            Err(invalid_registry(path, problems.join("; ")))
        }
    }

    pub fn get(&self, name: &str) -> Option<&SetterDefinition> {
        self.setters.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.setters.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SetterDefinition> {
        self.setters.values()
    }

    pub fn len(&self) -> usize {
        self.setters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.setters.is_empty()
    }
}

/// Parsed registries keyed by file path.
///
/// Entries are loaded on first `get`, dropped by `invalidate`, and rebuilt
/// on the next `get`. One writer at a time.
#[derive(Debug, Default)]
pub struct SchemaCache {
    entries: Mutex<HashMap<PathBuf, Arc<KnownSetters>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, Arc<KnownSetters>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Known setters of the registry at `path`, loading it if needed.
    pub fn get(&self, path: &Path) -> Result<Arc<KnownSetters>, SetterError> {
        if let Some(known) = self.lock().get(path) {
            return Ok(Arc::clone(known));
        }
        let registry = read_registry(path)?;
        let known = Arc::new(KnownSetters::from_registry(path, &registry)?);
        tracing::debug!(registry = %path.display(), setters = known.len(), "loaded registry");
        self.lock().insert(path.to_path_buf(), Arc::clone(&known));
        Ok(known)
    }

    pub fn invalidate(&self, path: &Path) {
        self.lock().remove(path);
    }

    /// Drop and immediately rebuild the entry for `path`.
    pub fn reload(&self, path: &Path) -> Result<Arc<KnownSetters>, SetterError> {
        self.invalidate(path);
        self.get(path)
    }

    pub fn is_cached(&self, path: &Path) -> bool {
        self.lock().contains_key(path)
    }
}

/// Writes setter definitions into a registry file.
#[derive(Debug, Clone, Copy)]
pub struct SchemaRegistrar<'a> {
    cache: &'a SchemaCache,
}

impl<'a> SchemaRegistrar<'a> {
    pub fn new(cache: &'a SchemaCache) -> Self {
        Self { cache }
    }

    /// Insert or replace the entry for `def.name`.
    ///
    /// The definition is validated first; an invalid definition leaves the
    /// file untouched. A successful write invalidates the cached registry.
    ///
    /// # Errors
    ///
    /// Returns a validation error, a store error, or
    /// `SetterError::InvalidRegistry` if the file doesn't have the
    /// `openAPI.definitions` layout.
    pub fn upsert(&self, openapi_path: &Path, def: &SetterDefinition) -> Result<(), SetterError> {
        validate_definition(def)?;

        let mut registry = read_registry(openapi_path)?;
        let definitions = definitions_mut(&mut registry, openapi_path)?;
        let key = def.definition_key();
        let entry = build_entry(def, definitions.get(&key), openapi_path)?;
        definitions.insert(key, entry);

        save_value(openapi_path, &registry)?;
        self.cache.invalidate(openapi_path);
        tracing::debug!(setter = %def.name, registry = %openapi_path.display(), "wrote setter definition");
        Ok(())
    }
}
