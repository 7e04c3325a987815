//! Creating a setter: tag matching fields, then record the definition.
//!
//! The two stores are written one after the other with no rollback. If the
//! registry write fails after the documents were updated, running `create`
//! again once the registry is fixed converges to the same state.

use std::path::Path;

use serde_json::Value;

use crate::error::SetterError;
use crate::loader::{DocumentStore, LocalPackage};
use crate::path::FieldPath;
use crate::pipeline::{run, Mutation};
use crate::registry::{check_registry_location, validate_definition, SchemaCache, SchemaRegistrar};
use crate::types::{FieldMatchSpec, SetterDefinition, DEFAULT_DELIMITER};

/// Creates or updates a setter definition and references it from matching fields.
#[derive(Debug, Clone)]
pub struct SetterCreator {
    pub name: String,
    /// Value written into matched fields. `None` only tags them.
    pub value: Option<String>,
    pub set_by: String,
    pub description: String,
    pub setter_type: String,
    pub schema: Option<Value>,
    /// Full path, or any path suffix, of the fields to reference the setter from.
    pub field_path: FieldPath,
    pub field_name: Option<String>,
    pub field_value: Option<String>,
    /// Ordinal splice position, see [`Mutation::file_path_position`].
    pub file_path_position: usize,
    pub delimiter: String,
    /// The package consumer must set this setter before apply.
    pub required: bool,
}

/// What a successful `create` did.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateOutcome {
    /// Number of fields that now reference the setter.
    pub count: usize,
    /// The definition as last written to the registry.
    pub definition: SetterDefinition,
}

impl SetterCreator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            set_by: String::new(),
            description: String::new(),
            setter_type: String::new(),
            schema: None,
            field_path: FieldPath::default(),
            field_name: None,
            field_value: None,
            file_path_position: 0,
            delimiter: DEFAULT_DELIMITER.to_string(),
            required: false,
        }
    }

    fn definition(&self) -> SetterDefinition {
        SetterDefinition {
            name: self.name.clone(),
            value: self.value.clone().or_else(|| self.field_value.clone()),
            list_values: Vec::new(),
            set_by: self.set_by.clone(),
            description: self.description.clone(),
            setter_type: self.setter_type.clone(),
            schema: self.schema.clone(),
            required: self.required,
        }
    }

    /// A value with nothing to select fields by would overwrite every scalar.
    fn check_selector(&self) -> Result<(), SetterError> {
        let has_selector = !self.field_path.is_empty()
            || self.field_name.is_some()
            || self.field_value.is_some();
        if self.value.is_some() && !has_selector {
            return Err(SetterError::InvalidSetter {
                message: format!(
                    "setter {} has a value but no field path, field name or field value to match",
                    self.name
                ),
            });
        }
        Ok(())
    }

    fn match_spec(&self) -> FieldMatchSpec {
        FieldMatchSpec {
            field_path: self.field_path.clone(),
            field_name: self.field_name.clone(),
            field_value: self.field_value.clone(),
        }
    }

    fn mutation(&self, def: &SetterDefinition) -> Mutation {
        Mutation {
            value: self.value.clone(),
            delimiter: self.delimiter.clone(),
            file_path_position: self.file_path_position,
            setter_ref: Some(def.setter_ref()),
            ..Default::default()
        }
    }

    /// Update the documents in `store`, then upsert the definition into the
    /// registry at `openapi_path`.
    ///
    /// A setter that matches no field is still recorded. When the matched
    /// fields are lists, the definition is written a second time with the
    /// distinct element values in place of a scalar value.
    ///
    /// # Errors
    ///
    /// Validation errors, a value without any field selector, and a
    /// registry path that can't be written abort before either store is
    /// touched. A document
    /// error aborts before the registry is written. A registry error leaves
    /// the already-written documents in place.
    pub fn create(
        &self,
        openapi_path: &Path,
        store: &mut dyn DocumentStore,
        cache: &SchemaCache,
    ) -> Result<CreateOutcome, SetterError> {
        let def = self.definition();
        validate_definition(&def)?;
        self.check_selector()?;
        check_registry_location(openapi_path)?;

        let result = run(store, &self.match_spec(), &self.mutation(&def))?;
        if result.count == 0 {
            tracing::warn!(
                setter = %self.name,
                "setter {} doesn't match any field in resources, but creating setter definition",
                self.name
            );
        }

        let registrar = SchemaRegistrar::new(cache);
        registrar.upsert(openapi_path, &def)?;
        cache.reload(openapi_path)?;

        let def = if result.list_values.is_empty() {
            def
        } else {
            let def = def.with_list_values(result.list_values);
            registrar.upsert(openapi_path, &def)?;
            def
        };

        tracing::info!(setter = %self.name, fields = result.count, "created setter");
        Ok(CreateOutcome {
            count: result.count,
            definition: def,
        })
    }

    /// Run `create` against a package directory, skipping the registry file.
    pub fn create_in_package(
        &self,
        openapi_path: &Path,
        resources_path: &Path,
        cache: &SchemaCache,
    ) -> Result<CreateOutcome, SetterError> {
        let mut package = LocalPackage::new(resources_path).exclude(openapi_path);
        self.create(openapi_path, &mut package, cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaTypeError;
    use crate::loader::InMemoryDocuments;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn sets_value_and_records_definition() {
        let dir = TempDir::new().unwrap();
        let registry = dir.path().join("Kptfile");
        let cache = SchemaCache::new();
        let mut store = InMemoryDocuments::new([json!({
            "spec": { "template": { "spec": { "containers": [{ "image": "nginx:1.7" }] } } }
        })]);

        let mut creator = SetterCreator::new("image");
        creator.value = Some("nginx:1.8".into());
        creator.field_path = FieldPath::parse("containers/image");
        creator.setter_type = "string".into();
        let outcome = creator.create(&registry, &mut store, &cache).unwrap();

        assert_eq!(outcome.count, 1);
        let doc = &store.documents[0];
        assert_eq!(
            doc.content["spec"]["template"]["spec"]["containers"][0]["image"],
            json!("nginx:1.8")
        );
        assert_eq!(
            doc.setter_ref("/spec/template/spec/containers/0/image"),
            Some("#/definitions/io.k8s.cli.setters.image")
        );

        let known = cache.get(&registry).unwrap();
        assert_eq!(known.get("image").unwrap().value.as_deref(), Some("nginx:1.8"));
    }

    #[test]
    fn zero_matches_still_records_definition() {
        let dir = TempDir::new().unwrap();
        let registry = dir.path().join("registry.json");
        let cache = SchemaCache::new();
        let mut store = InMemoryDocuments::new([json!({ "kind": "Service" })]);

        let mut creator = SetterCreator::new("replicas");
        creator.value = Some("3".into());
        creator.field_path = FieldPath::parse("spec/replicas");
        let outcome = creator.create(&registry, &mut store, &cache).unwrap();

        assert_eq!(outcome.count, 0);
        assert_eq!(store.documents[0].content, json!({ "kind": "Service" }));
        assert!(cache.get(&registry).unwrap().get("replicas").is_some());
    }

    #[test]
    fn list_setter_records_list_values() {
        let dir = TempDir::new().unwrap();
        let registry = dir.path().join("registry.json");
        let cache = SchemaCache::new();
        let mut store = InMemoryDocuments::new([
            json!({ "spec": { "hosts": ["a.dev", "b.dev"] } }),
            json!({ "spec": { "hosts": ["b.dev", "c.dev"] } }),
        ]);

        let mut creator = SetterCreator::new("hosts");
        creator.field_name = Some("hosts".into());
        creator.setter_type = "array".into();
        let outcome = creator.create(&registry, &mut store, &cache).unwrap();

        assert_eq!(outcome.count, 2);
        assert_eq!(outcome.definition.value, None);
        assert_eq!(outcome.definition.list_values, vec!["a.dev", "b.dev", "c.dev"]);

        let known = cache.get(&registry).unwrap();
        let hosts = known.get("hosts").unwrap();
        assert_eq!(hosts.value, None);
        assert_eq!(hosts.list_values, vec!["a.dev", "b.dev", "c.dev"]);
        assert_eq!(store.documents[1].content["spec"]["hosts"], json!(["b.dev", "c.dev"]));
    }

    #[test]
    fn invalid_schema_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let registry = dir.path().join("registry.json");
        let cache = SchemaCache::new();
        let mut store = InMemoryDocuments::new([json!({ "image": "nginx" })]);

        let mut creator = SetterCreator::new("image");
        creator.value = Some("redis".into());
        creator.field_path = FieldPath::parse("image");
        creator.schema = Some(json!({ "type": "array", "items": [{ "type": "str" }] }));
        let err = creator.create(&registry, &mut store, &cache).unwrap_err();

        assert!(matches!(err, SetterError::Validation(SchemaTypeError::UnsupportedType { .. })));
        assert_eq!(store.documents[0].content, json!({ "image": "nginx" }));
        assert!(store.documents[0].setter_refs.is_empty());
        assert!(!registry.exists());
    }

    #[test]
    fn value_without_selector_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let registry = dir.path().join("registry.json");
        let cache = SchemaCache::new();
        let mut store = InMemoryDocuments::new([json!({ "kind": "Deployment", "image": "nginx" })]);

        let mut creator = SetterCreator::new("image");
        creator.value = Some("redis".into());
        let err = creator.create(&registry, &mut store, &cache).unwrap_err();

        assert!(matches!(err, SetterError::InvalidSetter { .. }));
        assert_eq!(err.exit_code(), 2);
        assert_eq!(
            store.documents[0].content,
            json!({ "kind": "Deployment", "image": "nginx" })
        );
        assert!(!registry.exists());
    }

    #[test]
    fn unwritable_registry_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let not_a_dir = dir.path().join("deploy.yaml");
        std::fs::write(&not_a_dir, "image: nginx\n").unwrap();
        let cache = SchemaCache::new();
        let mut store = InMemoryDocuments::new([json!({ "image": "nginx" })]);

        let mut creator = SetterCreator::new("image");
        creator.value = Some("redis".into());
        creator.field_path = FieldPath::parse("image");
        let err = creator
            .create(&not_a_dir.join("Kptfile"), &mut store, &cache)
            .unwrap_err();

        assert!(matches!(err, SetterError::InvalidRegistry { .. }));
        assert_eq!(store.documents[0].content, json!({ "image": "nginx" }));
        assert!(store.documents[0].setter_refs.is_empty());
    }

    #[test]
    fn tag_only_uses_field_value_as_setter_value() {
        let dir = TempDir::new().unwrap();
        let registry = dir.path().join("registry.json");
        let cache = SchemaCache::new();
        let mut store = InMemoryDocuments::new([json!({ "metadata": { "name": "nginx" } })]);

        let mut creator = SetterCreator::new("name");
        creator.field_name = Some("name".into());
        creator.field_value = Some("nginx".into());
        let outcome = creator.create(&registry, &mut store, &cache).unwrap();

        assert_eq!(outcome.count, 1);
        assert_eq!(outcome.definition.value.as_deref(), Some("nginx"));
        assert_eq!(store.documents[0].content, json!({ "metadata": { "name": "nginx" } }));
    }

    #[test]
    fn recreating_supersedes_previous_definition() {
        let dir = TempDir::new().unwrap();
        let registry = dir.path().join("registry.json");
        let cache = SchemaCache::new();
        let mut store = InMemoryDocuments::new([json!({ "spec": { "replicas": 1 } })]);

        let mut creator = SetterCreator::new("replicas");
        creator.field_path = FieldPath::parse("replicas");
        creator.value = Some("2".into());
        creator.create(&registry, &mut store, &cache).unwrap();
        creator.value = Some("4".into());
        creator.description = "scaled".into();
        creator.create(&registry, &mut store, &cache).unwrap();

        assert_eq!(store.documents[0].content, json!({ "spec": { "replicas": 4 } }));
        let known = cache.get(&registry).unwrap();
        assert_eq!(known.len(), 1);
        let replicas = known.get("replicas").unwrap();
        assert_eq!(replicas.value.as_deref(), Some("4"));
        assert_eq!(replicas.description, "scaled");
    }
}
