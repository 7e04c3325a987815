//! Reading and writing structured files.
//!
//! Files ending in `.json` are JSON; everything else is read as YAML, which
//! may hold several documents separated by `---`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::document::Document;
use crate::error::StoreError;

/// Extensions picked up when scanning a package directory.
const DOCUMENT_EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

fn is_json(path: &Path) -> bool {
    path.extension().map(|e| e == "json").unwrap_or(false)
}

fn read_file(path: &Path) -> Result<String, StoreError> {
    if !path.exists() {
        return Err(StoreError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    fs::read_to_string(path).map_err(|source| StoreError::ReadError {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse every document in `content`. Empty YAML documents are skipped.
pub fn parse_documents(path: &Path, content: &str) -> Result<Vec<Value>, StoreError> {
    if is_json(path) {
        let value = serde_json::from_str(content).map_err(|source| StoreError::InvalidJson {
            path: path.to_path_buf(),
            source,
        })?;
        return Ok(vec![value]);
    }

    let mut values = Vec::new();
    for document in serde_yaml_ng::Deserializer::from_str(content) {
        let value = Value::deserialize(document).map_err(|source| StoreError::InvalidYaml {
            path: path.to_path_buf(),
            source,
        })?;
        if !value.is_null() {
            values.push(value);
        }
    }
    Ok(values)
}

/// Load every document stored in a file.
///
/// # Errors
///
/// Returns `StoreError::FileNotFound` if the file doesn't exist, or a parse
/// error if its content isn't valid for its format.
pub fn load_documents(path: &Path) -> Result<Vec<Value>, StoreError> {
    let content = read_file(path)?;
    parse_documents(path, &content)
}

/// Load a file holding a single document. An empty file loads as `null`.
pub fn load_value(path: &Path) -> Result<Value, StoreError> {
    Ok(load_documents(path)?.into_iter().next().unwrap_or(Value::Null))
}

/// Render documents in the format implied by `path`.
pub fn render_documents(path: &Path, values: &[Value]) -> Result<String, StoreError> {
    let serialize_error = |message: String| StoreError::Serialize {
        path: path.to_path_buf(),
        message,
    };

    if is_json(path) {
        let value = match values {
            [single] => single,
            _ => {
                return Err(serialize_error(format!(
                    "a JSON file holds one document, got {}",
                    values.len()
                )))
            }
        };
        let mut out =
            serde_json::to_string_pretty(value).map_err(|e| serialize_error(e.to_string()))?;
        out.push('\n');
        return Ok(out);
    }

    let rendered = values
        .iter()
        .map(|value| serde_yaml_ng::to_string(value).map_err(|e| serialize_error(e.to_string())))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rendered.join("---\n"))
}

/// Write documents to a file, replacing its content.
pub fn save_documents(path: &Path, values: &[Value]) -> Result<(), StoreError> {
    let content = render_documents(path, values)?;
    fs::write(path, content).map_err(|source| StoreError::WriteError {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a single document to a file.
pub fn save_value(path: &Path, value: &Value) -> Result<(), StoreError> {
    save_documents(path, std::slice::from_ref(value))
}

/// Source and sink of the documents a setter is applied to.
pub trait DocumentStore {
    fn read(&self) -> Result<Vec<Document>, StoreError>;
    fn write(&mut self, documents: &[Document]) -> Result<(), StoreError>;
}

/// Documents held in memory, mostly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocuments {
    pub documents: Vec<Document>,
}

impl InMemoryDocuments {
    pub fn new(contents: impl IntoIterator<Item = Value>) -> Self {
        Self {
            documents: contents.into_iter().map(Document::new).collect(),
        }
    }
}

impl DocumentStore for InMemoryDocuments {
    fn read(&self) -> Result<Vec<Document>, StoreError> {
        Ok(self.documents.clone())
    }

    fn write(&mut self, documents: &[Document]) -> Result<(), StoreError> {
        self.documents = documents.to_vec();
        Ok(())
    }
}

/// A directory of `.json`, `.yaml` and `.yml` files.
#[derive(Debug, Clone)]
pub struct LocalPackage {
    root: PathBuf,
    exclude: Vec<PathBuf>,
}

impl LocalPackage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            exclude: Vec::new(),
        }
    }

    /// Skip a file (typically the registry) when reading the package.
    pub fn exclude(mut self, path: impl Into<PathBuf>) -> Self {
        self.exclude.push(path.into());
        self
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.exclude.iter().any(|excluded| {
            excluded == path
                || matches!(
                    (fs::canonicalize(excluded), fs::canonicalize(path)),
                    (Ok(a), Ok(b)) if a == b
                )
        })
    }

    fn document_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut files = Vec::new();
        if self.root.is_file() {
            files.push(self.root.clone());
        } else {
            collect_files_recursive(&self.root, &mut files)?;
            files.sort();
        }
        files.retain(|f| !self.is_excluded(f));
        Ok(files)
    }
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), StoreError> {
    let read_error = |source| StoreError::ReadError {
        path: dir.to_path_buf(),
        source,
    };
    if !dir.exists() {
        return Err(StoreError::FileNotFound {
            path: dir.to_path_buf(),
        });
    }

    for entry in fs::read_dir(dir).map_err(read_error)? {
        let path = entry.map_err(read_error)?.path();
        if path.is_dir() {
            collect_files_recursive(&path, files)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| DOCUMENT_EXTENSIONS.contains(&e))
            .unwrap_or(false)
        {
            files.push(path);
        }
    }
    Ok(())
}

impl DocumentStore for LocalPackage {
    fn read(&self) -> Result<Vec<Document>, StoreError> {
        let mut documents = Vec::new();
        for file in self.document_files()? {
            for value in load_documents(&file)? {
                documents.push(Document::new(value).with_source(&file));
            }
        }
        tracing::debug!(
            package = %self.root.display(),
            count = documents.len(),
            "read package documents"
        );
        Ok(documents)
    }

    fn write(&mut self, documents: &[Document]) -> Result<(), StoreError> {
        let mut files: Vec<(&Path, Vec<Value>)> = Vec::new();
        for document in documents {
            let Some(source) = document.source.as_deref() else {
                tracing::warn!("skipping document without a source file");
                continue;
            };
            match files.iter_mut().find(|(path, _)| *path == source) {
                Some((_, values)) => values.push(document.to_stored()),
                None => files.push((source, vec![document.to_stored()])),
            }
        }

        for (path, values) in &files {
            save_documents(path, values)?;
        }
        tracing::debug!(package = %self.root.display(), files = files.len(), "wrote package");
        Ok(())
    }
}
