//! Field path matching across document trees.
//!
//! A field path is a slash-delimited list of segments such as
//! `spec/containers/image`. It matches any location whose trailing steps
//! equal the segments, so a short path reaches deeper occurrences too.
//! List indices inside the matched span may be left out of the path: the
//! match then applies within every element of that list.

use std::fmt;

use serde_json::Value;

use crate::types::FieldMatchSpec;

/// One step from a parent node to a child.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Step {
    Key(String),
    Index(usize),
}

impl Step {
    fn matches(&self, segment: &str) -> bool {
        match self {
            Step::Key(key) => key == segment,
            Step::Index(index) => segment.parse::<usize>().map(|n| n == *index).unwrap_or(false),
        }
    }
}

/// Render a location as a JSON Pointer (RFC 6901).
pub fn to_pointer(location: &[Step]) -> String {
    let mut pointer = String::new();
    for step in location {
        pointer.push('/');
        match step {
            Step::Key(key) => pointer.push_str(&key.replace('~', "~0").replace('/', "~1")),
            Step::Index(index) => pointer.push_str(&index.to_string()),
        }
    }
    pointer
}

/// Text of a scalar value, as compared against field value filters.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// A parsed field path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parse a slash-delimited path. Empty segments are ignored, so
    /// `/spec/image` and `spec/image` are the same path.
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True if the trailing steps of `location` equal this path.
    ///
    /// The last segment must name the last step. Earlier segments may skip
    /// over list indices.
    pub fn matches_suffix(&self, location: &[Step]) -> bool {
        let Some((last, rest)) = self.segments.split_last() else {
            return true;
        };
        let Some((step, before)) = location.split_last() else {
            return false;
        };
        step.matches(last) && interior_matches(rest, before)
    }
}

fn interior_matches(segments: &[String], location: &[Step]) -> bool {
    let Some((last, rest)) = segments.split_last() else {
        return true;
    };
    let Some((step, before)) = location.split_last() else {
        return false;
    };
    if step.matches(last) && interior_matches(rest, before) {
        return true;
    }
    matches!(step, Step::Index(_)) && interior_matches(segments, before)
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        FieldPath::parse(path)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

/// A matched field inside one document.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldHandle<'a> {
    pub location: Vec<Step>,
    pub value: &'a Value,
}

impl FieldHandle<'_> {
    pub fn pointer(&self) -> String {
        to_pointer(&self.location)
    }
}

/// Nearest enclosing key. List elements report the key of their list.
fn terminal_key(location: &[Step]) -> Option<&str> {
    location.iter().rev().find_map(|step| match step {
        Step::Key(key) => Some(key.as_str()),
        Step::Index(_) => None,
    })
}

/// Lazy pre-order walk yielding every field that satisfies a match spec.
///
/// A matched object is yielded before the matches nested inside it. A
/// matched list is yielded once; its elements are not searched.
pub struct FieldMatches<'a> {
    spec: &'a FieldMatchSpec,
    stack: Vec<(Vec<Step>, &'a Value)>,
}

/// Match fields in a single document tree.
pub fn match_fields<'a>(document: &'a Value, spec: &'a FieldMatchSpec) -> FieldMatches<'a> {
    FieldMatches {
        spec,
        stack: vec![(Vec::new(), document)],
    }
}

impl<'a> FieldMatches<'a> {
    fn is_match(&self, location: &[Step], value: &Value) -> bool {
        if location.is_empty() {
            return false;
        }
        if self.spec.field_path.is_empty() {
            // without a path, whole objects are containers, not fields
            if value.is_object() {
                return false;
            }
        } else if !self.spec.field_path.matches_suffix(location) {
            return false;
        }
        if let Some(name) = &self.spec.field_name {
            if terminal_key(location) != Some(name.as_str()) {
                return false;
            }
        }
        if let Some(expected) = &self.spec.field_value {
            if scalar_text(value).as_deref() != Some(expected.as_str()) {
                return false;
            }
        }
        true
    }

    fn push_children(&mut self, location: &[Step], value: &'a Value) {
        match value {
            Value::Object(map) => {
                for (key, child) in map.iter().rev() {
                    let mut child_location = location.to_vec();
                    child_location.push(Step::Key(key.clone()));
                    self.stack.push((child_location, child));
                }
            }
            Value::Array(items) => {
                for (index, child) in items.iter().enumerate().rev() {
                    let mut child_location = location.to_vec();
                    child_location.push(Step::Index(index));
                    self.stack.push((child_location, child));
                }
            }
            _ => {}
        }
    }
}

impl<'a> Iterator for FieldMatches<'a> {
    type Item = FieldHandle<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((location, value)) = self.stack.pop() {
            let matched = self.is_match(&location, value);
            if !(matched && value.is_array()) {
                self.push_children(&location, value);
            }
            if matched {
                return Some(FieldHandle { location, value });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pointers(document: &Value, spec: &FieldMatchSpec) -> Vec<String> {
        match_fields(document, spec).map(|h| h.pointer()).collect()
    }

    fn deployment() -> Value {
        json!({
            "kind": "Deployment",
            "metadata": { "name": "nginx" },
            "spec": {
                "template": {
                    "spec": {
                        "containers": [
                            { "name": "nginx", "image": "nginx:1.7" },
                            { "name": "sidecar", "image": "envoy:1.2" }
                        ]
                    }
                }
            }
        })
    }

    #[test]
    fn parse_ignores_empty_segments() {
        let path = FieldPath::parse("/spec//image/");
        assert_eq!(path.segments(), ["spec", "image"]);
        assert_eq!(path.to_string(), "spec/image");
    }

    #[test]
    fn short_path_matches_deep_fields() {
        let spec = FieldMatchSpec::new(FieldPath::parse("image"));
        assert_eq!(
            pointers(&deployment(), &spec),
            vec![
                "/spec/template/spec/containers/0/image",
                "/spec/template/spec/containers/1/image"
            ]
        );
    }

    #[test]
    fn suffix_path_skips_list_indices() {
        let spec = FieldMatchSpec::new(FieldPath::parse("spec/containers/image"));
        assert_eq!(pointers(&deployment(), &spec).len(), 2);
    }

    #[test]
    fn explicit_index_selects_one_element() {
        let spec = FieldMatchSpec::new(FieldPath::parse("containers/1/image"));
        assert_eq!(
            pointers(&deployment(), &spec),
            vec!["/spec/template/spec/containers/1/image"]
        );
    }

    #[test]
    fn full_path_matches_exactly() {
        let spec = FieldMatchSpec::new(FieldPath::parse("metadata/name"));
        assert_eq!(pointers(&deployment(), &spec), vec!["/metadata/name"]);
    }

    #[test]
    fn non_suffix_path_does_not_match() {
        let spec = FieldMatchSpec::new(FieldPath::parse("template/image"));
        assert!(pointers(&deployment(), &spec).is_empty());
    }

    #[test]
    fn name_and_value_filters_are_anded() {
        let spec = FieldMatchSpec::default()
            .field_name("name")
            .field_value("nginx");
        assert_eq!(
            pointers(&deployment(), &spec),
            vec!["/metadata/name", "/spec/template/spec/containers/0/name"]
        );

        let spec = FieldMatchSpec::default()
            .field_name("image")
            .field_value("nginx");
        assert!(pointers(&deployment(), &spec).is_empty());
    }

    #[test]
    fn value_filter_compares_scalar_text() {
        let doc = json!({ "replicas": 3, "paused": false });
        let spec = FieldMatchSpec::default().field_value("3");
        assert_eq!(pointers(&doc, &spec), vec!["/replicas"]);
        let spec = FieldMatchSpec::default().field_value("false");
        assert_eq!(pointers(&doc, &spec), vec!["/paused"]);
    }

    #[test]
    fn list_field_matches_once() {
        let doc = json!({ "spec": { "hosts": ["a.example", "b.example"] } });
        let spec = FieldMatchSpec::new(FieldPath::parse("hosts"));
        let handles: Vec<_> = match_fields(&doc, &spec).collect();
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].pointer(), "/spec/hosts");
        assert!(handles[0].value.is_array());
    }

    #[test]
    fn path_can_target_a_whole_object() {
        let spec = FieldMatchSpec::new(FieldPath::parse("metadata"));
        let doc = deployment();
        let handles: Vec<_> = match_fields(&doc, &spec).collect();
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].value, &json!({ "name": "nginx" }));
    }

    #[test]
    fn nested_occurrences_inside_a_match_are_found() {
        let doc = json!({ "spec": { "template": { "spec": { "replicas": 1 } } } });
        let spec = FieldMatchSpec::new(FieldPath::parse("spec"));
        assert_eq!(pointers(&doc, &spec), vec!["/spec", "/spec/template/spec"]);
    }

    #[test]
    fn lists_inside_a_matched_list_are_not_yielded() {
        let doc = json!({ "args": [{ "args": ["--v=2"] }] });
        let spec = FieldMatchSpec::new(FieldPath::parse("args"));
        assert_eq!(pointers(&doc, &spec), vec!["/args"]);
    }

    #[test]
    fn terminal_key_of_list_element() {
        let doc = json!({ "args": ["--v=2"] });
        let spec = FieldMatchSpec::default().field_value("--v=2");
        let handle = match_fields(&doc, &spec).next().unwrap();
        assert_eq!(handle.pointer(), "/args/0");
        assert_eq!(terminal_key(&handle.location), Some("args"));
    }

    #[test]
    fn pointer_escapes_keys() {
        let location = vec![Step::Key("a/b".into()), Step::Key("c~d".into()), Step::Index(2)];
        assert_eq!(to_pointer(&location), "/a~1b/c~0d/2");
    }

    #[test]
    fn matches_are_lazy() {
        let spec = FieldMatchSpec::new(FieldPath::parse("image"));
        let doc = deployment();
        let mut matches = match_fields(&doc, &spec);
        assert!(matches.next().is_some());
        assert!(matches.next().is_some());
        assert!(matches.next().is_none());
    }
}
