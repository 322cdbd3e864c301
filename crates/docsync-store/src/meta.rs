//! The `META` part: a JSON object with an optional `annotation` member
//!
//! Only the annotation fields are interpreted; every other member is kept
//! as-is so rewriting the metadata never drops data owned by other tools.

use serde_json::{Map, Value};

const ANNOTATION: &str = "annotation";

/// Parsed document metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    fields: Map<String, Value>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `META` blob.
    ///
    /// Anything that is not a JSON object yields empty metadata; naming falls
    /// back to other sources in that case.
    pub fn parse(bytes: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(fields)) => Self { fields },
            Ok(_) => Self::default(),
            Err(e) => {
                tracing::debug!(error = %e, "Unparseable metadata, treating as empty");
                Self::default()
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        // Serialising a Map of Values cannot fail
        serde_json::to_vec(&self.fields).unwrap_or_default()
    }

    pub fn title(&self) -> Option<&str> {
        self.annotation_str("title")
    }

    /// Original file path the document was imported from.
    pub fn origin(&self) -> Option<&str> {
        self.annotation_str("origin")
    }

    pub fn comment(&self) -> Option<&str> {
        self.annotation_str("comment")
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.set_annotation("title", title);
        self
    }

    pub fn with_origin(mut self, origin: &str) -> Self {
        self.set_annotation("origin", origin);
        self
    }

    pub fn set_comment(&mut self, comment: &str) {
        self.set_annotation("comment", comment);
    }

    /// Raw access to a top-level member.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    fn annotation_str(&self, key: &str) -> Option<&str> {
        self.fields.get(ANNOTATION)?.get(key)?.as_str()
    }

    fn set_annotation(&mut self, key: &str, value: &str) {
        let entry = self
            .fields
            .entry(ANNOTATION)
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(annotation) = entry {
            annotation.insert(key.to_string(), Value::String(value.to_string()));
        }
    }
}
