//! Type registry: document type to file-extension candidates
//!
//! Maps a document's type identifier (a MIME type such as `text/plain`, or a
//! `public.*` uniform type identifier) to an ordered list of extensions.

use std::collections::HashMap;

/// Looks up file extensions for a document type.
pub trait TypeRegistry: Send + Sync {
    /// Candidate extensions for `doc_type`, preferred first, each with a
    /// leading dot. Empty if the type is unknown.
    fn extensions(&self, doc_type: &str) -> Vec<String>;
}

const BUILTINS: &[(&str, &[&str])] = &[
    ("text/plain", &[".txt"]),
    ("text/markdown", &[".md", ".markdown"]),
    ("text/html", &[".html", ".htm"]),
    ("text/csv", &[".csv"]),
    ("application/json", &[".json"]),
    ("application/pdf", &[".pdf"]),
    ("application/zip", &[".zip"]),
    ("application/vnd.oasis.opendocument.text", &[".odt"]),
    ("application/vnd.oasis.opendocument.spreadsheet", &[".ods"]),
    ("application/vnd.oasis.opendocument.presentation", &[".odp"]),
    ("image/png", &[".png"]),
    ("image/jpeg", &[".jpg", ".jpeg"]),
    ("image/gif", &[".gif"]),
    ("image/svg+xml", &[".svg"]),
    ("audio/mpeg", &[".mp3"]),
    ("video/mp4", &[".mp4"]),
    ("public.plain-text", &[".txt"]),
    ("public.html", &[".html", ".htm"]),
    ("public.jpeg", &[".jpg", ".jpeg"]),
    ("public.png", &[".png"]),
    ("com.adobe.pdf", &[".pdf"]),
];

/// Registry backed by a built-in table plus configured overrides.
///
/// Overrides are consulted first and replace the built-in entry for the
/// same type.
///
/// # Example
///
/// ```
/// use docsync_store::{BuiltinRegistry, TypeRegistry};
///
/// let mut registry = BuiltinRegistry::new();
/// registry.register("application/x-foo", [".foo"]);
/// assert_eq!(registry.extensions("application/x-foo"), vec![".foo".to_string()]);
/// assert_eq!(registry.extensions("text/plain"), vec![".txt".to_string()]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BuiltinRegistry {
    overrides: HashMap<String, Vec<String>>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register extensions for a type, replacing any previous entry.
    pub fn register<I, S>(&mut self, doc_type: impl Into<String>, extensions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let normalized = extensions
            .into_iter()
            .map(|e| {
                let e = e.into();
                if e.starts_with('.') { e } else { format!(".{}", e) }
            })
            .collect();
        self.overrides
            .insert(doc_type.into().to_ascii_lowercase(), normalized);
    }
}

impl TypeRegistry for BuiltinRegistry {
    fn extensions(&self, doc_type: &str) -> Vec<String> {
        let key = doc_type.trim().to_ascii_lowercase();
        // MIME parameters (e.g. "; charset=utf-8") do not affect the extension
        let key = key.split(';').next().unwrap_or("").trim();

        if let Some(exts) = self.overrides.get(key) {
            return exts.clone();
        }
        BUILTINS
            .iter()
            .find(|(t, _)| *t == key)
            .map(|(_, exts)| exts.iter().map(|e| e.to_string()).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("text/plain", ".txt")]
    #[case("TEXT/PLAIN", ".txt")]
    #[case("text/plain; charset=utf-8", ".txt")]
    #[case("image/jpeg", ".jpg")]
    #[case("public.jpeg", ".jpg")]
    fn builtin_first_extension(#[case] doc_type: &str, #[case] expected: &str) {
        let registry = BuiltinRegistry::new();
        assert_eq!(registry.extensions(doc_type)[0], expected);
    }

    #[test]
    fn unknown_type_is_empty() {
        assert!(BuiltinRegistry::new().extensions("application/x-unknown").is_empty());
    }

    #[test]
    fn override_replaces_builtin_and_adds_dot() {
        let mut registry = BuiltinRegistry::new();
        registry.register("text/plain", ["text", ".txt"]);
        assert_eq!(
            registry.extensions("text/plain"),
            vec![".text".to_string(), ".txt".to_string()]
        );
    }
}
