use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value};

/// Error raised while fetching or parsing a graph document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    Fetch(String),
    Parse(String),
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentError::Fetch(url) => write!(f, "could not fetch graph document '{}'", url),
            DocumentError::Parse(msg) => write!(f, "could not parse graph document: {}", msg),
        }
    }
}

/// The raw graph document as fetched: a node list and a link list, each entry
/// an open set of fields read through the configured accessors.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<Map<String, Value>>,
    #[serde(default)]
    pub links: Vec<Map<String, Value>>,
}

impl GraphDocument {
    pub fn from_json(text: &str) -> Result<Self, DocumentError> {
        serde_json::from_str(text).map_err(|e| DocumentError::Parse(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty()
    }
}

/// Fetch a document from a URL. This implementation reads the local
/// filesystem (with or without a `file://` prefix); remote schemes are the
/// embedding host's concern.
pub fn fetch_document(url: &str) -> Result<GraphDocument, DocumentError> {
    let path = url.strip_prefix("file://").unwrap_or(url);
    let text =
        std::fs::read_to_string(path).map_err(|_| DocumentError::Fetch(url.to_string()))?;
    GraphDocument::from_json(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_document() {
        let doc = GraphDocument::from_json(
            r#"{
                "nodes": [{"id": "a", "group": 1}, {"id": "b", "group": 2}],
                "links": [{"source": "a", "target": "b"}]
            }"#,
        )
        .unwrap();

        assert_eq!(doc.nodes.len(), 2);
        assert_eq!(doc.links.len(), 1);
        assert_eq!(doc.nodes[0].get("id"), Some(&serde_json::json!("a")));
    }

    #[test]
    fn test_missing_sections_default_empty() {
        let doc = GraphDocument::from_json("{}").unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_parse_failure_is_an_error() {
        let err = GraphDocument::from_json("not json").unwrap_err();
        assert!(matches!(err, DocumentError::Parse(_)));
    }

    #[test]
    fn test_fetch_missing_file_is_an_error() {
        let err = fetch_document("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, DocumentError::Fetch(_)));
    }
}
