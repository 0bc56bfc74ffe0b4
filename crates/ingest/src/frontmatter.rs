use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const MARKER: &str = "---";

/// Header metadata carried between `---` markers at the top of a transcript.
/// The header body is a JSON object; unknown keys are kept in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetadata {
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_content_type() -> String {
    "interview_transcript".to_string()
}

fn default_language() -> String {
    "english".to_string()
}

fn default_domain() -> String {
    "general".to_string()
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        Self {
            content_type: default_content_type(),
            language: default_language(),
            domain: default_domain(),
            extra: Map::new(),
        }
    }
}

impl DocumentMetadata {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(|v| v.as_str())
    }
}

/// Byte offsets of the header body and of the end of the closing marker.
fn header_bounds(content: &str) -> Option<(usize, usize)> {
    if !content.starts_with(MARKER) {
        return None;
    }
    let close = content[MARKER.len()..].find(MARKER)? + MARKER.len();
    Some((close, close + MARKER.len()))
}

/// Parse the front-matter header. A missing or malformed header yields defaults.
pub fn parse_front_matter(content: &str) -> DocumentMetadata {
    let Some((close, _)) = header_bounds(content) else {
        return DocumentMetadata::default();
    };

    let header = content[MARKER.len()..close].trim();
    match serde_json::from_str::<DocumentMetadata>(header) {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring malformed front matter");
            DocumentMetadata::default()
        }
    }
}

/// Return the document body with any front-matter header removed.
pub fn strip_front_matter(content: &str) -> &str {
    match header_bounds(content) {
        Some((_, body_start)) => content[body_start..].trim(),
        None => content,
    }
}
