//! Input documents and the content records extractors produce.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Supported input kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Text,
    Email,
    Spreadsheet,
    Csv,
    Slides,
    Image,
    Chat,
    Document,
}

impl InputKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Email => "email",
            Self::Spreadsheet => "spreadsheet",
            Self::Csv => "csv",
            Self::Slides => "slides",
            Self::Image => "image",
            Self::Chat => "chat",
            Self::Document => "document",
        }
    }

    /// Best guess from a file extension; unknown extensions are `Document`.
    #[must_use]
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "txt" | "md" | "markdown" => Self::Text,
            "eml" | "msg" => Self::Email,
            "xlsx" | "xls" => Self::Spreadsheet,
            "csv" => Self::Csv,
            "pptx" | "ppt" => Self::Slides,
            "png" | "jpg" | "jpeg" | "gif" | "webp" => Self::Image,
            "json" | "slack" => Self::Chat,
            _ => Self::Document,
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub content: String,
}

/// Common output of every content extractor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub raw_text: String,
    #[serde(default)]
    pub sections: Vec<Section>,
    pub filename: Option<String>,
    /// Kind-specific extras (author, subject, sheet names, ...)
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Tabular or otherwise structured payload, when the format has one
    pub structured: Option<serde_json::Value>,
}

impl ContentRecord {
    #[must_use]
    pub fn from_text(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    #[must_use]
    pub fn with_section(mut self, title: impl Into<String>, content: impl Into<String>) -> Self {
        self.sections.push(Section {
            title: title.into(),
            content: content.into(),
        });
        self
    }

    /// A record with no text and no sections carries nothing to normalize.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw_text.trim().is_empty() && self.sections.iter().all(|s| s.content.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDocument {
    pub id: String,
    pub kind: InputKind,
    pub filename: String,
    /// Pre-extracted content; when absent the file at `source_path` is read
    pub content: Option<ContentRecord>,
    pub source_path: Option<PathBuf>,
    pub uploaded_at: DateTime<Utc>,
}

impl InputDocument {
    /// A document whose content is already extracted.
    #[must_use]
    pub fn inline(kind: InputKind, filename: impl Into<String>, content: ContentRecord) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            filename: filename.into(),
            content: Some(content),
            source_path: None,
            uploaded_at: Utc::now(),
        }
    }

    /// A document read from disk at parse time. The kind is guessed from the
    /// extension.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let kind = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(InputKind::Document, InputKind::from_extension);
        let filename = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            filename,
            content: None,
            source_path: Some(path.to_path_buf()),
            uploaded_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_extension() {
        assert_eq!(InputKind::from_extension("MD"), InputKind::Text);
        assert_eq!(InputKind::from_extension("xlsx"), InputKind::Spreadsheet);
        assert_eq!(InputKind::from_extension("pptx"), InputKind::Slides);
        assert_eq!(InputKind::from_extension("bin"), InputKind::Document);
    }

    #[test]
    fn from_path_fills_name_and_kind() {
        let doc = InputDocument::from_path("inputs/meeting-notes.txt");
        assert_eq!(doc.filename, "meeting-notes.txt");
        assert_eq!(doc.kind, InputKind::Text);
        assert!(doc.content.is_none());
    }

    #[test]
    fn empty_record_detection() {
        assert!(ContentRecord::from_text("  \n").is_empty());
        assert!(!ContentRecord::from_text("").with_section("Goals", "ship it").is_empty());
    }
}
