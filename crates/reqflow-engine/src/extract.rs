//! Content extractors: one per input kind, each turning raw bytes into a
//! [`ContentRecord`].
//!
//! Only plain text is built in. Spreadsheet, email, slide, image and chat
//! extractors register through [`ExtractorRegistry::register`].

use pulldown_cmark::{Event, Parser as MdParser, Tag, TagEnd};
use reqflow_model::{ContentRecord, InputKind, Section};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::PipelineError;

pub trait ContentExtractor: Send + Sync {
    /// Kinds this extractor handles
    fn kinds(&self) -> &[InputKind];

    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<ContentRecord, PipelineError>;
}

/// Text and markdown. Markdown headings open sections, and a section runs
/// until the next heading. Text before the first heading only appears in
/// `raw_text`. A `#` line inside a fenced code block is code, not a heading.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl ContentExtractor for PlainTextExtractor {
    fn kinds(&self) -> &[InputKind] {
        &[InputKind::Text, InputKind::Csv]
    }

    fn extract(&self, filename: &str, bytes: &[u8]) -> Result<ContentRecord, PipelineError> {
        let text = String::from_utf8_lossy(bytes).replace("\r\n", "\n");
        let sections = markdown_sections(&text);
        Ok(ContentRecord {
            raw_text: text,
            sections,
            filename: Some(filename.to_string()),
            ..ContentRecord::default()
        })
    }
}

/// Heading text becomes the title; the source between the end of one
/// heading and the start of the next becomes the content.
fn markdown_sections(text: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    // Title and byte offset where its body starts
    let mut open: Option<(String, usize)> = None;
    let mut heading: Option<String> = None;

    for (event, range) in MdParser::new(text).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { .. }) => {
                if let Some((title, start)) = open.take() {
                    sections.push(Section {
                        title,
                        content: text[start..range.start].trim().to_string(),
                    });
                }
                heading = Some(String::new());
            }
            Event::Text(fragment) | Event::Code(fragment) => {
                if let Some(title) = heading.as_mut() {
                    title.push_str(&fragment);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some(title) = heading.take() {
                    open = Some((title.trim().to_string(), range.end));
                }
            }
            _ => {}
        }
    }
    if let Some((title, start)) = open {
        sections.push(Section {
            title,
            content: text[start..].trim().to_string(),
        });
    }
    sections
}

/// Dispatches extraction by input kind.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    by_kind: HashMap<InputKind, Arc<dyn ContentExtractor>>,
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.by_kind.keys().map(InputKind::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("ExtractorRegistry").field("kinds", &kinds).finish()
    }
}

impl ExtractorRegistry {
    /// Registry with no extractors.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the built-in extractors.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(PlainTextExtractor));
        registry
    }

    /// Later registrations replace earlier ones for the same kind.
    pub fn register(&mut self, extractor: Arc<dyn ContentExtractor>) {
        for kind in extractor.kinds() {
            self.by_kind.insert(*kind, Arc::clone(&extractor));
        }
    }

    #[must_use]
    pub fn get(&self, kind: InputKind) -> Option<Arc<dyn ContentExtractor>> {
        self.by_kind.get(&kind).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_headings_become_sections() {
        let text = "Intro line\n# Goals\nShip the export.\n\n## Constraints\r\nMust run on-prem.\n";
        let record = PlainTextExtractor.extract("prd.md", text.as_bytes()).unwrap();
        assert_eq!(record.sections.len(), 2);
        assert_eq!(record.sections[0].title, "Goals");
        assert_eq!(record.sections[0].content, "Ship the export.");
        assert_eq!(record.sections[1].title, "Constraints");
        assert_eq!(record.sections[1].content, "Must run on-prem.");
        assert!(record.raw_text.starts_with("Intro line"));
        assert_eq!(record.filename.as_deref(), Some("prd.md"));
    }

    #[test]
    fn hashes_inside_code_fences_are_not_headings() {
        let text = "# Scope\nUsers export CSV.\n```bash\n# install deps\nnpm i\n```\n";
        let record = PlainTextExtractor.extract("setup.md", text.as_bytes()).unwrap();
        let titles: Vec<_> = record.sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, ["Scope"]);
        assert!(record.sections[0].content.starts_with("Users export CSV."));
        assert!(record.sections[0].content.contains("# install deps"));
    }

    #[test]
    fn setext_and_inline_code_headings() {
        let text = "Overview\n========\nAll reports.\n\n## The `export` command\nWrites CSV.";
        let record = PlainTextExtractor.extract("notes.md", text.as_bytes()).unwrap();
        assert_eq!(record.sections[0].title, "Overview");
        assert_eq!(record.sections[0].content, "All reports.");
        assert_eq!(record.sections[1].title, "The export command");
        assert_eq!(record.sections[1].content, "Writes CSV.");
    }

    #[test]
    fn text_without_headings_has_no_sections() {
        let record = PlainTextExtractor
            .extract("mail.txt", b"Please add CSV export.\n#hashtag is not a heading")
            .unwrap();
        assert!(record.sections.is_empty());
        assert!(record.raw_text.contains("#hashtag"));
    }

    #[test]
    fn registry_dispatches_by_kind() {
        let registry = ExtractorRegistry::with_defaults();
        assert!(registry.get(InputKind::Text).is_some());
        assert!(registry.get(InputKind::Csv).is_some());
        assert!(registry.get(InputKind::Image).is_none());
    }
}
