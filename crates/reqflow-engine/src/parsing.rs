//! Parsing stage: input documents to content records.
//!
//! A document with inline content is used as-is. Otherwise its file is read
//! and handed to the extractor registered for its kind; the result is cached
//! by `(kind, bytes)`. One document failing never stops the others.

use reqflow_model::{ContentRecord, InputDocument};
use reqflow_utils::IdempotencyCache;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::extract::ExtractorRegistry;

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    pub document_id: String,
    pub filename: String,
    pub record: ContentRecord,
}

#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub parsed: Vec<ParsedDocument>,
    /// `"<filename>: <reason>"` for every skipped document
    pub skipped: Vec<String>,
}

impl ParseOutcome {
    #[must_use]
    pub fn records(&self) -> Vec<ContentRecord> {
        self.parsed.iter().map(|p| p.record.clone()).collect()
    }

    #[must_use]
    pub fn document_ids(&self) -> Vec<String> {
        self.parsed.iter().map(|p| p.document_id.clone()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct DocumentParser {
    registry: ExtractorRegistry,
    cache: Option<Arc<IdempotencyCache>>,
}

impl DocumentParser {
    #[must_use]
    pub fn new(registry: ExtractorRegistry, cache: Option<Arc<IdempotencyCache>>) -> Self {
        Self { registry, cache }
    }

    /// Parse every document, skipping the ones that fail or come back empty.
    pub async fn parse(&self, documents: &[InputDocument]) -> ParseOutcome {
        let mut outcome = ParseOutcome::default();
        for doc in documents {
            match self.parse_one(doc).await {
                Ok(record) if record.is_empty() => {
                    warn!(document_id = %doc.id, filename = %doc.filename, "Document has no content");
                    outcome.skipped.push(format!("{}: empty content", doc.filename));
                }
                Ok(mut record) => {
                    if record.filename.is_none() {
                        record.filename = Some(doc.filename.clone());
                    }
                    outcome.parsed.push(ParsedDocument {
                        document_id: doc.id.clone(),
                        filename: doc.filename.clone(),
                        record,
                    });
                }
                Err(e) => {
                    warn!(document_id = %doc.id, filename = %doc.filename, error = %e, "Skipping document");
                    outcome.skipped.push(format!("{}: {e}", doc.filename));
                }
            }
        }
        outcome
    }

    async fn parse_one(&self, doc: &InputDocument) -> Result<ContentRecord, PipelineError> {
        if let Some(content) = &doc.content {
            return Ok(content.clone());
        }

        let Some(path) = &doc.source_path else {
            return Err(PipelineError::Extraction {
                document: doc.filename.clone(),
                reason: "neither inline content nor a source path".to_string(),
            });
        };

        let extractor = self.registry.get(doc.kind).ok_or_else(|| PipelineError::Extraction {
            document: doc.filename.clone(),
            reason: format!("no extractor registered for kind '{}'", doc.kind),
        })?;

        let bytes = tokio::fs::read(path).await.map_err(|e| PipelineError::Extraction {
            document: doc.filename.clone(),
            reason: format!("cannot read {}: {e}", path.display()),
        })?;

        let key = IdempotencyCache::namespaced_key(&format!("extract:{}", doc.kind), &bytes);
        if let Some(cache) = &self.cache
            && let Some(mut record) = cache.get_as::<ContentRecord>(&key)
        {
            debug!(document_id = %doc.id, "Extraction cache hit");
            // Same bytes may arrive under another name.
            record.filename = Some(doc.filename.clone());
            return Ok(record);
        }

        let record = extractor.extract(&doc.filename, &bytes)?;

        if let Some(cache) = &self.cache
            && let Err(e) = cache.set_as(&key, &record, None)
        {
            warn!(document_id = %doc.id, error = %e, "Failed to cache extraction");
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqflow_model::InputKind;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn inline_and_file_documents_both_parse() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("notes.md");
        std::fs::write(&path, "# Export\nUsers export reports as CSV.").unwrap();

        let docs = [
            InputDocument::inline(InputKind::Email, "mail.eml", ContentRecord::from_text("hello")),
            InputDocument::from_path(&path),
        ];
        let parser = DocumentParser::new(ExtractorRegistry::with_defaults(), None);
        let outcome = parser.parse(&docs).await;

        assert!(outcome.skipped.is_empty());
        assert_eq!(outcome.parsed.len(), 2);
        assert_eq!(outcome.parsed[0].record.filename.as_deref(), Some("mail.eml"));
        assert_eq!(outcome.parsed[1].record.sections[0].title, "Export");
        assert_eq!(outcome.document_ids(), [docs[0].id.clone(), docs[1].id.clone()]);
    }

    #[tokio::test]
    async fn failures_are_skipped_not_fatal() {
        let docs = [
            InputDocument::from_path("/nonexistent/input.txt"),
            InputDocument::from_path("/nonexistent/deck.pptx"),
            InputDocument::inline(InputKind::Text, "blank.txt", ContentRecord::from_text("  ")),
            InputDocument::inline(InputKind::Text, "ok.txt", ContentRecord::from_text("content")),
        ];
        let parser = DocumentParser::new(ExtractorRegistry::with_defaults(), None);
        let outcome = parser.parse(&docs).await;

        assert_eq!(outcome.parsed.len(), 1);
        assert_eq!(outcome.skipped.len(), 3);
        assert!(outcome.skipped[1].contains("no extractor"));
    }

    #[tokio::test]
    async fn extraction_is_cached_by_content() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("a.txt");
        let second = tmp.path().join("b.txt");
        std::fs::write(&first, "same bytes").unwrap();
        std::fs::write(&second, "same bytes").unwrap();

        let cache = Arc::new(IdempotencyCache::in_memory(Duration::from_secs(60), 10));
        let parser = DocumentParser::new(ExtractorRegistry::with_defaults(), Some(cache.clone()));
        parser
            .parse(&[InputDocument::from_path(&first), InputDocument::from_path(&second)])
            .await;

        let stats = cache.stats();
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.hits, 1);
    }
}
