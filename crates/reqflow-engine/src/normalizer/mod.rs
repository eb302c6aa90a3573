//! Normalization: content records to an ordered, scored requirement list.
//!
//! Per record, one extraction call yields candidates. Per candidate, a story
//! call (skipped for constraints) and a confidence call fill in the rest. Ids
//! are assigned in extraction order across the whole run. A final relations
//! call links requirements when there is more than one.
//!
//! Every call is best-effort: a failure degrades that one piece of output and
//! is counted in the [`NormalizationReport`], never aborting the batch.

mod candidate;
pub(crate) mod prompts;

use reqflow_llm::CompletionService;
use reqflow_model::{
    ContentRecord, Priority, Requirement, RequirementType, SourceReference,
};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

pub use candidate::{Assessment, Candidate, Outcome, RelationTriple, StoryDraft};
use prompts::{
    EXCERPT_CHARS, EXTRACT_SYSTEM, RELATIONS_SYSTEM, SCORE_SYSTEM, STORY_SYSTEM,
    extraction_prompt, relations_prompt, score_prompt, story_prompt, truncate_chars,
};

/// What a normalization run produced, and what it had to give up on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizationReport {
    pub requirements: Vec<Requirement>,
    /// Completion calls that failed or returned unusable output
    pub degraded_calls: usize,
    /// Records whose extraction call failed outright
    pub failed_records: usize,
    /// Candidate entries skipped as unusable
    pub dropped_candidates: usize,
    pub warnings: Vec<String>,
}

impl NormalizationReport {
    /// True when every completion call returned usable output.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.degraded_calls == 0
    }

    fn degrade(&mut self, call: &str, reason: impl fmt::Display) {
        self.degraded_calls += 1;
        self.warnings.push(format!("{call}: {reason}"));
    }
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    completion: CompletionService,
}

impl Normalizer {
    #[must_use]
    pub fn new(completion: CompletionService) -> Self {
        Self { completion }
    }

    /// Normalize `records`; `document_ids[i]` identifies `records[i]`.
    pub async fn normalize(&self, records: &[ContentRecord], document_ids: &[String]) -> Vec<Requirement> {
        self.normalize_with_report(records, document_ids).await.requirements
    }

    pub async fn normalize_with_report(
        &self,
        records: &[ContentRecord],
        document_ids: &[String],
    ) -> NormalizationReport {
        let mut report = NormalizationReport::default();
        let mut next_id = 1usize;

        for (index, record) in records.iter().enumerate() {
            let document_id = document_ids
                .get(index)
                .cloned()
                .unwrap_or_else(|| format!("doc-{index}"));
            let filename = record.filename.clone().unwrap_or_else(|| document_id.clone());

            let candidates = self.extract_candidates(record, &filename, &mut report).await;
            debug!(document_id = %document_id, candidates = candidates.len(), "Extracted candidates");

            for candidate in candidates {
                let id = Requirement::format_id(next_id);
                next_id += 1;
                let requirement = self
                    .build_requirement(id, candidate, &document_id, &filename, &mut report)
                    .await;
                report.requirements.push(requirement);
            }
        }

        if report.requirements.len() > 1 {
            self.link_relations(&mut report).await;
        }

        info!(
            requirements = report.requirements.len(),
            degraded_calls = report.degraded_calls,
            dropped_candidates = report.dropped_candidates,
            "Normalization finished"
        );
        report
    }

    async fn extract_candidates(
        &self,
        record: &ContentRecord,
        filename: &str,
        report: &mut NormalizationReport,
    ) -> Vec<Candidate> {
        match self
            .completion
            .complete_structured(EXTRACT_SYSTEM, &extraction_prompt(record, filename))
            .await
        {
            Ok(value) => {
                let (candidates, dropped) = Candidate::parse_list(&value);
                if dropped > 0 {
                    warn!(filename, dropped, "Skipped unusable candidates");
                    report.dropped_candidates += dropped;
                }
                candidates
            }
            Err(e) => {
                warn!(filename, error = %e, "Candidate extraction failed; record yields nothing");
                report.failed_records += 1;
                report.degrade(&format!("extract {filename}"), e);
                Vec::new()
            }
        }
    }

    async fn build_requirement(
        &self,
        id: String,
        candidate: Candidate,
        document_id: &str,
        filename: &str,
        report: &mut NormalizationReport,
    ) -> Requirement {
        let requirement_type = RequirementType::from_hint(&candidate.type_hint);

        let story = if requirement_type == RequirementType::Constraint {
            StoryDraft::default()
        } else {
            let outcome = match self
                .completion
                .complete_structured(STORY_SYSTEM, &story_prompt(&candidate))
                .await
            {
                Ok(value) => StoryDraft::parse(&value),
                Err(e) => Outcome::degraded(e.to_string()),
            };
            if let Outcome::Degraded { reason } = &outcome {
                debug!(requirement_id = %id, reason = %reason, "User story degraded");
                report.degrade(&format!("story {id}"), reason);
            }
            outcome.into_value()
        };

        let outcome = match self
            .completion
            .complete_structured(
                SCORE_SYSTEM,
                &score_prompt(&candidate, story.user_story.as_deref()),
            )
            .await
        {
            Ok(value) => Assessment::parse(&value),
            Err(e) => Outcome::degraded(e.to_string()),
        };
        if let Outcome::Degraded { reason } = &outcome {
            debug!(requirement_id = %id, reason = %reason, "Confidence defaulted");
            report.degrade(&format!("confidence {id}"), reason);
        }
        let assessment = outcome.into_value();

        Requirement {
            requirement_type,
            user_story: story.user_story,
            acceptance_criteria: story.acceptance_criteria,
            priority: Priority::from_hint(&candidate.priority_hint),
            confidence: assessment.score,
            confidence_rationale: assessment.rationale,
            source: Some(SourceReference {
                document_id: document_id.to_string(),
                filename: filename.to_string(),
                section: candidate.section,
                line_start: candidate.line_start,
                line_end: candidate.line_end,
                excerpt: candidate.excerpt.map(|e| truncate_chars(&e, EXCERPT_CHARS)),
            }),
            assumptions: assessment.assumptions,
            missing_info: assessment.missing_info,
            ..Requirement::new(id, requirement_type, candidate.title, candidate.description)
        }
    }

    async fn link_relations(&self, report: &mut NormalizationReport) {
        let triples = match self
            .completion
            .complete_structured(RELATIONS_SYSTEM, &relations_prompt(&report.requirements))
            .await
        {
            Ok(value) => RelationTriple::parse_list(&value),
            Err(e) => {
                warn!(error = %e, "Relation analysis failed; requirements stay unlinked");
                report.degrade("relations", e);
                return;
            }
        };

        let known: HashSet<String> = report.requirements.iter().map(|r| r.id.clone()).collect();
        let mut applied = 0usize;
        for triple in triples {
            if !known.contains(&triple.to) || triple.from == triple.to {
                continue;
            }
            if let Some(source) = report.requirements.iter_mut().find(|r| r.id == triple.from) {
                source.add_related(&triple.to);
                applied += 1;
            }
        }
        debug!(applied, "Applied relation edges");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqflow_llm::RetryPolicy;
    use reqflow_llm::scripted::{ScriptedBackend, ScriptedFailure};
    use std::sync::Arc;

    fn normalizer(backend: ScriptedBackend) -> (Normalizer, Arc<ScriptedBackend>) {
        let backend = Arc::new(backend);
        let completion = CompletionService::new(backend.clone()).with_policy(RetryPolicy::immediate(1));
        (Normalizer::new(completion), backend)
    }

    fn records(n: usize) -> (Vec<ContentRecord>, Vec<String>) {
        let records = (0..n)
            .map(|i| ContentRecord::from_text(format!("document body {i}")).with_filename(format!("doc{i}.md")))
            .collect();
        let ids = (0..n).map(|i| format!("d{i}")).collect();
        (records, ids)
    }

    const STORY: &str = r#"{"user_story": "As a user I want it", "acceptance_criteria": ["works"]}"#;

    #[tokio::test]
    async fn ids_run_across_records_in_extraction_order() {
        let (normalizer, _) = normalizer(
            ScriptedBackend::new()
                .respond_sequence(
                    "[task:extract-candidates]",
                    [
                        r#"{"requirements": [{"title": "Login", "description": "Users log in"},
                                             {"title": "Logout", "description": "Users log out"}]}"#,
                        r#"{"requirements": []}"#,
                        r#"[{"title": "Audit", "description": "Actions are audited", "type": "NFR"}]"#,
                    ],
                )
                .respond("[task:user-story]", STORY)
                .respond("[task:confidence]", r#"{"score": 0.9, "rationale": "explicit"}"#)
                .respond("[task:relations]", r#"{"relations": []}"#),
        );
        let (records, ids) = records(3);
        let reqs = normalizer.normalize(&records, &ids).await;

        let got: Vec<_> = reqs.iter().map(|r| (r.id.as_str(), r.title.as_str())).collect();
        assert_eq!(got, [("REQ-001", "Login"), ("REQ-002", "Logout"), ("REQ-003", "Audit")]);
        assert_eq!(reqs[2].requirement_type, RequirementType::NonFunctional);
        let source = reqs[2].source.as_ref().unwrap();
        assert_eq!(source.document_id, "d2");
        assert_eq!(source.filename, "doc2.md");
    }

    #[tokio::test]
    async fn failed_extraction_yields_nothing_for_that_record_only() {
        let (normalizer, _) = normalizer(
            ScriptedBackend::new()
                .fail_times("[task:extract-candidates]", ScriptedFailure::Outage, 1)
                .respond(
                    "[task:extract-candidates]",
                    r#"{"requirements": [{"title": "Export", "description": "CSV export"}]}"#,
                )
                .respond("[task:user-story]", STORY)
                .respond("[task:confidence]", r#"{"score": 0.7}"#),
        );
        let (records, ids) = records(2);
        let report = normalizer.normalize_with_report(&records, &ids).await;

        assert_eq!(report.requirements.len(), 1);
        assert_eq!(report.requirements[0].id, "REQ-001");
        assert_eq!(report.failed_records, 1);
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn confidence_is_clamped_or_defaulted() {
        let (normalizer, _) = normalizer(
            ScriptedBackend::new()
                .respond(
                    "[task:extract-candidates]",
                    r#"[{"title": "A", "description": "first"},
                        {"title": "B", "description": "second"},
                        {"title": "C", "description": "third"}]"#,
                )
                .respond("[task:user-story]", STORY)
                .respond_sequence(
                    "[task:confidence]",
                    [
                        r#"{"score": 1.4, "assumptions": ["a"]}"#,
                        "no json here",
                        r#"{"score": -2}"#,
                    ],
                )
                .respond("[task:relations]", "{}"),
        );
        let (records, ids) = records(1);
        let report = normalizer.normalize_with_report(&records, &ids).await;
        let scores: Vec<f64> = report.requirements.iter().map(|r| r.confidence).collect();

        assert_eq!(scores, [1.0, 0.5, 0.0]);
        assert!(report.requirements[1].assumptions.is_empty());
        assert_eq!(report.requirements[0].assumptions, ["a"]);
        assert_eq!(report.degraded_calls, 1);
    }

    #[tokio::test]
    async fn constraints_skip_the_story_call() {
        let (normalizer, backend) = normalizer(
            ScriptedBackend::new()
                .respond(
                    "[task:extract-candidates]",
                    r#"[{"title": "On-prem", "description": "Runs on-prem only", "type": "CONSTRAINT", "priority": "high"}]"#,
                )
                .respond("[task:confidence]", r#"{"score": 0.8}"#),
        );
        let (records, ids) = records(1);
        let reqs = normalizer.normalize(&records, &ids).await;

        assert_eq!(reqs[0].requirement_type, RequirementType::Constraint);
        assert_eq!(reqs[0].priority, Priority::High);
        assert!(reqs[0].user_story.is_none());
        assert_eq!(backend.calls_matching("[task:user-story]"), 0);
        // A single requirement needs no relation analysis.
        assert_eq!(backend.calls_matching("[task:relations]"), 0);
    }

    #[tokio::test]
    async fn relations_apply_one_direction_and_skip_unknown_ids() {
        let (normalizer, _) = normalizer(
            ScriptedBackend::new()
                .respond(
                    "[task:extract-candidates]",
                    r#"[{"title": "A", "description": "first"}, {"title": "B", "description": "second"}]"#,
                )
                .respond("[task:user-story]", STORY)
                .respond("[task:confidence]", r#"{"score": 0.9}"#)
                .respond(
                    "[task:relations]",
                    r#"{"relations": [
                        {"from": "REQ-001", "to": "REQ-002", "type": "depends_on"},
                        {"from": "REQ-001", "to": "REQ-002", "type": "related_to"},
                        {"from": "REQ-002", "to": "REQ-404", "type": "related_to"},
                        {"from": "REQ-002", "to": "REQ-002", "type": "related_to"}
                    ]}"#,
                ),
        );
        let (records, ids) = records(1);
        let reqs = normalizer.normalize(&records, &ids).await;

        assert_eq!(reqs[0].related_ids, ["REQ-002"]);
        assert!(reqs[1].related_ids.is_empty());
    }

    #[tokio::test]
    async fn missing_document_ids_fall_back_to_position() {
        let (normalizer, _) = normalizer(
            ScriptedBackend::new()
                .respond("[task:extract-candidates]", r#"[{"title": "A", "description": "first"}]"#)
                .respond("[task:user-story]", STORY)
                .respond("[task:confidence]", r#"{"score": 0.9}"#),
        );
        let reqs = normalizer
            .normalize(&[ContentRecord::from_text("body")], &[])
            .await;
        let source = reqs[0].source.as_ref().unwrap();
        assert_eq!(source.document_id, "doc-0");
        assert_eq!(source.filename, "doc-0");
    }
}
