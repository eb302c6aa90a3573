//! Validation: quality scores per requirement, review routing, and conflict
//! detection.
//!
//! With the review workflow disabled every requirement is approved and no
//! review item is produced, whatever the scores say.

mod conflicts;

use once_cell::sync::Lazy;
use regex::Regex;
use reqflow_config::PipelineSettings;
use reqflow_llm::CompletionService;
use reqflow_model::{
    IssueType, Requirement, RequirementType, ReviewItem, ValidationResult,
};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::normalizer::prompts::truncate_chars;

/// Completeness a requirement needs to pass without review
pub const COMPLETENESS_THRESHOLD: f64 = 0.7;
/// Below this confidence a routed item is LOW_CONFIDENCE
pub const LOW_CONFIDENCE: f64 = 0.5;

const MISSING_INFO_ISSUES: usize = 2;
const ORIGINAL_TEXT_CHARS: usize = 500;

/// Korean vague wording. Matched as substrings: these attach to the
/// surrounding word, so there is no boundary to anchor on.
const VAGUE_SUBSTRINGS: &[&str] = &["등", "기타", "필요시", "적절한", "합리적인", "등등"];

/// English vague wording, matched as whole words.
static VAGUE_TERMS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        "etc",
        "and so on",
        "as needed",
        "if necessary",
        "appropriate",
        "reasonable",
        "various",
        "user-friendly",
    ]
    .into_iter()
    .map(|term| {
        let pattern = format!(r"(?i)\b{}\b", regex::escape(term));
        (term, Regex::new(&pattern).unwrap())
    })
    .collect()
});

#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub approved: Vec<Requirement>,
    pub review_items: Vec<ReviewItem>,
    /// One per input requirement, in input order
    pub results: Vec<ValidationResult>,
}

#[derive(Debug, Clone)]
pub struct Validator {
    completion: CompletionService,
    settings: PipelineSettings,
}

impl Validator {
    #[must_use]
    pub fn new(completion: CompletionService, settings: PipelineSettings) -> Self {
        Self {
            completion,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Score one requirement. Never calls the completion service.
    #[must_use]
    pub fn assess(&self, req: &Requirement) -> ValidationResult {
        let checks = [
            req.title.trim().chars().count() > 3,
            req.description.trim().chars().count() > 10,
            req.user_story.as_deref().is_some_and(|s| !s.trim().is_empty())
                || req.requirement_type == RequirementType::Constraint,
            !req.acceptance_criteria.is_empty(),
            // Priority always carries a value.
            true,
        ];
        let completeness = checks.iter().filter(|c| **c).count() as f64 / checks.len() as f64;

        let mut consistency_issues: Vec<String> = VAGUE_SUBSTRINGS
            .iter()
            .copied()
            .filter(|term| req.description.contains(term))
            .chain(
                VAGUE_TERMS
                    .iter()
                    .filter(|(_, re)| re.is_match(&req.description))
                    .map(|(term, _)| *term),
            )
            .map(|term| format!("Vague term '{term}' in description"))
            .collect();
        consistency_issues.extend(
            req.missing_info
                .iter()
                .take(MISSING_INFO_ISSUES)
                .map(|m| format!("Missing information: {m}")),
        );

        let mut traceability = 0.0;
        if req.source.is_some() {
            traceability += 0.5;
        }
        if req.confidence > 0.5 {
            traceability += 0.3;
        }
        if !req.confidence_rationale.trim().is_empty() {
            traceability += 0.2;
        }
        let traceability = f64::min(traceability, 1.0);

        let threshold = self.settings.auto_approve_threshold;
        let is_valid = completeness > COMPLETENESS_THRESHOLD
            && consistency_issues.is_empty()
            && req.confidence >= threshold;

        let mut review_reasons = Vec::new();
        if self.settings.review_enabled {
            if req.confidence < threshold {
                review_reasons.push(format!(
                    "Confidence {:.2} is below the auto-approve threshold {threshold:.2}",
                    req.confidence
                ));
            }
            if completeness < COMPLETENESS_THRESHOLD {
                review_reasons.push(format!("Completeness {completeness:.2} is below {COMPLETENESS_THRESHOLD:.2}"));
            }
            review_reasons.extend(consistency_issues.iter().cloned());
            if req.missing_info.len() > MISSING_INFO_ISSUES {
                review_reasons.push(format!(
                    "{} more missing-information entries",
                    req.missing_info.len() - MISSING_INFO_ISSUES
                ));
            }
        }

        ValidationResult {
            requirement_id: req.id.clone(),
            is_valid,
            completeness,
            consistency_issues,
            traceability,
            needs_review: !review_reasons.is_empty(),
            review_reasons,
        }
    }

    /// Split `requirements` into approved ones and review items for `job_id`.
    pub async fn validate(&self, requirements: &[Requirement], job_id: &str) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::default();
        let mut routed: HashSet<String> = HashSet::new();

        for req in requirements {
            let result = self.assess(req);
            if result.needs_review {
                debug!(requirement_id = %req.id, reasons = ?result.review_reasons, "Routing to review");
                outcome.review_items.push(review_item(req, &result, job_id));
                routed.insert(req.id.clone());
            }
            outcome.results.push(result);
        }

        if self.settings.review_enabled && self.settings.conflict_detection && requirements.len() >= 2 {
            for mut item in conflicts::detect_conflicts(&self.completion, requirements).await {
                item.job_id = job_id.to_string();
                routed.insert(item.requirement_id.clone());
                outcome.review_items.push(item);
            }
        }

        outcome.approved = requirements
            .iter()
            .filter(|r| !routed.contains(&r.id))
            .cloned()
            .collect();

        info!(
            job_id,
            approved = outcome.approved.len(),
            review_items = outcome.review_items.len(),
            "Validation finished"
        );
        outcome
    }
}

fn review_item(req: &Requirement, result: &ValidationResult, job_id: &str) -> ReviewItem {
    let issue_type = if req.confidence < LOW_CONFIDENCE {
        IssueType::LowConfidence
    } else if !req.missing_info.is_empty() {
        IssueType::MissingInfo
    } else {
        IssueType::Ambiguous
    };
    let description = if result.review_reasons.is_empty() {
        "Review needed".to_string()
    } else {
        result.review_reasons.join("; ")
    };
    let suggestion = match issue_type {
        IssueType::LowConfidence => "Confirm the requirement against its source material".to_string(),
        IssueType::MissingInfo => format!("Provide: {}", req.missing_info.join(", ")),
        _ => "Replace vague wording with measurable acceptance criteria".to_string(),
    };
    let original = req
        .source
        .as_ref()
        .and_then(|s| s.excerpt.as_deref())
        .unwrap_or(&req.description);

    ReviewItem::new(job_id, &req.id, issue_type, description)
        .with_original_text(truncate_chars(original, ORIGINAL_TEXT_CHARS))
        .with_suggestion(suggestion)
}
