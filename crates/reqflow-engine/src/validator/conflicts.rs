//! Cross-requirement conflict detection.
//!
//! One completion call over the first [`MAX_ANALYZED`] requirements. The call
//! is job-agnostic: items come back with an empty job id and the validator
//! fills it in.

use reqflow_llm::CompletionService;
use reqflow_model::{IssueType, Requirement, ReviewItem};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::normalizer::prompts::requirement_listing;

pub(crate) const MAX_ANALYZED: usize = 20;

pub(crate) const CONFLICTS_SYSTEM: &str = "[task:conflicts] You find requirements that \
contradict each other. Respond with JSON only: {\"conflicts\": [{\"req1\": \"REQ-001\", \
\"req2\": \"REQ-004\", \"type\": \"contradiction|overlap|dependency\", \
\"description\": \"what conflicts\"}]}. Return {\"conflicts\": []} when there are none.";

#[derive(Debug, Clone, PartialEq, Eq)]
struct ConflictTriple {
    req1: String,
    req2: String,
    kind: String,
    description: String,
}

impl ConflictTriple {
    fn parse_list(value: &Value) -> Vec<Self> {
        let items = match value {
            Value::Array(items) => items.as_slice(),
            Value::Object(obj) => obj
                .get("conflicts")
                .and_then(Value::as_array)
                .map_or(&[][..], Vec::as_slice),
            _ => &[],
        };
        items
            .iter()
            .filter_map(|entry| {
                let obj = entry.as_object()?;
                let text = |keys: &[&str]| {
                    keys.iter()
                        .find_map(|k| obj.get(*k).and_then(Value::as_str))
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                };
                Some(Self {
                    req1: text(&["req1", "req1_id"])?,
                    req2: text(&["req2", "req2_id"])?,
                    kind: text(&["type", "conflict_type"]).unwrap_or_else(|| "conflict".to_string()),
                    description: text(&["description"]).unwrap_or_default(),
                })
            })
            .collect()
    }
}

/// One CONFLICT item per reported pair whose ids are both known. Best-effort:
/// a failed call yields no items.
pub(crate) async fn detect_conflicts(
    completion: &CompletionService,
    requirements: &[Requirement],
) -> Vec<ReviewItem> {
    let analyzed = &requirements[..requirements.len().min(MAX_ANALYZED)];
    let prompt = format!("Requirements:\n{}", requirement_listing(analyzed));

    let triples = match completion.complete_structured(CONFLICTS_SYSTEM, &prompt).await {
        Ok(value) => ConflictTriple::parse_list(&value),
        Err(e) => {
            warn!(error = %e, "Conflict detection failed; continuing without it");
            return Vec::new();
        }
    };

    let known: HashSet<&str> = analyzed.iter().map(|r| r.id.as_str()).collect();
    let items: Vec<ReviewItem> = triples
        .into_iter()
        .filter(|t| t.req1 != t.req2 && known.contains(t.req1.as_str()) && known.contains(t.req2.as_str()))
        .map(|t| {
            let mut description = format!("Conflicts with {} ({})", t.req2, t.kind);
            if !t.description.is_empty() {
                description.push_str(": ");
                description.push_str(&t.description);
            }
            ReviewItem::new("", &t.req1, IssueType::Conflict, description)
                .with_suggestion(format!("Reconcile {} and {}, or reject one of them", t.req1, t.req2))
        })
        .collect();
    debug!(conflicts = items.len(), "Conflict detection finished");
    items
}
