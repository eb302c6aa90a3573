//! Applying resolved review decisions to a freshly normalized list.

use reqflow_model::{Requirement, ReviewDecision, ReviewItem};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Apply the decisions in `items` to `requirements`.
///
/// A requirement with any `reject` is dropped. Otherwise every `modify` on it
/// is applied in item order. Items pointing at a requirement that no longer
/// exists are logged and skipped.
pub(crate) fn apply_review_decisions(
    mut requirements: Vec<Requirement>,
    items: &[ReviewItem],
) -> Vec<Requirement> {
    let resolved = items.iter().filter(|i| i.resolved);

    let mut rejected: HashSet<&str> = HashSet::new();
    for item in resolved.clone() {
        if !requirements.iter().any(|r| r.id == item.requirement_id) {
            warn!(
                item_id = %item.id,
                requirement_id = %item.requirement_id,
                "Review item refers to a requirement missing after re-normalization"
            );
            continue;
        }
        if item.decision == Some(ReviewDecision::Reject) {
            rejected.insert(item.requirement_id.as_str());
        }
    }

    for item in resolved {
        if item.decision != Some(ReviewDecision::Modify) || rejected.contains(item.requirement_id.as_str()) {
            continue;
        }
        let Some(fields) = &item.modified_content else {
            continue;
        };
        if let Some(req) = requirements.iter_mut().find(|r| r.id == item.requirement_id) {
            let skipped = req.apply_modifications(fields);
            if !skipped.is_empty() {
                warn!(item_id = %item.id, requirement_id = %req.id, ?skipped, "Ignored modification fields");
            }
            debug!(item_id = %item.id, requirement_id = %req.id, "Applied modification");
        }
    }

    requirements.retain(|r| !rejected.contains(r.id.as_str()));
    requirements
}
