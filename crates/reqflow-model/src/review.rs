//! Review items: units of human-reviewable uncertainty.
//!
//! An item is created during validation, resolved exactly once by a reviewer,
//! and never deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    LowConfidence,
    MissingInfo,
    Conflict,
    Ambiguous,
}

impl IssueType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LowConfidence => "LOW_CONFIDENCE",
            Self::MissingInfo => "MISSING_INFO",
            Self::Conflict => "CONFLICT",
            Self::Ambiguous => "AMBIGUOUS",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approve,
    Reject,
    Modify,
}

impl ReviewDecision {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Modify => "modify",
        }
    }
}

impl fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReviewDecision {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            "modify" => Ok(Self::Modify),
            other => Err(ReviewError::UnknownDecision(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    #[error("Review item '{item_id}' is already resolved")]
    AlreadyResolved { item_id: String },

    #[error("Review item '{item_id}' not found in job '{job_id}'")]
    ItemNotFound { job_id: String, item_id: String },

    #[error("Unknown review decision '{0}' (expected approve, reject or modify)")]
    UnknownDecision(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub id: String,
    /// Empty until the validating job back-fills it
    pub job_id: String,
    pub requirement_id: String,
    pub issue_type: IssueType,
    pub description: String,
    #[serde(default)]
    pub original_text: String,
    pub suggested_resolution: Option<String>,
    pub decision: Option<ReviewDecision>,
    pub notes: Option<String>,
    /// Field overwrites carried by a `modify` decision
    pub modified_content: Option<Map<String, Value>>,
    #[serde(default)]
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ReviewItem {
    #[must_use]
    pub fn new(
        job_id: &str,
        requirement_id: &str,
        issue_type: IssueType,
        description: impl Into<String>,
    ) -> Self {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(8);
        Self {
            id,
            job_id: job_id.to_string(),
            requirement_id: requirement_id.to_string(),
            issue_type,
            description: description.into(),
            original_text: String::new(),
            suggested_resolution: None,
            decision: None,
            notes: None,
            modified_content: None,
            resolved: false,
            resolved_at: None,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_original_text(mut self, text: impl Into<String>) -> Self {
        self.original_text = text.into();
        self
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        let suggestion = suggestion.into();
        self.suggested_resolution = (!suggestion.is_empty()).then_some(suggestion);
        self
    }

    /// Record the reviewer's decision. An item resolves exactly once.
    pub fn resolve(
        &mut self,
        decision: ReviewDecision,
        notes: Option<String>,
        modified_content: Option<Map<String, Value>>,
    ) -> Result<(), ReviewError> {
        if self.resolved {
            return Err(ReviewError::AlreadyResolved {
                item_id: self.id.clone(),
            });
        }
        self.decision = Some(decision);
        self.notes = notes;
        self.modified_content = modified_content;
        self.resolved = true;
        self.resolved_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_item_has_short_id_and_is_open() {
        let item = ReviewItem::new("job", "REQ-001", IssueType::MissingInfo, "no SLA given");
        assert_eq!(item.id.len(), 8);
        assert!(!item.resolved);
        assert!(item.resolved_at.is_none());
    }

    #[test]
    fn resolve_sets_fields_once() {
        let mut item = ReviewItem::new("job", "REQ-001", IssueType::Ambiguous, "vague");
        let mut fields = Map::new();
        fields.insert("title".into(), json!("Export to CSV"));
        item.resolve(
            ReviewDecision::Modify,
            Some("tightened title".into()),
            Some(fields.clone()),
        )
        .unwrap();

        assert!(item.resolved);
        assert!(item.resolved_at.is_some());
        assert_eq!(item.decision, Some(ReviewDecision::Modify));
        assert_eq!(item.modified_content, Some(fields));

        let err = item.resolve(ReviewDecision::Reject, None, None).unwrap_err();
        assert!(matches!(err, ReviewError::AlreadyResolved { .. }));
        assert_eq!(item.decision, Some(ReviewDecision::Modify));
    }

    #[test]
    fn decision_parses_case_insensitively() {
        assert_eq!("APPROVE".parse::<ReviewDecision>().unwrap(), ReviewDecision::Approve);
        assert_eq!(" modify ".parse::<ReviewDecision>().unwrap(), ReviewDecision::Modify);
        assert!("maybe".parse::<ReviewDecision>().is_err());
    }

    #[test]
    fn empty_suggestion_is_dropped() {
        let item = ReviewItem::new("j", "REQ-001", IssueType::Conflict, "x").with_suggestion("");
        assert!(item.suggested_resolution.is_none());
    }

    #[test]
    fn issue_type_wire_names() {
        assert_eq!(
            serde_json::to_value(IssueType::LowConfidence).unwrap(),
            json!("LOW_CONFIDENCE")
        );
        assert_eq!(serde_json::to_value(ReviewDecision::Reject).unwrap(), json!("reject"));
    }
}
