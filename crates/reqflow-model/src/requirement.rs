//! Requirements and their validation results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Confidence used when a score is missing or malformed
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequirementType {
    Functional,
    NonFunctional,
    Constraint,
}

impl RequirementType {
    /// Classify a free-form type hint such as `"NFR"` or `"constraint"`.
    #[must_use]
    pub fn from_hint(hint: &str) -> Self {
        let hint = hint.to_uppercase();
        if hint.contains("NFR") || hint.contains("NON") {
            Self::NonFunctional
        } else if hint.contains("CONSTRAINT") {
            Self::Constraint
        } else {
            Self::Functional
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Functional => "FUNCTIONAL",
            Self::NonFunctional => "NON_FUNCTIONAL",
            Self::Constraint => "CONSTRAINT",
        }
    }
}

impl fmt::Display for RequirementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    #[must_use]
    pub fn from_hint(hint: &str) -> Self {
        let hint = hint.to_uppercase();
        if hint.contains("HIGH") {
            Self::High
        } else if hint.contains("LOW") {
            Self::Low
        } else {
            Self::Medium
        }
    }
}

/// Where a requirement came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReference {
    pub document_id: String,
    pub filename: String,
    pub section: Option<String>,
    pub line_start: Option<u32>,
    pub line_end: Option<u32>,
    pub excerpt: Option<String>,
}

impl fmt::Display for SourceReference {
    /// `notes.md [Export] (L12-18)`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.filename)?;
        if let Some(section) = self.section.as_deref().filter(|s| !s.is_empty()) {
            write!(f, " [{section}]")?;
        }
        match (self.line_start, self.line_end) {
            (Some(start), Some(end)) if end != start => write!(f, " (L{start}-{end})"),
            (Some(start), _) => write!(f, " (L{start})"),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    /// `REQ-NNN`, dense across one normalization run
    pub id: String,
    #[serde(rename = "type")]
    pub requirement_type: RequirementType,
    pub title: String,
    pub description: String,
    pub user_story: Option<String>,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
    /// Always within [0, 1]
    pub confidence: f64,
    #[serde(default)]
    pub confidence_rationale: String,
    pub source: Option<SourceReference>,
    #[serde(default)]
    pub assumptions: Vec<String>,
    #[serde(default)]
    pub missing_info: Vec<String>,
    /// Outgoing relation edges; not symmetrized
    #[serde(default)]
    pub related_ids: Vec<String>,
}

impl Requirement {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        requirement_type: RequirementType,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            requirement_type,
            title: title.into(),
            description: description.into(),
            user_story: None,
            acceptance_criteria: Vec::new(),
            priority: Priority::Medium,
            confidence: DEFAULT_CONFIDENCE,
            confidence_rationale: String::new(),
            source: None,
            assumptions: Vec::new(),
            missing_info: Vec::new(),
            related_ids: Vec::new(),
        }
    }

    /// `REQ-001`, `REQ-002`, ...
    #[must_use]
    pub fn format_id(n: usize) -> String {
        format!("REQ-{n:03}")
    }

    /// Clamp into [0, 1]; NaN becomes the default.
    #[must_use]
    pub fn clamp_confidence(score: f64) -> f64 {
        if score.is_nan() {
            DEFAULT_CONFIDENCE
        } else {
            score.clamp(0.0, 1.0)
        }
    }

    /// Append a relation edge unless it is already present or points at self.
    pub fn add_related(&mut self, id: &str) {
        if id != self.id && !self.related_ids.iter().any(|r| r == id) {
            self.related_ids.push(id.to_string());
        }
    }

    /// Overwrite named fields from a reviewer's `modify` payload.
    ///
    /// Each key is applied on its own: unknown keys, `id`, and values of the
    /// wrong shape are skipped and returned so the caller can report them.
    pub fn apply_modifications(&mut self, fields: &Map<String, Value>) -> Vec<String> {
        let mut rejected = Vec::new();
        for (key, value) in fields {
            if key == "id" {
                rejected.push(key.clone());
                continue;
            }
            let Ok(Value::Object(mut current)) = serde_json::to_value(&*self) else {
                rejected.push(key.clone());
                continue;
            };
            if !current.contains_key(key) {
                rejected.push(key.clone());
                continue;
            }
            current.insert(key.clone(), value.clone());
            match serde_json::from_value::<Self>(Value::Object(current)) {
                Ok(mut updated) => {
                    updated.confidence = Self::clamp_confidence(updated.confidence);
                    *self = updated;
                }
                Err(_) => rejected.push(key.clone()),
            }
        }
        rejected
    }
}

/// Per-requirement quality assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub requirement_id: String,
    pub is_valid: bool,
    pub completeness: f64,
    pub consistency_issues: Vec<String>,
    pub traceability: f64,
    pub needs_review: bool,
    pub review_reasons: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn req() -> Requirement {
        Requirement::new(
            "REQ-001",
            RequirementType::Functional,
            "Export",
            "Users can export reports",
        )
    }

    #[test]
    fn type_hints() {
        assert_eq!(RequirementType::from_hint("NFR"), RequirementType::NonFunctional);
        assert_eq!(RequirementType::from_hint("non-functional"), RequirementType::NonFunctional);
        assert_eq!(RequirementType::from_hint("Constraint"), RequirementType::Constraint);
        assert_eq!(RequirementType::from_hint("FR"), RequirementType::Functional);
        assert_eq!(RequirementType::from_hint(""), RequirementType::Functional);
    }

    #[test]
    fn priority_hints() {
        assert_eq!(Priority::from_hint("high"), Priority::High);
        assert_eq!(Priority::from_hint("LOW"), Priority::Low);
        assert_eq!(Priority::from_hint("urgent"), Priority::Medium);
    }

    #[test]
    fn ids_are_zero_padded() {
        assert_eq!(Requirement::format_id(1), "REQ-001");
        assert_eq!(Requirement::format_id(42), "REQ-042");
        assert_eq!(Requirement::format_id(1234), "REQ-1234");
    }

    #[test]
    fn add_related_dedups_and_skips_self() {
        let mut r = req();
        r.add_related("REQ-002");
        r.add_related("REQ-002");
        r.add_related("REQ-001");
        assert_eq!(r.related_ids, ["REQ-002"]);
    }

    #[test]
    fn modifications_overwrite_known_fields() {
        let mut r = req();
        let fields = json!({
            "title": "Export to CSV",
            "priority": "HIGH",
            "acceptance_criteria": ["CSV has a header row"],
            "user_story": "As an analyst I want CSV exports",
        });
        let rejected = r.apply_modifications(fields.as_object().unwrap());
        assert!(rejected.is_empty());
        assert_eq!(r.title, "Export to CSV");
        assert_eq!(r.priority, Priority::High);
        assert_eq!(r.acceptance_criteria.len(), 1);
        assert!(r.user_story.is_some());
    }

    #[test]
    fn modifications_never_touch_id_or_unknown_keys() {
        let mut r = req();
        let fields = json!({"id": "REQ-999", "colour": "blue", "priority": 7, "title": "T2"});
        let mut rejected = r.apply_modifications(fields.as_object().unwrap());
        rejected.sort();
        assert_eq!(rejected, ["colour", "id", "priority"]);
        assert_eq!(r.id, "REQ-001");
        assert_eq!(r.title, "T2");
    }

    #[test]
    fn modified_confidence_is_clamped() {
        let mut r = req();
        r.apply_modifications(json!({"confidence": 3.5}).as_object().unwrap());
        assert!((r.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn source_reference_display() {
        let mut source = SourceReference {
            document_id: "d1".into(),
            filename: "notes.md".into(),
            section: Some("Export".into()),
            line_start: Some(12),
            line_end: Some(18),
            excerpt: None,
        };
        assert_eq!(source.to_string(), "notes.md [Export] (L12-18)");
        source.line_end = Some(12);
        assert_eq!(source.to_string(), "notes.md [Export] (L12)");
        source.section = None;
        source.line_start = None;
        assert_eq!(source.to_string(), "notes.md");
    }

    proptest! {
        #[test]
        fn clamp_stays_in_unit_interval(score in proptest::num::f64::ANY) {
            let clamped = Requirement::clamp_confidence(score);
            prop_assert!((0.0..=1.0).contains(&clamped));
        }
    }
}
