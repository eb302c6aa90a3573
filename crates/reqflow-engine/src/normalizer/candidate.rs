//! Typed views over loosely-shaped completion output.
//!
//! Every completion response goes through exactly one parse step here. Keys
//! may be missing or aliased; anything that cannot be used yields either a
//! skipped entry (candidates, relations) or an explicit [`Outcome::Degraded`]
//! (stories, scores) whose value is the type's default.

use reqflow_model::RelationType;
use reqflow_model::requirement::DEFAULT_CONFIDENCE;
use serde_json::{Map, Value};

use super::prompts::{TITLE_CHARS, truncate_chars};

/// Result of parsing one best-effort response
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Complete(T),
    Degraded { reason: String },
}

impl<T: Default> Outcome<T> {
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self::Degraded {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// The parsed value, or the default for a degraded outcome.
    pub fn into_value(self) -> T {
        match self {
            Self::Complete(value) => value,
            Self::Degraded { .. } => T::default(),
        }
    }
}

fn str_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

fn string_list(obj: &Map<String, Value>, key: &str) -> Vec<String> {
    match obj.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

/// The array under one of `keys`, or `value` itself when it is an array.
fn entries<'a>(value: &'a Value, keys: &[&str]) -> &'a [Value] {
    match value {
        Value::Array(items) => items,
        Value::Object(obj) => keys
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_array))
            .map_or(&[], Vec::as_slice),
        _ => &[],
    }
}

/// `12`, `"12"`, `"12-18"`, `"L12-L18"`
fn parse_lines(value: Option<&Value>) -> (Option<u32>, Option<u32>) {
    let parse = |s: &str| s.trim().trim_start_matches(['L', 'l']).trim().parse::<u32>().ok();
    match value {
        Some(Value::Number(n)) => {
            let line = n.as_u64().and_then(|v| u32::try_from(v).ok());
            (line, line)
        }
        Some(Value::String(s)) => match s.split_once('-') {
            Some((start, end)) => (parse(start), parse(end)),
            None => {
                let line = parse(s);
                (line, line)
            }
        },
        _ => (None, None),
    }
}

/// One requirement candidate from the extraction call
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Candidate {
    pub title: String,
    pub description: String,
    pub excerpt: Option<String>,
    pub type_hint: String,
    pub priority_hint: String,
    pub section: Option<String>,
    pub line_start: Option<u32>,
    pub line_end: Option<u32>,
    pub context: Option<String>,
}

impl Candidate {
    /// Parse the extraction response. Returns the usable candidates and the
    /// number of entries that had to be skipped.
    pub fn parse_list(value: &Value) -> (Vec<Self>, usize) {
        let items = entries(value, &["requirements", "candidates"]);
        let candidates: Vec<Self> = items.iter().filter_map(Self::from_entry).collect();
        let skipped = items.len() - candidates.len();
        (candidates, skipped)
    }

    fn from_entry(entry: &Value) -> Option<Self> {
        let obj = entry.as_object()?;
        let title = str_field(obj, &["title", "name"]);
        let description = str_field(obj, &["description", "desc"]);
        let (title, description) = match (title, description) {
            (None, None) => return None,
            (Some(t), None) => (t.clone(), t),
            (None, Some(d)) => (d.clone(), d),
            (Some(t), Some(d)) => (t, d),
        };
        let (line_start, line_end) =
            parse_lines(["line", "lines", "line_hint"].iter().find_map(|k| obj.get(*k)));

        Some(Self {
            title: truncate_chars(&title, TITLE_CHARS),
            description,
            excerpt: str_field(obj, &["excerpt", "original_text"]),
            type_hint: str_field(obj, &["type", "type_hint"]).unwrap_or_default(),
            priority_hint: str_field(obj, &["priority", "priority_hint"]).unwrap_or_default(),
            section: str_field(obj, &["section", "section_name"]),
            line_start,
            line_end,
            context: str_field(obj, &["context"]),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StoryDraft {
    pub user_story: Option<String>,
    pub acceptance_criteria: Vec<String>,
}

impl StoryDraft {
    pub fn parse(value: &Value) -> Outcome<Self> {
        let Some(obj) = value.as_object() else {
            return Outcome::degraded("story response is not an object");
        };
        let draft = Self {
            user_story: str_field(obj, &["user_story", "story"]),
            acceptance_criteria: string_list(obj, "acceptance_criteria"),
        };
        if draft.user_story.is_none() && draft.acceptance_criteria.is_empty() {
            return Outcome::degraded("story response has neither story nor criteria");
        }
        Outcome::Complete(draft)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    /// Within [0, 1]
    pub score: f64,
    pub rationale: String,
    pub assumptions: Vec<String>,
    pub missing_info: Vec<String>,
}

impl Default for Assessment {
    fn default() -> Self {
        Self {
            score: DEFAULT_CONFIDENCE,
            rationale: String::new(),
            assumptions: Vec::new(),
            missing_info: Vec::new(),
        }
    }
}

impl Assessment {
    /// A missing or non-numeric score degrades the whole assessment.
    pub fn parse(value: &Value) -> Outcome<Self> {
        let Some(obj) = value.as_object() else {
            return Outcome::degraded("score response is not an object");
        };
        let score = ["score", "confidence_score", "confidence"]
            .iter()
            .filter_map(|k| obj.get(*k))
            .find_map(|v| match v {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            });
        let Some(score) = score else {
            return Outcome::degraded("score missing or not numeric");
        };
        Outcome::Complete(Self {
            score: reqflow_model::Requirement::clamp_confidence(score),
            rationale: str_field(obj, &["rationale", "reason", "confidence_reason"])
                .unwrap_or_default(),
            assumptions: string_list(obj, "assumptions"),
            missing_info: string_list(obj, "missing_info"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationTriple {
    pub from: String,
    pub to: String,
    pub relation: RelationType,
}

impl RelationTriple {
    /// Entries with a missing endpoint or an unknown type are dropped.
    pub fn parse_list(value: &Value) -> Vec<Self> {
        entries(value, &["relations"])
            .iter()
            .filter_map(|entry| {
                let obj = entry.as_object()?;
                Some(Self {
                    from: str_field(obj, &["from"])?,
                    to: str_field(obj, &["to"])?,
                    relation: RelationType::parse(&str_field(obj, &["type", "relation"])?)?,
                })
            })
            .collect()
    }
}
