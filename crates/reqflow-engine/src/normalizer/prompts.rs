//! Prompt text for the normalization calls.
//!
//! Each system prompt opens with a `[task:...]` tag so a single completion
//! log can be split by call kind.

use reqflow_model::{ContentRecord, Requirement};

use super::candidate::Candidate;

/// Raw text sent for candidate extraction
pub(crate) const CONTENT_CHARS: usize = 4000;
/// Sections sent for candidate extraction
pub(crate) const MAX_SECTIONS: usize = 8;
pub(crate) const SECTION_CHARS: usize = 300;
pub(crate) const EXCERPT_CHARS: usize = 200;
pub(crate) const TITLE_CHARS: usize = 50;
/// Description prefix shown when listing requirements for relation or
/// conflict analysis
pub(crate) const SUMMARY_DESCRIPTION_CHARS: usize = 100;

pub(crate) const EXTRACT_SYSTEM: &str = "[task:extract-candidates] You are a requirements analyst. \
Extract every distinct requirement from the document. Respond with JSON only: \
{\"requirements\": [{\"title\": \"short title\", \"description\": \"what the system must do\", \
\"excerpt\": \"verbatim source text\", \"type\": \"FR|NFR|CONSTRAINT\", \
\"priority\": \"HIGH|MEDIUM|LOW\", \"section\": \"section name\", \"line\": \"12-18\", \
\"context\": \"surrounding context\"}]}. Return {\"requirements\": []} when there are none.";

pub(crate) const STORY_SYSTEM: &str = "[task:user-story] You turn a requirement into a user story \
with testable acceptance criteria. Respond with JSON only: \
{\"user_story\": \"As a <role>, I want <goal> so that <benefit>\", \
\"acceptance_criteria\": [\"Given/When/Then statement\"]}.";

pub(crate) const SCORE_SYSTEM: &str = "[task:confidence] You judge how well a requirement is \
supported by its source. Respond with JSON only: {\"score\": 0.0-1.0, \"rationale\": \"why\", \
\"assumptions\": [\"assumption made\"], \"missing_info\": [\"information that is missing\"]}.";

pub(crate) const RELATIONS_SYSTEM: &str = "[task:relations] You find dependencies between \
requirements. Respond with JSON only: {\"relations\": [{\"from\": \"REQ-001\", \"to\": \"REQ-002\", \
\"type\": \"depends_on|related_to|conflicts_with\"}]}. Return {\"relations\": []} when none exist.";

/// First `max` characters of `text`.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

pub(crate) fn extraction_prompt(record: &ContentRecord, filename: &str) -> String {
    let mut prompt = format!(
        "Document: {filename}\n\nContent:\n{}\n",
        truncate_chars(&record.raw_text, CONTENT_CHARS)
    );
    if !record.sections.is_empty() {
        prompt.push_str("\nSections:\n");
        for section in record.sections.iter().take(MAX_SECTIONS) {
            prompt.push_str(&format!(
                "[{}] {}\n",
                section.title,
                truncate_chars(&section.content, SECTION_CHARS)
            ));
        }
    }
    prompt
}

pub(crate) fn story_prompt(candidate: &Candidate) -> String {
    format!(
        "Requirement: {}\nDescription: {}\nContext: {}",
        candidate.title,
        candidate.description,
        candidate.context.as_deref().unwrap_or("-")
    )
}

pub(crate) fn score_prompt(candidate: &Candidate, user_story: Option<&str>) -> String {
    format!(
        "Requirement: {}\nDescription: {}\nSource excerpt: {}\nUser story: {}",
        candidate.title,
        candidate.description,
        candidate.excerpt.as_deref().unwrap_or("-"),
        user_story.unwrap_or("-")
    )
}

/// One line per requirement: `REQ-001: title - description prefix`.
pub(crate) fn requirement_listing<'a>(requirements: impl IntoIterator<Item = &'a Requirement>) -> String {
    requirements
        .into_iter()
        .map(|r| {
            format!(
                "{}: {} - {}",
                r.id,
                r.title,
                truncate_chars(&r.description, SUMMARY_DESCRIPTION_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn relations_prompt(requirements: &[Requirement]) -> String {
    format!("Requirements:\n{}", requirement_listing(requirements))
}
