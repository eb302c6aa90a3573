//! Recovery of JSON values from model output.
//!
//! Models wrap JSON in markdown fences or surround it with prose. Recovery
//! order:
//! 1. strip one surrounding code fence (with optional language tag)
//! 2. parse what remains directly
//! 3. scan for each `{` or `[` in turn, take its balanced span and parse it
//!
//! Only when no span parses is [`LlmError::MalformedOutput`] returned.

use serde_json::Value;

use crate::LlmError;

const PREVIEW_CHARS: usize = 120;

/// Extract the first JSON object or array from `text`.
pub fn extract_json(text: &str) -> Result<Value, LlmError> {
    let body = strip_fences(text);

    if let Ok(value) = serde_json::from_str::<Value>(body)
        && (value.is_object() || value.is_array())
    {
        return Ok(value);
    }

    let mut offset = 0;
    while let Some(rel) = body[offset..].find(['{', '[']) {
        let start = offset + rel;
        if let Some(span) = balanced_span(&body[start..])
            && let Ok(value) = serde_json::from_str::<Value>(span)
        {
            return Ok(value);
        }
        offset = start + 1;
    }

    Err(LlmError::MalformedOutput {
        preview: preview(text),
    })
}

/// Remove one surrounding ``` fence. Text without a leading fence is returned trimmed.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end()
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

/// The shortest prefix of `text` (which starts with `{` or `[`) whose brackets
/// balance, honouring string literals and escapes. `None` if it never closes
/// or the nesting is mismatched.
fn balanced_span(text: &str) -> Option<&str> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(c) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn preview(text: &str) -> String {
    let trimmed = text.trim();
    let mut out: String = trimmed.chars().take(PREVIEW_CHARS).collect();
    if trimmed.chars().count() > PREVIEW_CHARS {
        out.push_str("...");
    }
    out
}
