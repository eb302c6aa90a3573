//! Scrubbing of credentials from text that ends up in logs or persisted job state.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Pattern to match URLs with embedded credentials (user:pass@host)
static URL_WITH_CREDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(https?://)[^:@\s]+:[^@\s]+@").unwrap());

/// Provider key prefixes, kept even when shorter than a generic token
static PROVIDER_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"sk-(?:ant-)?[A-Za-z0-9_-]{8,}").unwrap());

/// Sequences of 32+ key-like characters
static POTENTIAL_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(^|[^A-Za-z0-9_-])([A-Za-z0-9_-]{32,})([^A-Za-z0-9_-]|$)").unwrap()
});

/// Hyphenated UUIDs (job and document ids)
static UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .unwrap()
});

/// Remove credentials from free text.
///
/// - URLs with embedded credentials keep their scheme and host
/// - provider keys (`sk-...`) are replaced wholesale
/// - any other 32+ character token is treated as a key, except a
///   hyphenated UUID, which is an id
#[must_use]
pub fn redact_secrets(message: &str) -> String {
    let redacted = URL_WITH_CREDS.replace_all(message, "$1[REDACTED]@");
    let redacted = PROVIDER_KEY.replace_all(&redacted, "[REDACTED_KEY]");
    let redacted = POTENTIAL_KEY.replace_all(&redacted, |caps: &Captures<'_>| {
        if UUID.is_match(&caps[2]) {
            caps[0].to_string()
        } else {
            format!("{}[REDACTED_KEY]{}", &caps[1], &caps[3])
        }
    });
    redacted.into_owned()
}
