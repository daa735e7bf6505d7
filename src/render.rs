//! Placeholder substitution for page templates.
//!
//! Templates are opaque text with `{{token}}` placeholders. Substitution
//! is one left-to-right pass: every occurrence of a known token is
//! replaced, unknown tokens stay verbatim and replacement values are
//! never re-scanned for further tokens.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// A `{{token}}` placeholder. Token bodies are lowercase identifiers.
static RE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([a-z_]+)\}\}").unwrap());

/// Replace every known placeholder in `template` with its mapped value.
pub fn substitute(template: &str, values: &HashMap<&str, String>) -> String {
    RE_TOKEN
        .replace_all(template, |caps: &regex::Captures| {
            match values.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Replace a single placeholder, leaving everything else untouched.
///
/// Used for the globals resolved once per run rather than per document.
pub fn substitute_one(template: &str, token: &str, value: &str) -> String {
    let mut values = HashMap::new();
    values.insert(token, value.to_string());
    substitute(template, &values)
}

// ============================================================================
// Tests
// ============================================================================
