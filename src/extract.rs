//! Heuristic field extraction from wordpress block-editor markup.
//!
//! Every field is recovered by an ordered rule chain: a prioritized slice of
//! pure `fn(&str) -> Option<String>` rules tried in sequence, first success
//! wins, with an explicit default after the chain. Adding a new layout
//! heuristic means appending a rule, not modifying existing ones.
//!
//! There is deliberately no DOM or selector engine here. The input dialect is
//! a single known one (wordpress block classes like `wp-block-cover`,
//! `wp-block-pullquote`, `is-style-text-subtitle`), and ordered pattern
//! matching over the markup is enough to tear it apart. Extraction never
//! fails: a body with none of the expected structure yields the documented
//! defaults.

use crate::utils::text::strip_html;
use regex::Regex;
use std::sync::LazyLock;

// ============================================================================
// Patterns
// ============================================================================

static RE_CITE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<cite[^>]*>(.*?)</cite>").unwrap());

/// Citation like "1 Juan 5:11-13, 20 (NTV)". Book names accept Spanish
/// accented letters; the version code is uppercase inside parentheses.
static RE_CITATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[1-3]?\s*[A-Za-záéíóúÁÉÍÓÚñÑ]+\s+\d+:\d+(?:-\d+)?(?:,\s*\d+(?:-\d+)?)*\s*\([A-Z]+\)")
        .unwrap()
});

/// Citation form to strip out of quoted verse text. Accepts an en-dash as
/// range separator and an optional trailing period before the version code,
/// both of which appear in real post content.
static RE_CITATION_STRIP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[1-3]?\s*[A-Za-záéíóúÁÉÍÓÚñÑ]+\s+\d+:\d+(?:[-\u{2013}]\d+)?\.?\s*\([A-Z]+\)")
        .unwrap()
});

static RE_BLOCKQUOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<blockquote[^>]*>(.*?)</blockquote>").unwrap());

static RE_PULLQUOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<figure[^>]*class="wp-block-pullquote"[^>]*>(.*?)</figure>"#).unwrap()
});

static RE_COVER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?is)<div[^>]*class="wp-block-cover"[^>]*>.*?</div>"#).unwrap());

static RE_POST_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<div[^>]*class="wp-block-post-date"[^>]*>.*?</div>"#).unwrap()
});

/// Trailing "related posts" region; always discarded before extraction.
static RE_QUERY_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?is)<div[^>]*class="wp-block-query"[^>]*>.*$"#).unwrap());

static RE_TREASURE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<p[^>]*is-style-text-subtitle[^>]*>.*?Tesoro Bíblico.*?</p>").unwrap()
});

static RE_GROUP_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)<div[^>]*class="wp-block-group[^"]*"[^>]*>"#).unwrap());

static RE_DIV_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)</div>").unwrap());

/// Start of the call-to-action label paragraph, used as a truncation marker.
static RE_ACTION_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<p[^>]*is-style-text-subtitle[^>]*>.*?Punto de Acción").unwrap()
});

/// Separator `<hr class="…has-alpha-channel…">` followed by a subtitle paragraph.
static RE_HR_THEN_SUBTITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<hr[^>]*class="[^"]*has-alpha-channel[^"]*"[^>]*>\s*<p[^>]*is-style-text-subtitle"#)
        .unwrap()
});

static RE_ACTION_H2: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<h2[^>]*has-background[^>]*>").unwrap());

static RE_TRAILING_HR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<hr[^>]*>\s*$").unwrap());

static RE_ANY_HR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<hr[^>]*>").unwrap());

static RE_ACTION_AFTER_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<p[^>]*is-style-text-subtitle[^>]*>.*?Punto de Acción.*?</p>(.*)$").unwrap()
});

static RE_ACTION_H2_BODY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<h2[^>]*has-background[^>]*>(.*?)</h2>(.*)$").unwrap());

static RE_ACTION_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<p[^>]*>(?:Hoy identifica|Hoy puedes|Hoy reflexiona)[^<]*</p>.*$").unwrap()
});

// ============================================================================
// Defaults
// ============================================================================

const DEFAULT_VERSE_REF: &str = "Salmo 119:71 (NTV)";
const DEFAULT_VERSE_TEXT: &str =
    "\"Me hizo bien haber sido afligido, porque así pude aprender tus estatutos\"";
const DEFAULT_CALL_TO_ACTION: &str =
    "<p>Reflexiona en este día sobre la Palabra de Dios y ponla en práctica.</p>";

// ============================================================================
// Extracted Fields
// ============================================================================

/// Structured fields recovered from one document's body markup.
///
/// Ephemeral: recomputed for every render, never cached across runs.
#[derive(Debug, Clone)]
pub struct ExtractedFields {
    /// Bible citation, e.g. "1 Juan 5:11-13 (NTV)"
    pub verse_ref: String,
    /// Quoted verse with the citation stripped out
    pub verse_text: String,
    /// Teaching-section markup fragment
    pub biblical_treasure: String,
    /// Closing call-to-action markup fragment
    pub call_to_action: String,
}

impl ExtractedFields {
    /// Run all four chains over a document body. Infallible.
    pub fn from_body(body: &str) -> Self {
        Self {
            verse_ref: bible_reference(body),
            verse_text: primary_verse(body),
            biblical_treasure: biblical_treasure(body),
            call_to_action: call_to_action(body),
        }
    }
}

/// One heuristic in an ordered chain. Returns `None` to pass to the next rule.
type Rule = fn(&str) -> Option<String>;

#[inline]
fn apply_chain(body: &str, rules: &[Rule], default: &str) -> String {
    rules
        .iter()
        .find_map(|rule| rule(body))
        .unwrap_or_else(|| default.to_string())
}

// ============================================================================
// Bible Reference
// ============================================================================

const BIBLE_REF_RULES: &[Rule] = &[ref_from_cite, ref_from_citation_pattern];

/// Extract the bible citation for a document.
pub fn bible_reference(body: &str) -> String {
    apply_chain(body, BIBLE_REF_RULES, DEFAULT_VERSE_REF)
}

fn ref_from_cite(body: &str) -> Option<String> {
    RE_CITE
        .captures(body)
        .map(|cap| strip_html(cap.get(1).map_or("", |m| m.as_str())))
}

fn ref_from_citation_pattern(body: &str) -> Option<String> {
    RE_CITATION.find(body).map(|m| m.as_str().trim().to_string())
}

// ============================================================================
// Primary Verse
// ============================================================================

const VERSE_RULES: &[Rule] = &[verse_from_blockquote, verse_from_pullquote];

/// Extract the quoted verse text for a document.
pub fn primary_verse(body: &str) -> String {
    apply_chain(body, VERSE_RULES, DEFAULT_VERSE_TEXT)
}

fn verse_from_blockquote(body: &str) -> Option<String> {
    RE_BLOCKQUOTE
        .captures(body)
        .map(|cap| strip_citation(&strip_html(cap.get(1).map_or("", |m| m.as_str()))))
}

fn verse_from_pullquote(body: &str) -> Option<String> {
    RE_PULLQUOTE
        .captures(body)
        .map(|cap| strip_citation(&strip_html(cap.get(1).map_or("", |m| m.as_str()))))
}

/// Remove embedded citations from verse text. Idempotent.
fn strip_citation(text: &str) -> String {
    RE_CITATION_STRIP.replace_all(text, "").trim().to_string()
}

// ============================================================================
// Biblical Treasure
// ============================================================================

const TREASURE_RULES: &[Rule] = &[
    treasure_until_action_label,
    treasure_until_hr_subtitle,
    treasure_until_h2,
];

/// Extract the teaching-section markup for a document.
///
/// The body is first reduced (cover, post-date and pullquote blocks removed,
/// the trailing query region cut, group wrappers unwrapped), then truncated
/// at the first call-to-action marker found. The final fallback keeps the
/// reduced content minus `<hr>` elements, so this never fails.
pub fn biblical_treasure(body: &str) -> String {
    let cleaned = reduce_body(body);

    TREASURE_RULES
        .iter()
        .find_map(|rule| rule(&cleaned))
        .unwrap_or_else(|| RE_ANY_HR.replace_all(&cleaned, "").trim().to_string())
}

/// Strip the blocks that never belong to the teaching section.
fn reduce_body(body: &str) -> String {
    let content = RE_COVER.replace(body, "");
    let content = RE_POST_DATE.replace(&content, "");
    let content = RE_PULLQUOTE.replace(&content, "");
    let content = RE_QUERY_BLOCK.replace(&content, "");
    let content = RE_TREASURE_LABEL.replace(&content, "");

    // Unwrap group wrappers rather than removing them with their content.
    let content = RE_GROUP_OPEN.replace_all(&content, "");
    RE_DIV_CLOSE.replace_all(&content, "").into_owned()
}

fn treasure_until_action_label(cleaned: &str) -> Option<String> {
    RE_ACTION_LABEL.find(cleaned).map(|m| {
        let before = cleaned[..m.start()].trim();
        RE_TRAILING_HR.replace(before, "").trim().to_string()
    })
}

fn treasure_until_hr_subtitle(cleaned: &str) -> Option<String> {
    RE_HR_THEN_SUBTITLE
        .find(cleaned)
        .map(|m| cleaned[..m.start()].trim().to_string())
}

fn treasure_until_h2(cleaned: &str) -> Option<String> {
    RE_ACTION_H2
        .find(cleaned)
        .map(|m| cleaned[..m.start()].trim().to_string())
}

// ============================================================================
// Call To Action
// ============================================================================

const ACTION_RULES: &[Rule] = &[
    action_after_label,
    action_from_h2,
    action_from_phrase,
];

/// Extract the closing call-to-action markup for a document.
pub fn call_to_action(body: &str) -> String {
    let content = RE_QUERY_BLOCK.replace(body, "");

    apply_chain(&content, ACTION_RULES, DEFAULT_CALL_TO_ACTION)
}

fn action_after_label(content: &str) -> Option<String> {
    RE_ACTION_AFTER_LABEL
        .captures(content)
        .map(|cap| cap.get(1).map_or("", |m| m.as_str()).trim().to_string())
}

fn action_from_h2(content: &str) -> Option<String> {
    RE_ACTION_H2_BODY.captures(content).map(|cap| {
        let heading = strip_html(cap.get(1).map_or("", |m| m.as_str()));
        let rest = cap.get(2).map_or("", |m| m.as_str()).trim();
        format!("<p><strong>{heading}</strong></p>{rest}")
    })
}

/// Known lead-in phrases mark the start of the action section; the matched
/// paragraph itself is part of the result.
fn action_from_phrase(content: &str) -> Option<String> {
    RE_ACTION_PHRASE
        .find(content)
        .map(|m| m.as_str().trim().to_string())
}

// ============================================================================
// Tests
// ============================================================================
