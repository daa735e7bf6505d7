//! Per-devotional metadata and navigation links.
//!
//! Pass 1 of the build derives one [`DevoMeta`] per post. The full set is
//! then sorted newest-first and neighbor links are computed over that
//! order, so every page can point at the devotionals published directly
//! before and after it. Metadata is immutable once pass 2 starts.

use crate::extract;
use crate::fetch::Post;
use crate::utils::date::DateTimeUtc;
use crate::utils::text;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// `YYYY/MM/DD` path segment inside a wordpress permalink.
static RE_LINK_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})/(\d{2})/(\d{2})").unwrap());

/// Number of cosmetic page variants shipped with the template assets.
const VARIANT_COUNT: u32 = 7;

/// Summary record for one devotional, serialized into `devocionales.json`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DevoMeta {
    /// Canonical `YYYY-MM-DD` identifier, also the output file stem.
    pub date_slug: String,

    /// Title markup with inline `style="..."` attributes removed.
    /// Structural tags like `<em>` survive.
    pub display_title: String,

    /// Bible reference of the day, e.g. `Salmo 119:71 (NTV)`.
    pub verse_ref: String,

    /// Quoted verse text with the citation stripped.
    pub verse_text: String,

    /// Display date in Spanish, e.g. `LUNES 8 DE DICIEMBRE DE 2025`.
    /// Falls back to the raw timestamp when it cannot be parsed.
    pub date_display: String,

    /// Raw wordpress publish timestamp, e.g. `2025-12-08T10:00:00`.
    pub date_iso: String,

    /// `{date_slug}.html`
    pub output_file_name: String,

    /// Two-digit cosmetic bucket `01`..`07`, a pure function of the slug.
    pub presentation_variant: String,

    /// `devo-{presentation_variant}.jpg`. A naming convention, never
    /// checked against the assets actually on disk.
    pub banner_asset: String,
}

impl DevoMeta {
    /// Derive the metadata record for one post.
    ///
    /// Infallible: every field has a defined fallback, so a malformed
    /// post still yields a usable record.
    pub fn from_post(post: &Post) -> Self {
        let date_slug = date_slug_for(post);
        let presentation_variant = presentation_variant(&date_slug);
        let banner_asset = format!("devo-{presentation_variant}.jpg");
        let output_file_name = format!("{date_slug}.html");

        Self {
            display_title: text::strip_style_attrs(&post.title.rendered),
            verse_ref: extract::bible_reference(&post.content.rendered),
            verse_text: extract::primary_verse(&post.content.rendered),
            date_display: display_date(&post.date),
            date_iso: post.date.clone(),
            date_slug,
            output_file_name,
            presentation_variant,
            banner_asset,
        }
    }
}

/// Canonical identifier for a post.
///
/// Taken from the `YYYY/MM/DD` segment of the permalink when present,
/// otherwise the post's own slug verbatim. The fallback is not validated
/// for date shape.
pub fn date_slug_for(post: &Post) -> String {
    match RE_LINK_DATE.captures(&post.link) {
        Some(caps) => format!("{}-{}-{}", &caps[1], &caps[2], &caps[3]),
        None => post.slug.clone(),
    }
}

/// Deterministic cosmetic bucket for a slug: concatenate its digits,
/// reduce modulo 7, add 1, zero-pad to two characters.
///
/// Folding the modulo through each digit keeps the accumulator small,
/// so slugs with arbitrarily many digits cannot overflow.
pub fn presentation_variant(date_slug: &str) -> String {
    let bucket = date_slug
        .bytes()
        .filter(u8::is_ascii_digit)
        .fold(0u32, |acc, d| (acc * 10 + u32::from(d - b'0')) % VARIANT_COUNT);
    format!("{:02}", bucket + 1)
}

/// Spanish display date in the site's all-caps style.
///
/// Unparseable timestamps fall back to the raw string so a bad post
/// never aborts the build.
fn display_date(raw: &str) -> String {
    match DateTimeUtc::parse(raw) {
        Some(date) => date.spanish_upper(),
        None => raw.to_string(),
    }
}

/// Slugs that appear more than once in the set.
///
/// Duplicates would silently overwrite each other's output files, so the
/// build warns about every colliding slug before rendering.
pub fn duplicate_slugs(metas: &[DevoMeta]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut dupes = Vec::new();
    for meta in metas {
        if !seen.insert(meta.date_slug.as_str()) && !dupes.contains(&meta.date_slug) {
            dupes.push(meta.date_slug.clone());
        }
    }
    dupes
}

// ============================================================================
// Navigation
// ============================================================================

/// Neighbor links for one devotional within the sorted set.
///
/// The list is sorted newest-first, so "previous" (chronologically older)
/// is the element after this one and "next" (newer) the element before it.
pub struct NavLinks<'a> {
    pub prev: Option<&'a DevoMeta>,
    pub next: Option<&'a DevoMeta>,
}

/// Compute the neighbor pair for the element at `index` of a
/// newest-first sorted slice.
pub fn nav_links(sorted: &[DevoMeta], index: usize) -> NavLinks<'_> {
    NavLinks {
        prev: sorted.get(index + 1),
        next: index.checked_sub(1).and_then(|i| sorted.get(i)),
    }
}

impl NavLinks<'_> {
    /// Render the navigation fragment injected into the page template.
    ///
    /// Sides without a neighbor are omitted. A devotional with no
    /// neighbors at all gets an empty string, not an empty `<nav>`.
    pub fn to_fragment(&self) -> String {
        if self.prev.is_none() && self.next.is_none() {
            return String::new();
        }

        let mut html = String::from("<nav class=\"devo-nav\">");
        if let Some(prev) = self.prev {
            html.push_str(&format!(
                "<a class=\"nav-prev\" href=\"{}\">&larr; {}</a>",
                prev.output_file_name, prev.date_slug
            ));
        }
        if let Some(next) = self.next {
            html.push_str(&format!(
                "<a class=\"nav-next\" href=\"{}\">{} &rarr;</a>",
                next.output_file_name, next.date_slug
            ));
        }
        html.push_str("</nav>");
        html
    }
}

// ============================================================================
// Tests
// ============================================================================
