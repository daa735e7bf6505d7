//! Markup stripping and entity decoding for wordpress content.

use regex::Regex;
use std::sync::LazyLock;

static RE_STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap());
static RE_SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap());
static RE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static RE_STYLE_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\s*style="[^"]*""#).unwrap());

/// Reduce markup to plain text: drop style/script blocks, drop all tags,
/// decode the entities wordpress emits, trim.
pub fn strip_html(html: &str) -> String {
    let text = RE_STYLE_BLOCK.replace_all(html, "");
    let text = RE_SCRIPT_BLOCK.replace_all(&text, "");
    let text = RE_TAG.replace_all(&text, "");
    decode_entities(&text).trim().to_string()
}

/// Decode the named and numeric entities the wordpress block editor produces.
///
/// This is not a general entity decoder; only the entities observed in real
/// post content are handled.
pub fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#8220;", "\"")
        .replace("&#8221;", "\"")
        .replace("&#8211;", "\u{2013}")
        .replace("&#8230;", "...")
}

/// Remove inline `style="..."` attributes while keeping the tags themselves.
///
/// Used for display titles, where structural markup (e.g. `<em>`) should
/// survive but editor-injected inline styling should not.
pub fn strip_style_attrs(html: &str) -> String {
    RE_STYLE_ATTR.replace_all(html, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html_tags() {
        assert_eq!(strip_html("<p>Hola <strong>mundo</strong></p>"), "Hola mundo");
    }

    #[test]
    fn test_strip_html_style_and_script_blocks() {
        let html = "<style>p { color: red }</style><p>texto</p><script>alert(1)</script>";
        assert_eq!(strip_html(html), "texto");
    }

    #[test]
    fn test_strip_html_multiline_blocks() {
        let html = "<style>\np { color: red }\n</style><p>uno</p>";
        assert_eq!(strip_html(html), "uno");
    }

    #[test]
    fn test_strip_html_entities() {
        assert_eq!(
            strip_html("<p>Salmo&nbsp;23 &amp; Juan &#8211; hoy</p>"),
            "Salmo 23 & Juan \u{2013} hoy"
        );
    }

    #[test]
    fn test_strip_html_typographic_quotes() {
        assert_eq!(strip_html("<p>&#8220;cita&#8221;</p>"), "\"cita\"");
    }

    #[test]
    fn test_strip_html_trims() {
        assert_eq!(strip_html("  <p> hola </p>  "), "hola");
    }

    #[test]
    fn test_strip_html_empty() {
        assert_eq!(strip_html(""), "");
    }

    #[test]
    fn test_decode_entities_ellipsis() {
        assert_eq!(decode_entities("espera&#8230;"), "espera...");
    }

    #[test]
    fn test_strip_style_attrs_keeps_tags() {
        let html = r#"<h1 style="color:red" class="title">Fe <em style="font-style:italic">viva</em></h1>"#;
        assert_eq!(
            strip_style_attrs(html),
            r#"<h1 class="title">Fe <em>viva</em></h1>"#
        );
    }

    #[test]
    fn test_strip_style_attrs_case_insensitive() {
        assert_eq!(strip_style_attrs(r#"<p STYLE="x">a</p>"#), "<p>a</p>");
    }

    #[test]
    fn test_strip_style_attrs_without_styles() {
        assert_eq!(strip_style_attrs("<p>limpio</p>"), "<p>limpio</p>");
    }
}
