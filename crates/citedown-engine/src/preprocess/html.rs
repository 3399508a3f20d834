//! Inline HTML normalization: image tags, evidence badges, tag stripping.

use regex::Regex;
use std::sync::OnceLock;

fn img_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<img\b[^>]*>").expect("Invalid img tag regex"))
}

fn attr_regex(name: &'static str, slot: &'static OnceLock<Regex>) -> &'static Regex {
    slot.get_or_init(|| {
        // Leading whitespace keeps e.g. `data-src` from matching as `src`.
        Regex::new(&format!(r#"(?i)\s{name}\s*=\s*["']([^"']*)["']"#))
            .expect("Invalid attribute regex")
    })
}

fn tag_attr(tag: &str, name: &'static str, slot: &'static OnceLock<Regex>) -> Option<String> {
    attr_regex(name, slot)
        .captures(tag)
        .map(|c| c[1].to_string())
}

/// Rewrite `<img ...>` tags to Markdown image syntax.
///
/// Attribute order inside the tag does not matter; only `src`, `alt` and
/// `title` are recognized. A tag without `src` is left for [`strip_tags`].
/// Missing `alt` defaults to the empty string.
pub fn rewrite_img_tags(input: &str) -> String {
    static SRC: OnceLock<Regex> = OnceLock::new();
    static ALT: OnceLock<Regex> = OnceLock::new();
    static TITLE: OnceLock<Regex> = OnceLock::new();

    img_tag_regex()
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let tag = &caps[0];
            let Some(src) = tag_attr(tag, "src", &SRC) else {
                return caps[0].to_string();
            };
            let alt = tag_attr(tag, "alt", &ALT).unwrap_or_default();
            match tag_attr(tag, "title", &TITLE) {
                Some(title) => format!("![{alt}]({src} \"{title}\")"),
                None => format!("![{alt}]({src})"),
            }
        })
        .into_owned()
}

/// Glyph for an evidence-badge color. Unrecognized colors get the neutral
/// fallback glyph.
fn badge_glyph(class: &str) -> &'static str {
    for (color, glyph) in [
        ("green", "\u{2705}"),
        ("yellow", "\u{26A0}\u{FE0F}"),
        ("red", "\u{274C}"),
        ("blue", "\u{2139}\u{FE0F}"),
    ] {
        if class.contains(color) {
            return glyph;
        }
    }
    "\u{2796}"
}

/// Rewrite evidence-badge divs into emphasized, glyph-prefixed inline text.
pub fn rewrite_badges(input: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r#"(?is)<div\b[^>]*class\s*=\s*["']([^"']*evidence-badge[^"']*)["'][^>]*>(.*?)</div>"#)
            .expect("Invalid badge regex")
    });

    re.replace_all(input, |caps: &regex::Captures<'_>| {
        let glyph = badge_glyph(&caps[1]);
        let content = strip_tags(caps[2].trim());
        format!("*{glyph} {content}*")
    })
    .into_owned()
}

/// Strip remaining HTML tags and comments, preserving inner text.
///
/// Best-effort normalization only; this is not an HTML parser and makes no
/// sanitization guarantees.
pub fn strip_tags(input: &str) -> String {
    static COMMENT: OnceLock<Regex> = OnceLock::new();
    static TAG: OnceLock<Regex> = OnceLock::new();
    let comment = COMMENT.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").expect("Invalid comment regex"));
    let tag = TAG.get_or_init(|| Regex::new(r"</?[A-Za-z][^>]*>").expect("Invalid tag regex"));

    let without_comments = comment.replace_all(input, "");
    tag.replace_all(&without_comments, "").into_owned()
}
