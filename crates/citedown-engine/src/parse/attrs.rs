//! `{.class key=value}` annotation capture.
//!
//! Annotations trail the content they describe: at the end of a block's
//! inline content (separated by whitespace) they become the block's `class`
//! attribute, immediately after an inline run they become a `span` mark, and
//! immediately after an image they populate the image's extended attributes.

use crate::tree::{ImageAttrs, Inline, Mark};
use regex::Regex;
use std::sync::OnceLock;

/// A parsed annotation: dot-prefixed classes plus `key=value` pairs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Annotation {
    pub classes: Vec<String>,
    pub attrs: Vec<(String, String)>,
}

impl Annotation {
    /// Space-joined class attribute value, `None` when no classes.
    pub fn class_attr(&self) -> Option<String> {
        if self.classes.is_empty() {
            None
        } else {
            Some(self.classes.join(" "))
        }
    }

    fn parse_tokens(body: &str) -> Option<Annotation> {
        let mut annotation = Annotation::default();
        for token in body.split_whitespace() {
            if let Some(class) = token.strip_prefix('.') {
                if class.is_empty() || !class.chars().all(is_name_char) {
                    return None;
                }
                annotation.classes.push(class.to_string());
            } else if let Some((key, value)) = token.split_once('=') {
                if key.is_empty() || value.is_empty() || !key.chars().all(is_name_char) {
                    return None;
                }
                annotation.attrs.push((key.to_string(), value.to_string()));
            } else {
                return None;
            }
        }
        if annotation.classes.is_empty() && annotation.attrs.is_empty() {
            None
        } else {
            Some(annotation)
        }
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn candidate_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{[^{}\n]+\}").expect("Invalid annotation regex"))
}

/// All well-formed annotations in `text` with their byte ranges.
fn find_annotations(text: &str) -> Vec<(std::ops::Range<usize>, Annotation)> {
    candidate_regex()
        .find_iter(text)
        .filter_map(|m| {
            let body = &text[m.start() + 1..m.end() - 1];
            Annotation::parse_tokens(body).map(|a| (m.range(), a))
        })
        .collect()
}

/// Extract a block-level annotation from the end of inline content.
///
/// A block annotation must be separated from preceding text by whitespace,
/// or stand as the block's entire content. An annotation glued to an inline
/// run is a span/image annotation and is left for
/// [`apply_inline_annotations`].
pub fn extract_block_annotation(content: &mut Vec<Inline>) -> Option<Annotation> {
    let Some(Inline::Text { text, .. }) = content.last() else {
        return None;
    };
    let (range, annotation) = find_annotations(text)
        .into_iter()
        .last()
        .filter(|(range, _)| range.end == text.len())?;

    let before = &text[..range.start];
    let whole_node = before.is_empty();
    let element_annotation = whole_node && content.len() > 1;
    if !element_annotation && (whole_node || before.ends_with(char::is_whitespace)) {
        match content.last_mut() {
            Some(Inline::Text { text, .. }) => {
                let stripped = text[..range.start].trim_end().to_string();
                if stripped.is_empty() {
                    content.pop();
                } else {
                    *text = stripped;
                }
            }
            _ => unreachable!("checked above"),
        }
        return Some(annotation);
    }
    None
}

/// Resolve remaining annotations inside inline content.
///
/// An annotation glued to the text before it becomes a `span` mark covering
/// the run back to the nearest boundary (start of content, an image, or the
/// end of a previous annotation). An annotation directly after an image sets
/// the image's class and extended attributes. An annotation with nothing to
/// cover stays literal text.
pub fn apply_inline_annotations(content: Vec<Inline>) -> Vec<Inline> {
    let mut out: Vec<Inline> = Vec::new();
    // Index into `out` where the current annotatable segment starts.
    let mut boundary = 0;

    for inline in content {
        let Inline::Text { text, marks } = inline else {
            out.push(inline);
            boundary = out.len();
            continue;
        };

        let mut cursor = 0;
        for (range, annotation) in find_annotations(&text) {
            if range.start > cursor {
                out.push(Inline::Text {
                    text: text[cursor..range.start].to_string(),
                    marks: marks.clone(),
                });
            }
            let segment_empty = out.len() == boundary;
            if segment_empty && cursor == range.start && follows_image(&out, boundary) {
                if let Some(Inline::Image(attrs)) = out.last_mut() {
                    apply_image_annotation(attrs, &annotation);
                }
            } else if !segment_empty {
                if let Some(class) = annotation.class_attr() {
                    for covered in &mut out[boundary..] {
                        if let Inline::Text { marks, .. } = covered {
                            marks.push(Mark::Span {
                                class: class.clone(),
                            });
                        }
                    }
                }
                boundary = out.len();
            } else {
                // Nothing to annotate: keep the literal text.
                out.push(Inline::Text {
                    text: text[range.start..range.end].to_string(),
                    marks: marks.clone(),
                });
            }
            cursor = range.end;
        }
        if cursor < text.len() {
            out.push(Inline::Text {
                text: text[cursor..].to_string(),
                marks,
            });
        }
    }

    merge_adjacent_text(out)
}

fn follows_image(out: &[Inline], boundary: usize) -> bool {
    boundary > 0 && boundary == out.len() && matches!(out.last(), Some(Inline::Image(_)))
}

fn apply_image_annotation(attrs: &mut ImageAttrs, annotation: &Annotation) {
    if let Some(class) = annotation.class_attr() {
        attrs.class = Some(class);
    }
    for (key, value) in &annotation.attrs {
        match key.as_str() {
            "width" => attrs.width = value.parse().ok(),
            "height" => attrs.height = value.parse().ok(),
            "max-width" => attrs.max_width = value.parse().ok(),
            "align" => attrs.align = Some(value.clone()),
            _ => {}
        }
    }
}

/// Merge neighboring text runs carrying identical mark sets.
pub fn merge_adjacent_text(content: Vec<Inline>) -> Vec<Inline> {
    let mut out: Vec<Inline> = Vec::new();
    for inline in content {
        if let (
            Some(Inline::Text {
                text: prev,
                marks: prev_marks,
            }),
            Inline::Text { text, marks },
        ) = (out.last_mut(), &inline)
            && prev_marks == marks
        {
            prev.push_str(text);
            continue;
        }
        out.push(inline);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Inline;
    use pretty_assertions::assert_eq;

    #[test]
    fn block_annotation_requires_preceding_whitespace() {
        let mut content = vec![Inline::text("Title {.intro .wide}")];
        let annotation = extract_block_annotation(&mut content).unwrap();
        assert_eq!(annotation.class_attr(), Some("intro wide".to_string()));
        assert_eq!(content, vec![Inline::text("Title")]);
    }

    #[test]
    fn glued_annotation_is_not_a_block_annotation() {
        let mut content = vec![Inline::text("word{.x}")];
        assert_eq!(extract_block_annotation(&mut content), None);
        assert_eq!(content, vec![Inline::text("word{.x}")]);
    }

    #[test]
    fn annotation_only_content_is_a_block_annotation() {
        let mut content = vec![Inline::text("{.note}")];
        let annotation = extract_block_annotation(&mut content).unwrap();
        assert_eq!(annotation.class_attr(), Some("note".to_string()));
        assert!(content.is_empty());
    }

    #[test]
    fn annotation_after_marked_run_is_left_for_span_pass() {
        let mut content = vec![
            Inline::marked("bar", vec![Mark::Em]),
            Inline::text("{.x}"),
        ];
        assert_eq!(extract_block_annotation(&mut content), None);
    }

    #[test]
    fn span_covers_run_back_to_block_start() {
        let out = apply_inline_annotations(vec![Inline::text("foo bar{.hl}")]);
        assert_eq!(
            out,
            vec![Inline::marked(
                "foo bar",
                vec![Mark::Span { class: "hl".into() }]
            )]
        );
    }

    #[test]
    fn span_after_previous_span_starts_at_new_boundary() {
        let out = apply_inline_annotations(vec![Inline::text("foo{.a} bar{.b}")]);
        assert_eq!(
            out,
            vec![
                Inline::marked("foo", vec![Mark::Span { class: "a".into() }]),
                Inline::marked(" bar", vec![Mark::Span { class: "b".into() }]),
            ]
        );
    }

    #[test]
    fn span_overlays_existing_marks() {
        let out = apply_inline_annotations(vec![
            Inline::marked("bar", vec![Mark::Em]),
            Inline::text("{.x}"),
        ]);
        assert_eq!(
            out,
            vec![Inline::marked(
                "bar",
                vec![Mark::Em, Mark::Span { class: "x".into() }]
            )]
        );
    }

    #[test]
    fn image_annotation_sets_extended_attributes() {
        let out = apply_inline_annotations(vec![
            Inline::Image(ImageAttrs::new("a.png")),
            Inline::text("{.photo width=320 max-width=600 align=center}"),
        ]);
        let Inline::Image(attrs) = &out[0] else {
            panic!("expected image");
        };
        assert_eq!(attrs.class.as_deref(), Some("photo"));
        assert_eq!(attrs.width, Some(320.0));
        assert_eq!(attrs.max_width, Some(600.0));
        assert_eq!(attrs.align.as_deref(), Some("center"));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn annotation_with_nothing_to_cover_stays_literal() {
        let out = apply_inline_annotations(vec![Inline::text("{.x} trailing")]);
        assert_eq!(out, vec![Inline::text("{.x} trailing")]);
    }

    #[test]
    fn malformed_annotation_is_ordinary_text() {
        let out = apply_inline_annotations(vec![Inline::text("set {1, 2, 3} of values")]);
        assert_eq!(out, vec![Inline::text("set {1, 2, 3} of values")]);
        let mut content = vec![Inline::text("x {not a class}")];
        assert_eq!(extract_block_annotation(&mut content), None);
    }

    #[test]
    fn merge_joins_equal_mark_runs() {
        let merged = merge_adjacent_text(vec![
            Inline::text("a"),
            Inline::text("b"),
            Inline::marked("c", vec![Mark::Em]),
        ]);
        assert_eq!(
            merged,
            vec![Inline::text("ab"), Inline::marked("c", vec![Mark::Em])]
        );
    }
}
