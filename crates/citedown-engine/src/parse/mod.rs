//! Markdown parsing pipeline: frontmatter split, preprocessing, tokenizer
//! walk, and the recovery ladder that keeps parsing a total function.

mod builder;

pub mod attrs;

use crate::frontmatter::split_frontmatter;
use crate::preprocess;
use crate::tree::{Block, Doc, Inline};
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Diagnostic paragraph text used when no readable content survives the
/// recovery ladder.
pub const PARSE_FAILURE_NOTICE: &str =
    "This document could not be read as Markdown and no text content was recovered.";

/// Parser capabilities.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Capture `{.class}` annotations. When the capability is disabled,
    /// class attributes degrade to `None` and annotations stay literal text.
    pub attributes: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions { attributes: true }
    }
}

/// Internal tokenizer-walk failure. Never escapes [`parse_document`]; it
/// routes malformed input into the recovery ladder.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("tokenizer produced unbalanced structure at {0}")]
    Unbalanced(&'static str),
}

/// Parse Markdown text into a document tree. Total: any input produces a
/// structurally valid tree.
pub fn parse_document(input: &str) -> Doc {
    parse_document_with(input, &ParseOptions::default())
}

/// [`parse_document`] with explicit capabilities.
pub fn parse_document_with(input: &str, opts: &ParseOptions) -> Doc {
    let split = split_frontmatter(input);
    let body = preprocess::preprocess(split.body);

    // The tokenizer walk must never take the caller down with it; a panic
    // or structural error drops to the plain-text fallback.
    let blocks = match catch_unwind(AssertUnwindSafe(|| builder::build_tree(&body, opts))) {
        Ok(Ok(blocks)) => blocks,
        Ok(Err(_)) | Err(_) => fallback_blocks(&body),
    };

    let mut content = Vec::with_capacity(blocks.len() + 1);
    if let Some(raw_yaml) = split.frontmatter {
        content.push(Block::Frontmatter {
            raw_yaml: raw_yaml.to_string(),
        });
    }
    content.extend(blocks);
    Doc::new(content)
}

/// Recovery ladder step (a): strip HTML line by line and wrap every
/// non-blank line as a plain paragraph. Step (b): if even that yields
/// nothing, a single diagnostic paragraph.
fn fallback_blocks(body: &str) -> Vec<Block> {
    let mut blocks: Vec<Block> = body
        .lines()
        .map(|line| preprocess::html::strip_tags(line))
        .map(|line| html_escape::decode_html_entities(&line).trim().to_string())
        .filter(|line| !line.is_empty())
        .map(|line| Block::Paragraph {
            class: None,
            content: vec![Inline::text(line)],
        })
        .collect();
    if blocks.is_empty() {
        blocks.push(Block::Paragraph {
            class: None,
            content: vec![Inline::text(PARSE_FAILURE_NOTICE)],
        });
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{CellAlign, ImageAttrs, Mark};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn frontmatter_becomes_leading_node() {
        let doc = parse_document("---\nkey: v\n---\n\n# Hi");
        assert_eq!(
            doc.content[0],
            Block::Frontmatter {
                raw_yaml: "key: v".to_string()
            }
        );
        assert_eq!(
            doc.content[1],
            Block::Heading {
                level: 1,
                class: None,
                content: vec![Inline::text("Hi")]
            }
        );
    }

    #[test]
    fn heading_with_trailing_annotation() {
        let doc = parse_document("# Title {.intro .wide}");
        assert_eq!(
            doc.content[0],
            Block::Heading {
                level: 1,
                class: Some("intro wide".to_string()),
                content: vec![Inline::text("Title")]
            }
        );
    }

    #[test]
    fn paragraph_annotation_and_marks() {
        let doc = parse_document("Some *emphasis* and **strong** text. {.note}");
        assert_eq!(
            doc.content[0],
            Block::Paragraph {
                class: Some("note".to_string()),
                content: vec![
                    Inline::text("Some "),
                    Inline::marked("emphasis", vec![Mark::Em]),
                    Inline::text(" and "),
                    Inline::marked("strong", vec![Mark::Strong]),
                    Inline::text(" text."),
                ],
            }
        );
    }

    #[test]
    fn span_annotation_becomes_span_mark() {
        let doc = parse_document("highlighted{.hl}");
        assert_eq!(
            doc.content[0],
            Block::Paragraph {
                class: None,
                content: vec![Inline::marked(
                    "highlighted",
                    vec![Mark::Span { class: "hl".into() }]
                )],
            }
        );
    }

    #[test]
    fn image_with_extended_attributes() {
        let doc = parse_document("![A](a.png){.photo width=320 align=center}");
        let Block::Paragraph { content, .. } = &doc.content[0] else {
            panic!("expected paragraph");
        };
        let Inline::Image(attrs) = &content[0] else {
            panic!("expected image");
        };
        assert_eq!(attrs.src, "a.png");
        assert_eq!(attrs.alt.as_deref(), Some("A"));
        assert_eq!(attrs.class.as_deref(), Some("photo"));
        assert_eq!(attrs.width, Some(320.0));
        assert_eq!(attrs.align.as_deref(), Some("center"));
    }

    #[test]
    fn html_img_tag_is_normalized_into_image_node() {
        let doc = parse_document(r#"Before <img src="a.png" alt="A"> after"#);
        let Block::Paragraph { content, .. } = &doc.content[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(
            content[1],
            Inline::Image(ImageAttrs {
                alt: Some("A".to_string()),
                ..ImageAttrs::new("a.png")
            })
        );
    }

    #[test]
    fn table_with_column_alignment() {
        let doc = parse_document("| Name | Score |\n| :--- | ---: |\n| a | 1 |\n");
        let Block::Table(table) = &doc.content[0] else {
            panic!("expected table");
        };
        let head = table.head.as_ref().unwrap();
        assert!(head.cells[0].header);
        assert_eq!(head.cells[0].align, Some(CellAlign::Left));
        assert_eq!(head.cells[1].align, Some(CellAlign::Right));
        assert_eq!(table.body.len(), 1);
        assert_eq!(table.body[0].cells[1].align, Some(CellAlign::Right));
        assert!(!table.body[0].cells[0].header);
    }

    #[test]
    fn annotation_paragraph_after_table_sets_table_class() {
        let doc = parse_document("| A |\n| --- |\n| 1 |\n\n{.compact}\n");
        let Block::Table(table) = &doc.content[0] else {
            panic!("expected table");
        };
        assert_eq!(table.class.as_deref(), Some("compact"));
        assert_eq!(doc.content.len(), 1);
    }

    #[test]
    fn annotation_paragraph_after_blockquote_sets_quote_class() {
        let doc = parse_document("> quoted\n\n{.callout}\n");
        let Block::Blockquote { class, .. } = &doc.content[0] else {
            panic!("expected blockquote");
        };
        assert_eq!(class.as_deref(), Some("callout"));
        assert_eq!(doc.content.len(), 1);
    }

    #[test]
    fn footnotes_become_lists_and_citations() {
        let doc = parse_document("See [^1].\n\n[^1]: Some note.\n");
        assert_eq!(
            doc.content[0],
            Block::Paragraph {
                class: None,
                content: vec![Inline::text("See [1].")],
            }
        );
        let Block::OrderedList { start, items } = &doc.content[1] else {
            panic!("expected ordered list, got {:?}", doc.content[1]);
        };
        assert_eq!(*start, 1);
        assert_eq!(
            items[0].content[0],
            Block::Paragraph {
                class: None,
                content: vec![Inline::text("Some note.")],
            }
        );
    }

    #[test]
    fn nested_lists_and_blockquote() {
        let doc = parse_document("> - outer\n>   - inner\n");
        let Block::Blockquote { content, .. } = &doc.content[0] else {
            panic!("expected blockquote");
        };
        let Block::BulletList { items } = &content[0] else {
            panic!("expected list");
        };
        assert_eq!(items.len(), 1);
        let Block::BulletList { items: inner } = &items[0].content[1] else {
            panic!("expected nested list");
        };
        assert_eq!(
            inner[0].content[0],
            Block::Paragraph {
                class: None,
                content: vec![Inline::text("inner")],
            }
        );
    }

    #[test]
    fn code_block_keeps_language_and_text() {
        let doc = parse_document("```rust\nfn main() {}\n```\n");
        assert_eq!(
            doc.content[0],
            Block::CodeBlock {
                language: Some("rust".to_string()),
                text: "fn main() {}\n".to_string(),
            }
        );
    }

    #[test]
    fn attribute_capability_disabled_leaves_annotations_literal() {
        let opts = ParseOptions { attributes: false };
        let doc = parse_document_with("Title {.intro}", &opts);
        assert_eq!(
            doc.content[0],
            Block::Paragraph {
                class: None,
                content: vec![Inline::text("Title {.intro}")],
            }
        );
    }

    #[rstest]
    #[case("")]
    #[case("\u{0}\u{1}\u{2}binary\u{fffd}garbage")]
    #[case("| broken | table\n| --- |\n||||")]
    #[case("<div><span>unclosed")]
    #[case("[^]:")]
    #[case("{..}{=}{}")]
    fn parser_is_total_on_malformed_input(#[case] input: &str) {
        // Must produce a structurally valid tree, never panic.
        let doc = parse_document(input);
        if let Some(Block::Frontmatter { .. }) = doc.content.first() {
            panic!("no frontmatter expected");
        }
        let _ = doc.text_content();
    }

    #[test]
    fn empty_input_parses_to_empty_doc() {
        assert_eq!(parse_document(""), Doc::default());
    }

    #[test]
    fn fallback_wraps_lines_as_paragraphs() {
        let blocks = fallback_blocks("<p>alpha</p>\n\n  beta &amp; gamma  \n");
        assert_eq!(
            blocks,
            vec![
                Block::Paragraph {
                    class: None,
                    content: vec![Inline::text("alpha")],
                },
                Block::Paragraph {
                    class: None,
                    content: vec![Inline::text("beta & gamma")],
                },
            ]
        );
    }

    #[test]
    fn fallback_with_no_content_yields_diagnostic() {
        let blocks = fallback_blocks("  \n<div>\n");
        assert_eq!(
            blocks,
            vec![Block::Paragraph {
                class: None,
                content: vec![Inline::text(PARSE_FAILURE_NOTICE)],
            }]
        );
    }
}
