//! Mapping between plain-text offsets and tree positions.
//!
//! Hosts that work on [`Doc::text_content`] — highlighters, comment anchors,
//! programmatic edits — address the document by character offset into that
//! projection. This module maps such offsets back onto the tree and applies
//! positional text replacements without reparsing the document.
//!
//! Offsets count Unicode scalar values. The offset of the separator newline
//! between two leaves maps to the end of the earlier leaf.

use crate::tree::{Block, Doc, Inline, Table, inline_text};

/// A resolved position inside the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPosition {
    /// Indices from the document root to the leaf block: child indices for
    /// blockquotes, `[list, item, block]` for list content and
    /// `[table, row, cell]` for table cells, with the header as row 0.
    pub block_path: Vec<usize>,
    /// Index of the inline node within the leaf; `content.len()` when the
    /// offset falls after every text run. Always 0 for code blocks.
    pub inline_index: usize,
    /// Character offset within that inline text run.
    pub char_offset: usize,
}

/// Resolve a character offset into a tree position. Offsets past the end
/// clamp to the last text-bearing leaf; `None` only when the document has
/// no such leaf at all.
pub fn locate(doc: &Doc, offset: usize) -> Option<TextPosition> {
    let total = doc.text_content().chars().count();
    let offset = offset.min(total);
    let mut cursor = 0usize;
    let mut path = Vec::new();
    locate_blocks(&doc.content, offset, &mut cursor, &mut path)
}

fn locate_blocks(
    blocks: &[Block],
    offset: usize,
    cursor: &mut usize,
    path: &mut Vec<usize>,
) -> Option<TextPosition> {
    for (i, block) in blocks.iter().enumerate() {
        path.push(i);
        match block {
            Block::Frontmatter { .. } | Block::HorizontalRule => {}
            Block::Paragraph { content, .. } | Block::Heading { content, .. } => {
                let len = inline_text(content).chars().count();
                if offset <= *cursor + len {
                    let (inline_index, char_offset) = locate_inline(content, offset - *cursor);
                    return Some(TextPosition {
                        block_path: path.clone(),
                        inline_index,
                        char_offset,
                    });
                }
                *cursor += len + 1;
            }
            Block::Blockquote { content, .. } => {
                if let Some(found) = locate_blocks(content, offset, cursor, path) {
                    return Some(found);
                }
            }
            Block::BulletList { items } | Block::OrderedList { items, .. } => {
                for (j, item) in items.iter().enumerate() {
                    path.push(j);
                    if let Some(found) = locate_blocks(&item.content, offset, cursor, path) {
                        return Some(found);
                    }
                    path.pop();
                }
            }
            Block::CodeBlock { text, .. } => {
                let len = text.trim_end_matches('\n').chars().count();
                if offset <= *cursor + len {
                    return Some(TextPosition {
                        block_path: path.clone(),
                        inline_index: 0,
                        char_offset: offset - *cursor,
                    });
                }
                *cursor += len + 1;
            }
            Block::Table(table) => {
                if let Some(found) = locate_table(table, offset, cursor, path) {
                    return Some(found);
                }
            }
        }
        path.pop();
    }
    None
}

fn locate_table(
    table: &Table,
    offset: usize,
    cursor: &mut usize,
    path: &mut Vec<usize>,
) -> Option<TextPosition> {
    for (r, row) in table.head.iter().chain(table.body.iter()).enumerate() {
        for (c, cell) in row.cells.iter().enumerate() {
            let len = inline_text(&cell.content).chars().count();
            if offset <= *cursor + len {
                path.push(r);
                path.push(c);
                let (inline_index, char_offset) = locate_inline(&cell.content, offset - *cursor);
                return Some(TextPosition {
                    block_path: path.clone(),
                    inline_index,
                    char_offset,
                });
            }
            *cursor += len + 1;
        }
    }
    None
}

fn locate_inline(content: &[Inline], offset: usize) -> (usize, usize) {
    let mut cursor = 0usize;
    for (i, inline) in content.iter().enumerate() {
        if let Inline::Text { text, .. } = inline {
            let len = text.chars().count();
            if offset <= cursor + len {
                return (i, offset - cursor);
            }
            cursor += len;
        }
    }
    (content.len(), 0)
}

/// Replace the character range `[start, end)` of the plain-text projection
/// with `replacement`, returning the edited tree. The range is clamped to
/// the document, and `end` is further clamped to the leaf containing
/// `start`: an edit never crosses a block boundary. Inserted text takes the
/// marks of the run it lands in; images strictly inside the deleted range
/// are removed.
pub fn replace_text_range(doc: &Doc, start: usize, end: usize, replacement: &str) -> Doc {
    let mut doc = doc.clone();
    let total = doc.text_content().chars().count();
    let start = start.min(total);
    let end = end.clamp(start, total);
    let mut cursor = 0usize;
    let mut done = false;
    splice_blocks(&mut doc.content, start, end, replacement, &mut cursor, &mut done);
    doc
}

fn splice_blocks(
    blocks: &mut [Block],
    start: usize,
    end: usize,
    replacement: &str,
    cursor: &mut usize,
    done: &mut bool,
) {
    for block in blocks.iter_mut() {
        if *done {
            return;
        }
        match block {
            Block::Frontmatter { .. } | Block::HorizontalRule => {}
            Block::Paragraph { content, .. } | Block::Heading { content, .. } => {
                let len = inline_text(content).chars().count();
                if start <= *cursor + len {
                    let local_end = end.min(*cursor + len) - *cursor;
                    splice_inlines(content, start - *cursor, local_end, replacement);
                    *done = true;
                    return;
                }
                *cursor += len + 1;
            }
            Block::Blockquote { content, .. } => {
                splice_blocks(content, start, end, replacement, cursor, done);
            }
            Block::BulletList { items } | Block::OrderedList { items, .. } => {
                for item in items.iter_mut() {
                    splice_blocks(&mut item.content, start, end, replacement, cursor, done);
                    if *done {
                        return;
                    }
                }
            }
            Block::CodeBlock { text, .. } => {
                let len = text.trim_end_matches('\n').chars().count();
                if start <= *cursor + len {
                    let local_start = start - *cursor;
                    let local_end = end.min(*cursor + len) - *cursor;
                    let from = byte_at(text, local_start);
                    let to = byte_at(text, local_end);
                    text.replace_range(from..to, replacement);
                    *done = true;
                    return;
                }
                *cursor += len + 1;
            }
            Block::Table(table) => {
                for row in table.head.iter_mut().chain(table.body.iter_mut()) {
                    for cell in row.cells.iter_mut() {
                        let len = inline_text(&cell.content).chars().count();
                        if start <= *cursor + len {
                            let local_end = end.min(*cursor + len) - *cursor;
                            splice_inlines(&mut cell.content, start - *cursor, local_end, replacement);
                            *done = true;
                            return;
                        }
                        *cursor += len + 1;
                    }
                }
            }
        }
    }
}

fn splice_inlines(content: &mut Vec<Inline>, start: usize, end: usize, replacement: &str) {
    let mut out: Vec<Inline> = Vec::new();
    let mut cursor = 0usize;
    let mut inserted = false;
    for inline in content.drain(..) {
        match inline {
            Inline::Text { text, marks } => {
                let len = text.chars().count();
                let span_end = cursor + len;
                if !inserted && start <= span_end {
                    let prefix = &text[..byte_at(&text, start - cursor)];
                    let suffix = &text[byte_at(&text, end.min(span_end) - cursor)..];
                    let mut head = String::from(prefix);
                    head.push_str(replacement);
                    if !head.is_empty() {
                        out.push(Inline::Text {
                            text: head,
                            marks: marks.clone(),
                        });
                    }
                    if !suffix.is_empty() {
                        out.push(Inline::Text {
                            text: suffix.to_string(),
                            marks,
                        });
                    }
                    inserted = true;
                } else if inserted && cursor < end {
                    // Tail of the deleted range spilling into later runs.
                    let suffix = &text[byte_at(&text, end.min(span_end) - cursor)..];
                    if !suffix.is_empty() {
                        out.push(Inline::Text {
                            text: suffix.to_string(),
                            marks,
                        });
                    }
                } else {
                    out.push(Inline::Text { text, marks });
                }
                cursor = span_end;
            }
            Inline::Image(attrs) => {
                if !(start < cursor && cursor < end) {
                    out.push(Inline::Image(attrs));
                }
            }
        }
    }
    if !inserted && !replacement.is_empty() {
        out.push(Inline::text(replacement));
    }
    *content = merge_runs(out);
}

fn merge_runs(runs: Vec<Inline>) -> Vec<Inline> {
    let mut merged: Vec<Inline> = Vec::new();
    for inline in runs {
        if let Inline::Text { text, marks } = &inline
            && let Some(Inline::Text {
                text: prev,
                marks: prev_marks,
            }) = merged.last_mut()
            && *prev_marks == *marks
        {
            prev.push_str(text);
            continue;
        }
        merged.push(inline);
    }
    merged
}

fn byte_at(s: &str, char_offset: usize) -> usize {
    s.char_indices()
        .nth(char_offset)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{ImageAttrs, ListItem, Mark, TableCell, TableRow};
    use pretty_assertions::assert_eq;

    fn para(content: Vec<Inline>) -> Block {
        Block::Paragraph {
            class: None,
            content,
        }
    }

    fn sample_doc() -> Doc {
        // text_content: "Hello\nworld wide"
        Doc::new(vec![
            Block::Heading {
                level: 1,
                class: None,
                content: vec![Inline::text("Hello")],
            },
            para(vec![
                Inline::marked("world", vec![Mark::Strong]),
                Inline::text(" wide"),
            ]),
        ])
    }

    #[test]
    fn locate_maps_offsets_to_leaves() {
        let doc = sample_doc();
        let pos = locate(&doc, 2).unwrap();
        assert_eq!(pos.block_path, vec![0]);
        assert_eq!((pos.inline_index, pos.char_offset), (0, 2));
        let pos = locate(&doc, 8).unwrap();
        assert_eq!(pos.block_path, vec![1]);
        assert_eq!((pos.inline_index, pos.char_offset), (0, 2));
    }

    #[test]
    fn separator_offset_maps_to_end_of_earlier_leaf() {
        let pos = locate(&sample_doc(), 5).unwrap();
        assert_eq!(pos.block_path, vec![0]);
        assert_eq!((pos.inline_index, pos.char_offset), (0, 5));
    }

    #[test]
    fn locate_second_run_and_clamp_past_end() {
        let doc = sample_doc();
        let pos = locate(&doc, 13).unwrap();
        assert_eq!((pos.inline_index, pos.char_offset), (1, 2));
        let clamped = locate(&doc, 999).unwrap();
        assert_eq!(clamped.block_path, vec![1]);
        assert_eq!((clamped.inline_index, clamped.char_offset), (1, 5));
    }

    #[test]
    fn locate_descends_lists_and_tables() {
        let doc = Doc::new(vec![
            Block::BulletList {
                items: vec![ListItem {
                    content: vec![para(vec![Inline::text("item")])],
                }],
            },
            Block::Table(crate::tree::Table {
                class: None,
                head: Some(TableRow {
                    cells: vec![TableCell::text(vec![Inline::text("Col")])],
                }),
                body: vec![TableRow {
                    cells: vec![TableCell::text(vec![Inline::text("val")])],
                }],
            }),
        ]);
        // "item\nCol\nval"
        let pos = locate(&doc, 1).unwrap();
        assert_eq!(pos.block_path, vec![0, 0, 0]);
        let pos = locate(&doc, 6).unwrap();
        assert_eq!(pos.block_path, vec![1, 0, 0]);
        let pos = locate(&doc, 10).unwrap();
        assert_eq!(pos.block_path, vec![1, 1, 0]);
        assert_eq!(pos.char_offset, 1);
    }

    #[test]
    fn locate_empty_document_is_none() {
        assert_eq!(locate(&Doc::default(), 0), None);
        let atoms_only = Doc::new(vec![Block::HorizontalRule]);
        assert_eq!(locate(&atoms_only, 0), None);
    }

    #[test]
    fn replace_within_one_run_keeps_marks() {
        let doc = sample_doc();
        let edited = replace_text_range(&doc, 6, 11, "globe");
        let Block::Paragraph { content, .. } = &edited.content[1] else {
            panic!("expected paragraph");
        };
        assert_eq!(
            content,
            &vec![
                Inline::marked("globe", vec![Mark::Strong]),
                Inline::text(" wide"),
            ]
        );
    }

    #[test]
    fn replace_across_runs_takes_start_run_marks() {
        let doc = sample_doc();
        let edited = replace_text_range(&doc, 9, 13, "-");
        let Block::Paragraph { content, .. } = &edited.content[1] else {
            panic!("expected paragraph");
        };
        assert_eq!(
            content,
            &vec![
                Inline::marked("wor-", vec![Mark::Strong]),
                Inline::text("ide"),
            ]
        );
    }

    #[test]
    fn replace_never_crosses_block_boundary() {
        let doc = sample_doc();
        let edited = replace_text_range(&doc, 3, 9, "p!");
        assert_eq!(edited.text_content(), "Help!\nworld wide");
    }

    #[test]
    fn image_inside_deleted_range_is_removed() {
        let doc = Doc::new(vec![para(vec![
            Inline::text("aa"),
            Inline::Image(ImageAttrs::new("x.png")),
            Inline::text("bb"),
        ])]);
        let edited = replace_text_range(&doc, 1, 3, "");
        let Block::Paragraph { content, .. } = &edited.content[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(content, &vec![Inline::text("ab")]);
    }

    #[test]
    fn image_at_splice_point_survives() {
        let doc = Doc::new(vec![para(vec![
            Inline::text("aa"),
            Inline::Image(ImageAttrs::new("x.png")),
            Inline::text("bb"),
        ])]);
        let edited = replace_text_range(&doc, 2, 2, "!");
        let Block::Paragraph { content, .. } = &edited.content[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(
            content,
            &vec![
                Inline::text("aa!"),
                Inline::Image(ImageAttrs::new("x.png")),
                Inline::text("bb"),
            ]
        );
    }

    #[test]
    fn replace_inside_code_block_edits_raw_text() {
        let doc = Doc::new(vec![Block::CodeBlock {
            language: Some("rust".to_string()),
            text: "let x = 1;\n".to_string(),
        }]);
        let edited = replace_text_range(&doc, 8, 9, "2");
        assert_eq!(
            edited.content[0],
            Block::CodeBlock {
                language: Some("rust".to_string()),
                text: "let x = 2;\n".to_string(),
            }
        );
    }

    #[test]
    fn multibyte_offsets_count_scalar_values() {
        let doc = Doc::new(vec![para(vec![Inline::text("héllo")])]);
        let edited = replace_text_range(&doc, 1, 2, "e");
        assert_eq!(edited.text_content(), "hello");
        let pos = locate(&doc, 3).unwrap();
        assert_eq!(pos.char_offset, 3);
    }
}
