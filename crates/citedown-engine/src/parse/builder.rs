//! pulldown-cmark event stream to document tree construction.

use pulldown_cmark::{Alignment, Event, Options, Parser, Tag, TagEnd};

use super::attrs;
use super::{ParseError, ParseOptions};
use crate::tree::{
    Block, CellAlign, ImageAttrs, Inline, ListItem, Mark, Table, TableCell, TableRow,
};

/// Tokenize the preprocessed body and build its block sequence.
pub(crate) fn build_tree(body: &str, opts: &ParseOptions) -> Result<Vec<Block>, ParseError> {
    let parser = Parser::new_ext(body, Options::ENABLE_TABLES);
    let mut builder = TreeBuilder::new(opts.attributes);
    for event in parser {
        builder.event(event)?;
    }
    builder.finish()
}

/// One open container during tree construction.
enum Frame {
    Root {
        blocks: Vec<Block>,
    },
    Blockquote {
        blocks: Vec<Block>,
    },
    List {
        start: Option<u64>,
        items: Vec<ListItem>,
    },
    Item {
        blocks: Vec<Block>,
    },
    Table {
        alignments: Vec<Option<CellAlign>>,
        head: Option<TableRow>,
        rows: Vec<TableRow>,
        in_head: bool,
    },
    Row {
        cells: Vec<TableCell>,
    },
}

/// What kind of leaf block the open inline context belongs to.
enum InlineKind {
    Paragraph,
    Heading(u8),
    Cell { header: bool, align: Option<CellAlign> },
}

struct InlineCtx {
    kind: InlineKind,
    content: Vec<Inline>,
}

struct ImageCtx {
    attrs: ImageAttrs,
    alt: String,
}

struct TreeBuilder {
    attributes: bool,
    frames: Vec<Frame>,
    inline: Option<InlineCtx>,
    marks: Vec<Mark>,
    image: Option<ImageCtx>,
    code: Option<(Option<String>, String)>,
}

impl TreeBuilder {
    fn new(attributes: bool) -> Self {
        TreeBuilder {
            attributes,
            frames: vec![Frame::Root { blocks: Vec::new() }],
            inline: None,
            marks: Vec::new(),
            image: None,
            code: None,
        }
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), ParseError> {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(end) => self.end(end),
            Event::Text(text) => {
                self.text(&text);
                Ok(())
            }
            Event::Code(text) => {
                self.ensure_inline();
                let mut marks = self.marks.clone();
                marks.push(Mark::Code);
                self.push_text(&text, marks);
                Ok(())
            }
            Event::SoftBreak | Event::HardBreak => {
                self.text("\n");
                Ok(())
            }
            Event::Rule => {
                self.close_implicit_paragraph();
                self.push_block(Block::HorizontalRule);
                Ok(())
            }
            // Residual HTML is dropped; the preprocessor normalizes it away
            // and anything left is malformed input.
            Event::Html(_) | Event::InlineHtml(_) => Ok(()),
            // Footnotes and task lists are rewritten by the preprocessor;
            // math and anything future is ignored rather than fatal.
            _ => Ok(()),
        }
    }

    fn start(&mut self, tag: Tag<'_>) -> Result<(), ParseError> {
        match tag {
            Tag::Paragraph => {
                self.inline = Some(InlineCtx {
                    kind: InlineKind::Paragraph,
                    content: Vec::new(),
                });
            }
            Tag::Heading { level, .. } => {
                self.inline = Some(InlineCtx {
                    kind: InlineKind::Heading(level as u8),
                    content: Vec::new(),
                });
            }
            Tag::BlockQuote(_) => {
                self.close_implicit_paragraph();
                self.frames.push(Frame::Blockquote { blocks: Vec::new() });
            }
            Tag::List(start) => {
                self.close_implicit_paragraph();
                self.frames.push(Frame::List {
                    start,
                    items: Vec::new(),
                });
            }
            Tag::Item => {
                self.frames.push(Frame::Item { blocks: Vec::new() });
            }
            Tag::CodeBlock(kind) => {
                let language = match kind {
                    pulldown_cmark::CodeBlockKind::Fenced(info) => {
                        let lang = info.split_whitespace().next().unwrap_or("").to_string();
                        if lang.is_empty() { None } else { Some(lang) }
                    }
                    pulldown_cmark::CodeBlockKind::Indented => None,
                };
                self.code = Some((language, String::new()));
            }
            Tag::Table(alignments) => {
                self.close_implicit_paragraph();
                let alignments = alignments.iter().map(|a| cell_align(*a)).collect();
                self.frames.push(Frame::Table {
                    alignments,
                    head: None,
                    rows: Vec::new(),
                    in_head: false,
                });
            }
            Tag::TableHead => {
                if let Some(Frame::Table { in_head, .. }) = self.frames.last_mut() {
                    *in_head = true;
                }
                self.frames.push(Frame::Row { cells: Vec::new() });
            }
            Tag::TableRow => {
                self.frames.push(Frame::Row { cells: Vec::new() });
            }
            Tag::TableCell => {
                let (header, align) = self.cell_context();
                self.inline = Some(InlineCtx {
                    kind: InlineKind::Cell { header, align },
                    content: Vec::new(),
                });
            }
            Tag::Emphasis => self.marks.push(Mark::Em),
            Tag::Strong => self.marks.push(Mark::Strong),
            Tag::Link {
                dest_url, title, ..
            } => self.marks.push(Mark::Link {
                href: dest_url.to_string(),
                title: non_empty(&title),
            }),
            Tag::Image {
                dest_url, title, ..
            } => {
                let mut attrs = ImageAttrs::new(dest_url.to_string());
                attrs.title = non_empty(&title);
                self.image = Some(ImageCtx {
                    attrs,
                    alt: String::new(),
                });
            }
            // HTML blocks, metadata blocks and unknown containers parse as
            // transparent: their inner text still arrives as events.
            _ => {}
        }
        Ok(())
    }

    fn end(&mut self, end: TagEnd) -> Result<(), ParseError> {
        match end {
            TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::TableCell => self.close_inline(),
            TagEnd::BlockQuote(_) => {
                self.close_implicit_paragraph();
                match self.frames.pop() {
                    Some(Frame::Blockquote { blocks }) => {
                        self.push_block(Block::Blockquote {
                            class: None,
                            content: blocks,
                        });
                        Ok(())
                    }
                    _ => Err(ParseError::Unbalanced("blockquote")),
                }
            }
            TagEnd::Item => {
                self.close_implicit_paragraph();
                match self.frames.pop() {
                    Some(Frame::Item { blocks }) => {
                        if let Some(Frame::List { items, .. }) = self.frames.last_mut() {
                            items.push(ListItem { content: blocks });
                            Ok(())
                        } else {
                            Err(ParseError::Unbalanced("list item"))
                        }
                    }
                    _ => Err(ParseError::Unbalanced("list item")),
                }
            }
            TagEnd::List(_) => match self.frames.pop() {
                Some(Frame::List { start, items }) => {
                    let block = match start {
                        Some(start) => Block::OrderedList { start, items },
                        None => Block::BulletList { items },
                    };
                    self.push_block(block);
                    Ok(())
                }
                _ => Err(ParseError::Unbalanced("list")),
            },
            TagEnd::CodeBlock => {
                if let Some((language, text)) = self.code.take() {
                    self.push_block(Block::CodeBlock { language, text });
                }
                Ok(())
            }
            TagEnd::TableHead => match self.frames.pop() {
                Some(Frame::Row { cells }) => {
                    if let Some(Frame::Table { head, in_head, .. }) = self.frames.last_mut() {
                        *head = Some(TableRow { cells });
                        *in_head = false;
                        Ok(())
                    } else {
                        Err(ParseError::Unbalanced("table head"))
                    }
                }
                _ => Err(ParseError::Unbalanced("table head")),
            },
            TagEnd::TableRow => match self.frames.pop() {
                Some(Frame::Row { cells }) => {
                    if let Some(Frame::Table { rows, .. }) = self.frames.last_mut() {
                        rows.push(TableRow { cells });
                        Ok(())
                    } else {
                        Err(ParseError::Unbalanced("table row"))
                    }
                }
                _ => Err(ParseError::Unbalanced("table row")),
            },
            TagEnd::Table => match self.frames.pop() {
                Some(Frame::Table { head, rows, .. }) => {
                    self.push_block(Block::Table(Table {
                        class: None,
                        head,
                        body: rows,
                    }));
                    Ok(())
                }
                _ => Err(ParseError::Unbalanced("table")),
            },
            TagEnd::Emphasis => {
                self.remove_mark(|m| matches!(m, Mark::Em));
                Ok(())
            }
            TagEnd::Strong => {
                self.remove_mark(|m| matches!(m, Mark::Strong));
                Ok(())
            }
            TagEnd::Link => {
                self.remove_mark(|m| matches!(m, Mark::Link { .. }));
                Ok(())
            }
            TagEnd::Image => {
                if let Some(ctx) = self.image.take() {
                    let mut attrs = ctx.attrs;
                    attrs.alt = if ctx.alt.is_empty() {
                        None
                    } else {
                        Some(ctx.alt)
                    };
                    self.ensure_inline();
                    if let Some(inline) = self.inline.as_mut() {
                        inline.content.push(Inline::Image(attrs));
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(image) = self.image.as_mut() {
            image.alt.push_str(text);
            return;
        }
        if let Some((_, buffer)) = self.code.as_mut() {
            buffer.push_str(text);
            return;
        }
        self.ensure_inline();
        let marks = self.marks.clone();
        self.push_text(text, marks);
    }

    fn push_text(&mut self, text: &str, mut marks: Vec<Mark>) {
        let Some(inline) = self.inline.as_mut() else {
            return;
        };
        // Canonical mark set: rank order, duplicates collapsed. Nesting
        // variants of the same formatting compare equal and serialize
        // identically, and re-nested emphasis (`*a **b** a*` emitted as
        // `***b***`) reads back without a doubled mark.
        marks.sort_by_key(Mark::rank);
        marks.dedup();
        if let Some(Inline::Text {
            text: prev,
            marks: prev_marks,
        }) = inline.content.last_mut()
            && *prev_marks == marks
        {
            prev.push_str(text);
            return;
        }
        inline.content.push(Inline::Text {
            text: text.to_string(),
            marks,
        });
    }

    /// Tight list items carry bare inline events without a paragraph tag;
    /// open an implicit paragraph for them (and for any stray inline event).
    fn ensure_inline(&mut self) {
        if self.inline.is_none() {
            self.inline = Some(InlineCtx {
                kind: InlineKind::Paragraph,
                content: Vec::new(),
            });
        }
    }

    fn close_implicit_paragraph(&mut self) {
        if self.inline.is_some() {
            let _ = self.close_inline();
        }
    }

    /// Finish the open inline context into its block, applying annotation
    /// capture when the attribute capability is enabled.
    fn close_inline(&mut self) -> Result<(), ParseError> {
        let Some(ctx) = self.inline.take() else {
            return Ok(());
        };
        let mut content = ctx.content;
        let class = if self.attributes {
            let annotation = attrs::extract_block_annotation(&mut content);
            content = attrs::apply_inline_annotations(content);
            annotation.and_then(|a| a.class_attr())
        } else {
            None
        };

        match ctx.kind {
            InlineKind::Paragraph => self.push_block(Block::Paragraph { class, content }),
            InlineKind::Heading(level) => self.push_block(Block::Heading {
                level,
                class,
                content,
            }),
            InlineKind::Cell { header, align } => {
                if let Some(Frame::Row { cells }) = self.frames.last_mut() {
                    cells.push(TableCell {
                        header,
                        align,
                        class,
                        content,
                    });
                } else {
                    return Err(ParseError::Unbalanced("table cell"));
                }
            }
        }
        Ok(())
    }

    /// Append a finished block to the innermost open container.
    ///
    /// An annotation-only paragraph landing right after a table or
    /// blockquote is that block's trailing class annotation, not content.
    fn push_block(&mut self, block: Block) {
        let blocks = match self.frames.last_mut() {
            Some(Frame::Root { blocks })
            | Some(Frame::Blockquote { blocks })
            | Some(Frame::Item { blocks }) => blocks,
            _ => return,
        };
        if let Block::Paragraph {
            class: Some(class),
            content,
        } = &block
            && content.is_empty()
        {
            match blocks.last_mut() {
                Some(Block::Table(table)) if table.class.is_none() => {
                    table.class = Some(class.clone());
                    return;
                }
                Some(Block::Blockquote {
                    class: quote_class, ..
                }) if quote_class.is_none() => {
                    *quote_class = Some(class.clone());
                    return;
                }
                _ => {}
            }
        }
        blocks.push(block);
    }

    fn remove_mark(&mut self, pred: impl Fn(&Mark) -> bool) {
        if let Some(pos) = self.marks.iter().rposition(pred) {
            self.marks.remove(pos);
        }
    }

    /// Header flag and column alignment for the cell about to open.
    fn cell_context(&self) -> (bool, Option<CellAlign>) {
        let mut frames = self.frames.iter().rev();
        let column = match frames.next() {
            Some(Frame::Row { cells }) => cells.len(),
            _ => 0,
        };
        match frames.next() {
            Some(Frame::Table {
                alignments,
                in_head,
                ..
            }) => (*in_head, alignments.get(column).copied().flatten()),
            _ => (false, None),
        }
    }

    fn finish(mut self) -> Result<Vec<Block>, ParseError> {
        self.close_implicit_paragraph();
        match self.frames.pop() {
            Some(Frame::Root { blocks }) if self.frames.is_empty() => Ok(blocks),
            _ => Err(ParseError::Unbalanced("document")),
        }
    }
}

fn cell_align(alignment: Alignment) -> Option<CellAlign> {
    match alignment {
        Alignment::None => None,
        Alignment::Left => Some(CellAlign::Left),
        Alignment::Center => Some(CellAlign::Center),
        Alignment::Right => Some(CellAlign::Right),
    }
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
