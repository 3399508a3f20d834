//! Typed document tree shared by the parser, serializer and editing surface.
//!
//! The tree is a plain value type: parsing builds a fresh tree, edits build
//! new trees, and nothing here holds references back into source text. The
//! serde representation is the JSON structural form used for persistence and
//! transport (`{"type": "paragraph", ...}` tagged maps).

use serde::{Deserialize, Serialize};

/// A parsed document: ordered block content, at most one leading frontmatter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Doc {
    pub content: Vec<Block>,
}

/// A block-level node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Verbatim YAML payload between the `---` fences, fences excluded.
    Frontmatter {
        #[serde(rename = "rawYaml")]
        raw_yaml: String,
    },
    Paragraph {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        class: Option<String>,
        content: Vec<Inline>,
    },
    Heading {
        level: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        class: Option<String>,
        content: Vec<Inline>,
    },
    Blockquote {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        class: Option<String>,
        content: Vec<Block>,
    },
    BulletList {
        items: Vec<ListItem>,
    },
    OrderedList {
        start: u64,
        items: Vec<ListItem>,
    },
    CodeBlock {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        text: String,
    },
    HorizontalRule,
    Table(Table),
}

/// One list item; items hold block content so lists nest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    pub content: Vec<Block>,
}

/// A table: optional header row plus one or more body rows.
///
/// The column count is fixed by the first row; the serializer pads or
/// truncates later rows to it rather than this type enforcing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<TableRow>,
    pub body: Vec<TableRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    /// True for `table_header` cells, false for ordinary `table_cell`s.
    #[serde(default)]
    pub header: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<CellAlign>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub content: Vec<Inline>,
}

impl TableCell {
    pub fn text(content: Vec<Inline>) -> Self {
        TableCell {
            header: false,
            align: None,
            class: None,
            content,
        }
    }
}

/// Per-cell horizontal alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellAlign {
    Left,
    Right,
    Center,
}

/// Inline content: text runs decorated with marks, plus atomic images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inline {
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        marks: Vec<Mark>,
    },
    Image(ImageAttrs),
}

impl Inline {
    pub fn text(text: impl Into<String>) -> Self {
        Inline::Text {
            text: text.into(),
            marks: Vec::new(),
        }
    }

    pub fn marked(text: impl Into<String>, marks: Vec<Mark>) -> Self {
        Inline::Text {
            text: text.into(),
            marks,
        }
    }
}

/// Attributes of an atomic inline image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAttrs {
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(rename = "maxWidth", default, skip_serializing_if = "Option::is_none")]
    pub max_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
}

impl ImageAttrs {
    pub fn new(src: impl Into<String>) -> Self {
        ImageAttrs {
            src: src.into(),
            alt: None,
            title: None,
            width: None,
            height: None,
            max_width: None,
            align: None,
            class: None,
        }
    }
}

/// A mark applied to a run of text. Marks form a set per run and may overlap
/// freely; they are not nested wrapper nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Mark {
    Em,
    Strong,
    Code,
    Link {
        href: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    Span {
        class: String,
    },
}

impl Mark {
    /// Fixed open/close priority so serialization is deterministic: lower
    /// ranks open first (outermost). Span closes with its `{.class}` suffix,
    /// so it sits innermost next to the text it annotates.
    pub fn rank(&self) -> u8 {
        match self {
            Mark::Link { .. } => 0,
            Mark::Strong => 1,
            Mark::Em => 2,
            Mark::Code => 3,
            Mark::Span { .. } => 4,
        }
    }
}

impl Doc {
    pub fn new(content: Vec<Block>) -> Self {
        Doc { content }
    }

    /// The frontmatter payload, when the document carries one.
    pub fn frontmatter(&self) -> Option<&str> {
        match self.content.first() {
            Some(Block::Frontmatter { raw_yaml }) => Some(raw_yaml),
            _ => None,
        }
    }

    /// Plain-text projection of the document.
    ///
    /// Every text-bearing leaf (paragraph, heading, code block, table cell)
    /// contributes one entry, joined by single newlines. Atomic nodes
    /// (frontmatter, rules, images) contribute nothing. Highlight and
    /// replacement ranges supplied by the host are offsets into this string.
    pub fn text_content(&self) -> String {
        let mut lines = Vec::new();
        collect_text(&self.content, &mut lines);
        lines.join("\n")
    }

    /// Serialize the tree to its JSON structural form.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Rebuild a tree from its JSON structural form.
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// Concatenated text of an inline sequence. Images contribute nothing.
pub fn inline_text(content: &[Inline]) -> String {
    let mut out = String::new();
    for inline in content {
        if let Inline::Text { text, .. } = inline {
            out.push_str(text);
        }
    }
    out
}

fn collect_text(blocks: &[Block], lines: &mut Vec<String>) {
    for block in blocks {
        match block {
            Block::Frontmatter { .. } | Block::HorizontalRule => {}
            Block::Paragraph { content, .. } | Block::Heading { content, .. } => {
                lines.push(inline_text(content));
            }
            Block::Blockquote { content, .. } => collect_text(content, lines),
            Block::BulletList { items } | Block::OrderedList { items, .. } => {
                for item in items {
                    collect_text(&item.content, lines);
                }
            }
            Block::CodeBlock { text, .. } => lines.push(text.trim_end_matches('\n').to_string()),
            Block::Table(table) => {
                for row in table.head.iter().chain(table.body.iter()) {
                    for cell in &row.cells {
                        lines.push(inline_text(&cell.content));
                    }
                }
            }
        }
    }
}
