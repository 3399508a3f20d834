//! Document tree to Markdown serialization.
//!
//! Walks the tree depth-first and emits one physical line at a time,
//! carrying container prefixes (`> `, list continuations) on a stack.
//! Serialization is total: schema-violating nodes degrade to empty output
//! instead of failing, so the whole-document result is always a string.

mod table;

use crate::tree::{Block, Doc, ImageAttrs, Inline, ListItem, Mark};
use regex::Regex;
use std::sync::OnceLock;

/// Serialize a document tree to Markdown text.
pub fn serialize_document(doc: &Doc) -> String {
    let mut writer = Writer::new();
    writer.write_blocks(&doc.content);
    writer.out
}

struct Writer {
    out: String,
    /// Continuation prefixes of the open containers, innermost last.
    prefixes: Vec<String>,
    /// Pending list marker for the next physical line.
    marker: Option<Marker>,
}

/// A list marker replaces the continuation prefixes at `from..to` on the
/// first line of its item. Markers of directly nested items merge, so
/// `- - inner` keeps every level's marker.
struct Marker {
    text: String,
    from: usize,
    to: usize,
}

impl Writer {
    fn new() -> Self {
        Writer {
            out: String::new(),
            prefixes: Vec::new(),
            marker: None,
        }
    }

    fn physical_line(&mut self, content: &str) {
        let start = self.out.len();
        match self.marker.take() {
            Some(marker) => {
                for prefix in &self.prefixes[..marker.from] {
                    self.out.push_str(prefix);
                }
                self.out.push_str(&marker.text);
                for prefix in &self.prefixes[marker.to..] {
                    self.out.push_str(prefix);
                }
            }
            None => {
                for prefix in &self.prefixes {
                    self.out.push_str(prefix);
                }
            }
        }
        self.out.push_str(content);
        if content.is_empty() {
            let trimmed = self.out[start..].trim_end().len();
            self.out.truncate(start + trimmed);
        }
        self.out.push('\n');
    }

    fn blank_line(&mut self) {
        self.physical_line("");
    }

    fn write_blocks(&mut self, blocks: &[Block]) {
        for (i, block) in blocks.iter().enumerate() {
            if i > 0 {
                self.blank_line();
            }
            self.write_block(block);
        }
    }

    fn write_block(&mut self, block: &Block) {
        match block {
            Block::Frontmatter { raw_yaml } => {
                self.physical_line("---");
                for line in non_empty_lines(raw_yaml) {
                    self.physical_line(line);
                }
                self.physical_line("---");
            }
            Block::Paragraph { class, content } => {
                let rendered = render_inlines(content, false);
                self.write_annotated_lines(&rendered, class.as_deref());
            }
            Block::Heading {
                level,
                class,
                content,
            } => {
                let level = (*level).clamp(1, 6) as usize;
                let rendered = render_inlines(content, false).replace('\n', " ");
                let mut line = "#".repeat(level);
                if !rendered.is_empty() {
                    line.push(' ');
                    line.push_str(&rendered);
                }
                if let Some(class) = class {
                    line.push(' ');
                    line.push_str(&class_suffix(class));
                }
                self.physical_line(&line);
            }
            Block::Blockquote { class, content } => {
                self.prefixes.push("> ".to_string());
                self.write_blocks(content);
                self.prefixes.pop();
                if let Some(class) = class {
                    self.blank_line();
                    self.physical_line(&class_suffix(class));
                }
            }
            Block::BulletList { items } => {
                self.write_list(items, |_| "- ".to_string());
            }
            Block::OrderedList { start, items } => {
                self.write_list(items, |i| format!("{}. ", start + i as u64));
            }
            Block::CodeBlock { language, text } => {
                let fence = if text.contains("```") { "````" } else { "```" };
                let mut opening = fence.to_string();
                if let Some(language) = language {
                    opening.push_str(language);
                }
                self.physical_line(&opening);
                for line in non_empty_lines(text) {
                    self.physical_line(line);
                }
                self.physical_line(fence);
            }
            // "***" rather than "---" so a rule at the top of a document
            // cannot be mistaken for a frontmatter fence when re-parsed.
            Block::HorizontalRule => self.physical_line("***"),
            Block::Table(inner) => {
                for line in table::render_table(inner) {
                    self.physical_line(&line);
                }
                if let Some(class) = &inner.class {
                    self.blank_line();
                    self.physical_line(&class_suffix(class));
                }
            }
        }
    }

    fn write_annotated_lines(&mut self, rendered: &str, class: Option<&str>) {
        let mut lines: Vec<String> = if rendered.is_empty() {
            Vec::new()
        } else {
            rendered.split('\n').map(escape_line_start).collect()
        };
        if let Some(class) = class {
            match lines.last_mut() {
                Some(last) => {
                    last.push(' ');
                    last.push_str(&class_suffix(class));
                }
                None => lines.push(class_suffix(class)),
            }
        }
        for line in &lines {
            self.physical_line(line);
        }
    }

    fn write_list(&mut self, items: &[ListItem], marker_for: impl Fn(usize) -> String) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.blank_line();
            }
            let marker = marker_for(i);
            self.prefixes.push(" ".repeat(marker.chars().count()));
            let to = self.prefixes.len();
            self.marker = Some(match self.marker.take() {
                Some(outer) => Marker {
                    text: format!("{}{marker}", outer.text),
                    from: outer.from,
                    to,
                },
                None => Marker {
                    text: marker,
                    from: to - 1,
                    to,
                },
            });
            if item.content.is_empty() {
                self.physical_line("");
            } else {
                self.write_blocks(&item.content);
            }
            self.marker = None;
            self.prefixes.pop();
        }
    }
}

fn non_empty_lines(text: &str) -> impl Iterator<Item = &str> {
    let trimmed = text.strip_suffix('\n').unwrap_or(text);
    trimmed.split('\n').filter(move |_| !trimmed.is_empty())
}

/// `{.a .b}` suffix from a space-joined class attribute.
fn class_suffix(class: &str) -> String {
    let tokens: Vec<String> = class
        .split_whitespace()
        .map(|token| format!(".{token}"))
        .collect();
    format!("{{{}}}", tokens.join(" "))
}

/// Escape a rendered paragraph line whose first characters would otherwise
/// open a block construct on re-parse.
fn escape_line_start(line: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^(?:#{1,6}(?:\s|$)|[-+]\s|\d{1,9}[.)]\s|>|[-=]+\s*$)")
            .expect("Invalid line-start regex")
    });
    if re.is_match(line) {
        format!("\\{line}")
    } else {
        line.to_string()
    }
}

/// Render inline content to Markdown. In cell mode newlines collapse to
/// spaces and `|` is escaped so the output stays a single table row.
pub(crate) fn render_inlines(content: &[Inline], cell_mode: bool) -> String {
    let mut renderer = InlineRenderer {
        out: String::new(),
        active: Vec::new(),
        cell_mode,
    };
    for inline in content {
        match inline {
            Inline::Text { text, marks } => {
                let mut desired = marks.clone();
                desired.sort_by_key(Mark::rank);
                renderer.transition(&desired);
                let raw = desired.iter().any(|m| matches!(m, Mark::Code));
                renderer.push_text(text, raw);
            }
            Inline::Image(attrs) => {
                renderer.transition(&[]);
                renderer.push_image(attrs);
            }
        }
    }
    renderer.transition(&[]);
    renderer.out
}

struct InlineRenderer {
    out: String,
    active: Vec<Mark>,
    cell_mode: bool,
}

impl InlineRenderer {
    /// Close and open marks to move from the active set to `desired`,
    /// keeping the shared prefix untouched.
    fn transition(&mut self, desired: &[Mark]) {
        let keep = self
            .active
            .iter()
            .zip(desired)
            .take_while(|(a, d)| a == d)
            .count();
        for mark in self.active.split_off(keep).iter().rev() {
            self.close_mark(mark);
        }
        for mark in &desired[keep..] {
            self.open_mark(mark);
            self.active.push(mark.clone());
        }
    }

    fn open_mark(&mut self, mark: &Mark) {
        match mark {
            Mark::Link { .. } => self.out.push('['),
            Mark::Strong => self.out.push_str("**"),
            Mark::Em => self.out.push('*'),
            Mark::Code => self.out.push('`'),
            // The span annotation trails its text run.
            Mark::Span { .. } => {}
        }
    }

    fn close_mark(&mut self, mark: &Mark) {
        match mark {
            Mark::Link { href, title } => {
                self.out.push_str("](");
                self.out.push_str(&escape_url(href));
                if let Some(title) = title {
                    self.out.push_str(" \"");
                    self.out.push_str(&title.replace('"', "\\\""));
                    self.out.push('"');
                }
                self.out.push(')');
            }
            Mark::Strong => self.out.push_str("**"),
            Mark::Em => self.out.push('*'),
            Mark::Code => self.out.push('`'),
            Mark::Span { class } => self.out.push_str(&class_suffix(class)),
        }
    }

    fn push_text(&mut self, text: &str, raw: bool) {
        for c in text.chars() {
            match c {
                '\n' if self.cell_mode => self.out.push(' '),
                '|' if self.cell_mode => self.out.push_str("\\|"),
                '\\' | '*' | '_' | '[' | ']' | '`' if !raw => {
                    self.out.push('\\');
                    self.out.push(c);
                }
                _ => self.out.push(c),
            }
        }
    }

    fn push_image(&mut self, attrs: &ImageAttrs) {
        self.out.push_str("![");
        self.push_text(attrs.alt.as_deref().unwrap_or(""), false);
        self.out.push_str("](");
        self.out.push_str(&escape_url(&attrs.src));
        if let Some(title) = &attrs.title {
            self.out.push_str(" \"");
            self.out.push_str(&title.replace('"', "\\\""));
            self.out.push('"');
        }
        self.out.push(')');
        if let Some(annotation) = image_annotation(attrs) {
            self.out.push_str(&annotation);
        }
    }
}

/// `{.class width=.. height=.. max-width=.. align=..}` suffix for extended
/// image attributes, `None` when the image carries none.
fn image_annotation(attrs: &ImageAttrs) -> Option<String> {
    let mut tokens: Vec<String> = Vec::new();
    if let Some(class) = &attrs.class {
        tokens.extend(class.split_whitespace().map(|c| format!(".{c}")));
    }
    for (key, value) in [
        ("width", attrs.width),
        ("height", attrs.height),
        ("max-width", attrs.max_width),
    ] {
        if let Some(value) = value {
            tokens.push(format!("{key}={}", format_number(value)));
        }
    }
    if let Some(align) = &attrs.align {
        tokens.push(format!("align={align}"));
    }
    if tokens.is_empty() {
        None
    } else {
        Some(format!("{{{}}}", tokens.join(" ")))
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn escape_url(url: &str) -> String {
    url.replace(' ', "%20")
        .replace('(', "%28")
        .replace(')', "%29")
}
