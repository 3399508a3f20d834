//! Image source resolution against a ticket's artifact store.
//!
//! Relative image paths in ticket documents refer to files attached to the
//! ticket. Resolution rewrites them to the file-bytes endpoint; absolute
//! URLs and data URIs pass through untouched. The resolver is pure: it
//! performs no I/O and never fails.

use crate::tree::{Block, Doc, Inline, ListItem, Table};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Everything the resolver needs to know about its surroundings. All
/// fields are optional; with no ticket id resolution is the identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveContext {
    pub ticket_id: Option<String>,
    /// Base URL for the API, `/api` when unset.
    pub api_base_url: Option<String>,
    /// Bearer token appended as a query parameter, for consumers that
    /// cannot attach headers to image fetches.
    pub access_token: Option<String>,
}

/// The characters `encodeURIComponent` leaves unescaped, minus
/// alphanumerics which `NON_ALPHANUMERIC` already excludes.
const FILE_PATH_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'!')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Resolve a single image source. Already-absolute sources and data URIs
/// come back unchanged, as does anything when no ticket id is available.
pub fn resolve_image_url(src: &str, ctx: &ResolveContext) -> String {
    if src.is_empty()
        || src.starts_with("http://")
        || src.starts_with("https://")
        || src.starts_with("data:")
    {
        return src.to_string();
    }
    let Some(ticket_id) = ctx.ticket_id.as_deref() else {
        return src.to_string();
    };
    let mut path = src;
    loop {
        if let Some(rest) = path.strip_prefix("./") {
            path = rest;
        } else if let Some(rest) = path.strip_prefix("../") {
            path = rest;
        } else if let Some(rest) = path.strip_prefix('/') {
            path = rest;
        } else {
            break;
        }
    }
    let base = ctx.api_base_url.as_deref().unwrap_or("/api");
    let base = base.strip_suffix('/').unwrap_or(base);
    let encoded = utf8_percent_encode(path, FILE_PATH_SET);
    let mut url = format!("{base}/tickets/{ticket_id}/pr/file-bytes?file_path={encoded}");
    if let Some(token) = ctx.access_token.as_deref() {
        url.push_str("&token=");
        url.push_str(&utf8_percent_encode(token, FILE_PATH_SET).to_string());
    }
    url
}

/// Rewrite every image source in a document tree, returning a new tree.
pub fn resolve_tree(doc: &Doc, ctx: &ResolveContext) -> Doc {
    Doc::new(doc.content.iter().map(|b| resolve_block(b, ctx)).collect())
}

fn resolve_block(block: &Block, ctx: &ResolveContext) -> Block {
    match block {
        Block::Paragraph { class, content } => Block::Paragraph {
            class: class.clone(),
            content: resolve_inlines(content, ctx),
        },
        Block::Heading {
            level,
            class,
            content,
        } => Block::Heading {
            level: *level,
            class: class.clone(),
            content: resolve_inlines(content, ctx),
        },
        Block::Blockquote { class, content } => Block::Blockquote {
            class: class.clone(),
            content: content.iter().map(|b| resolve_block(b, ctx)).collect(),
        },
        Block::BulletList { items } => Block::BulletList {
            items: resolve_items(items, ctx),
        },
        Block::OrderedList { start, items } => Block::OrderedList {
            start: *start,
            items: resolve_items(items, ctx),
        },
        Block::Table(table) => Block::Table(Table {
            class: table.class.clone(),
            head: table.head.as_ref().map(|row| {
                let mut row = row.clone();
                for cell in &mut row.cells {
                    cell.content = resolve_inlines(&cell.content, ctx);
                }
                row
            }),
            body: table
                .body
                .iter()
                .map(|row| {
                    let mut row = row.clone();
                    for cell in &mut row.cells {
                        cell.content = resolve_inlines(&cell.content, ctx);
                    }
                    row
                })
                .collect(),
        }),
        other => other.clone(),
    }
}

fn resolve_items(items: &[ListItem], ctx: &ResolveContext) -> Vec<ListItem> {
    items
        .iter()
        .map(|item| ListItem {
            content: item.content.iter().map(|b| resolve_block(b, ctx)).collect(),
        })
        .collect()
}

fn resolve_inlines(content: &[Inline], ctx: &ResolveContext) -> Vec<Inline> {
    content
        .iter()
        .map(|inline| match inline {
            Inline::Image(attrs) => {
                let mut attrs = attrs.clone();
                attrs.src = resolve_image_url(&attrs.src, ctx);
                Inline::Image(attrs)
            }
            text => text.clone(),
        })
        .collect()
}
