//! Markdown engine for ticket evidence documents.
//!
//! Converts between Markdown text and a typed document tree, in both
//! directions. The dialect is CommonMark plus pipe tables, `{.class}`
//! attribute annotations, evidence-badge and footnote normalization, and a
//! frontmatter fence. Parsing is total: any input yields a tree. On top of
//! the two conversions sit a pure image-source resolver and offset-based
//! text editing for embedding hosts.

pub mod frontmatter;
pub mod parse;
pub mod position;
pub mod preprocess;
pub mod resolve;
pub mod serialize;
pub mod tree;

pub use frontmatter::{SplitDocument, split_frontmatter};
pub use parse::{PARSE_FAILURE_NOTICE, ParseOptions, parse_document, parse_document_with};
pub use position::{TextPosition, locate, replace_text_range};
pub use resolve::{ResolveContext, resolve_image_url, resolve_tree};
pub use serialize::serialize_document;
pub use tree::{
    Block, CellAlign, Doc, ImageAttrs, Inline, ListItem, Mark, Table, TableCell, TableRow,
};
