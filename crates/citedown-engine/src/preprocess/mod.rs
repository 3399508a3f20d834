//! Text normalization applied to the document body before tokenization.
//!
//! The rewrites are order-sensitive: inline `<img>` tags become Markdown
//! image syntax first, recognized badge divs become emphasized glyph text,
//! remaining HTML is stripped down to its inner text, and finally footnote
//! syntax is rewritten into ordinary list / bracket-citation syntax. The
//! output is plain Markdown with no residual HTML or footnote markers.

pub mod footnotes;
pub mod html;

/// Run the full preprocessing pipeline over a document body.
pub fn preprocess(body: &str) -> String {
    let step = html::rewrite_img_tags(body);
    let step = html::rewrite_badges(&step);
    let step = html::strip_tags(&step);
    footnotes::rewrite_footnotes(&step)
}
