//! Splits a leading `---` frontmatter block from the document body.

/// Result of splitting raw input into frontmatter payload and body.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitDocument<'a> {
    /// Text between the `---` fences, fences and their newlines excluded.
    pub frontmatter: Option<&'a str>,
    /// Everything after the closing fence (or the whole input).
    pub body: &'a str,
}

/// Detect and extract a leading frontmatter block.
///
/// The input carries frontmatter only when it starts with `---\n` and a line
/// that is exactly `---` follows. Without a closing fence the whole input is
/// body text.
pub fn split_frontmatter(input: &str) -> SplitDocument<'_> {
    if let Some(rest) = input.strip_prefix("---\n") {
        // Closing fence right after the opening one: empty payload.
        if let Some(body) = rest.strip_prefix("---\n").or(match rest {
            "---" => Some(""),
            _ => None,
        }) {
            return SplitDocument {
                frontmatter: Some(""),
                body,
            };
        }
        if let Some(end) = find_closing_fence(rest) {
            return SplitDocument {
                frontmatter: Some(&rest[..end]),
                body: rest.get(end + "\n---\n".len()..).unwrap_or(""),
            };
        }
    }
    SplitDocument {
        frontmatter: None,
        body: input,
    }
}

/// Offset in `rest` (text after the opening fence) of the `\n` that starts
/// the closing `\n---\n` sequence. A final `---` with no trailing newline
/// also closes the block.
fn find_closing_fence(rest: &str) -> Option<usize> {
    if let Some(pos) = rest.find("\n---\n") {
        return Some(pos);
    }
    // Closing fence at end of input without a trailing newline
    if let Some(stripped) = rest.strip_suffix("\n---") {
        return Some(stripped.len());
    }
    None
}
