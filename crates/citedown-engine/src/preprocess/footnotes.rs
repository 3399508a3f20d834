//! Footnote syntax normalization.
//!
//! Footnote definitions become ordinary list items (numbered for all-digit
//! labels, `- [label]` bullets otherwise) and inline references become
//! bracket citations, so the downstream tokenizer never sees footnote
//! syntax.

use regex::Regex;
use std::sync::OnceLock;

fn definition_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\[\^([^\]\s]+)\]:\s*(.*)$").expect("Invalid footnote definition regex")
    })
}

fn reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\^([^\]\s]+)\]").expect("Invalid footnote reference regex"))
}

/// Rewrite footnote definitions and references into list / citation syntax.
pub fn rewrite_footnotes(input: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    // Inside a footnote-derived list item: indented lines fold in as
    // continuations until a non-indented, non-blank line ends the item.
    let mut in_footnote = false;

    for line in input.lines() {
        if let Some(caps) = definition_regex().captures(line) {
            let label = &caps[1];
            let content = rewrite_references(&caps[2]);
            // Separate from preceding prose so the item starts a list
            // instead of continuing a paragraph. Consecutive definitions
            // stay one list.
            if !in_footnote && out.last().is_some_and(|prev| !prev.trim().is_empty()) {
                out.push(String::new());
            }
            if label.chars().all(|c| c.is_ascii_digit()) {
                out.push(format!("{label}. {content}"));
            } else {
                out.push(format!("- [{label}] {content}"));
            }
            in_footnote = true;
            continue;
        }

        if in_footnote {
            if line.trim().is_empty() {
                out.push(String::new());
                continue;
            }
            if line.starts_with('\t') || line.starts_with("    ") {
                out.push(format!("   {}", rewrite_references(line.trim_start())));
                continue;
            }
            in_footnote = false;
        }

        out.push(rewrite_references(line));
    }

    let mut result = out.join("\n");
    if input.ends_with('\n') {
        result.push('\n');
    }
    result
}

/// Rewrite inline `[^label]` references (not immediately followed by `:`)
/// into `[label]` bracket citations.
fn rewrite_references(line: &str) -> String {
    let mut result = String::with_capacity(line.len());
    let mut last = 0;
    for caps in reference_regex().captures_iter(line) {
        let m = caps.get(0).expect("capture 0 always present");
        // A trailing colon marks a definition, which is handled line-wise.
        if line[m.end()..].starts_with(':') {
            continue;
        }
        result.push_str(&line[last..m.start()]);
        result.push('[');
        result.push_str(&caps[1]);
        result.push(']');
        last = m.end();
    }
    result.push_str(&line[last..]);
    result
}
