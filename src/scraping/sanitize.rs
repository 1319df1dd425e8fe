//! Rendered markup → normalized plain text.

use regex::Regex;
use scraper::{Html, Node};
use std::sync::OnceLock;
use tracing::warn;

/// Element subtrees that never carry page content worth sending to the model.
pub const STRIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "header", "footer", "nav", "aside", "noscript",
];

static WHITESPACE_RUN: OnceLock<Regex> = OnceLock::new();

fn whitespace_run() -> &'static Regex {
    WHITESPACE_RUN.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace pattern"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    pub text: String,
    pub truncated: bool,
}

/// Strip non-content elements, flatten to single-spaced text, and cap the
/// result at `max_bytes` UTF-8 bytes.
pub fn sanitize(html: &str, max_bytes: usize) -> Sanitized {
    let mut text = extract_text(html);
    let original_len = text.len();
    let truncated = truncate_to_bytes(&mut text, max_bytes);
    if truncated {
        warn!(
            "Extracted text is large ({:.2} MB), truncated to {} bytes",
            original_len as f64 / (1024.0 * 1024.0),
            text.len()
        );
    }
    Sanitized { text, truncated }
}

/// Text of every node outside [`STRIPPED_ELEMENTS`], in document order,
/// whitespace-normalized. Includes `<title>`.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts: Vec<&str> = Vec::new();

    // Explicit stack instead of recursion: rendered DOMs can nest deeply.
    let mut stack = vec![*document.root_element()];
    while let Some(node) = stack.pop() {
        match node.value() {
            Node::Text(text) => {
                parts.push(text);
                continue;
            }
            Node::Element(el) if STRIPPED_ELEMENTS.contains(&el.name()) => continue,
            _ => {}
        }
        stack.extend(node.children().rev());
    }

    normalize_whitespace(&parts.join(" "))
}

/// Collapse every whitespace run (spaces, tabs, newlines, NBSP) to one space.
pub fn normalize_whitespace(text: &str) -> String {
    whitespace_run().replace_all(text, " ").trim().to_string()
}

/// Cut `text` to at most `max_bytes` bytes. The cut lands on the nearest
/// character boundary at or below the limit, so a multi-byte character that
/// straddles the limit is dropped whole. Returns whether anything was removed.
pub fn truncate_to_bytes(text: &mut String, max_bytes: usize) -> bool {
    if text.len() <= max_bytes {
        return false;
    }
    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
    true
}
