//! Link span resolution for markdown editors
//!
//! Tokenizers often classify only a fragment of a URL as a link (they split
//! on punctuation inside it). Given the line the token sits on, this crate
//! re-expands the fragment to the surrounding URL and normalizes it:
//!
//! - `see (https://example.com/a,b) now` with the token `https://example.com/a`
//!   resolves to `https://example.com/a,b`
//! - `www.example.com` resolves to `https://www.example.com`
//!
//! Expansion stops only at whitespace and brackets, so sentence punctuation
//! glued to a URL (`example.com.`) is kept.

use serde::{Deserialize, Serialize};

/// Characters that end a link span.
pub const DELIMITERS: [char; 9] = [' ', '\t', '\n', '(', ')', '[', ']', '<', '>'];

/// Scheme prepended to spans that don't already start with `http`.
const DEFAULT_SCHEME: &str = "https://";

/// A resolved link inside a single line.
///
/// Offsets are character offsets into the line (not bytes), matching how
/// editors report token positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSpan {
    /// First character of the expanded span
    pub start: usize,
    /// One past the last character of the expanded span
    pub end: usize,
    /// The span text, prefixed with `https://` if it had no `http` prefix
    pub url: String,
}

/// Returns true if `c` terminates a link span.
pub fn is_delimiter(c: char) -> bool {
    DELIMITERS.contains(&c)
}

/// Returns true if a tokenizer's type string marks the token as a link.
///
/// Token types can be compound (`"link string"`), so each class is checked.
pub fn is_link_kind(kind: &str) -> bool {
    kind.split_whitespace()
        .any(|class| class.contains("link") || class == "url")
}

/// Expand a link token to the full span around it.
///
/// Returns `None` when the token isn't a link or the span is empty.
/// Offsets past the end of the line are clamped.
pub fn find_link_span(
    line: &str,
    token_start: usize,
    token_end: usize,
    kind: Option<&str>,
) -> Option<LinkSpan> {
    if !kind.is_some_and(is_link_kind) {
        return None;
    }

    let chars: Vec<char> = line.chars().collect();
    let len = chars.len();

    let (mut start, mut end) = if token_start <= token_end {
        (token_start, token_end)
    } else {
        (token_end, token_start)
    };
    start = start.min(len);
    end = end.min(len);

    while start > 0 && !is_delimiter(chars[start - 1]) {
        start -= 1;
    }
    while end < len && !is_delimiter(chars[end]) {
        end += 1;
    }

    if start == end {
        return None;
    }

    let text: String = chars[start..end].iter().collect();
    Some(LinkSpan {
        start,
        end,
        url: normalize_url(&text),
    })
}

/// Expand a link token and return only the normalized URL.
pub fn resolve_link(
    line: &str,
    token_start: usize,
    token_end: usize,
    kind: Option<&str>,
) -> Option<String> {
    find_link_span(line, token_start, token_end, kind).map(|span| span.url)
}

/// Prefix `https://` unless the text already starts with `http`.
pub fn normalize_url(text: &str) -> String {
    if text.starts_with("http") {
        text.to_string()
    } else {
        format!("{}{}", DEFAULT_SCHEME, text)
    }
}
