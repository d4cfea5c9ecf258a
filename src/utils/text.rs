//! Text helpers that respect grapheme boundaries.

use unicode_segmentation::UnicodeSegmentation;

/// First `max` graphemes of `text`, borrowed.
pub fn prefix(text: &str, max: usize) -> &str {
    match text.grapheme_indices(true).nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Shorten `text` to `max` graphemes, appending `...` when cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    let head = prefix(text, max);
    if head.len() < text.len() {
        format!("{head}...")
    } else {
        head.to_string()
    }
}

/// Cap document content at `max` graphemes, appending a visible note.
pub fn truncate_content(text: &str, max: usize) -> String {
    let head = prefix(text, max);
    if head.len() < text.len() {
        format!("{head}\n\n[Content truncated]")
    } else {
        text.to_string()
    }
}
