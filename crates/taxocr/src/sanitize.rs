//! Helpers for keeping log and span fields free of client data.
//!
//! Upload paths carry case and client directory names; model output and OCR
//! text carry tax figures. Only short, bounded forms go into logs.

use std::path::Path;

/// Returns only the filename component of a path.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// The first `max_chars` characters of `text`, cut on a char boundary.
pub fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}
