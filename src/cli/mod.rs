//! Terminal subcommands other than `serve`.

pub mod doctor;
pub mod projects;
pub mod reconcile;
pub mod search;

/// Shorten text for single-line terminal output, respecting char boundaries.
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    match flat.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}
