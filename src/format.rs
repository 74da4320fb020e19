//! Hashline record formatting: `{line_number}#{hash_id}|{content}`.

use crate::hash::compute_line_hash;

/// Format a single hashline record.
pub fn format_record(line_number: usize, content: &str) -> String {
    format!(
        "{}#{}|{}",
        line_number,
        compute_line_hash(line_number, content),
        content
    )
}

/// Format the whole of `content` as hashline records, one per line,
/// starting at `start_line`.
///
/// Mirrors the line-counting rule applied everywhere else in the engine:
/// an empty `content` yields no lines; a trailing `\n` yields one final
/// empty-content record (so counts always match what a reader would see
/// when the file is opened as lines).
pub fn format_hashlines(content: &str, start_line: usize) -> String {
    if content.is_empty() {
        return String::new();
    }
    let lines: Vec<&str> = content.split('\n').collect();
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| format_record(start_line + i, line))
        .collect::<Vec<_>>()
        .join("\n")
}
