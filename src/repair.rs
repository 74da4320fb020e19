//! Repair heuristics for malformed `pos`/`end` fields (§4.8, repair half).
//!
//! Tolerates a common failure mode: the model echoes an entire JSON- or
//! Python-dict-shaped edit record into the `pos` string instead of
//! emitting `lines`/`end` as separate fields.

use std::sync::LazyLock;

use regex::Regex;

use crate::edit::{Lines, OpKind, RawEdit};

static ANCHOR_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+#[A-Za-z]{2,16})(.*)$").unwrap());
static LINES_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)"lines"\s*:\s*(\[.*?\]|"(?:[^"\\]|\\.)*"|null)"#).unwrap());
static LINES_QUERY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[?&]lines=([^&]*)").unwrap());
static END_KEY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""end"\s*:\s*"([^"]*)""#).unwrap());

const CLOSING_GARBAGE: [&str; 5] = ["</", "<", "'}]", "}", "]"];

fn looks_like_closing_garbage(trailing: &str) -> bool {
    let t = trailing.trim_start();
    CLOSING_GARBAGE.iter().any(|p| t.starts_with(p))
}

/// If `raw` looks like `"{anchor}{trailing garbage}"`, split it. Returns
/// `None` when the anchor is already clean (nothing to repair).
fn split_anchor_prefix(raw: &str) -> Option<(String, String)> {
    let caps = ANCHOR_PREFIX_RE.captures(raw)?;
    let rest = caps[2].to_string();
    if rest.is_empty() {
        return None;
    }
    Some((caps[1].to_string(), rest))
}

/// Try to pull a `lines` value out of trailing garbage after an anchor.
/// Handles an embedded `"lines": <json>` (tolerating single-quoted
/// Python-dict style by normalizing quotes first), a `?lines=...`/
/// `&lines=...` query tail, and finally a plain-text fallback.
fn extract_lines_value(rest: &str) -> Option<Lines> {
    let normalized = rest.replace('\'', "\"");
    if let Some(caps) = LINES_KEY_RE.captures(&normalized) {
        let raw = &caps[1];
        if raw == "null" {
            return Some(Lines::Empty);
        }
        if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(raw) {
            return match parsed {
                serde_json::Value::String(s) => Some(Lines::Single(s)),
                serde_json::Value::Array(items) => {
                    let strs: Option<Vec<String>> =
                        items.into_iter().map(|v| v.as_str().map(str::to_string)).collect();
                    strs.map(|v| if v.is_empty() { Lines::Empty } else { Lines::Many(v) })
                }
                serde_json::Value::Null => Some(Lines::Empty),
                _ => None,
            };
        }
        return None;
    }

    if let Some(caps) = LINES_QUERY_RE.captures(rest) {
        return Some(Lines::Single(caps[1].replace('+', " ")));
    }

    let trimmed = rest
        .trim_start_matches(|c: char| matches!(c, '|' | '=' | '%' | ':' | ',' | ';' | '\'' | '"'))
        .trim();
    if trimmed.is_empty() || looks_like_closing_garbage(trimmed) {
        return None;
    }
    Some(Lines::Single(trimmed.to_string()))
}

fn extract_end_value(rest: &str) -> Option<String> {
    let normalized = rest.replace('\'', "\"");
    END_KEY_RE.captures(&normalized).map(|c| c[1].to_string())
}

/// Repair a raw edit's `pos`/`end` fields before anchor parsing. Only
/// applies to `Replace` edits. Returns one warning string per repair step
/// applied; repairs never fail the edit outright, they only record what
/// they did.
pub fn repair_raw_edit(edit: &mut RawEdit) -> Vec<String> {
    let mut warnings = Vec::new();

    if edit.op != OpKind::Replace {
        return warnings;
    }

    if let Some(pos) = edit.pos.clone() {
        if let Some((anchor, rest)) = split_anchor_prefix(&pos) {
            edit.pos = Some(anchor);
            warnings.push(format!("Auto-repaired malformed 'pos' field: {pos:?}"));

            if edit.lines.is_absent() {
                if let Some(lines) = extract_lines_value(&rest) {
                    edit.lines = lines;
                    warnings.push("Auto-repaired: extracted 'lines' embedded in 'pos'".to_string());
                }
            }

            // Asymmetric by design: only an embedded `end` anchor is ever
            // extracted from `pos`, never `lines` extracted from `end`.
            if edit.end.is_none() {
                if let Some(end) = extract_end_value(&rest) {
                    edit.end = Some(end);
                    warnings.push("Auto-repaired: extracted 'end' embedded in 'pos'".to_string());
                }
            }
        }
    }

    if let Some(end) = edit.end.clone() {
        if let Some((anchor, _rest)) = split_anchor_prefix(&end) {
            edit.end = Some(anchor);
            warnings.push(format!("Auto-repaired malformed 'end' field: {end:?}"));
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::parse_raw_edit;
    use serde_json::json;

    #[test]
    fn repairs_embedded_python_dict_lines() {
        let mut edit = parse_raw_edit(&json!({
            "op": "replace",
            "pos": "2#ZZ', 'lines': ['REPLACED']}",
        }))
        .unwrap();
        assert!(edit.lines.is_absent());

        let warnings = repair_raw_edit(&mut edit);
        assert_eq!(edit.pos.as_deref(), Some("2#ZZ"));
        assert_eq!(edit.lines, Lines::Many(vec!["REPLACED".to_string()]));
        assert!(!warnings.is_empty());
    }

    #[test]
    fn repairs_embedded_json_lines_array() {
        let mut edit = parse_raw_edit(&json!({
            "op": "replace",
            "pos": r#"2#ZZ", "lines": ["a", "b"]}"#,
        }))
        .unwrap();
        repair_raw_edit(&mut edit);
        assert_eq!(edit.lines, Lines::Many(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn repairs_query_style_lines_tail() {
        let mut edit = parse_raw_edit(&json!({
            "op": "replace",
            "pos": "2#ZZ?lines=hello+world",
        }))
        .unwrap();
        repair_raw_edit(&mut edit);
        assert_eq!(edit.lines, Lines::Single("hello world".to_string()));
    }

    #[test]
    fn extracts_embedded_end_anchor() {
        let mut edit = parse_raw_edit(&json!({
            "op": "replace",
            "pos": r#"2#ZZ", "end": "5#PP"}"#,
            "lines": ["x"],
        }))
        .unwrap();
        repair_raw_edit(&mut edit);
        assert_eq!(edit.pos.as_deref(), Some("2#ZZ"));
        assert_eq!(edit.end.as_deref(), Some("5#PP"));
    }

    #[test]
    fn refuses_to_guess_lines_from_closing_garbage() {
        let mut edit = parse_raw_edit(&json!({
            "op": "replace",
            "pos": "2#ZZ</div>",
        }))
        .unwrap();
        repair_raw_edit(&mut edit);
        assert_eq!(edit.pos.as_deref(), Some("2#ZZ"));
        assert!(edit.lines.is_absent());
    }

    #[test]
    fn plain_trailing_text_becomes_single_replacement_line() {
        let mut edit = parse_raw_edit(&json!({
            "op": "replace",
            "pos": "2#ZZ|bravo content",
        }))
        .unwrap();
        repair_raw_edit(&mut edit);
        assert_eq!(edit.pos.as_deref(), Some("2#ZZ"));
        assert_eq!(edit.lines, Lines::Single("bravo content".to_string()));
    }

    #[test]
    fn clean_anchor_is_left_untouched() {
        let mut edit = parse_raw_edit(&json!({
            "op": "replace",
            "pos": "2#ZZ",
            "lines": ["x"],
        }))
        .unwrap();
        let warnings = repair_raw_edit(&mut edit);
        assert!(warnings.is_empty());
        assert_eq!(edit.pos.as_deref(), Some("2#ZZ"));
    }

    #[test]
    fn non_replace_ops_are_never_repaired() {
        let mut edit = parse_raw_edit(&json!({
            "op": "append",
            "pos": "2#ZZ', garbage",
            "lines": ["x"],
        }))
        .unwrap();
        let warnings = repair_raw_edit(&mut edit);
        assert!(warnings.is_empty());
        assert_eq!(edit.pos.as_deref(), Some("2#ZZ', garbage"));
    }
}
