//! Edit algebra: wire-level parsing of edit records, the `Lines` sum type,
//! and the normalization heuristics that absorb common model mangling
//! before an edit ever touches the anchor validator.

pub mod apply;
pub mod order;

use crate::anchor::Anchor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Replace,
    Append,
    Prepend,
}

impl OpKind {
    /// Sort precedence within a shared target line: `Replace < Append < Prepend`.
    fn precedence(self) -> u8 {
        match self {
            OpKind::Replace => 0,
            OpKind::Append => 1,
            OpKind::Prepend => 2,
        }
    }
}

/// The `lines` field's dynamic shape, modeled as a sum type instead of the
/// `string | string[] | null | undefined` union it arrives as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lines {
    Empty,
    Single(String),
    Many(Vec<String>),
    Absent,
}

impl Lines {
    pub fn is_absent(&self) -> bool {
        matches!(self, Lines::Absent)
    }

    /// Collapse to a flat line vector. `Single` is split on `\n`; `Empty`
    /// and `Absent` both yield no lines (callers distinguish "absent is an
    /// error for replace" before reaching this point).
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Lines::Empty | Lines::Absent => Vec::new(),
            Lines::Single(s) => s.split('\n').map(str::to_string).collect(),
            Lines::Many(v) => v,
        }
    }
}

/// An edit as received over the wire, before anchors are parsed.
#[derive(Debug, Clone)]
pub struct RawEdit {
    pub op: OpKind,
    pub pos: Option<String>,
    pub end: Option<String>,
    pub lines: Lines,
}

/// Parse one wire-format edit record out of a JSON value.
///
/// Uses manual field access rather than a derived `Deserialize` so that a
/// present-but-null `lines` and an altogether missing `lines` key are
/// distinguishable — `serde`'s `Option` collapses that distinction.
pub fn parse_raw_edit(value: &serde_json::Value) -> Result<RawEdit, String> {
    let op_str = value
        .get("op")
        .and_then(|v| v.as_str())
        .ok_or_else(|| "edit is missing required 'op' field".to_string())?;
    let op = match op_str {
        "replace" => OpKind::Replace,
        "append" => OpKind::Append,
        "prepend" => OpKind::Prepend,
        other => {
            return Err(format!(
                "unknown op {other:?}, expected \"replace\", \"append\", or \"prepend\""
            ));
        }
    };

    let pos = value
        .get("pos")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string());
    let end = value
        .get("end")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string());
    // `end` is only meaningful for replace.
    let end = if matches!(op, OpKind::Replace) { end } else { None };

    let lines = match value.get("lines") {
        None => Lines::Absent,
        Some(serde_json::Value::Null) => Lines::Empty,
        Some(serde_json::Value::String(s)) => Lines::Single(s.clone()),
        Some(serde_json::Value::Array(arr)) => {
            if arr.is_empty() {
                Lines::Empty
            } else {
                let mut out = Vec::with_capacity(arr.len());
                for item in arr {
                    match item.as_str() {
                        Some(s) => out.push(s.to_string()),
                        None => return Err("'lines' array must contain only strings".into()),
                    }
                }
                Lines::Many(out)
            }
        }
        Some(other) => return Err(format!("'lines' has an unsupported type: {other}")),
    };

    // Append/Prepend collapse pos/end to a single anchor; pos wins.
    let pos = if matches!(op, OpKind::Append | OpKind::Prepend) {
        pos.or_else(|| end.clone())
    } else {
        pos
    };

    if matches!(op, OpKind::Replace) && pos.is_none() && end.is_none() {
        return Err("replace requires at least one of 'pos'/'end'".into());
    }

    Ok(RawEdit { op, pos, end, lines })
}

/// An edit whose anchors have been parsed (not yet validated against live
/// file content) and whose payload has been reduced to a flat line list.
#[derive(Debug, Clone)]
pub struct Edit {
    pub op: OpKind,
    pub pos: Option<Anchor>,
    pub end: Option<Anchor>,
    pub payload: Vec<String>,
    pub sort_line: usize,
    /// Dedup/order is computed over the *normalized* payload; this key is
    /// filled in by `order::dedup_key` once payload normalization settles.
    pub index: usize,
}

/// Strip hashline (`L#HH|`) or diff-plus (`+`, not `++`) prefixes from a
/// replacement payload when at least half of its non-empty lines carry
/// that prefix — absorbs the common failure where a model echoes back the
/// whole hashline record as its replacement.
pub fn strip_prefixes(lines: &[String]) -> Vec<String> {
    use std::sync::LazyLock;
    static HASHLINE_PREFIX_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
        regex::Regex::new(r"^\s*(?:>>>|>>)?\s*\d+#[A-Z]{2,16}\|").unwrap()
    });

    let non_empty = lines.iter().filter(|l| !l.is_empty()).count();
    if non_empty == 0 {
        return lines.to_vec();
    }

    let hash_prefixed = lines
        .iter()
        .filter(|l| !l.is_empty() && HASHLINE_PREFIX_RE.is_match(l))
        .count();
    let plus_prefixed = lines
        .iter()
        .filter(|l| !l.is_empty() && is_diff_plus(l))
        .count();

    if hash_prefixed * 2 >= non_empty && hash_prefixed > 0 {
        return lines
            .iter()
            .map(|l| HASHLINE_PREFIX_RE.replace(l, "").into_owned())
            .collect();
    }
    if plus_prefixed * 2 >= non_empty && plus_prefixed > 0 {
        return lines.iter().map(|l| strip_diff_plus(l)).collect();
    }
    lines.to_vec()
}

fn is_diff_plus(s: &str) -> bool {
    s.starts_with('+') && !s.starts_with("++")
}

fn strip_diff_plus(s: &str) -> String {
    if is_diff_plus(s) {
        s[1..].to_string()
    } else {
        s.to_string()
    }
}

fn strip_all_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

fn equals_ignoring_whitespace(a: &str, b: &str) -> bool {
    a == b || strip_all_whitespace(a) == strip_all_whitespace(b)
}

fn leading_whitespace(s: &str) -> &str {
    let end = s.len() - s.trim_start().len();
    &s[..end]
}

/// Drop a leading payload line that echoes `anchor_line` (insert-after).
pub fn strip_insert_after_echo(anchor_line: &str, payload: &[String]) -> Vec<String> {
    if payload.len() <= 1 {
        return payload.to_vec();
    }
    if equals_ignoring_whitespace(&payload[0], anchor_line) {
        payload[1..].to_vec()
    } else {
        payload.to_vec()
    }
}

/// Drop a trailing payload line that echoes `anchor_line` (insert-before).
pub fn strip_insert_before_echo(anchor_line: &str, payload: &[String]) -> Vec<String> {
    if payload.len() <= 1 {
        return payload.to_vec();
    }
    if equals_ignoring_whitespace(payload.last().unwrap(), anchor_line) {
        payload[..payload.len() - 1].to_vec()
    } else {
        payload.to_vec()
    }
}

/// Drop a leading/trailing payload line that echoes the line just outside
/// the replaced `[start..=end]` range, when the payload is longer than the
/// span it replaces.
pub fn strip_range_boundary_echo(
    file_lines: &[String],
    start: usize,
    end: usize,
    payload: &[String],
) -> Vec<String> {
    let span = end - start + 1;
    if payload.len() <= 1 || payload.len() <= span {
        return payload.to_vec();
    }

    let mut out = payload.to_vec();

    if start >= 2 {
        let before = &file_lines[start - 2];
        if equals_ignoring_whitespace(&out[0], before) {
            out.remove(0);
        }
    }
    if end < file_lines.len() && !out.is_empty() {
        let after = &file_lines[end];
        if equals_ignoring_whitespace(out.last().unwrap(), after) {
            out.pop();
        }
    }
    out
}

/// Heuristic 1: a one-line payload whose whitespace-stripped form equals
/// the whitespace-stripped concatenation of the original span — the model
/// merged several original lines into one. Split it back.
pub fn restore_merged_lines(original: &[String], payload: &[String]) -> Vec<String> {
    if payload.len() != 1 || original.len() < 2 {
        return payload.to_vec();
    }
    let merged_canon = strip_all_whitespace(&payload[0]);
    let original_canon: String = original.iter().map(|l| strip_all_whitespace(l)).collect();
    if merged_canon == original_canon {
        original.to_vec()
    } else {
        payload.to_vec()
    }
}

/// Heuristic 2: fold a 2..=10-line payload span back into one original
/// line when its whitespace-stripped concatenation uniquely matches that
/// original line's whitespace-stripped form.
pub fn restore_wrapped_lines(original: &[String], payload: &[String]) -> Vec<String> {
    if original.is_empty() || payload.len() < 2 {
        return payload.to_vec();
    }

    use std::collections::HashMap;
    let mut canon_to_original: HashMap<String, (&str, usize)> = HashMap::new();
    for line in original {
        let canon = strip_all_whitespace(line);
        let entry = canon_to_original.entry(canon).or_insert((line.as_str(), 0));
        entry.1 += 1;
    }

    struct Candidate {
        start: usize,
        len: usize,
        replacement: String,
    }

    let mut candidates = Vec::new();
    for start in 0..payload.len() {
        let max_len = 10.min(payload.len() - start);
        if max_len < 2 {
            continue;
        }
        for len in 2..=max_len {
            let joined: String = payload[start..start + len].concat();
            let canon = strip_all_whitespace(&joined);
            if canon.len() < 6 {
                continue;
            }
            if let Some((line, count)) = canon_to_original.get(&canon) {
                if *count == 1 {
                    candidates.push(Candidate {
                        start,
                        len,
                        replacement: line.to_string(),
                    });
                }
            }
        }
    }

    if candidates.is_empty() {
        return payload.to_vec();
    }

    // Keep non-overlapping candidates, applied back-to-front.
    candidates.sort_by(|a, b| b.start.cmp(&a.start));
    let mut out = payload.to_vec();
    let mut covered_until = usize::MAX;
    for c in candidates {
        if c.start + c.len > covered_until {
            continue;
        }
        out.splice(c.start..c.start + c.len, std::iter::once(c.replacement));
        covered_until = c.start;
    }
    out
}

/// Heuristic 3: when payload length equals the replaced span length, copy
/// leading whitespace from each original line onto the payload line at the
/// same index, if the payload line has none of its own.
pub fn restore_paired_indent(original: &[String], payload: &[String]) -> Vec<String> {
    if original.len() != payload.len() {
        return payload.to_vec();
    }
    original
        .iter()
        .zip(payload.iter())
        .map(|(orig, line)| {
            if line.is_empty() {
                return line.clone();
            }
            let indent = leading_whitespace(orig);
            if indent.is_empty() || orig.trim().is_empty() {
                return line.clone();
            }
            if !leading_whitespace(line).is_empty() {
                return line.clone();
            }
            if line == orig {
                return line.clone();
            }
            format!("{indent}{line}")
        })
        .collect()
}

/// Run the full indent/wrap auto-correction pipeline (§4.4) over a
/// `Replace` payload, given the original span it targets.
pub fn auto_correct_replace_payload(original: &[String], payload: &[String]) -> Vec<String> {
    let payload = restore_merged_lines(original, payload);
    let payload = restore_wrapped_lines(original, &payload);
    restore_paired_indent(original, &payload)
}
