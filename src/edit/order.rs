//! Dedup key, bottom-up ordering, and range overlap detection (§4.5).

use std::collections::HashSet;

use crate::hash::compute_file_hash;

use super::{Edit, OpKind};

/// Canonical dedup key for an edit: `"{op}|{pos}|{end}|{hash_of_payload}"`.
/// Two edits with the same key are considered identical resubmissions.
pub fn dedup_key(edit: &Edit) -> String {
    let pos = edit
        .pos
        .as_ref()
        .map(|a| format!("{}#{}", a.line, a.hash))
        .unwrap_or_default();
    let end = edit
        .end
        .as_ref()
        .map(|a| format!("{}#{}", a.line, a.hash))
        .unwrap_or_default();
    let payload_hash = compute_file_hash(edit.payload.join("\n").as_bytes());
    format!("{:?}|{pos}|{end}|{payload_hash}", edit.op)
}

/// Drop later edits whose dedup key repeats an earlier one. Returns the
/// surviving edits plus how many were dropped.
pub fn deduplicate(edits: Vec<Edit>) -> (Vec<Edit>, usize) {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(edits.len());
    let mut dropped = 0;
    for edit in edits {
        let key = dedup_key(&edit);
        if seen.insert(key) {
            kept.push(edit);
        } else {
            dropped += 1;
        }
    }
    (kept, dropped)
}

fn sort_line(edit: &Edit) -> usize {
    match edit.op {
        OpKind::Replace => edit.end.as_ref().or(edit.pos.as_ref()).map(|a| a.line).unwrap_or(0),
        OpKind::Append | OpKind::Prepend => edit.pos.as_ref().map(|a| a.line).unwrap_or(0),
    }
}

/// Sort edits by descending target line (so applying front-to-back never
/// shifts a later anchor's meaning), then by op precedence
/// `Replace < Append < Prepend` within a shared line.
pub fn order(mut edits: Vec<Edit>) -> Vec<Edit> {
    edits.sort_by(|a, b| {
        sort_line(b)
            .cmp(&sort_line(a))
            .then(a.op.precedence().cmp(&b.op.precedence()))
            .then(a.index.cmp(&b.index))
    });
    edits
}

/// A detected overlap between two `Replace` ranges.
#[derive(Debug, Clone)]
pub struct Overlap {
    pub a: (usize, usize),
    pub b: (usize, usize),
}

impl std::fmt::Display for Overlap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Overlapping range edits detected: [{}..={}] and [{}..={}]",
            self.a.0, self.a.1, self.b.0, self.b.1
        )
    }
}

impl std::error::Error for Overlap {}

/// Among `Replace` edits carrying an `end` anchor, detect any two ranges
/// that truly overlap. A single-line `Replace` (no `end`) sitting strictly
/// inside another range's span is allowed — it only conflicts with a range
/// if it lands exactly on one of that range's endpoints, the same boundary
/// a range/range overlap would be rejected for.
pub fn detect_overlaps(edits: &[Edit]) -> Result<(), Overlap> {
    let mut ranges: Vec<(usize, usize)> = edits
        .iter()
        .filter(|e| e.op == OpKind::Replace && e.end.is_some())
        .filter_map(|e| {
            let end = e.end.as_ref()?.line;
            let start = e.pos.as_ref().map(|a| a.line).unwrap_or(end);
            Some((start.min(end), start.max(end)))
        })
        .collect();

    ranges.sort_by_key(|&(start, end)| (start, end));

    for window in ranges.windows(2) {
        let (a, b) = (window[0], window[1]);
        if a.1 >= b.0 {
            return Err(Overlap { a, b });
        }
    }

    let single_lines = edits
        .iter()
        .filter(|e| e.op == OpKind::Replace && e.end.is_none())
        .filter_map(|e| e.pos.as_ref().map(|a| a.line));

    for line in single_lines {
        for &(start, end) in &ranges {
            if line == start || line == end {
                return Err(Overlap {
                    a: (line, line),
                    b: (start, end),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::Anchor;

    fn anchor(line: usize) -> Anchor {
        Anchor {
            line,
            hash: "ZZ".to_string(),
        }
    }

    fn edit(op: OpKind, pos: Option<usize>, end: Option<usize>, payload: &[&str], index: usize) -> Edit {
        let pos_a = pos.map(anchor);
        let sort = end.or(pos).unwrap_or(0);
        Edit {
            op,
            pos: pos_a,
            end: end.map(anchor),
            payload: payload.iter().map(|s| s.to_string()).collect(),
            sort_line: sort,
            index,
        }
    }

    #[test]
    fn dedup_drops_identical_repeats() {
        let edits = vec![
            edit(OpKind::Replace, Some(2), None, &["a"], 0),
            edit(OpKind::Replace, Some(2), None, &["a"], 1),
        ];
        let (kept, dropped) = deduplicate(edits);
        assert_eq!(kept.len(), 1);
        assert_eq!(dropped, 1);
    }

    #[test]
    fn dedup_keeps_distinct_payloads() {
        let edits = vec![
            edit(OpKind::Replace, Some(2), None, &["a"], 0),
            edit(OpKind::Replace, Some(2), None, &["b"], 1),
        ];
        let (kept, dropped) = deduplicate(edits);
        assert_eq!(kept.len(), 2);
        assert_eq!(dropped, 0);
    }

    #[test]
    fn orders_by_descending_line() {
        let edits = vec![
            edit(OpKind::Replace, Some(1), None, &["a"], 0),
            edit(OpKind::Replace, Some(5), None, &["b"], 1),
            edit(OpKind::Replace, Some(3), None, &["c"], 2),
        ];
        let ordered = order(edits);
        let lines: Vec<usize> = ordered.iter().map(sort_line).collect();
        assert_eq!(lines, vec![5, 3, 1]);
    }

    #[test]
    fn equal_line_breaks_tie_by_op_precedence() {
        let edits = vec![
            edit(OpKind::Prepend, Some(2), None, &["p"], 0),
            edit(OpKind::Replace, Some(2), None, &["r"], 1),
            edit(OpKind::Append, Some(2), None, &["a"], 2),
        ];
        let ordered = order(edits);
        assert_eq!(ordered[0].op, OpKind::Replace);
        assert_eq!(ordered[1].op, OpKind::Append);
        assert_eq!(ordered[2].op, OpKind::Prepend);
    }

    #[test]
    fn detects_overlapping_ranges() {
        let edits = vec![
            edit(OpKind::Replace, Some(1), Some(3), &["x"], 0),
            edit(OpKind::Replace, Some(2), Some(4), &["y"], 1),
        ];
        assert!(detect_overlaps(&edits).is_err());
    }

    #[test]
    fn allows_adjacent_non_overlapping_ranges() {
        let edits = vec![
            edit(OpKind::Replace, Some(1), Some(2), &["x"], 0),
            edit(OpKind::Replace, Some(4), Some(5), &["y"], 1),
        ];
        assert!(detect_overlaps(&edits).is_ok());
    }

    #[test]
    fn single_line_replace_outside_another_range_is_fine() {
        let edits = vec![
            edit(OpKind::Replace, Some(1), Some(2), &["x"], 0),
            edit(OpKind::Replace, Some(3), None, &["y"], 1),
        ];
        assert!(detect_overlaps(&edits).is_ok());
    }

    #[test]
    fn single_line_replace_strictly_inside_a_range_is_fine() {
        let edits = vec![
            edit(OpKind::Replace, Some(1), Some(5), &["x"], 0),
            edit(OpKind::Replace, Some(3), None, &["y"], 1),
        ];
        assert!(detect_overlaps(&edits).is_ok());
    }

    #[test]
    fn single_line_replace_on_a_range_endpoint_is_rejected() {
        let edits = vec![
            edit(OpKind::Replace, Some(1), Some(5), &["x"], 0),
            edit(OpKind::Replace, Some(5), None, &["y"], 1),
        ];
        assert!(detect_overlaps(&edits).is_err());
    }
}
