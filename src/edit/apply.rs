//! Application primitives (§4.6). Each consumes and returns the canonical
//! line array; no-op detection compares before/after and never fails on
//! its own — the caller decides whether an all-no-op batch is an error.

use super::{strip_insert_after_echo, strip_insert_before_echo};

/// Replace line `L` (1-indexed) with `payload`. Caller has already run
/// boundary/indent correction on `payload`.
pub fn set_line(lines: &[String], target: usize, payload: &[String]) -> Vec<String> {
    let mut out = lines.to_vec();
    out.splice(target - 1..target, payload.iter().cloned());
    out
}

/// Replace `[a..=b]` (1-indexed, inclusive) with `payload`.
pub fn replace_range(lines: &[String], a: usize, b: usize, payload: &[String]) -> Vec<String> {
    let mut out = lines.to_vec();
    out.splice(a - 1..b, payload.iter().cloned());
    out
}

/// Insert `payload` after line `L`. Strips a leading payload line that
/// echoes line `L`; fails if the payload becomes empty.
pub fn insert_after(lines: &[String], target: usize, payload: &[String]) -> Result<Vec<String>, String> {
    let anchor_line = &lines[target - 1];
    let cleaned = strip_insert_after_echo(anchor_line, payload);
    if cleaned.is_empty() {
        return Err("insert_after payload became empty after echo stripping".to_string());
    }
    let mut out = lines.to_vec();
    out.splice(target..target, cleaned);
    Ok(out)
}

/// Insert `payload` before line `L`. Strips a trailing payload line that
/// echoes line `L`; fails if the payload becomes empty.
pub fn insert_before(lines: &[String], target: usize, payload: &[String]) -> Result<Vec<String>, String> {
    let anchor_line = &lines[target - 1];
    let cleaned = strip_insert_before_echo(anchor_line, payload);
    if cleaned.is_empty() {
        return Err("insert_before payload became empty after echo stripping".to_string());
    }
    let mut out = lines.to_vec();
    out.splice(target - 1..target - 1, cleaned);
    Ok(out)
}

/// Append at EOF. Special case: a file that is a single empty line is
/// replaced rather than appended to, so `""` + append(["x"]) yields
/// `"x"`, not `"\nx"`.
pub fn append(lines: &[String], payload: &[String]) -> Vec<String> {
    if lines.len() == 1 && lines[0].is_empty() {
        return payload.to_vec();
    }
    let mut out = lines.to_vec();
    out.extend(payload.iter().cloned());
    out
}

/// Prepend at BOF. Same single-empty-line special case as [`append`].
pub fn prepend(lines: &[String], payload: &[String]) -> Vec<String> {
    if lines.len() == 1 && lines[0].is_empty() {
        return payload.to_vec();
    }
    let mut out = payload.to_vec();
    out.extend(lines.iter().cloned());
    out
}

/// True iff applying a primitive produced no change — counted, not failed.
pub fn is_noop(before: &[String], after: &[String]) -> bool {
    before == after
}
