//! Anchor parsing (`L#HH`) and batch validation against live file content.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;

use crate::hash::{compute_line_hash, is_valid_token, truncate_token};

/// A parsed anchor: 1-indexed line number + hash token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub line: usize,
    pub hash: String,
}

static STRICT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)#([A-Z]{2})$").unwrap());
static SUBSTRING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)#([A-Z]{2,16})").unwrap());
static HASH_WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*#\s*").unwrap());

/// Parse an anchor string, tolerating common echo noise from a model:
/// diff markers, stray whitespace, a trailing `|content` record echo, and
/// over-long hash tokens.
pub fn parse_anchor(raw: &str) -> Result<Anchor, String> {
    let line_count = raw.lines().count();
    if line_count > 1 {
        return Err(format!(
            "anchor {:?} contains {} lines — must be a single-line anchor",
            raw, line_count
        ));
    }

    let trimmed = raw.trim();
    let no_marker = strip_diff_marker(trimmed);
    let cut_at_pipe = no_marker.split('|').next().unwrap_or(no_marker).trim();
    let normalized = HASH_WS_RE.replace(cut_at_pipe, "#").to_string();

    if let Some(caps) = STRICT_RE.captures(&normalized) {
        return finish(&caps[1], &caps[2], raw);
    }

    if let Some(caps) = SUBSTRING_RE.captures(&normalized) {
        return finish(&caps[1], &caps[2], raw);
    }

    if let Some(prefix) = non_numeric_prefix(&normalized) {
        return Err(format!(
            "anchor {:?} does not start with a line number ({:?} is not numeric); use the actual line number",
            raw, prefix
        ));
    }

    Err(format!(
        "{:?} is not a valid \"L#HH\" anchor, expected \"L#HH\"",
        raw
    ))
}

fn finish(line_str: &str, hash_str: &str, raw: &str) -> Result<Anchor, String> {
    let line: usize = line_str.parse().map_err(|_| {
        format!("{:?} is not a valid \"L#HH\" anchor: unparseable line number", raw)
    })?;
    if line < 1 {
        return Err(format!(
            "{:?} is not a valid \"L#HH\" anchor: line number must be >= 1",
            raw
        ));
    }
    let hash = truncate_token(hash_str);
    if !is_valid_token(&hash) {
        return Err(format!(
            "{:?} is not a valid \"L#HH\" anchor: hash token {:?} is not valid",
            raw, hash_str
        ));
    }
    Ok(Anchor { line, hash })
}

fn strip_diff_marker(s: &str) -> &str {
    for marker in [">>>", ">>", "+", "-"] {
        if let Some(rest) = s.strip_prefix(marker) {
            return rest.trim_start();
        }
    }
    s
}

fn non_numeric_prefix(s: &str) -> Option<&str> {
    let first_digit = s.find(|c: char| c.is_ascii_digit());
    match first_digit {
        Some(0) | None => None,
        Some(idx) => Some(&s[..idx]),
    }
}

/// A single hash mismatch discovered during batch validation.
#[derive(Debug, Clone)]
pub struct Mismatch {
    pub line: usize,
    pub expected: String,
    pub actual: String,
}

const MISMATCH_CONTEXT: usize = 2;

/// Raised when one or more anchors in a batch no longer match the live
/// file. Carries enough context to let a caller show the model exactly
/// what changed and how to recover.
#[derive(Debug, Clone)]
pub struct HashlineMismatch {
    pub mismatches: Vec<Mismatch>,
    pub lines: Vec<String>,
}

impl HashlineMismatch {
    /// `{ old "L#HH" -> new "L#HH" }` for every mismatched anchor, so a
    /// caller can mechanically rewrite a retried batch.
    pub fn remap_table(&self) -> HashMap<String, String> {
        self.mismatches
            .iter()
            .map(|m| {
                (
                    format!("{}#{}", m.line, m.expected),
                    format!("{}#{}", m.line, m.actual),
                )
            })
            .collect()
    }

    /// A windowed rendering of the mismatched lines (±2 context), with
    /// mismatched rows marked `>>>`.
    pub fn display(&self) -> String {
        let mut by_line: HashMap<usize, &Mismatch> = HashMap::new();
        for m in &self.mismatches {
            by_line.insert(m.line, m);
        }

        let mut window = BTreeSet::new();
        for m in &self.mismatches {
            let lo = m.line.saturating_sub(MISMATCH_CONTEXT).max(1);
            let hi = (m.line + MISMATCH_CONTEXT).min(self.lines.len());
            for i in lo..=hi {
                window.insert(i);
            }
        }

        let count = self.mismatches.len();
        let mut out = vec![format!(
            "{} line{} changed since last read:",
            count,
            if count == 1 { "" } else { "s" }
        )];
        out.push(String::new());

        let mut prev: Option<usize> = None;
        for &line in &window {
            if let Some(p) = prev {
                if line > p + 1 {
                    out.push("    ...".to_string());
                }
            }
            prev = Some(line);

            let content = &self.lines[line - 1];
            let anchor = format!("{}#{}", line, compute_line_hash(line, content));
            if let Some(m) = by_line.get(&line) {
                out.push(format!(">>> {anchor}|{content}"));
                if let Some(hint) = did_you_mean(&m.expected, &self.lines) {
                    out.push(format!("    {hint}"));
                }
            } else {
                out.push(format!("    {anchor}|{content}"));
            }
        }

        out.join("\n")
    }
}

impl std::fmt::Display for HashlineMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

impl std::error::Error for HashlineMismatch {}

/// One entry rejected up front, before the mismatch pass even runs: a line
/// number out of `1..=lines.len()`.
#[derive(Debug, Clone)]
pub struct OutOfRange {
    pub line: usize,
    pub len: usize,
}

impl std::fmt::Display for OutOfRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "anchor line {} is out of range (file has {} lines)",
            self.line, self.len
        )
    }
}

impl std::error::Error for OutOfRange {}

/// Validate a batch of anchors against `lines`. Out-of-range anchors fail
/// immediately; hash mismatches are collected and raised together once the
/// whole batch has been checked.
pub fn validate_anchors(anchors: &[Anchor], lines: &[String]) -> Result<(), AnchorError> {
    let mut mismatches = Vec::new();

    for anchor in anchors {
        if anchor.line < 1 || anchor.line > lines.len() {
            return Err(AnchorError::OutOfRange(OutOfRange {
                line: anchor.line,
                len: lines.len(),
            }));
        }
        let actual = compute_line_hash(anchor.line, &lines[anchor.line - 1]);
        if actual != anchor.hash {
            mismatches.push(Mismatch {
                line: anchor.line,
                expected: anchor.hash.clone(),
                actual,
            });
        }
    }

    if mismatches.is_empty() {
        Ok(())
    } else {
        Err(AnchorError::Mismatch(HashlineMismatch {
            mismatches,
            lines: lines.to_vec(),
        }))
    }
}

#[derive(Debug, Clone)]
pub enum AnchorError {
    OutOfRange(OutOfRange),
    Mismatch(HashlineMismatch),
}

impl std::fmt::Display for AnchorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnchorError::OutOfRange(e) => write!(f, "{e}"),
            AnchorError::Mismatch(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for AnchorError {}

/// If `hash` matches some other line in `lines`, produce a
/// `Did you mean "L#HH"?` hint for a parse or validation failure.
pub fn did_you_mean(hash: &str, lines: &[String]) -> Option<String> {
    for (idx, content) in lines.iter().enumerate() {
        let line_no = idx + 1;
        if compute_line_hash(line_no, content) == hash {
            return Some(format!("Did you mean \"{line_no}#{hash}\"?"));
        }
    }
    None
}
