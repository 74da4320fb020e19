//! Process-wide failure ledger and missing-`lines` escalation ladder
//! (§4.8 diagnostics half, §9 design notes, §5 concurrency model).
//!
//! Modeled as "an internal state object with a mutex... one per running
//! process... allow tests to inject an isolated instance" — so the public
//! type is a plain struct callers own (an [`Engine`](crate::engine::Engine)
//! holds one), not a bare global; a crate-wide [`LazyLock`] instance
//! exists only for callers that genuinely want a single process-wide
//! ledger shared across every [`Engine`].

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

/// Failures before a per-anchor hint mentions the current line content.
const HINT_THRESHOLD: u32 = 2;
/// Failures before the hint becomes a full worked example.
const EXAMPLE_THRESHOLD: u32 = 4;
/// Failures before the per-anchor counter alone forces a soft-reject.
const ANCHOR_BAIL_THRESHOLD: u32 = 6;
/// Failures (any anchor) in one file before a soft-reject fires regardless
/// of any single anchor's count (Open Question 2: both thresholds are
/// adopted, ORed).
const FILE_BAIL_THRESHOLD: u32 = 10;

#[derive(Debug, Default)]
pub struct FailureLedger {
    by_anchor: Mutex<HashMap<String, u32>>,
    by_file: Mutex<HashMap<String, u32>>,
}

/// What the caller should do after a missing-`lines` failure is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Escalation {
    /// Raise an error; message should stay at the base level.
    Error,
    /// Raise an error; message should include the hint about current
    /// line content.
    ErrorWithHint,
    /// Raise an error; message should include a full worked example.
    ErrorWithExample,
    /// Don't raise — return a soft-reject string instead. The file is not
    /// modified.
    SoftReject,
}

impl FailureLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one missing-`lines` failure for `anchor` within `file_path`
    /// and report which rung of the ladder the caller has reached.
    pub fn record_failure(&self, anchor: &str, file_path: &str) -> Escalation {
        let anchor_count = {
            let mut map = self.by_anchor.lock().unwrap();
            let count = map.entry(anchor.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        let file_count = {
            let mut map = self.by_file.lock().unwrap();
            let count = map.entry(file_path.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        if anchor_count >= ANCHOR_BAIL_THRESHOLD || file_count >= FILE_BAIL_THRESHOLD {
            Escalation::SoftReject
        } else if anchor_count >= EXAMPLE_THRESHOLD {
            Escalation::ErrorWithExample
        } else if anchor_count >= HINT_THRESHOLD {
            Escalation::ErrorWithHint
        } else {
            Escalation::Error
        }
    }

    /// Current failure count for `anchor`, for building the soft-reject
    /// message's `(attempt N)` marker. Zero if never recorded.
    pub fn anchor_attempts(&self, anchor: &str) -> u32 {
        *self.by_anchor.lock().unwrap().get(anchor).unwrap_or(&0)
    }

    /// Reset both counters. Used between independent sessions/tests.
    pub fn reset(&self) {
        self.by_anchor.lock().unwrap().clear();
        self.by_file.lock().unwrap().clear();
    }
}

/// A single process-wide ledger, for callers that don't construct their
/// own [`Engine`](crate::engine::Engine) per test/session.
pub static SHARED: LazyLock<FailureLedger> = LazyLock::new(FailureLedger::new);

/// Build the base `"replace requires explicit 'lines' field."` message,
/// extended with a pattern-specific hint when `pos` looks like it carries
/// key-value syntax, XML markup, or other trailing content.
pub fn base_message(pos: &str) -> String {
    let mut msg = "replace requires explicit 'lines' field.".to_string();
    if pos.contains(':') || pos.contains('=') {
        msg.push_str(" The 'pos' value looks like it may contain key-value syntax — pass the replacement text in 'lines' instead.");
    } else if pos.contains('<') && pos.contains('>') {
        msg.push_str(" The 'pos' value looks like it may contain XML/HTML markup — pass the replacement text in 'lines' instead.");
    } else if pos.len() > 32 {
        msg.push_str(" The 'pos' value looks unusually long for an anchor — pass only the anchor there and the replacement text in 'lines'.");
    }
    msg
}

/// Extend a base message with the "Line L currently contains 'C'" hint
/// (escalation rung 2).
pub fn with_hint(base: &str, line: usize, content: &str) -> String {
    format!("{base} Line {line} currently contains {content:?}. Set 'lines' to the replacement content.")
}

/// Replace the hint with a full worked example (escalation rung 3).
pub fn with_example(anchor: &str, line: usize, content: &str) -> String {
    format!(
        "replace requires explicit 'lines' field. Line {line} currently contains {content:?}. \
         Example of a correct edit:\n\
         {{\"op\": \"replace\", \"pos\": \"{anchor}\", \"lines\": [\"your replacement text\"]}}"
    )
}

/// Build the soft-reject string (escalation rung 4). Never raised as an
/// error — returned as a plain string, per the deliberate API-shape break
/// documented in §7.
pub fn soft_reject(anchor: &str, line: usize, content: &str, attempt: u32) -> String {
    format!(
        "\u{26a0}\u{fe0f} edit_file: NOT APPLIED (attempt {attempt}) — repeated 'replace' calls on anchor \"{anchor}\" \
         are missing the required 'lines' field. Line {line} currently contains {content:?}.\n\
         \n\
         Corrected edit:\n\
         {{\"op\": \"replace\", \"pos\": \"{anchor}\", \"lines\": [\"your replacement text\"]}}\n\
         \n\
         To delete the line instead:\n\
         {{\"op\": \"replace\", \"pos\": \"{anchor}\", \"lines\": []}}\n\
         \n\
         If this keeps failing, consider using write_file to rewrite the whole file instead."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_failure_is_plain_error() {
        let ledger = FailureLedger::new();
        assert_eq!(ledger.record_failure("2#ZZ", "a.rs"), Escalation::Error);
    }

    #[test]
    fn second_failure_adds_hint() {
        let ledger = FailureLedger::new();
        ledger.record_failure("2#ZZ", "a.rs");
        assert_eq!(ledger.record_failure("2#ZZ", "a.rs"), Escalation::ErrorWithHint);
    }

    #[test]
    fn fourth_failure_adds_example() {
        let ledger = FailureLedger::new();
        for _ in 0..3 {
            ledger.record_failure("2#ZZ", "a.rs");
        }
        assert_eq!(ledger.record_failure("2#ZZ", "a.rs"), Escalation::ErrorWithExample);
    }

    #[test]
    fn sixth_failure_on_same_anchor_soft_rejects() {
        let ledger = FailureLedger::new();
        for _ in 0..5 {
            ledger.record_failure("2#ZZ", "a.rs");
        }
        assert_eq!(ledger.record_failure("2#ZZ", "a.rs"), Escalation::SoftReject);
    }

    #[test]
    fn tenth_failure_across_distinct_anchors_soft_rejects_via_file_count() {
        let ledger = FailureLedger::new();
        for i in 0..9 {
            let anchor = format!("{i}#ZZ");
            ledger.record_failure(&anchor, "a.rs");
        }
        assert_eq!(ledger.record_failure("9#ZZ", "a.rs"), Escalation::SoftReject);
    }

    #[test]
    fn anchor_counter_is_global_not_scoped_per_file() {
        // The anchor counter is keyed by anchor text alone, not by
        // (anchor, file) — so the same anchor string keeps escalating
        // even when seen in a different file on each call.
        let ledger = FailureLedger::new();
        for _ in 0..5 {
            ledger.record_failure("2#ZZ", "a.rs");
        }
        assert_eq!(ledger.record_failure("2#ZZ", "b.rs"), Escalation::SoftReject);
    }

    #[test]
    fn distinct_anchors_in_distinct_files_have_independent_counters() {
        let ledger = FailureLedger::new();
        for _ in 0..5 {
            ledger.record_failure("2#ZZ", "a.rs");
        }
        assert_eq!(ledger.record_failure("3#PP", "b.rs"), Escalation::Error);
    }

    #[test]
    fn reset_clears_both_counters() {
        let ledger = FailureLedger::new();
        for _ in 0..5 {
            ledger.record_failure("2#ZZ", "a.rs");
        }
        ledger.reset();
        assert_eq!(ledger.record_failure("2#ZZ", "a.rs"), Escalation::Error);
    }

    #[test]
    fn soft_reject_message_contains_required_markers() {
        let msg = soft_reject("2#ZZ", 2, "bravo", 6);
        assert!(msg.contains("NOT APPLIED"));
        assert!(msg.contains("2#ZZ"));
        assert!(msg.contains("bravo"));
        assert!(msg.contains("write_file"));
    }
}
