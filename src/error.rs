//! The engine's external error surface. Surface strings here are part of
//! the contract callers parse against (§6) — wording changes should stay
//! backward compatible with the substrings listed there.

use std::path::PathBuf;

use crate::anchor::{AnchorError, HashlineMismatch};
use crate::edit::order::Overlap;
use crate::fsread::FsReadError;
use crate::pathsafety::PathSafetyError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A `pos`/`end` string doesn't parse as `L#HH`, including the
    /// multi-line-input and non-numeric-prefix cases.
    #[error("{0}")]
    InvalidAnchor(String),

    /// An anchor names a line number outside `1..=len`.
    #[error("{0}")]
    OutOfRange(String),

    /// One or more anchors no longer match the live file's line hashes.
    #[error(transparent)]
    Mismatch(#[from] HashlineMismatch),

    /// The caller's `expected_file_hash` no longer matches the file on
    /// disk — a coarser, whole-file staleness check independent of
    /// per-line anchors.
    #[error("File changed since read_file output. expected={expected}, current={current}")]
    StaleFileHash { expected: String, current: String },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error(transparent)]
    PathSafety(#[from] PathSafetyError),

    /// `replace` submitted with `lines` absent. The message grows an
    /// escalation addendum as the failure ledger climbs its ladder.
    #[error("{0}")]
    MissingLines(String),

    #[error(transparent)]
    Overlap(#[from] Overlap),

    /// Edit parsing/repair/application failures not covered by a more
    /// specific variant above (unknown op, empty insert payload after
    /// echo-stripping, malformed `lines`, …).
    #[error("{0}")]
    Edit(String),

    #[error(transparent)]
    FsRead(#[from] FsReadError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<AnchorError> for EngineError {
    fn from(err: AnchorError) -> Self {
        match err {
            AnchorError::OutOfRange(e) => EngineError::OutOfRange(e.to_string()),
            AnchorError::Mismatch(e) => EngineError::Mismatch(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_anchor_message_passes_through_verbatim() {
        let err = EngineError::InvalidAnchor("\"x\" is not a valid \"L#HH\" anchor".into());
        assert!(err.to_string().contains("is not a valid"));
    }

    #[test]
    fn stale_file_hash_contains_expected_and_current() {
        let err = EngineError::StaleFileHash {
            expected: "abc12345".into(),
            current: "def67890".into(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("File changed since read_file output."));
        assert!(msg.contains("expected=abc12345"));
        assert!(msg.contains("current=def67890"));
    }

    #[test]
    fn file_not_found_includes_path() {
        let err = EngineError::FileNotFound(PathBuf::from("/tmp/missing.rs"));
        assert!(err.to_string().contains("missing.rs"));
    }

    #[test]
    fn path_safety_traversal_surfaces_through() {
        let err: EngineError = PathSafetyError::Traversal(PathBuf::from("../x")).into();
        assert!(err.to_string().contains("Path traversal blocked"));
    }

    #[test]
    fn path_safety_symlink_surfaces_through() {
        let err: EngineError = PathSafetyError::Symlink(PathBuf::from("/tmp/link")).into();
        assert!(err.to_string().contains("Refusing to operate on symlink"));
    }

    #[test]
    fn anchor_error_out_of_range_converts() {
        let inner = crate::anchor::OutOfRange { line: 5, len: 2 };
        let err: EngineError = AnchorError::OutOfRange(inner).into();
        assert!(matches!(err, EngineError::OutOfRange(_)));
    }

    #[test]
    fn anchor_error_mismatch_converts() {
        let inner = HashlineMismatch {
            mismatches: vec![],
            lines: vec!["a".to_string()],
        };
        let err: EngineError = AnchorError::Mismatch(inner).into();
        assert!(matches!(err, EngineError::Mismatch(_)));
    }

    #[test]
    fn overlap_message_contains_ranges() {
        let err: EngineError = Overlap { a: (1, 3), b: (2, 4) }.into();
        assert!(err.to_string().contains("Overlapping range edits detected"));
    }
}
