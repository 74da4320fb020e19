//! Top-level orchestration (§6): `Engine::execute_edit`,
//! `read_file_hashlined`, `reset_failure_ledger`, `stream_hashlines`. Wires
//! together every other module's contribution into the single
//! read → repair → validate → order → apply → write pipeline described in
//! §2's data-flow paragraph.

use std::path::{Path, PathBuf};

use tokio::io::AsyncRead;

use crate::anchor::{self, Anchor};
use crate::edit::apply;
use crate::edit::order;
use crate::edit::{parse_raw_edit, strip_prefixes, Edit, OpKind};
use crate::envelope::Envelope;
use crate::error::EngineError;
use crate::fsread::{self, FsReadOptions, FsReadResult};
use crate::hash::compute_file_hash;
use crate::ledger::{self, Escalation, FailureLedger};
use crate::pathsafety::{atomic_write, resolve_safe_path};
use crate::repair::repair_raw_edit;
use crate::stream::{self, StreamOptions};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Edits and reads are confined under this root (§4.9).
    pub project_root: PathBuf,
    /// Whether atomic writes `fsync` the temp file and parent directory.
    pub fsync_writes: bool,
}

impl EngineConfig {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            fsync_writes: true,
        }
    }

    /// Project root defaults to the process's current working directory;
    /// embedders that need a different root should use `new` instead.
    pub fn from_cwd() -> Self {
        Self::new(std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_cwd()
    }
}

/// Orchestrates the edit engine for one configured project root. Owns its
/// own failure ledger rather than reaching for [`ledger::SHARED`], so
/// independent `Engine`s (and tests) never bleed escalation state into
/// each other.
pub struct Engine {
    config: EngineConfig,
    ledger: FailureLedger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Created,
    Updated,
}

#[derive(Debug, Clone)]
pub struct Summary {
    pub action: Action,
    pub edits_applied: usize,
    pub line_delta: i64,
    pub warnings: Vec<String>,
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = match self.action {
            Action::Created => "Created",
            Action::Updated => "Updated",
        };
        write!(
            f,
            "{verb}, {} edit(s) applied, {} line(s)",
            self.edits_applied, self.line_delta
        )
    }
}

/// `execute_edit`'s result: either the batch applied, or the deliberate
/// non-throwing soft-reject string (§4.8, §7).
#[derive(Debug, Clone)]
pub enum EditOutcome {
    Applied(Summary),
    SoftReject(String),
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ledger: FailureLedger::new(),
        }
    }

    pub fn reset_failure_ledger(&self) {
        self.ledger.reset();
    }

    pub fn read_file_hashlined(
        &self,
        path: &Path,
        opts: &FsReadOptions,
    ) -> Result<FsReadResult, EngineError> {
        let resolved = resolve_safe_path(&self.config.project_root, path)?;
        Ok(fsread::read_windowed(&resolved, opts)?)
    }

    /// The lazy formatter (§4.1), exposed from the engine for callers that
    /// don't want to depend on `crate::stream` directly.
    pub async fn stream_hashlines<R: AsyncRead + Unpin>(
        &self,
        source: R,
        opts: StreamOptions,
    ) -> std::io::Result<Vec<String>> {
        stream::stream_hashlines(source, opts).await
    }

    /// Apply a batch of edits to `path`. All-or-nothing: any invariant
    /// violation or stale anchor fails the whole batch with no write.
    pub fn execute_edit(
        &self,
        path: &Path,
        edits_in: Vec<serde_json::Value>,
        expected_file_hash: Option<&str>,
    ) -> Result<EditOutcome, EngineError> {
        let resolved = resolve_safe_path(&self.config.project_root, path)?;
        let file_path_key = resolved.to_string_lossy().into_owned();
        let exists = resolved.exists();

        let (original_lines, envelope_shape) = if exists {
            let raw_bytes = std::fs::read(&resolved)?;
            if let Some(expected) = expected_file_hash {
                let current = compute_file_hash(&raw_bytes);
                if expected != current {
                    return Err(EngineError::StaleFileHash {
                        expected: expected.to_string(),
                        current,
                    });
                }
            }
            let text = String::from_utf8_lossy(&raw_bytes).into_owned();
            let envelope = Envelope::canonicalize(&text);
            let lines: Vec<String> = envelope.content.split('\n').map(str::to_string).collect();
            (lines, (envelope.had_bom, envelope.line_ending))
        } else {
            let envelope = Envelope::canonicalize("");
            (vec![String::new()], (envelope.had_bom, envelope.line_ending))
        };

        let mut warnings = Vec::new();
        let mut edits: Vec<Edit> = Vec::with_capacity(edits_in.len());
        let mut anchors_to_validate: Vec<Anchor> = Vec::new();

        for (index, value) in edits_in.into_iter().enumerate() {
            let mut raw = parse_raw_edit(&value).map_err(EngineError::Edit)?;
            let repairs = repair_raw_edit(&mut raw);
            for r in &repairs {
                tracing::warn!(file = %file_path_key, edit = index, "{r}");
            }
            warnings.extend(repairs);

            let anchored = raw.pos.is_some() || raw.end.is_some();
            if !exists && (raw.op == OpKind::Replace || anchored) {
                return Err(EngineError::FileNotFound(resolved.clone()));
            }

            if raw.op == OpKind::Replace && raw.lines.is_absent() {
                let anchor_text = raw
                    .pos
                    .clone()
                    .or_else(|| raw.end.clone())
                    .unwrap_or_default();
                let escalation = self.ledger.record_failure(&anchor_text, &file_path_key);
                let line_no = anchor::parse_anchor(&anchor_text).ok().map(|a| a.line);
                let content = line_no
                    .and_then(|l| original_lines.get(l - 1))
                    .cloned()
                    .unwrap_or_default();

                return match escalation {
                    Escalation::Error => {
                        Err(EngineError::MissingLines(ledger::base_message(&anchor_text)))
                    }
                    Escalation::ErrorWithHint => {
                        let base = ledger::base_message(&anchor_text);
                        Err(EngineError::MissingLines(ledger::with_hint(
                            &base,
                            line_no.unwrap_or(0),
                            &content,
                        )))
                    }
                    Escalation::ErrorWithExample => Err(EngineError::MissingLines(
                        ledger::with_example(&anchor_text, line_no.unwrap_or(0), &content),
                    )),
                    Escalation::SoftReject => {
                        let attempt = self.ledger.anchor_attempts(&anchor_text);
                        tracing::warn!(
                            file = %file_path_key,
                            anchor = %anchor_text,
                            attempt,
                            "soft-rejecting edit after repeated missing 'lines'"
                        );
                        Ok(EditOutcome::SoftReject(ledger::soft_reject(
                            &anchor_text,
                            line_no.unwrap_or(0),
                            &content,
                            attempt,
                        )))
                    }
                };
            }

            let pos_anchor = raw
                .pos
                .as_deref()
                .map(anchor::parse_anchor)
                .transpose()
                .map_err(EngineError::InvalidAnchor)?;
            let end_anchor = raw
                .end
                .as_deref()
                .map(anchor::parse_anchor)
                .transpose()
                .map_err(EngineError::InvalidAnchor)?;

            anchors_to_validate.extend(pos_anchor.iter().cloned());
            anchors_to_validate.extend(end_anchor.iter().cloned());

            let mut payload = strip_prefixes(&raw.lines.clone().into_vec());

            if raw.op == OpKind::Replace {
                let start = pos_anchor
                    .as_ref()
                    .or(end_anchor.as_ref())
                    .map(|a| a.line)
                    .unwrap_or(1);
                let end = end_anchor.as_ref().map(|a| a.line).unwrap_or(start);
                let (start, end) = (start.min(end), start.max(end));
                if end <= original_lines.len() {
                    let span = &original_lines[start - 1..end];
                    payload = crate::edit::strip_range_boundary_echo(&original_lines, start, end, &payload);
                    payload = crate::edit::auto_correct_replace_payload(span, &payload);
                }
            }

            edits.push(Edit {
                op: raw.op,
                pos: pos_anchor,
                end: end_anchor,
                payload,
                sort_line: 0,
                index,
            });
        }

        if exists && !anchors_to_validate.is_empty() {
            anchor::validate_anchors(&anchors_to_validate, &original_lines)?;
        }

        let (deduped, dropped) = order::deduplicate(edits);
        if dropped > 0 {
            warnings.push(format!("Dropped {dropped} duplicate edit(s)"));
        }
        order::detect_overlaps(&deduped)?;
        let ordered = order::order(deduped);

        let mut lines = original_lines.clone();
        let mut noop_count = 0usize;
        let edits_applied = ordered.len();

        for edit in &ordered {
            let before = lines.clone();
            lines = match edit.op {
                OpKind::Replace => {
                    let start = edit.pos.as_ref().or(edit.end.as_ref()).map(|a| a.line).unwrap_or(1);
                    let end = edit.end.as_ref().map(|a| a.line).unwrap_or(start);
                    let (start, end) = (start.min(end), start.max(end));
                    apply::replace_range(&lines, start, end, &edit.payload)
                }
                OpKind::Append => match &edit.pos {
                    Some(a) => apply::insert_after(&lines, a.line, &edit.payload).map_err(EngineError::Edit)?,
                    None => apply::append(&lines, &edit.payload),
                },
                OpKind::Prepend => match &edit.pos {
                    Some(a) => apply::insert_before(&lines, a.line, &edit.payload).map_err(EngineError::Edit)?,
                    None => apply::prepend(&lines, &edit.payload),
                },
            };
            if apply::is_noop(&before, &lines) {
                noop_count += 1;
            }
        }

        if noop_count > 0 {
            warnings.push(format!("{noop_count} no-op edit(s) made no change"));
        }
        if edits_applied > 0 && noop_count == edits_applied {
            return Err(EngineError::Edit(
                "No changes made — every edit was a no-op. Re-read the file before retrying.".into(),
            ));
        }

        let new_content = lines.join("\n");
        let (had_bom, line_ending) = envelope_shape;
        let restored = Envelope {
            content: new_content,
            had_bom,
            line_ending,
        }
        .restore();

        atomic_write(&resolved, restored.as_bytes(), self.config.fsync_writes)?;

        let line_delta = lines.len() as i64 - original_lines.len() as i64;
        let action = if exists { Action::Updated } else { Action::Created };
        tracing::info!(
            file = %file_path_key,
            action = ?action,
            edits_applied,
            line_delta,
            "wrote file"
        );

        Ok(EditOutcome::Applied(Summary {
            action,
            edits_applied,
            line_delta,
            warnings,
        }))
    }
}
