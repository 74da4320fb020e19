//! Ignore-aware windowed file reading (§4.10). The collaborator `read_file`
//! and the engine's read path both go through here rather than touching
//! `std::fs` directly, so ignore rules and binary/size limits apply
//! uniformly.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;

use crate::envelope::Envelope;
use crate::format::format_hashlines;
use crate::hash::compute_file_hash;

/// Files this large are rejected outright; callers must use `offset`/`limit`
/// windows instead of reading a file in one shot.
pub const MAX_FILE_BYTES: u64 = 1_000_000;
/// Default window size when no limit/around_line is given.
pub const DEFAULT_LIMIT: usize = 2000;
/// Lines of context on each side of `around_line` when `before`/`after`
/// aren't given.
const DEFAULT_CONTEXT: usize = 10;

const BINARY_SAMPLE_BYTES: usize = 4096;
const BINARY_NON_PRINTABLE_RATIO: f64 = 0.30;

const DENY_DIR_NAMES: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "__pycache__",
    ".venv",
    "dist",
    "build",
    ".tox",
];

/// Built-in deny list, as a `GlobSet` rather than a plain containment
/// check so it composes with `.gitignore`/`.ignore` matching and reads the
/// same way the rest of the tree builds globs (see `tools/glob.rs`).
static DENY_GLOBSET: LazyLock<globset::GlobSet> = LazyLock::new(|| {
    let mut builder = globset::GlobSetBuilder::new();
    for name in DENY_DIR_NAMES {
        for pattern in [format!("**/{name}/**"), format!("{name}/**")] {
            if let Ok(glob) = globset::GlobBuilder::new(&pattern)
                .literal_separator(true)
                .build()
            {
                builder.add(glob);
            }
        }
    }
    builder.build().expect("built-in deny patterns are static and always valid")
});

#[derive(Debug, thiserror::Error)]
pub enum FsReadError {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("File too large ({size} bytes, max {max})")]
    TooLarge { size: u64, max: u64 },
    #[error("Binary file detected: {0:?}")]
    Binary(PathBuf),
    #[error("Path is ignored: {0:?}")]
    Ignored(PathBuf),
}

/// Windowing request. `around_line` takes precedence over `offset`/`limit`
/// when both are given.
#[derive(Debug, Clone)]
pub struct FsReadOptions {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub around_line: Option<usize>,
    pub before: Option<usize>,
    pub after: Option<usize>,
    pub respect_git_ignore: bool,
}

impl Default for FsReadOptions {
    fn default() -> Self {
        Self {
            limit: None,
            offset: None,
            around_line: None,
            before: None,
            after: None,
            respect_git_ignore: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FsReadResult {
    pub bytes: u64,
    pub content: String,
    pub numbered_content: String,
    pub total_lines: usize,
    pub start_line: usize,
    pub end_line: usize,
    pub truncated: bool,
    pub file_hash: String,
    pub last_modified: SystemTime,
}

/// Read `path` through the ignore/binary/size gates and return the
/// requested line window, hashline-formatted.
pub fn read_windowed(path: &Path, opts: &FsReadOptions) -> Result<FsReadResult, FsReadError> {
    if is_denied_by_builtin(path) || (opts.respect_git_ignore && is_git_ignored(path)) {
        return Err(FsReadError::Ignored(path.to_path_buf()));
    }

    let metadata = std::fs::metadata(path)?;
    let size = metadata.len();
    if size > MAX_FILE_BYTES {
        return Err(FsReadError::TooLarge {
            size,
            max: MAX_FILE_BYTES,
        });
    }
    let last_modified = metadata.modified()?;

    let raw = std::fs::read(path)?;
    let sample_len = raw.len().min(BINARY_SAMPLE_BYTES);
    if is_binary_sample(&raw[..sample_len]) {
        return Err(FsReadError::Binary(path.to_path_buf()));
    }

    let file_hash = compute_file_hash(&raw);
    let text = String::from_utf8_lossy(&raw).into_owned();
    let envelope = Envelope::canonicalize(&text);

    let all_lines: Vec<&str> = if envelope.content.is_empty() {
        Vec::new()
    } else {
        envelope.content.split('\n').collect()
    };
    let total_lines = all_lines.len();

    let (start_line, end_line) = resolve_window(opts, total_lines);
    let start_idx = start_line.saturating_sub(1).min(total_lines);
    let end_idx = end_line.min(total_lines);
    let selected = &all_lines[start_idx..end_idx];

    let content = selected.join("\n");
    let numbered_content = format_hashlines(&content, start_line);
    let truncated = end_idx < total_lines || start_idx > 0;

    Ok(FsReadResult {
        bytes: size,
        content,
        numbered_content,
        total_lines,
        start_line,
        end_line: start_idx + selected.len(),
        truncated,
        file_hash,
        last_modified,
    })
}

fn resolve_window(opts: &FsReadOptions, total_lines: usize) -> (usize, usize) {
    if let Some(center) = opts.around_line {
        let before = opts.before.unwrap_or(DEFAULT_CONTEXT);
        let after = opts.after.unwrap_or(DEFAULT_CONTEXT);
        let start = center.saturating_sub(before).max(1);
        let end = center.saturating_add(after).min(total_lines.max(1));
        return (start, end);
    }
    let start = opts.offset.unwrap_or(1).max(1);
    let limit = opts.limit.unwrap_or(DEFAULT_LIMIT);
    let end = start.saturating_add(limit).saturating_sub(1);
    (start, end)
}

fn is_binary_sample(data: &[u8]) -> bool {
    if data.is_empty() {
        return false;
    }
    if data.contains(&0) {
        return true;
    }
    let non_printable = data
        .iter()
        .filter(|&&b| !(b.is_ascii_graphic() || b.is_ascii_whitespace()))
        .count();
    (non_printable as f64 / data.len() as f64) >= BINARY_NON_PRINTABLE_RATIO
}

fn is_denied_by_builtin(path: &Path) -> bool {
    DENY_GLOBSET.is_match(path)
}

/// Walk up from `path` looking for a `.git` directory; that's where we
/// anchor the ignore-file chain. Falls back to the file's own directory
/// when there's no repository.
fn find_ignore_root(path: &Path) -> PathBuf {
    let start = path.parent().unwrap_or_else(|| Path::new("."));
    let mut dir = start.to_path_buf();
    loop {
        if dir.join(".git").exists() {
            return dir;
        }
        match dir.parent() {
            Some(parent) => dir = parent.to_path_buf(),
            None => return start.to_path_buf(),
        }
    }
}

/// Layer `.gitignore`/`.ignore`/`.fdignore` from the ignore root down to
/// the file's own directory, plus `.git/info/exclude`, and check whether
/// `path` is ignored by any of them.
fn is_git_ignored(path: &Path) -> bool {
    let root = find_ignore_root(path);
    let mut builder = ignore::gitignore::GitignoreBuilder::new(&root);

    let mut dirs = vec![root.clone()];
    if let Some(parent) = path.parent() {
        if let Ok(rel) = parent.strip_prefix(&root) {
            let mut cur = root.clone();
            for component in rel.components() {
                cur = cur.join(component.as_os_str());
                dirs.push(cur.clone());
            }
        }
    }

    for dir in &dirs {
        for name in [".gitignore", ".ignore", ".fdignore"] {
            let candidate = dir.join(name);
            if candidate.is_file() {
                let _ = builder.add(candidate);
            }
        }
    }
    let exclude = root.join(".git").join("info").join("exclude");
    if exclude.is_file() {
        let _ = builder.add(exclude);
    }

    match builder.build() {
        Ok(gi) => gi.matched(path, false).is_ignore(),
        Err(_) => false,
    }
}
