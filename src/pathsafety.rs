//! Path safety checks and atomic file writes (§4.9).

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PathSafetyError {
    #[error("Path traversal blocked: {0:?} escapes the project root")]
    Traversal(PathBuf),
    #[error("Refusing to operate on symlink: {0:?}")]
    Symlink(PathBuf),
    #[error("invalid project root {0:?}: {1}")]
    InvalidRoot(PathBuf, io::Error),
}

/// Resolve `requested` (absolute or relative) against `root`, rejecting
/// `..` segments, paths that land outside `root`, and symlinked targets.
/// Does not require `requested` to exist; does require `root` to exist.
pub fn resolve_safe_path(root: &Path, requested: &Path) -> Result<PathBuf, PathSafetyError> {
    if requested
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(PathSafetyError::Traversal(requested.to_path_buf()));
    }

    let root_canon = root
        .canonicalize()
        .map_err(|e| PathSafetyError::InvalidRoot(root.to_path_buf(), e))?;

    let joined = if requested.is_absolute() {
        requested.to_path_buf()
    } else {
        root_canon.join(requested)
    };
    let candidate = normalize_lexically(&joined);

    if !candidate.starts_with(&root_canon) {
        return Err(PathSafetyError::Traversal(requested.to_path_buf()));
    }

    if let Ok(meta) = fs::symlink_metadata(&candidate) {
        if meta.file_type().is_symlink() {
            return Err(PathSafetyError::Symlink(candidate));
        }
    }

    Ok(candidate)
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Write `content` to `path` crash-safely: write to a sibling temp file
/// named with a random suffix under `O_CREAT | O_EXCL | O_WRONLY`,
/// optionally `fsync`, then `rename` onto `path`. `rename` does not follow
/// a symlink at the destination (POSIX semantics), so this never clobbers
/// through one. The temp file is unlinked if any step fails.
pub fn atomic_write(path: &Path, content: &[u8], fsync: bool) -> io::Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("hashline-tmp");
    let tmp_path = dir.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    let result = (|| -> io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&tmp_path)?;
        use std::io::Write;
        file.write_all(content)?;
        if fsync {
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;
        if fsync {
            if let Ok(parent_dir) = fs::File::open(dir) {
                let _ = parent_dir.sync_all();
            }
        }
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}
