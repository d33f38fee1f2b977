//! Path containment for the file tools.
//!
//! Requested paths are joined onto the root and normalized lexically, so
//! `sub/../a.txt` is fine while `../a.txt` is not. When part of the path
//! already exists on disk, its real location is checked as well, which
//! catches symlinks pointing outside the root.

use std::path::{Component, Path, PathBuf};

use crate::tool::ToolError;

/// Resolve `requested` against `root` and reject anything that lands outside it.
pub fn resolve_within(root: &Path, requested: &str) -> Result<PathBuf, ToolError> {
    let root = normalize(&absolute(root)?);
    let candidate = normalize(&root.join(requested));

    if !candidate.starts_with(&root) {
        return Err(ToolError::PermissionDenied(format!(
            "'{requested}' is outside the working directory"
        )));
    }

    if let (Some(existing), Ok(real_root)) = (deepest_existing(&candidate), root.canonicalize()) {
        if let Ok(real) = existing.canonicalize() {
            if !real.starts_with(&real_root) {
                return Err(ToolError::PermissionDenied(format!(
                    "'{requested}' resolves outside the working directory"
                )));
            }
        }
    }

    Ok(candidate)
}

fn absolute(path: &Path) -> Result<PathBuf, ToolError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|e| ToolError::Io(format!("cannot resolve current directory: {e}")))
}

/// Lexical normalization: drops `.`, folds `..` into its parent.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn deepest_existing(path: &Path) -> Option<&Path> {
    path.ancestors().find(|p| p.exists())
}
