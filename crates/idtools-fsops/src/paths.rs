//! Path normalisation for operation inputs.
//!
//! Operations only ever consume absolute, lexically cleaned paths; callers run raw
//! input through [`normalize_path`] once before building a request.

use std::path::{self, Component, Path, PathBuf};

use crate::error::{FsOpsError, FsOpsResult};

/// Convert a raw user-supplied path into an absolute, cleaned path.
///
/// `.` components are dropped and `..` components consume the preceding component
/// without ever escaping the filesystem root. Symlinks are not resolved.
///
/// # Errors
///
/// Returns [`FsOpsError::InvalidInput`] for empty input and [`FsOpsError::Io`] when
/// the current directory cannot be determined.
pub fn normalize_path(raw: impl AsRef<Path>) -> FsOpsResult<PathBuf> {
    let raw = raw.as_ref();
    if raw.as_os_str().is_empty() {
        return Err(FsOpsError::InvalidInput {
            field: "path",
            reason: "empty",
            value: None,
        });
    }
    let absolute =
        path::absolute(raw).map_err(|source| FsOpsError::io("normalize.absolute", raw, source))?;
    Ok(clean(&absolute))
}

fn clean(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                cleaned.push(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(cleaned.components().next_back(), Some(Component::Normal(_))) {
                    cleaned.pop();
                }
            }
        }
    }
    cleaned
}
