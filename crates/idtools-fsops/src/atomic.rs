//! Crash-safe mutation primitives.
//!
//! Replacement content is staged next to the target and renamed into place; removal
//! first links the target under a checkpoint name. Both sibling paths live in the
//! target's directory so rename and link never cross a filesystem boundary.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

use crate::error::{FsOpsError, FsOpsResult};

/// Suffix of the staging file written before a copy is renamed into place.
pub const COPY_TEMP_SUFFIX: &str = ".tmp";

/// Suffix of the checkpoint link held while a file is being removed.
pub const REMOVE_TEMP_SUFFIX: &str = ".rmtmp";

#[cfg(unix)]
const STAGING_MODE: u32 = 0o600;

/// Append `suffix` to the final component of `path`, keeping it in the same directory.
#[must_use]
pub fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Stream the full contents of `source` into `staging`, truncating any stale content.
///
/// The staging file is owner-only until the requested mode is applied, and is
/// flushed to disk before returning so a later rename publishes complete content.
pub(crate) fn stream_to_staging(source: &Path, staging: &Path) -> FsOpsResult<u64> {
    let mut reader = File::open(source)
        .map_err(|source_err| FsOpsError::io("copy.open_source", source, source_err))?;

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(STAGING_MODE);
    let mut writer = options
        .open(staging)
        .map_err(|source_err| FsOpsError::io("copy.open_staging", staging, source_err))?;
    // A stale staging file keeps its old mode; tighten it before writing.
    #[cfg(unix)]
    writer
        .set_permissions(fs::Permissions::from_mode(STAGING_MODE))
        .map_err(|source_err| FsOpsError::io("copy.open_staging", staging, source_err))?;

    let written = io::copy(&mut reader, &mut writer)
        .map_err(|source_err| FsOpsError::io("copy.stream", staging, source_err))?;
    writer
        .sync_all()
        .map_err(|source_err| FsOpsError::io("copy.sync_staging", staging, source_err))?;
    Ok(written)
}

/// Atomically replace `destination` with `staging`.
pub(crate) fn publish(staging: &Path, destination: &Path) -> FsOpsResult<()> {
    fs::rename(staging, destination)
        .map_err(|source_err| FsOpsError::io("copy.rename", destination, source_err))
}

/// Give `path` a second name so its content survives the first unlink.
pub(crate) fn link_checkpoint(path: &Path, checkpoint: &Path) -> FsOpsResult<()> {
    fs::hard_link(path, checkpoint)
        .map_err(|source_err| FsOpsError::io("remove.link_checkpoint", checkpoint, source_err))
}

pub(crate) fn unlink(operation: &'static str, path: &Path) -> FsOpsResult<()> {
    fs::remove_file(path).map_err(|source_err| FsOpsError::io(operation, path, source_err))
}
