//! Idempotent copy and remove operations.
//!
//! # Design
//! - Mutations only happen when the comparator (copy) or an existence check (remove)
//!   says they are needed; repeated runs converge and then report no change.
//! - A failed step leaves the target either untouched or recoverable from a sibling
//!   path, which is named in the returned error.
//! - Operations record into an [`OperationContext`] and return a `Result`; they never
//!   decide the process exit code.

use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::atomic::{self, COPY_TEMP_SUFFIX, REMOVE_TEMP_SUFFIX, sibling_path};
use crate::compare::compare_files;
use crate::error::{FsOpsError, FsOpsResult};
use crate::outcome::{OperationContext, PathField};
use crate::perms::{Ownership, PermissionSpec, SystemOwnership};

/// Inputs for an idempotent copy. Paths must already be normalised.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CopyRequest {
    /// File whose content and permissions should be mirrored.
    pub source: PathBuf,
    /// File to create or update.
    pub destination: PathBuf,
    /// Ownership and mode for the destination.
    pub permissions: PermissionSpec,
}

/// Inputs for an idempotent removal. The path must already be normalised.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoveRequest {
    /// File that must not exist afterwards.
    pub path: PathBuf,
}

/// Runs idempotent file operations against an injected ownership capability.
#[derive(Clone, Debug, Default)]
pub struct FsOpsService<O = SystemOwnership> {
    ownership: O,
}

impl<O: Ownership> FsOpsService<O> {
    /// Construct a service that applies ownership through `ownership`.
    #[must_use]
    pub const fn new(ownership: O) -> Self {
        Self { ownership }
    }

    /// Ownership capability in use.
    #[must_use]
    pub const fn ownership(&self) -> &O {
        &self.ownership
    }

    /// Make `request.destination` match `request.source` in content and permissions.
    ///
    /// Content is only rewritten when it differs; permissions are reapplied on every
    /// run and never mark the operation as changed on their own.
    ///
    /// # Errors
    ///
    /// Any stat, read, write, permission or rename failure. If the rename fails the
    /// staging file is left next to the destination with the new content.
    pub fn copy(&self, context: &mut OperationContext, request: &CopyRequest) -> FsOpsResult<()> {
        context.set_path(PathField::Source, &request.source);
        context.set_path(PathField::Destination, &request.destination);
        record_permissions(context, &request.permissions);

        let comparison = compare_files(&request.source, &request.destination)?;
        context.fields_mut().comparison = Some(comparison);

        if comparison.is_identical() {
            return self.set_perms(&request.destination, &request.permissions);
        }

        let staging = sibling_path(&request.destination, COPY_TEMP_SUFFIX);
        let bytes = atomic::stream_to_staging(&request.source, &staging)?;
        self.set_perms(&staging, &request.permissions)?;
        if let Err(err) = atomic::publish(&staging, &request.destination) {
            warn!(
                staging = %staging.display(),
                destination = %request.destination.display(),
                "rename failed; staged content left in place"
            );
            return Err(err);
        }

        context.insert_extra("bytes", bytes.to_string());
        info!(
            source = %request.source.display(),
            destination = %request.destination.display(),
            bytes,
            comparison = comparison.as_str(),
            "copied file"
        );
        context.mark_changed(format!(
            "copied file from '{}' to '{}'",
            request.source.display(),
            request.destination.display()
        ));
        Ok(())
    }

    /// Ensure `request.path` does not exist; an already-absent path is success.
    ///
    /// The file is first hard-linked to a checkpoint sibling, then both names are
    /// unlinked, so an interruption between the two unlinks leaves the content
    /// reachable at the checkpoint.
    ///
    /// # Errors
    ///
    /// Any stat, link or unlink failure. No retry is attempted; the message names the
    /// path whose unlink failed.
    pub fn remove(&self, context: &mut OperationContext, request: &RemoveRequest) -> FsOpsResult<()> {
        let path = request.path.as_path();
        context.set_path(PathField::FilePath, path);

        match fs::metadata(path) {
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(FsOpsError::io("remove.stat", path, err)),
        }

        let checkpoint = sibling_path(path, REMOVE_TEMP_SUFFIX);
        atomic::link_checkpoint(path, &checkpoint)?;

        if let Err(err) = atomic::unlink("remove.unlink_original", path) {
            warn!(
                path = %path.display(),
                checkpoint = %checkpoint.display(),
                "original could not be unlinked; checkpoint link retained"
            );
            return Err(err);
        }
        if let Err(err) = atomic::unlink("remove.unlink_checkpoint", &checkpoint) {
            warn!(
                path = %path.display(),
                checkpoint = %checkpoint.display(),
                "checkpoint could not be unlinked; content recoverable there"
            );
            return Err(err);
        }

        info!(path = %path.display(), "removed file");
        context.mark_changed(format!("removed file '{}'", path.display()));
        Ok(())
    }
}

fn record_permissions(context: &mut OperationContext, spec: &PermissionSpec) {
    let fields = context.fields_mut();
    fields.mode = Some(format!("{:04o}", spec.mode));
    fields.owner.clone_from(&spec.owner);
    fields.group.clone_from(&spec.group);
}
