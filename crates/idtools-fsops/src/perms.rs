//! Ownership and mode application.
//!
//! # Design
//! - Ownership support is an injected capability ([`Ownership`]) rather than a
//!   platform check buried in the operation, so the copy logic runs on any host.
//! - Permissions are applied unconditionally whenever reached; they never flip the
//!   `changed` flag of an operation.
//! - Owner and group names that do not resolve map to id 0; `chown` decides whether
//!   that is acceptable.

use std::fmt;
use std::path::Path;

#[cfg(unix)]
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

#[cfg(unix)]
use nix::unistd::{Gid, Group, Uid, User, chown, getegid, geteuid};
use tracing::{debug, warn};

use crate::error::{FsOpsError, FsOpsResult};
use crate::service::FsOpsService;

/// Mode applied by the copy tool when none is requested.
pub const DEFAULT_MODE: u32 = 0o644;

const MAX_MODE: u32 = 0o7777;

const UNRESOLVED_ACCOUNT: Account = Account { uid: 0, gid: 0 };

/// Requested ownership and mode for a destination file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PermissionSpec {
    /// Owner name or numeric uid; `None` keeps the process default.
    pub owner: Option<String>,
    /// Group name or numeric gid; `None` keeps the process default.
    pub group: Option<String>,
    /// Numeric permission bits.
    pub mode: u32,
}

impl PermissionSpec {
    /// Build a spec from raw flag values, treating blank owner/group as unset.
    #[must_use]
    pub fn new(owner: &str, group: &str, mode: u32) -> Self {
        Self {
            owner: non_blank(owner),
            group: non_blank(group),
            mode,
        }
    }
}

impl Default for PermissionSpec {
    fn default() -> Self {
        Self {
            owner: None,
            group: None,
            mode: DEFAULT_MODE,
        }
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Parse an octal mode string such as `0644`, `644` or `0o644`.
///
/// # Errors
///
/// Returns [`FsOpsError::InvalidInput`] when the value is not octal or exceeds `0o7777`.
pub fn parse_octal_mode(field: &'static str, value: &str) -> FsOpsResult<u32> {
    let trimmed = value.trim();
    let digits = trimmed.strip_prefix("0o").unwrap_or(trimmed);
    let mode = u32::from_str_radix(digits, 8)
        .map_err(|_| FsOpsError::invalid_input(field, "invalid_octal", value))?;
    if mode > MAX_MODE {
        return Err(FsOpsError::invalid_input(field, "out_of_range", value));
    }
    Ok(mode)
}

/// Numeric identity of a resolved user account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Account {
    /// User id.
    pub uid: u32,
    /// Primary group id.
    pub gid: u32,
}

/// Platform capability for resolving and changing file ownership.
pub trait Ownership: fmt::Debug {
    /// Whether ownership and mode changes are applied at all on this host.
    fn supports_ownership_change(&self) -> bool;

    /// Resolve a user name to its ids, `None` when no such user exists.
    ///
    /// # Errors
    ///
    /// Returns an error when the account database cannot be queried.
    fn lookup_user(&self, name: &str) -> FsOpsResult<Option<Account>>;

    /// Resolve a group name to its id, `None` when no such group exists.
    ///
    /// # Errors
    ///
    /// Returns an error when the group database cannot be queried.
    fn lookup_group(&self, name: &str) -> FsOpsResult<Option<u32>>;

    /// Effective uid and gid of the running process.
    fn effective_ids(&self) -> (u32, u32);

    /// Change the owner and group of `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the ownership change is rejected.
    fn change_owner(&self, path: &Path, uid: u32, gid: u32) -> FsOpsResult<()>;
}

/// Ownership backed by the host account database and `chown(2)`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemOwnership;

#[cfg(unix)]
impl Ownership for SystemOwnership {
    fn supports_ownership_change(&self) -> bool {
        true
    }

    fn lookup_user(&self, name: &str) -> FsOpsResult<Option<Account>> {
        let user = User::from_name(name).map_err(|source| FsOpsError::UserLookup {
            user: name.to_string(),
            source,
        })?;
        Ok(user.map(|user| Account {
            uid: user.uid.as_raw(),
            gid: user.gid.as_raw(),
        }))
    }

    fn lookup_group(&self, name: &str) -> FsOpsResult<Option<u32>> {
        let group = Group::from_name(name).map_err(|source| FsOpsError::GroupLookup {
            group: name.to_string(),
            source,
        })?;
        Ok(group.map(|group| group.gid.as_raw()))
    }

    fn effective_ids(&self) -> (u32, u32) {
        (geteuid().as_raw(), getegid().as_raw())
    }

    fn change_owner(&self, path: &Path, uid: u32, gid: u32) -> FsOpsResult<()> {
        chown(path, Some(Uid::from_raw(uid)), Some(Gid::from_raw(gid)))
            .map_err(|source| FsOpsError::nix("set_perms.chown", path, source))
    }
}

#[cfg(not(unix))]
impl Ownership for SystemOwnership {
    fn supports_ownership_change(&self) -> bool {
        false
    }

    fn lookup_user(&self, name: &str) -> FsOpsResult<Option<Account>> {
        NoOwnership.lookup_user(name)
    }

    fn lookup_group(&self, name: &str) -> FsOpsResult<Option<u32>> {
        NoOwnership.lookup_group(name)
    }

    fn effective_ids(&self) -> (u32, u32) {
        NoOwnership.effective_ids()
    }

    fn change_owner(&self, path: &Path, uid: u32, gid: u32) -> FsOpsResult<()> {
        NoOwnership.change_owner(path, uid, gid)
    }
}

/// Capability for hosts without an ownership model; permission application is skipped.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOwnership;

impl Ownership for NoOwnership {
    fn supports_ownership_change(&self) -> bool {
        false
    }

    fn lookup_user(&self, _name: &str) -> FsOpsResult<Option<Account>> {
        Ok(None)
    }

    fn lookup_group(&self, _name: &str) -> FsOpsResult<Option<u32>> {
        Ok(None)
    }

    fn effective_ids(&self) -> (u32, u32) {
        (0, 0)
    }

    fn change_owner(&self, _path: &Path, _uid: u32, _gid: u32) -> FsOpsResult<()> {
        Err(FsOpsError::Unsupported {
            operation: "set_perms.chown",
            value: Some("no_ownership_model".to_string()),
        })
    }
}

impl<O: Ownership> FsOpsService<O> {
    /// Apply owner, group and mode to `path`.
    ///
    /// This always runs when reached; there is no attempt to detect that the
    /// requested permissions are already in place. Hosts without ownership support
    /// skip the whole step.
    ///
    /// # Errors
    ///
    /// Fails when the account database cannot be queried or when either the ownership
    /// or the mode change is rejected. Unknown names are not an error here.
    pub fn set_perms(&self, path: &Path, spec: &PermissionSpec) -> FsOpsResult<()> {
        if !self.ownership().supports_ownership_change() {
            debug!(path = %path.display(), "ownership unsupported; skipping permissions");
            return Ok(());
        }

        let (uid, gid) = self.resolve_ids(spec)?;
        self.ownership().change_owner(path, uid, gid)?;
        apply_mode(path, spec.mode)?;
        debug!(
            path = %path.display(),
            uid,
            gid,
            mode = format_args!("{:04o}", spec.mode),
            "permissions applied"
        );
        Ok(())
    }

    fn resolve_ids(&self, spec: &PermissionSpec) -> FsOpsResult<(u32, u32)> {
        let (mut uid, mut gid) = self.ownership().effective_ids();
        if let Some(owner) = spec.owner.as_deref() {
            let (owner_uid, owner_gid) = self.resolve_owner(owner)?;
            uid = owner_uid;
            if let Some(owner_gid) = owner_gid {
                gid = owner_gid;
            }
        }
        if let Some(group) = spec.group.as_deref() {
            gid = self.resolve_group(group)?;
        }
        Ok((uid, gid))
    }

    fn resolve_owner(&self, owner: &str) -> FsOpsResult<(u32, Option<u32>)> {
        if let Ok(id) = owner.parse::<u32>() {
            return Ok((id, None));
        }
        let account = self.ownership().lookup_user(owner)?.unwrap_or_else(|| {
            warn!(owner, "unknown owner; falling back to uid 0 and gid 0");
            UNRESOLVED_ACCOUNT
        });
        Ok((account.uid, Some(account.gid)))
    }

    fn resolve_group(&self, group: &str) -> FsOpsResult<u32> {
        if let Ok(id) = group.parse::<u32>() {
            return Ok(id);
        }
        Ok(self.ownership().lookup_group(group)?.unwrap_or_else(|| {
            warn!(group, "unknown group; falling back to gid 0");
            UNRESOLVED_ACCOUNT.gid
        }))
    }
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: u32) -> FsOpsResult<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|source| FsOpsError::io("set_perms.chmod", path, source))
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, mode: u32) -> FsOpsResult<()> {
    Err(FsOpsError::Unsupported {
        operation: "set_perms.chmod",
        value: Some(format!("{mode:04o}")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::cell::RefCell;
    use std::path::PathBuf;

    type TestResult<T> = Result<T>;

    /// Ownership double that records `chown` calls instead of performing them.
    #[derive(Debug, Default)]
    struct RecordingOwnership {
        calls: RefCell<Vec<(PathBuf, u32, u32)>>,
    }

    impl Ownership for RecordingOwnership {
        fn supports_ownership_change(&self) -> bool {
            true
        }

        fn lookup_user(&self, name: &str) -> FsOpsResult<Option<Account>> {
            Ok((name == "deploy").then_some(Account {
                uid: 1500,
                gid: 1600,
            }))
        }

        fn lookup_group(&self, name: &str) -> FsOpsResult<Option<u32>> {
            Ok((name == "www").then_some(1700))
        }

        fn effective_ids(&self) -> (u32, u32) {
            (1000, 1001)
        }

        fn change_owner(&self, path: &Path, uid: u32, gid: u32) -> FsOpsResult<()> {
            self.calls
                .borrow_mut()
                .push((path.to_path_buf(), uid, gid));
            Ok(())
        }
    }

    fn spec(owner: &str, group: &str) -> PermissionSpec {
        PermissionSpec::new(owner, group, DEFAULT_MODE)
    }

    #[test]
    fn parse_octal_mode_validates_values() -> TestResult<()> {
        assert_eq!(parse_octal_mode("mode", "0644")?, 0o644);
        assert_eq!(parse_octal_mode("mode", "600")?, 0o600);
        assert_eq!(parse_octal_mode("mode", "0o755")?, 0o755);
        assert_eq!(parse_octal_mode("mode", "4755")?, 0o4755);
        assert!(parse_octal_mode("mode", "not-a-mode").is_err());
        assert!(parse_octal_mode("mode", "0999").is_err());
        assert!(parse_octal_mode("mode", "").is_err());
        assert!(matches!(
            parse_octal_mode("mode", "17777"),
            Err(FsOpsError::InvalidInput {
                reason: "out_of_range",
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn permission_spec_treats_blank_names_as_unset() {
        let spec = PermissionSpec::new("  ", "", 0o600);
        assert_eq!(spec.owner, None);
        assert_eq!(spec.group, None);
        assert_eq!(spec.mode, 0o600);
        assert_eq!(PermissionSpec::default().mode, DEFAULT_MODE);
    }

    #[test]
    fn resolve_ids_defaults_to_effective_ids() -> TestResult<()> {
        let service = FsOpsService::new(RecordingOwnership::default());
        assert_eq!(service.resolve_ids(&spec("", ""))?, (1000, 1001));
        Ok(())
    }

    #[test]
    fn resolve_ids_uses_owner_primary_group() -> TestResult<()> {
        let service = FsOpsService::new(RecordingOwnership::default());
        assert_eq!(service.resolve_ids(&spec("deploy", ""))?, (1500, 1600));
        assert_eq!(service.resolve_ids(&spec("deploy", "www"))?, (1500, 1700));
        assert_eq!(service.resolve_ids(&spec("", "www"))?, (1000, 1700));
        Ok(())
    }

    #[test]
    fn resolve_ids_accepts_numeric_ids() -> TestResult<()> {
        let service = FsOpsService::new(RecordingOwnership::default());
        assert_eq!(service.resolve_ids(&spec("42", ""))?, (42, 1001));
        assert_eq!(service.resolve_ids(&spec("42", "43"))?, (42, 43));
        Ok(())
    }

    #[test]
    fn resolve_ids_maps_unknown_names_to_zero() -> TestResult<()> {
        let service = FsOpsService::new(RecordingOwnership::default());
        assert_eq!(service.resolve_ids(&spec("ghost", ""))?, (0, 0));
        assert_eq!(service.resolve_ids(&spec("", "ghosts"))?, (1000, 0));
        assert_eq!(service.resolve_ids(&spec("ghost", "www"))?, (0, 1700));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn set_perms_with_unknown_owner_still_chowns_and_applies_mode() -> TestResult<()> {
        let temp = tempfile::Builder::new().prefix("idtools-perms-").tempdir()?;
        let path = temp.path().join("file");
        fs::write(&path, b"content")?;

        let service = FsOpsService::new(RecordingOwnership::default());
        service.set_perms(&path, &PermissionSpec::new("no_such_user", "", 0o600))?;

        assert_eq!(
            service.ownership().calls.borrow().as_slice(),
            &[(path.clone(), 0, 0)]
        );
        assert_eq!(fs::metadata(&path)?.permissions().mode() & 0o7777, 0o600);
        Ok(())
    }

    #[test]
    fn set_perms_is_noop_without_ownership_support() -> TestResult<()> {
        let temp = tempfile::Builder::new().prefix("idtools-perms-").tempdir()?;
        let path = temp.path().join("file");
        std::fs::write(&path, b"content")?;
        let before = std::fs::metadata(&path)?.permissions();

        let service = FsOpsService::new(NoOwnership);
        service.set_perms(&path, &PermissionSpec::new("ghost", "", 0o600))?;

        assert_eq!(std::fs::metadata(&path)?.permissions(), before);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn set_perms_applies_owner_then_mode() -> TestResult<()> {
        let temp = tempfile::Builder::new().prefix("idtools-perms-").tempdir()?;
        let path = temp.path().join("file");
        fs::write(&path, b"content")?;

        let service = FsOpsService::new(RecordingOwnership::default());
        service.set_perms(&path, &PermissionSpec::new("deploy", "", 0o640))?;

        assert_eq!(
            service.ownership().calls.borrow().as_slice(),
            &[(path.clone(), 1500, 1600)]
        );
        assert_eq!(fs::metadata(&path)?.permissions().mode() & 0o7777, 0o640);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn set_perms_with_system_ownership_keeps_process_ids() -> TestResult<()> {
        use std::os::unix::fs::MetadataExt;

        let temp = tempfile::Builder::new().prefix("idtools-perms-").tempdir()?;
        let path = temp.path().join("file");
        fs::write(&path, b"content")?;

        let service = FsOpsService::new(SystemOwnership);
        service.set_perms(&path, &PermissionSpec::new("", "", 0o600))?;

        let meta = fs::metadata(&path)?;
        assert_eq!(meta.uid(), geteuid().as_raw());
        assert_eq!(meta.gid(), getegid().as_raw());
        assert_eq!(meta.permissions().mode() & 0o7777, 0o600);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn set_perms_reports_missing_path() -> TestResult<()> {
        let temp = tempfile::Builder::new().prefix("idtools-perms-").tempdir()?;
        let missing = temp.path().join("missing");

        let service = FsOpsService::new(SystemOwnership);
        let err = service.set_perms(&missing, &PermissionSpec::default()).err();
        assert!(matches!(
            err,
            Some(FsOpsError::Nix {
                operation: "set_perms.chown",
                ..
            })
        ));
        Ok(())
    }
}
