//! # Design
//!
//! - Provide structured, constant-message errors for the copy and remove operations.
//! - Capture operation context (operation label, path, field) so failures are reproducible in tests.
//! - Render a single report line on demand instead of interpolating context into `Display`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for filesystem operations.
pub type FsOpsResult<T> = Result<T, FsOpsError>;

/// Errors produced by the idempotent filesystem operations.
///
/// Every variant is fatal for the running operation.
#[derive(Debug, Error)]
pub enum FsOpsError {
    /// IO failures while interacting with the filesystem.
    #[error("fsops io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Nix syscall failures.
    #[cfg(unix)]
    #[error("fsops nix failure")]
    Nix {
        /// Operation that triggered the nix failure.
        operation: &'static str,
        /// Path involved in the nix failure.
        path: PathBuf,
        /// Underlying nix error.
        source: nix::Error,
    },
    /// User lookup failed when applying ownership changes.
    #[cfg(unix)]
    #[error("fsops user lookup failed")]
    UserLookup {
        /// Username that failed lookup.
        user: String,
        /// Underlying nix error.
        source: nix::Error,
    },
    /// Group lookup failed when applying ownership changes.
    #[cfg(unix)]
    #[error("fsops group lookup failed")]
    GroupLookup {
        /// Group name that failed lookup.
        group: String,
        /// Underlying nix error.
        source: nix::Error,
    },
    /// Input validation failures.
    #[error("fsops invalid input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// Unsupported operation on the current platform.
    #[error("fsops unsupported operation")]
    Unsupported {
        /// Operation that is unsupported.
        operation: &'static str,
        /// Optional value that triggered the unsupported error.
        value: Option<String>,
    },
}

impl FsOpsError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    #[cfg(unix)]
    pub(crate) fn nix(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: nix::Error,
    ) -> Self {
        Self::Nix {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_input(
        field: &'static str,
        reason: &'static str,
        value: impl Into<String>,
    ) -> Self {
        Self::InvalidInput {
            field,
            reason,
            value: Some(value.into()),
        }
    }

    /// Render the error as the single-line message recorded in an operation report.
    #[must_use]
    pub fn report_message(&self) -> String {
        match self {
            Self::Io {
                operation,
                path,
                source,
            } => format!("{operation} failed for '{}': {source}", path.display()),
            #[cfg(unix)]
            Self::Nix {
                operation,
                path,
                source,
            } => format!("{operation} failed for '{}': {source}", path.display()),
            #[cfg(unix)]
            Self::UserLookup { user, source } => {
                format!("unable to look up user '{user}': {source}")
            }
            #[cfg(unix)]
            Self::GroupLookup { group, source } => {
                format!("unable to look up group '{group}': {source}")
            }
            Self::InvalidInput {
                field,
                reason,
                value: Some(value),
            } => format!("invalid {field} '{value}': {reason}"),
            Self::InvalidInput {
                field,
                reason,
                value: None,
            } => format!("invalid {field}: {reason}"),
            Self::Unsupported {
                operation,
                value: Some(value),
            } => format!("{operation} is not supported: {value}"),
            Self::Unsupported {
                operation,
                value: None,
            } => format!("{operation} is not supported"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn io_error() -> io::Error {
        io::Error::new(io::ErrorKind::NotFound, "missing")
    }

    #[test]
    fn fsops_error_helpers_build_variants() {
        let io_err = FsOpsError::io("copy.open_source", "/tmp/a", io_error());
        assert!(matches!(io_err, FsOpsError::Io { .. }));
        assert!(io_err.source().is_some());

        let input_err = FsOpsError::invalid_input("mode", "invalid_octal", "0999");
        assert!(matches!(
            input_err,
            FsOpsError::InvalidInput {
                field: "mode",
                reason: "invalid_octal",
                value: Some(_),
            }
        ));
        assert!(input_err.source().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn nix_helper_preserves_source() {
        let err = FsOpsError::nix("set_perms.chown", "/tmp/a", nix::Error::EPERM);
        assert!(matches!(err, FsOpsError::Nix { .. }));
        assert!(err.source().is_some());
        assert!(err.report_message().starts_with("set_perms.chown failed for '/tmp/a'"));
    }

    #[test]
    fn report_message_names_operation_and_path() {
        let err = FsOpsError::io("copy.rename", "/srv/data/file.tmp", io_error());
        let message = err.report_message();
        assert!(message.contains("copy.rename"));
        assert!(message.contains("/srv/data/file.tmp"));
        assert!(message.contains("missing"));
    }

    #[test]
    fn report_message_covers_validation_variants() {
        let with_value = FsOpsError::invalid_input("mode", "invalid_octal", "rwx");
        assert_eq!(
            with_value.report_message(),
            "invalid mode 'rwx': invalid_octal"
        );

        let without_value = FsOpsError::InvalidInput {
            field: "source",
            reason: "empty",
            value: None,
        };
        assert_eq!(without_value.report_message(), "invalid source: empty");

        let unsupported = FsOpsError::Unsupported {
            operation: "set_perms.mode",
            value: Some("unix_only".to_string()),
        };
        assert_eq!(
            unsupported.report_message(),
            "set_perms.mode is not supported: unix_only"
        );
    }
}
