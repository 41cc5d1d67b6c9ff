#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions, clippy::multiple_crate_versions)]

//! Idempotent, declarative file primitives.
//!
//! Layout:
//! - `compare.rs`: content comparator deciding whether a copy is needed
//! - `atomic.rs`: staging/rename and link-checkpoint mutation primitives
//! - `perms.rs`: ownership capability, mode parsing, permission application
//! - `service.rs`: the copy and remove operations
//! - `outcome.rs`: per-operation context and the report it produces
//! - `paths.rs`: input path normalisation

pub mod atomic;
pub mod compare;
pub mod error;
pub mod outcome;
pub mod paths;
pub mod perms;
pub mod service;

pub use atomic::{COPY_TEMP_SUFFIX, REMOVE_TEMP_SUFFIX, sibling_path};
pub use compare::{Comparison, compare_files, is_same_file};
pub use error::{FsOpsError, FsOpsResult};
pub use outcome::{
    COMMENT_SEPARATOR, OperationContext, OperationKind, OperationReport, PathField, ReportFields,
    ReportLine,
};
pub use paths::normalize_path;
pub use perms::{
    Account, DEFAULT_MODE, NoOwnership, Ownership, PermissionSpec, SystemOwnership,
    parse_octal_mode,
};
pub use service::{CopyRequest, FsOpsService, RemoveRequest};
