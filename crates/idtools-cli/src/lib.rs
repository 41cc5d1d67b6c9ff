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
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::redundant_pub_crate, clippy::multiple_crate_versions)]

//! Command-line front ends for the idempotent copy and remove operations.
//!
//! Layout:
//! - `cli.rs`: argument parsing, logging setup and operation dispatch
//! - `flags.rs`: single-dash long flag rewriting
//! - `output.rs`: report renderers
//! - `bin/`: thin `idcp` and `idrm` entrypoints delegating to `run_copy()`/`run_remove()`

pub(crate) mod cli;
pub(crate) mod flags;
pub(crate) mod output;

pub use cli::{run_copy, run_remove};
