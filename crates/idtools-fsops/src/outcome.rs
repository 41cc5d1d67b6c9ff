//! Operation context and the report it produces.
//!
//! # Design
//! - Each top-level operation owns exactly one [`OperationContext`] for its lifetime.
//! - The context is consumed once by [`OperationContext::finish`]; the resulting
//!   [`OperationReport`] carries the exit code but never terminates the process.
//! - Diagnostic fields are typed; `extra` exists for genuinely open-ended values.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::error;

use crate::compare::Comparison;
use crate::error::FsOpsResult;

/// Separator used when joining operation comments.
pub const COMMENT_SEPARATOR: &str = " | ";

/// Top-level operation recorded in a report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Idempotent copy.
    Copy,
    /// Idempotent removal.
    Remove,
}

impl OperationKind {
    /// Name used as the report `function` value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Remove => "remove",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Diagnostic fields attached to a report.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReportFields {
    /// Copy source path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    /// Copy destination path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    /// Path targeted by a removal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filepath: Option<PathBuf>,
    /// Requested mode rendered as four octal digits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// Requested owner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Requested group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Comparator verdict for copies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<Comparison>,
    /// Additional key/value pairs, emitted in key order.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl ReportFields {
    /// Populated fields as `(key, value)` pairs in emission order.
    #[must_use]
    pub fn entries(&self) -> Vec<(&str, String)> {
        let mut entries = Vec::new();
        let paths = [
            ("source", self.source.as_deref()),
            ("destination", self.destination.as_deref()),
            ("filepath", self.filepath.as_deref()),
        ];
        for (key, path) in paths {
            if let Some(path) = path {
                entries.push((key, path.display().to_string()));
            }
        }
        let labels = [
            ("mode", self.mode.as_deref()),
            ("owner", self.owner.as_deref()),
            ("group", self.group.as_deref()),
            ("comparison", self.comparison.map(Comparison::as_str)),
        ];
        for (key, value) in labels {
            if let Some(value) = value {
                entries.push((key, value.to_string()));
            }
        }
        entries.extend(
            self.extra
                .iter()
                .map(|(key, value)| (key.as_str(), value.clone())),
        );
        entries
    }
}

/// Mutable outcome record owned by a single running operation.
#[derive(Debug)]
pub struct OperationContext {
    kind: OperationKind,
    started_at: DateTime<Utc>,
    changed: bool,
    comments: Vec<String>,
    fields: ReportFields,
}

impl OperationContext {
    /// Start recording a new operation.
    #[must_use]
    pub fn begin(kind: OperationKind) -> Self {
        Self {
            kind,
            started_at: Utc::now(),
            changed: false,
            comments: Vec::new(),
            fields: ReportFields::default(),
        }
    }

    /// Record that the filesystem was mutated, with a note describing how.
    pub fn mark_changed(&mut self, comment: impl Into<String>) {
        self.changed = true;
        self.add_comment(comment);
    }

    /// Append a note to the report comment.
    pub fn add_comment(&mut self, comment: impl Into<String>) {
        self.comments.push(comment.into());
    }

    /// Diagnostic fields, for operations to fill in as they learn them.
    pub const fn fields_mut(&mut self) -> &mut ReportFields {
        &mut self.fields
    }

    /// Attach an open-ended diagnostic value.
    pub fn insert_extra(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.extra.insert(key.into(), value.into());
    }

    /// Record a path-valued field.
    pub fn set_path(&mut self, field: PathField, path: &Path) {
        let slot = match field {
            PathField::Source => &mut self.fields.source,
            PathField::Destination => &mut self.fields.destination,
            PathField::FilePath => &mut self.fields.filepath,
        };
        *slot = Some(path.to_path_buf());
    }

    /// Consume the context and produce the final report for `result`.
    #[must_use]
    pub fn finish(self, result: FsOpsResult<()>) -> OperationReport {
        let error = match result {
            Ok(()) => String::new(),
            Err(err) => {
                let message = err.report_message();
                error!(function = self.kind.as_str(), error = %message, "operation failed");
                message
            }
        };
        OperationReport {
            function: self.kind,
            started_at: self.started_at,
            finished_at: Utc::now(),
            changed: self.changed,
            comment: self.comments.join(COMMENT_SEPARATOR),
            error,
            fields: self.fields,
        }
    }
}

/// Path-valued report fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathField {
    /// `source`
    Source,
    /// `destination`
    Destination,
    /// `filepath`
    FilePath,
}

/// Final, immutable result of one operation.
#[derive(Clone, Debug, Serialize)]
pub struct OperationReport {
    /// Operation that ran.
    pub function: OperationKind,
    /// When the operation began.
    pub started_at: DateTime<Utc>,
    /// When the report was produced.
    pub finished_at: DateTime<Utc>,
    /// Whether content on disk was mutated.
    pub changed: bool,
    /// Joined human-readable notes; empty when nothing was recorded.
    pub comment: String,
    /// Fatal error message; empty on success.
    pub error: String,
    /// Diagnostic fields.
    #[serde(flatten)]
    pub fields: ReportFields,
}

impl OperationReport {
    /// Whether the operation completed without a fatal error.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.error.is_empty()
    }

    /// Process exit code for this report: `0` on success, `1` on any fatal error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        if self.succeeded() { 0 } else { 1 }
    }

    /// Report rendered as one line per field, `start` first and `finish` last.
    #[must_use]
    pub fn lines(&self) -> Vec<ReportLine> {
        let started = format_timestamp(self.started_at);
        let finished = format_timestamp(self.finished_at);
        let line = |timestamp: &str, key: &str, value: String| ReportLine {
            timestamp: timestamp.to_string(),
            function: self.function,
            key: key.to_string(),
            value,
        };

        let mut lines = vec![
            line(&started, "start", started.clone()),
            line(&started, "function", self.function.as_str().to_string()),
        ];
        lines.extend(
            self.fields
                .entries()
                .into_iter()
                .map(|(key, value)| line(&finished, key, value)),
        );
        lines.push(line(&finished, "changed", self.changed.to_string()));
        lines.push(line(&finished, "comment", self.comment.clone()));
        lines.push(line(&finished, "error", self.error.clone()));
        lines.push(line(&finished, "finish", finished.clone()));
        lines
    }
}

/// One emitted report line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportLine {
    /// RFC 3339 timestamp.
    pub timestamp: String,
    /// Operation the line belongs to.
    pub function: OperationKind,
    /// Field key.
    pub key: String,
    /// Field value, possibly empty.
    pub value: String,
}

/// Renders `timestamp\tfunction\tkey\tvalue`. Control characters in the value are
/// escaped (`\t`, `\n`, `\u{1b}`) so every field stays on one line.
impl fmt::Display for ReportLine {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "{}\t{}\t{}\t",
            self.timestamp, self.function, self.key
        )?;
        for ch in self.value.chars() {
            if ch.is_control() {
                write!(formatter, "{}", ch.escape_default())?;
            } else {
                write!(formatter, "{ch}")?;
            }
        }
        Ok(())
    }
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}
