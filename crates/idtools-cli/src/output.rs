//! Report renderers.

use std::io::{self, Write};

use clap::ValueEnum;
use idtools_fsops::OperationReport;

use crate::cli::{CliError, CliResult};

/// Report layout written to standard output.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// One tab-separated `timestamp function key value` line per field.
    #[default]
    Lines,
    /// A single JSON object.
    Json,
}

pub(crate) fn render_report(
    report: &OperationReport,
    format: OutputFormat,
    out: &mut dyn Write,
) -> CliResult<()> {
    match format {
        OutputFormat::Lines => {
            for line in report.lines() {
                writeln!(out, "{line}").map_err(CliError::Output)?;
            }
        }
        OutputFormat::Json => {
            serde_json::to_writer(&mut *out, report)
                .map_err(|err| CliError::Output(io::Error::from(err)))?;
            writeln!(out).map_err(CliError::Output)?;
        }
    }
    out.flush().map_err(CliError::Output)
}
