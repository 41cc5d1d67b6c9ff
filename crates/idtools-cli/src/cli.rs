//! Argument parsing and command execution for `idcp` and `idrm`.

use std::ffi::OsString;
use std::fmt::{self, Display, Formatter};
use std::io::{self, Write};

use clap::error::ErrorKind;
use clap::{Args, CommandFactory, Parser};
use idtools_fsops::{
    CopyRequest, FsOpsResult, FsOpsService, OperationContext, OperationKind, OperationReport,
    PermissionSpec, RemoveRequest, SystemOwnership, normalize_path, parse_octal_mode,
};
use idtools_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, TelemetryError, init_logging};
use tracing::debug;

use crate::flags::normalize_flag_args;
use crate::output::{OutputFormat, render_report};

const DEFAULT_MODE_ARG: &str = "0644";

#[derive(Parser, Debug)]
#[command(
    name = "idcp",
    about = "Idempotently copy a file, then apply owner, group and mode to the destination"
)]
struct CopyCli {
    #[arg(long, help = "source of the file to be copied")]
    source: Option<String>,
    #[arg(long, help = "destination that the file should be copied to")]
    dest: Option<String>,
    #[arg(long, default_value = "", help = "owner of the destination file")]
    owner: String,
    #[arg(long, default_value = "", help = "group of the destination file")]
    group: String,
    #[arg(
        long,
        default_value = DEFAULT_MODE_ARG,
        help = "file mode of the destination file (octal)"
    )]
    mode: String,
    #[arg(value_name = "PATH", help = "source and destination when the flags are omitted")]
    paths: Vec<String>,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Parser, Debug)]
#[command(name = "idrm", about = "Idempotently ensure a file does not exist")]
struct RemoveCli {
    #[arg(long, help = "path of the file to be removed")]
    filepath: Option<String>,
    #[arg(value_name = "PATH", help = "path of the file when the flag is omitted")]
    paths: Vec<String>,
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct CommonArgs {
    #[arg(
        long,
        env = "IDTOOLS_LOG_LEVEL",
        default_value = DEFAULT_LOG_LEVEL,
        help = "log level or filter directive for diagnostics on stderr"
    )]
    log_level: String,
    #[arg(
        long,
        env = "IDTOOLS_LOG_FORMAT",
        value_parser = parse_log_format,
        help = "diagnostic log format: pretty or json"
    )]
    log_format: Option<LogFormat>,
    #[arg(
        long,
        env = "IDTOOLS_OUTPUT",
        value_enum,
        default_value = "lines",
        help = "report format written to stdout"
    )]
    output: OutputFormat,
}

impl CommonArgs {
    fn install_logging(&self, stderr: &mut dyn Write) {
        let config = LoggingConfig {
            level: &self.log_level,
            format: self.log_format.unwrap_or_else(LogFormat::infer),
        };
        if let Err(err) = init_logging(&config) {
            // Diagnostics are best effort; the report is still produced.
            let _ = writeln!(stderr, "warning: {err}");
        }
    }
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    value
        .parse()
        .map_err(|err: TelemetryError| err.to_string())
}

/// Failures that end a run before or after an operation report exists.
#[derive(Debug)]
pub(crate) enum CliError {
    /// Help or version output was requested.
    Help(String),
    /// Arguments were invalid or incomplete.
    Usage(String),
    /// Writing the report failed.
    Output(io::Error),
}

pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    const fn exit_code(&self) -> i32 {
        match self {
            Self::Help(_) => 0,
            Self::Usage(_) | Self::Output(_) => 1,
        }
    }

    fn from_clap(err: &clap::Error) -> Self {
        let rendered = err.render().to_string();
        match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => Self::Help(rendered),
            _ => Self::Usage(rendered),
        }
    }

    fn missing<C: CommandFactory>(what: &str) -> Self {
        let mut command = C::command();
        let usage = command.render_usage();
        Self::Usage(format!("error: missing {what}\n\n{usage}\n"))
    }

    fn report(self, stdout: &mut dyn Write, stderr: &mut dyn Write) -> i32 {
        let exit_code = self.exit_code();
        // Nothing is left to report to if the streams themselves are gone.
        let _ = match &self {
            Self::Help(text) => write!(stdout, "{text}"),
            Self::Usage(text) => write!(stderr, "{text}"),
            Self::Output(err) => writeln!(stderr, "error: failed to write report: {err}"),
        }
        .and_then(|()| stdout.flush());
        exit_code
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Help(_) => formatter.write_str("help requested"),
            Self::Usage(_) => formatter.write_str("invalid command-line arguments"),
            Self::Output(_) => formatter.write_str("failed to write report"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Output(err) => Some(err),
            Self::Help(_) | Self::Usage(_) => None,
        }
    }
}

/// Run the copy tool with `args` (program name first), returning the exit code.
pub fn run_copy<I, T>(args: I, stdout: &mut dyn Write, stderr: &mut dyn Write) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    match copy_command(args, stdout, stderr) {
        Ok(exit_code) => exit_code,
        Err(err) => err.report(stdout, stderr),
    }
}

/// Run the remove tool with `args` (program name first), returning the exit code.
pub fn run_remove<I, T>(args: I, stdout: &mut dyn Write, stderr: &mut dyn Write) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    match remove_command(args, stdout, stderr) {
        Ok(exit_code) => exit_code,
        Err(err) => err.report(stdout, stderr),
    }
}

fn parse_cli<C: Parser>(args: Vec<OsString>) -> CliResult<C> {
    C::try_parse_from(args).map_err(|err| CliError::from_clap(&err))
}

fn copy_command<I, T>(args: I, stdout: &mut dyn Write, stderr: &mut dyn Write) -> CliResult<i32>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let cli: CopyCli = parse_cli(normalize_flag_args(args))?;
    let source = flag_or_slot(cli.source.as_deref(), &cli.paths, 0)
        .ok_or_else(|| CliError::missing::<CopyCli>("source"))?;
    let dest = flag_or_slot(cli.dest.as_deref(), &cli.paths, 1)
        .ok_or_else(|| CliError::missing::<CopyCli>("destination"))?;

    cli.common.install_logging(stderr);
    debug!(source, dest, mode = %cli.mode, "starting copy");

    let service = FsOpsService::new(SystemOwnership);
    let mut context = OperationContext::begin(OperationKind::Copy);
    let result = copy_request(source, dest, &cli.owner, &cli.group, &cli.mode)
        .and_then(|request| service.copy(&mut context, &request));
    finish(context, result, cli.common.output, stdout)
}

fn remove_command<I, T>(args: I, stdout: &mut dyn Write, stderr: &mut dyn Write) -> CliResult<i32>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let cli: RemoveCli = parse_cli(normalize_flag_args(args))?;
    let filepath = flag_or_slot(cli.filepath.as_deref(), &cli.paths, 0)
        .ok_or_else(|| CliError::missing::<RemoveCli>("filepath"))?;

    cli.common.install_logging(stderr);
    debug!(filepath, "starting remove");

    let service = FsOpsService::new(SystemOwnership);
    let mut context = OperationContext::begin(OperationKind::Remove);
    let result = normalize_path(filepath)
        .and_then(|path| service.remove(&mut context, &RemoveRequest { path }));
    finish(context, result, cli.common.output, stdout)
}

fn copy_request(
    source: &str,
    dest: &str,
    owner: &str,
    group: &str,
    mode: &str,
) -> FsOpsResult<CopyRequest> {
    Ok(CopyRequest {
        source: normalize_path(source)?,
        destination: normalize_path(dest)?,
        permissions: PermissionSpec::new(owner, group, parse_octal_mode("mode", mode)?),
    })
}

fn finish(
    context: OperationContext,
    result: FsOpsResult<()>,
    format: OutputFormat,
    stdout: &mut dyn Write,
) -> CliResult<i32> {
    let report: OperationReport = context.finish(result);
    render_report(&report, format, stdout)?;
    Ok(report.exit_code())
}

/// Flag value, else the positional argument at `slot`; empty strings count as missing.
fn flag_or_slot<'a>(flag: Option<&'a str>, paths: &'a [String], slot: usize) -> Option<&'a str> {
    flag.filter(|value| !value.is_empty())
        .or_else(|| paths.get(slot).map(String::as_str))
        .filter(|value| !value.is_empty())
}
