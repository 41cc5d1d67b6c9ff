//! Argument pre-processing for single-dash long flags.
//!
//! The tools accept `-source a`, `-mode=0600` and `-help` as well as the
//! double-dash forms; clap only understands the latter, so single-dash words are
//! rewritten before parsing. Single characters (`-h`) stay short flags and
//! everything after `--` is passed through untouched.

use std::ffi::OsString;

pub(crate) fn normalize_flag_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut normalized = Vec::new();
    let mut passthrough = false;
    for (index, arg) in args.into_iter().enumerate() {
        let arg: OsString = arg.into();
        if index == 0 || passthrough {
            normalized.push(arg);
            continue;
        }
        match arg.to_str() {
            Some("--") => {
                passthrough = true;
                normalized.push(arg);
            }
            Some(text) if is_single_dash_long(text) => normalized.push(format!("-{text}").into()),
            _ => normalized.push(arg),
        }
    }
    normalized
}

fn is_single_dash_long(text: &str) -> bool {
    let Some(rest) = text.strip_prefix('-') else {
        return false;
    };
    if rest.starts_with('-') {
        return false;
    }
    let name = rest.split_once('=').map_or(rest, |(name, _)| name);
    name.len() > 1
        && name.starts_with(|c: char| c.is_ascii_alphabetic())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(args: &[&str]) -> Vec<String> {
        normalize_flag_args(args.iter().copied())
            .into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn single_dash_long_flags_gain_a_dash() {
        assert_eq!(
            normalize(&["idcp", "-source", "/tmp/a", "-mode=0600", "-help"]),
            ["idcp", "--source", "/tmp/a", "--mode=0600", "--help"]
        );
    }

    #[test]
    fn short_flags_values_and_double_dash_are_untouched() {
        assert_eq!(
            normalize(&["idrm", "-h", "--filepath", "/tmp/a", "-", "-1"]),
            ["idrm", "-h", "--filepath", "/tmp/a", "-", "-1"]
        );
    }

    #[test]
    fn arguments_after_terminator_pass_through() {
        assert_eq!(
            normalize(&["idrm", "--", "-weird-name"]),
            ["idrm", "--", "-weird-name"]
        );
    }

    #[test]
    fn program_name_is_never_rewritten() {
        assert_eq!(normalize(&["-odd", "-dest"]), ["-odd", "--dest"]);
    }
}
