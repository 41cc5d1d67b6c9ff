#![forbid(unsafe_code)]

//! `idcp`: make a destination file match a source file, then apply permissions.

use std::{env, io, process};

fn main() {
    let exit_code = idtools_cli::run_copy(
        env::args_os(),
        &mut io::stdout().lock(),
        &mut io::stderr().lock(),
    );
    process::exit(exit_code);
}
