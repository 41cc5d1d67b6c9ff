#![forbid(unsafe_code)]

//! `idrm`: make sure a file does not exist.

use std::{env, io, process};

fn main() {
    let exit_code = idtools_cli::run_remove(
        env::args_os(),
        &mut io::stdout().lock(),
        &mut io::stderr().lock(),
    );
    process::exit(exit_code);
}
