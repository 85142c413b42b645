//! Entrypoint for the `intaked` daemon.
//!
//! Set `INTAKE_FOREGROUND` to stay attached to the console; otherwise the
//! process detaches into the background.

use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match intaked::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            writeln!(io::stderr().lock(), "intaked: {error}").ok();
            ExitCode::FAILURE
        }
    }
}
