//! Binary entrypoint for the rank tracker.

use std::process::ExitCode;

use serp_rank::cli;

fn main() -> ExitCode {
    cli::run()
}
