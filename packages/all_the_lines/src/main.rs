#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))]

//! Binary entry point for the all_the_lines stats viewer.
//!
//! This module is excluded from mutation testing because testing process entry/exit behavior
//! is impractical - it requires spawning subprocesses and checking exit codes.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use all_the_lines::{Error, ViewInput, view};
use argh::FromArgs;
use tracing_subscriber::EnvFilter;

/// Renders a saved line timing stats file as an annotated source report.
#[derive(FromArgs)]
struct Args {
    /// path to the stats file written by the profiler
    #[argh(positional)]
    stats_file: PathBuf,

    /// show the total time of each loop, conditional and function block on its opening line
    #[argh(switch)]
    block_sums: bool,

    /// list this many of the most expensive blocks after each function
    #[argh(option)]
    top: Option<usize>,

    /// print the stats as JSON instead of as a report
    #[argh(switch)]
    json: bool,
}

// Binary entry point - mutations would require subprocess testing which is impractical.
#[cfg_attr(test, mutants::skip)]
fn main() -> ExitCode {
    let args: Args = argh::from_env();

    // Diagnostics go to stderr so they never mix with the report.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let input = ViewInput {
        stats_file: args.stats_file,
        block_sums: args.block_sums,
        top: args.top,
        json: args.json,
    };

    let mut stdout = io::stdout().lock();

    let result = view(&input, &mut stdout).and_then(|()| stdout.flush().map_err(Error::Output));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
