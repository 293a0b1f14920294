//! Rendering of saved stats files, used by the `all_the_lines` binary.

use std::io;
use std::path::PathBuf;

use crate::{Error, Report, ReportOptions, Result, load_stats};

/// Input parameters for the [`view`] function.
///
/// This is the parsed command line that the stats viewer operates on.
#[doc(hidden)]
#[derive(Debug)]
#[allow(
    clippy::exhaustive_structs,
    reason = "This is a hidden struct for internal/test use only"
)]
pub struct ViewInput {
    /// Path to the stats file to render.
    pub stats_file: PathBuf,
    /// Show the total time of each block on its opening line.
    pub block_sums: bool,
    /// List this many of the most expensive blocks after each function.
    pub top: Option<usize>,
    /// Print the stats as JSON instead of as a report.
    pub json: bool,
}

/// Loads the stats file named by `input` and writes it to `out`, either as a report or as JSON.
///
/// # Errors
///
/// Returns an error if the stats file cannot be loaded or the output cannot be written.
#[doc(hidden)]
pub fn view(input: &ViewInput, out: &mut impl io::Write) -> Result<()> {
    let stats = load_stats(&input.stats_file)?;

    if input.json {
        let json = stats.to_json()?;
        return writeln!(out, "{json}").map_err(Error::Output);
    }

    let mut options = ReportOptions::new().with_block_sums(input.block_sums);

    if let Some(top) = input.top {
        options = options.with_top_blocks(top);
    }

    Report::new(&stats, options)
        .write_to(out)
        .map_err(Error::Output)
}
