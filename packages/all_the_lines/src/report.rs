//! Line timing reports.

mod block_sums;
mod format;
mod source;

use std::collections::BTreeMap;
use std::fmt;
use std::io;

use crate::pal::{SourceFiles, SourceFilesFacade};
use crate::report::block_sums::{BlockTotal, SourceLine, block_totals, largest_blocks};
use crate::report::format::{format_general, format_tenths, mean, percent_of};
use crate::report::source::{function_block, placeholder_count};
use crate::{FunctionId, LineTiming, Stats};

/// Controls what a [`Report`] shows in addition to the per-line table.
///
/// # Examples
///
/// ```
/// use all_the_lines::ReportOptions;
///
/// let options = ReportOptions::new().with_block_sums(true).with_top_blocks(5);
///
/// assert!(options.block_sums());
/// assert_eq!(options.top_blocks(), Some(5));
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct ReportOptions {
    block_sums: bool,
    top_blocks: Option<usize>,
}

impl ReportOptions {
    /// Creates options for a plain per-line report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether each block-opening line shows the total time of its block.
    #[must_use]
    pub fn with_block_sums(self, block_sums: bool) -> Self {
        Self { block_sums, ..self }
    }

    /// Lists the `count` most expensive blocks after each function's table.
    #[must_use]
    pub fn with_top_blocks(self, count: usize) -> Self {
        Self {
            top_blocks: Some(count),
            ..self
        }
    }

    /// Whether each block-opening line shows the total time of its block.
    #[must_use]
    pub fn block_sums(&self) -> bool {
        self.block_sums
    }

    /// How many of the most expensive blocks are listed after each function's table.
    #[must_use]
    pub fn top_blocks(&self) -> Option<usize> {
        self.top_blocks
    }
}

/// Renders line timing statistics next to the source code they were measured on.
///
/// For every function the report shows its total time and then one row per line of the
/// function's source: the line number, how often it was hit, the total time spent on it in
/// timer ticks, the average time per hit and the share of the function's total time.
///
/// Source code is read from disk when the report is rendered. If a file cannot be read the
/// report explains so and shows blank lines in place of the code.
///
/// # Examples
///
/// ```
/// use all_the_lines::{FunctionId, LineTiming, Report, ReportOptions, Stats};
///
/// let function = FunctionId::new("does/not/exist.rs", 10, "work");
///
/// let mut stats = Stats::new(1e-6);
/// stats.insert(function.clone(), 11, LineTiming::new(2, 30));
/// stats.insert(function, 12, LineTiming::new(1, 10));
///
/// let text = Report::new(&stats, ReportOptions::new()).to_string();
///
/// assert!(text.starts_with("Timer unit: 1e-06 s"));
/// assert!(text.contains("Total time: 4e-05 s"));
/// assert!(text.contains("Could not find file does/not/exist.rs"));
/// ```
#[derive(Debug)]
pub struct Report<'a> {
    stats: &'a Stats,
    options: ReportOptions,
    source_files: SourceFilesFacade,
}

/// Column layout of the per-line table.
const LINE_NUMBER_WIDTH: usize = 6;
const HITS_WIDTH: usize = 9;
const TIME_WIDTH: usize = 12;
const PER_HIT_WIDTH: usize = 8;
const PERCENT_WIDTH: usize = 8;

impl<'a> Report<'a> {
    /// Creates a report of `stats` that reads source code from the file system.
    #[must_use]
    pub fn new(stats: &'a Stats, options: ReportOptions) -> Self {
        Self::with_source_files(stats, options, SourceFilesFacade::real())
    }

    pub(crate) fn with_source_files(
        stats: &'a Stats,
        options: ReportOptions,
        source_files: SourceFilesFacade,
    ) -> Self {
        Self {
            stats,
            options,
            source_files,
        }
    }

    /// Writes the report to `out`.
    ///
    /// # Errors
    ///
    /// Returns any error reported by `out`.
    pub fn write_to(&self, out: &mut impl io::Write) -> io::Result<()> {
        write!(out, "{self}")
    }

    /// Prints the report to stdout.
    ///
    /// Prints nothing if no line was hit, not even the timer unit line.
    #[cfg_attr(test, mutants::skip)] // Too difficult to test stdout output reliably - manually tested.
    pub fn print_to_stdout(&self) {
        if self.stats.is_empty() {
            return;
        }
        print!("{self}");
    }

    fn render_function(
        &self,
        f: &mut impl fmt::Write,
        function: &FunctionId,
        lines: &BTreeMap<u32, LineTiming>,
    ) -> fmt::Result {
        let total_ticks = self.stats.total_ticks(function);

        writeln!(f, "File: {}", function.file())?;
        writeln!(
            f,
            "Function: {} at line {}",
            function.name(),
            function.first_line()
        )?;
        writeln!(
            f,
            "Total time: {} s",
            format_general(self.stats.total_seconds(function))
        )?;

        let source = match self.read_block(function, lines.keys().next_back().copied()) {
            Some(block) => block,
            None => {
                writeln!(f)?;
                writeln!(f, "Could not find file {}", function.file())?;
                writeln!(
                    f,
                    "Are you sure you are running this program from the same directory"
                )?;
                writeln!(f, "that you ran the profiler from?")?;
                writeln!(f, "Continuing without the function's contents.")?;

                let sampled: Vec<u32> = lines.keys().copied().collect();
                vec![String::new(); placeholder_count(&sampled, function.first_line())]
            }
        };

        let rows: Vec<(u32, SourceLine<'_>)> = (function.first_line()..)
            .zip(&source)
            .map(|(line_number, text)| {
                (
                    line_number,
                    SourceLine {
                        text,
                        timing: lines.get(&line_number).copied(),
                    },
                )
            })
            .collect();

        let blocks = if self.options.block_sums() || self.options.top_blocks().is_some() {
            let source_lines: Vec<_> = rows.iter().map(|(_, line)| *line).collect();
            block_totals(&source_lines)
        } else {
            vec![None; rows.len()]
        };

        writeln!(f)?;
        let header = self.table_row(
            "Line #",
            "Hits",
            "Time",
            "Per Hit",
            "% Time",
            ("Block Time", "Blk/Hit"),
            "Line Contents",
        );
        writeln!(f, "{header}")?;
        writeln!(f, "{}", "=".repeat(header.len()))?;

        for ((line_number, line), block) in rows.iter().zip(&blocks) {
            writeln!(
                f,
                "{}",
                self.sampled_row(*line_number, line, *block, total_ticks)
            )?;
        }

        writeln!(f)?;

        if let Some(count) = self.options.top_blocks() {
            self.render_top_blocks(f, &rows, &blocks, count, total_ticks)?;
        }

        Ok(())
    }

    fn render_top_blocks(
        &self,
        f: &mut impl fmt::Write,
        rows: &[(u32, SourceLine<'_>)],
        blocks: &[Option<BlockTotal>],
        count: usize,
        total_ticks: u64,
    ) -> fmt::Result {
        let largest = largest_blocks(blocks, count);
        if largest.is_empty() {
            return Ok(());
        }

        writeln!(f, "Top {} blocks by time:", largest.len())?;

        let header = format!(
            "{:>LINE_NUMBER_WIDTH$} {:>TIME_WIDTH$} {:>PERCENT_WIDTH$}  {}",
            "Line #", "Block Time", "% Time", "Line Contents"
        );
        writeln!(f, "{header}")?;
        writeln!(f, "{}", "=".repeat(header.len()))?;

        for index in largest {
            let (Some((line_number, line)), Some(Some(block))) = (rows.get(index), blocks.get(index))
            else {
                continue;
            };

            writeln!(
                f,
                "{:>LINE_NUMBER_WIDTH$} {:>TIME_WIDTH$} {:>PERCENT_WIDTH$}  {}",
                line_number,
                block.ticks,
                format_tenths(percent_of(block.ticks, total_ticks)),
                line.text.trim()
            )?;
        }

        writeln!(f)
    }

    fn sampled_row(
        &self,
        line_number: u32,
        line: &SourceLine<'_>,
        block: Option<BlockTotal>,
        total_ticks: u64,
    ) -> String {
        let (hits, time, per_hit, percent) = match line.timing {
            Some(timing) => (
                timing.hits().to_string(),
                timing.total_ticks().to_string(),
                mean(timing.total_ticks(), timing.hits())
                    .map(format_tenths)
                    .unwrap_or_default(),
                format_tenths(percent_of(timing.total_ticks(), total_ticks)),
            ),
            None => Default::default(),
        };

        let (block_time, block_per_hit) = block.map_or_else(Default::default, |block| {
            (
                block.ticks.to_string(),
                mean(block.ticks, block.hits)
                    .map(format_tenths)
                    .unwrap_or_default(),
            )
        });

        self.table_row(
            &line_number.to_string(),
            &hits,
            &time,
            &per_hit,
            &percent,
            (&block_time, &block_per_hit),
            line.text,
        )
    }

    #[expect(clippy::too_many_arguments, reason = "one argument per table column")]
    fn table_row(
        &self,
        line_number: &str,
        hits: &str,
        time: &str,
        per_hit: &str,
        percent: &str,
        (block_time, block_per_hit): (&str, &str),
        contents: &str,
    ) -> String {
        let mut row = format!(
            "{line_number:>LINE_NUMBER_WIDTH$} {hits:>HITS_WIDTH$} {time:>TIME_WIDTH$} \
             {per_hit:>PER_HIT_WIDTH$} {percent:>PERCENT_WIDTH$}"
        );

        if self.options.block_sums() {
            row.push_str(&format!(
                " {block_time:>TIME_WIDTH$} {block_per_hit:>PER_HIT_WIDTH$}"
            ));
        }

        row.push_str("  ");
        row.push_str(contents);
        row
    }

    /// Reads the source block of `function`, extended when needed so that it reaches
    /// `last_sampled`. Sampled lines past the inferred end of the block are still shown.
    fn read_block(
        &self,
        function: &FunctionId,
        last_sampled: Option<u32>,
    ) -> Option<Vec<String>> {
        let path = function.file().path()?;

        let all_lines = match self.source_files.read_lines(path) {
            Ok(all_lines) => all_lines,
            Err(error) => {
                tracing::warn!(%function, %error, "cannot read source of profiled function");
                return None;
            }
        };

        let block = function_block(&all_lines, function.first_line());

        if block.is_empty() {
            tracing::warn!(
                %function,
                "function starts beyond the end of its source file"
            );
            return None;
        }

        let needed = last_sampled.map_or(0, |last| {
            let span = last
                .saturating_sub(function.first_line())
                .saturating_add(1);
            usize::try_from(span).expect("u32 always fits in usize on supported targets")
        });

        if needed <= block.len() {
            return Some(block.to_vec());
        }

        tracing::warn!(
            %function,
            block_lines = block.len(),
            needed_lines = needed,
            "sampled lines extend past the end of the function's source block"
        );

        // The block is not empty, so the first line is in range.
        let start = usize::try_from(function.first_line().saturating_sub(1))
            .expect("u32 always fits in usize on supported targets");

        let mut extended: Vec<String> = all_lines
            .iter()
            .skip(start)
            .take(needed)
            .cloned()
            .collect();
        extended.resize(needed, String::new());

        Some(extended)
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Timer unit: {} s", format_general(self.stats.unit()))?;
        writeln!(f)?;

        for (function, lines) in self.stats.functions() {
            self.render_function(f, function, lines)?;
        }

        Ok(())
    }
}
