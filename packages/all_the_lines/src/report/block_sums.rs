//! Inclusive time of nested blocks, reconstructed from indentation.

use crate::LineTiming;
use crate::report::source::{HeaderScanner, indentation, is_blank, is_decoration};

/// Keywords that open a block when they start a line.
const BLOCK_KEYWORDS: [&str; 9] = [
    "def", "fn", "for", "while", "loop", "if", "elif", "else", "match",
];

/// Words that may precede a function keyword without changing what the line opens.
const MODIFIERS: [&str; 4] = ["pub", "async", "unsafe", "const"];

/// One line of a function's source together with its sample, if it has one.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SourceLine<'a> {
    pub(crate) text: &'a str,
    pub(crate) timing: Option<LineTiming>,
}

/// The inclusive time of a block: its opening line plus every line nested inside it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct BlockTotal {
    /// Ticks spent in the block.
    pub(crate) ticks: u64,

    /// Hits of the block's opening line, used for the per-hit average.
    pub(crate) hits: u64,
}

#[derive(Debug)]
struct OpenBlock {
    line_index: usize,
    indent: usize,
    total: BlockTotal,
}

/// Calculates the block total of every line that opens a block.
///
/// Returns one entry per input line, `None` for lines that do not open a block.
pub(crate) fn block_totals(lines: &[SourceLine<'_>]) -> Vec<Option<BlockTotal>> {
    let samples = attributed_samples(lines);
    let ticks_at = |index: usize| {
        samples
            .get(index)
            .copied()
            .flatten()
            .map_or(0, |timing| timing.total_ticks())
    };

    let mut totals = vec![None; lines.len()];
    let mut open: Vec<OpenBlock> = Vec::new();

    // Present while the header of the innermost open block continues on the next line.
    let mut unfinished_header: Option<HeaderScanner> = None;

    for (index, line) in lines.iter().enumerate() {
        if is_blank(line.text) {
            continue;
        }

        let ticks = ticks_at(index);

        if let Some(scanner) = unfinished_header.as_mut() {
            if scanner.complete_after(line.text) {
                unfinished_header = None;
            }

            add_to_all(&mut open, ticks);
            continue;
        }

        let indent = indentation(line.text);

        while open.last().is_some_and(|block| block.indent >= indent) {
            close(&mut open, &mut totals);
        }

        add_to_all(&mut open, ticks);

        if leading_keyword(line.text).is_some() {
            let mut scanner = HeaderScanner::default();
            if !scanner.complete_after(line.text) {
                unfinished_header = Some(scanner);
            }

            open.push(OpenBlock {
                line_index: index,
                indent,
                total: BlockTotal {
                    ticks,
                    hits: opening_hits(lines, &samples, index),
                },
            });
        }
    }

    while !open.is_empty() {
        close(&mut open, &mut totals);
    }

    totals
}

/// Indexes of the `count` lines with the largest block totals, largest first.
///
/// Lines with equal totals keep their source order.
pub(crate) fn largest_blocks(totals: &[Option<BlockTotal>], count: usize) -> Vec<usize> {
    let mut candidates: Vec<(usize, u64)> = totals
        .iter()
        .enumerate()
        .filter_map(|(index, total)| total.map(|total| (index, total.ticks)))
        .collect();

    // Stable, so ties stay in source order.
    candidates.sort_by(|a, b| b.1.cmp(&a.1));
    candidates.truncate(count);

    candidates.into_iter().map(|(index, _)| index).collect()
}

/// The samples used for block totals.
///
/// Some collectors attribute the cost of entering a function to the decorator or attribute
/// line above its header instead of the header itself. Such a sample is moved onto the header.
fn attributed_samples(lines: &[SourceLine<'_>]) -> Vec<Option<LineTiming>> {
    let mut samples: Vec<_> = lines.iter().map(|line| line.timing).collect();

    for (index, pair) in lines.windows(2).enumerate() {
        let [decoration, header] = pair else {
            continue;
        };

        if !is_decoration(decoration.text) || !is_function_header(header.text) {
            continue;
        }

        let next = index.saturating_add(1);
        if let (Some(Some(_)), Some(None)) = (samples.get(index), samples.get(next)) {
            let moved = samples.get_mut(index).and_then(Option::take);
            if let Some(slot) = samples.get_mut(next) {
                *slot = moved;
            }
        }
    }

    samples
}

/// The hit count of a block's opening line.
///
/// An `else` line is not executed on its own, so unless it has hits it takes the hits of the
/// first sampled line of its body.
fn opening_hits(lines: &[SourceLine<'_>], samples: &[Option<LineTiming>], index: usize) -> u64 {
    let own = samples
        .get(index)
        .copied()
        .flatten()
        .map_or(0, |timing| timing.hits());

    let Some(line) = lines.get(index) else {
        return own;
    };

    if own != 0 || leading_keyword(line.text) != Some("else") {
        return own;
    }

    let indent = indentation(line.text);

    for (body_index, body_line) in lines.iter().enumerate().skip(index.saturating_add(1)) {
        if is_blank(body_line.text) {
            continue;
        }

        if indentation(body_line.text) <= indent {
            break;
        }

        if let Some(timing) = samples.get(body_index).copied().flatten() {
            return timing.hits();
        }
    }

    own
}

fn add_to_all(open: &mut [OpenBlock], ticks: u64) {
    for block in open {
        block.total.ticks = block.total.ticks.checked_add(ticks).expect(
            "block time accumulation overflows u64 - this indicates an unrealistic scenario",
        );
    }
}

fn close(open: &mut Vec<OpenBlock>, totals: &mut [Option<BlockTotal>]) {
    let Some(block) = open.pop() else {
        return;
    };

    if let Some(slot) = totals.get_mut(block.line_index) {
        *slot = Some(block.total);
    }
}

fn is_function_header(line: &str) -> bool {
    matches!(leading_keyword(line), Some("def" | "fn"))
}

/// The block keyword a line starts with, ignoring a leading closing brace and modifiers.
fn leading_keyword(line: &str) -> Option<&'static str> {
    let mut rest = line.trim_start();

    if let Some(after_brace) = rest.strip_prefix('}') {
        rest = after_brace.trim_start();
    }

    loop {
        let (word, after) = split_word(rest);

        if MODIFIERS.contains(&word) {
            rest = skip_visibility_scope(after).trim_start();
            continue;
        }

        return BLOCK_KEYWORDS
            .iter()
            .find(|keyword| **keyword == word)
            .copied();
    }
}

fn split_word(text: &str) -> (&str, &str) {
    let end = text
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(text.len());

    text.split_at(end)
}

// Skips the `(crate)` of `pub(crate)`.
fn skip_visibility_scope(text: &str) -> &str {
    if !text.starts_with('(') {
        return text;
    }

    text.find(')')
        .and_then(|end| text.get(end.saturating_add(1)..))
        .unwrap_or(text)
}
