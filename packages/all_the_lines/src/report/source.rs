//! Locating the source text of a profiled function.
//!
//! There is no parse tree available at report time, so the extent of a function is inferred
//! from indentation: the block starts at the header line and continues while lines are
//! indented deeper than the header. This works for brace-delimited code formatted in the
//! usual way as well as for indentation-delimited code.

/// The width of a line's leading whitespace, counting each whitespace character as one column.
pub(crate) fn indentation(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

/// Whether a line contains nothing but whitespace.
pub(crate) fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Whether a line is a decorator or attribute attached to the item that follows it.
pub(crate) fn is_decoration(line: &str) -> bool {
    let stripped = line.trim_start();
    stripped.starts_with('@') || stripped.starts_with("#[")
}

/// Keywords of indentation-delimited headers, where a colon ends the header even when a
/// statement follows it on the same line.
const COLON_KEYWORDS: [&str; 11] = [
    "def", "class", "if", "elif", "else", "for", "while", "with", "try", "except", "finally",
];

/// Tracks whether a block header spanning several lines has been completed.
///
/// A header is complete once it reaches the opening brace of its body or, for
/// indentation-delimited code, the colon that ends it. Brackets hide both, as they belong to
/// parameter lists, and `::` path separators never end a header. Outside of keyword headers
/// such as `def` or `if`, a colon only ends the header when it is the last thing on the line,
/// so bounds like `T: Debug` in a `where` clause keep the header open until its brace.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct HeaderScanner {
    bracket_depth: usize,
    lines_seen: usize,
    keyword_header: bool,
}

impl HeaderScanner {
    /// Consumes one line of a header and returns whether the header is now complete.
    pub(crate) fn complete_after(&mut self, line: &str) -> bool {
        if is_decoration(line) {
            // The decorated item's own header follows.
            return false;
        }

        if self.lines_seen == 0 {
            self.keyword_header = starts_with_colon_keyword(line);
        }
        self.lines_seen = self.lines_seen.saturating_add(1);

        for (index, c) in line.char_indices() {
            match c {
                '(' | '[' => self.bracket_depth = self.bracket_depth.saturating_add(1),
                ')' | ']' => self.bracket_depth = self.bracket_depth.saturating_sub(1),
                '{' | ';' if self.bracket_depth == 0 => return true,
                ':' if self.bracket_depth == 0 && !in_path_separator(line, index) => {
                    let rest = after(line, index).trim_start();

                    if self.keyword_header || rest.is_empty() || rest.starts_with('#') {
                        return true;
                    }
                }
                '#' if self.bracket_depth == 0 => break,
                _ => {}
            }
        }

        false
    }
}

fn starts_with_colon_keyword(line: &str) -> bool {
    let stripped = line.trim_start();
    let stripped = stripped.strip_prefix("async ").unwrap_or(stripped).trim_start();

    let word = stripped
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .next()
        .unwrap_or_default();

    COLON_KEYWORDS.contains(&word)
}

/// The text following the single-byte character at `index`.
fn after(line: &str, index: usize) -> &str {
    line.get(index..)
        .and_then(|rest| rest.get(1..))
        .unwrap_or_default()
}

fn in_path_separator(line: &str, index: usize) -> bool {
    let before = line.get(..index).unwrap_or_default();

    before.ends_with(':') || after(line, index).starts_with(':')
}

/// Extracts the block of a function whose header is on `first_line` (1-based).
///
/// Returns an empty block if the file has fewer lines than that.
pub(crate) fn function_block(all_lines: &[String], first_line: u32) -> &[String] {
    let Some(start) = usize::try_from(first_line)
        .ok()
        .and_then(|line| line.checked_sub(1))
    else {
        return &[];
    };

    let Some(candidates) = all_lines.get(start..) else {
        return &[];
    };

    let Some((header, rest)) = candidates.split_first() else {
        return &[];
    };

    let base = indentation(header);
    let mut scanner = HeaderScanner::default();
    let mut header_open = !scanner.complete_after(header);

    // Number of lines in the block, not counting trailing blank lines.
    let mut len: usize = 1;

    for (offset, line) in rest.iter().enumerate() {
        let position = offset.saturating_add(2);

        if is_blank(line) {
            continue;
        }

        let indent = indentation(line);

        if indent > base {
            if header_open {
                header_open = !scanner.complete_after(line);
            }
            len = position;
            continue;
        }

        if indent == base && header_open {
            header_open = !scanner.complete_after(line);
            len = position;
            continue;
        }

        if indent == base && line.trim_start().starts_with('}') {
            len = position;
        }

        break;
    }

    candidates.get(..len).unwrap_or(candidates)
}

/// The number of blank placeholder lines that stand in for an unreadable function block.
///
/// The placeholders start at `first_line` and extend far enough to cover the span between the
/// lowest of the first line and the sampled lines and the highest sampled line.
pub(crate) fn placeholder_count(sampled_lines: &[u32], first_line: u32) -> usize {
    let (Some(min), Some(max)) = (sampled_lines.iter().min(), sampled_lines.iter().max()) else {
        return 0;
    };

    let low = (*min).min(first_line);
    let span = max.saturating_sub(low).saturating_add(1);

    usize::try_from(span).expect("u32 always fits in usize on supported targets")
}
