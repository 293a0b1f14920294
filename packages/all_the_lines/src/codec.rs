//! Persisted form of line timing statistics.
//!
//! Stats are persisted as a flat, versionless layout: the timer unit followed by one entry per
//! function, sorted by function identity, each listing its sampled lines in ascending order.
//! The same layout is available in two encodings:
//!
//! * A compact binary container (`.lprof` files). It starts with the magic bytes `LPRF`.
//!   Every number is stored little-endian regardless of the platform that wrote it. Strings
//!   are a `u32` byte length followed by UTF-8 bytes. Sequences are a `u32` entry count
//!   followed by the entries.
//! * JSON, for consumption by other tools.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, FunctionId, LineTiming, Result, SourceFile, Stats};

const MAGIC: &[u8; 4] = b"LPRF";

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub(crate) struct StatsLayout {
    unit: f64,
    functions: Vec<FunctionEntry>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
struct FunctionEntry {
    file: String,
    first_line: u32,
    name: String,
    lines: Vec<LineEntry>,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
struct LineEntry {
    line: u32,
    hits: u64,
    total_ticks: u64,
}

impl StatsLayout {
    pub(crate) fn from_stats(stats: &Stats) -> Self {
        let functions = stats
            .functions()
            .map(|(function, lines)| FunctionEntry {
                file: function.file().identifier(),
                first_line: function.first_line(),
                name: function.name().to_string(),
                lines: lines
                    .iter()
                    .map(|(line, timing)| LineEntry {
                        line: *line,
                        hits: timing.hits(),
                        total_ticks: timing.total_ticks(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            unit: stats.unit(),
            functions,
        }
    }

    pub(crate) fn into_stats(self) -> Result<Stats> {
        let mut stats = Stats::new(self.unit);

        for entry in self.functions {
            let function =
                FunctionId::new(SourceFile::from(entry.file), entry.first_line, entry.name);

            if stats.lines(&function).is_some() {
                return Err(Error::invalid(format!("{function} is listed more than once")));
            }
            stats.insert_function(function.clone());

            for line in entry.lines {
                if line.hits == 0 && line.total_ticks != 0 {
                    return Err(Error::invalid(format!(
                        "line {} of {function} has time but no hits",
                        line.line
                    )));
                }

                if stats.line(&function, line.line).is_some() {
                    return Err(Error::invalid(format!(
                        "line {} of {function} is listed more than once",
                        line.line
                    )));
                }

                stats.insert(
                    function.clone(),
                    line.line,
                    LineTiming::new(line.hits, line.total_ticks),
                );
            }
        }

        Ok(stats)
    }
}

/// Encodes stats into the binary `.lprof` container.
///
/// # Examples
///
/// ```
/// use all_the_lines::{FunctionId, LineTiming, Stats, decode, encode};
///
/// let mut stats = Stats::new(1e-9);
/// stats.insert(FunctionId::new("src/lib.rs", 3, "work"), 4, LineTiming::new(2, 90));
///
/// let bytes = encode(&stats);
/// assert_eq!(decode(&bytes).unwrap(), stats);
/// ```
#[must_use]
pub fn encode(stats: &Stats) -> Vec<u8> {
    let layout = StatsLayout::from_stats(stats);

    let mut encoder = Encoder::default();
    encoder.bytes(MAGIC);
    encoder.f64(layout.unit);
    encoder.len(layout.functions.len());

    for function in &layout.functions {
        encoder.str(&function.file);
        encoder.u32(function.first_line);
        encoder.str(&function.name);
        encoder.len(function.lines.len());

        for line in &function.lines {
            encoder.u32(line.line);
            encoder.u64(line.hits);
            encoder.u64(line.total_ticks);
        }
    }

    encoder.buffer
}

/// Decodes stats from the binary `.lprof` container.
///
/// # Errors
///
/// Returns [`Error::InvalidStatsFile`] if the data does not follow the container layout.
pub fn decode(bytes: &[u8]) -> Result<Stats> {
    let mut decoder = Decoder { remaining: bytes };

    if decoder.array::<4>()? != *MAGIC {
        return Err(Error::invalid("missing LPRF header"));
    }

    let unit = decoder.f64()?;
    let function_count = decoder.u32()?;

    let mut functions = Vec::new();
    for _ in 0..function_count {
        let file = decoder.string()?;
        let first_line = decoder.u32()?;
        let name = decoder.string()?;
        let line_count = decoder.u32()?;

        let mut lines = Vec::new();
        for _ in 0..line_count {
            lines.push(LineEntry {
                line: decoder.u32()?,
                hits: decoder.u64()?,
                total_ticks: decoder.u64()?,
            });
        }

        functions.push(FunctionEntry {
            file,
            first_line,
            name,
            lines,
        });
    }

    if !decoder.remaining.is_empty() {
        return Err(Error::invalid(format!(
            "{} unexpected bytes after the last function",
            decoder.remaining.len()
        )));
    }

    StatsLayout { unit, functions }.into_stats()
}

/// Writes stats to a `.lprof` file, replacing any existing file.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be written.
pub fn save_stats(stats: &Stats, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();

    fs::write(path, encode(stats)).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(path = %path.display(), "saved line timing stats");
    Ok(())
}

/// Reads stats from a `.lprof` file, typically one written by another process.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be read and [`Error::InvalidStatsFile`] if its
/// contents are not a stats container.
pub fn load_stats(path: impl AsRef<Path>) -> Result<Stats> {
    let path = path.as_ref();

    let bytes = fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let stats = decode(&bytes)?;

    tracing::debug!(
        path = %path.display(),
        functions = stats.functions().count(),
        "loaded line timing stats"
    );
    Ok(stats)
}

impl Stats {
    /// Renders the persisted layout of these stats as a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStatsFile`] if the unit is not a finite number, as JSON has no
    /// representation for it, and [`Error::Json`] if serialization fails for another reason.
    pub fn to_json(&self) -> Result<String> {
        if !self.unit().is_finite() {
            return Err(Error::invalid(format!(
                "timer unit {} cannot be written as JSON",
                self.unit()
            )));
        }

        Ok(serde_json::to_string_pretty(&StatsLayout::from_stats(self))?)
    }

    /// Parses stats from a JSON document produced by [`to_json()`](Self::to_json).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the document does not match the layout and
    /// [`Error::InvalidStatsFile`] if it contains inconsistent timings.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str::<StatsLayout>(json)?.into_stats()
    }
}

#[derive(Default)]
struct Encoder {
    buffer: Vec<u8>,
}

impl Encoder {
    fn bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    fn u32(&mut self, value: u32) {
        self.bytes(&value.to_le_bytes());
    }

    fn u64(&mut self, value: u64) {
        self.bytes(&value.to_le_bytes());
    }

    fn f64(&mut self, value: f64) {
        self.bytes(&value.to_le_bytes());
    }

    fn len(&mut self, len: usize) {
        self.u32(
            u32::try_from(len)
                .expect("more than u32::MAX entries in stats - this indicates an unrealistic scenario"),
        );
    }

    fn str(&mut self, value: &str) {
        self.len(value.len());
        self.bytes(value.as_bytes());
    }
}

struct Decoder<'a> {
    remaining: &'a [u8],
}

impl Decoder<'_> {
    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let (head, tail) = self
            .remaining
            .split_first_chunk::<N>()
            .ok_or_else(|| Error::invalid("data ends in the middle of an entry"))?;

        self.remaining = tail;
        Ok(*head)
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.array()?))
    }

    fn string(&mut self) -> Result<String> {
        let len = usize::try_from(self.u32()?)
            .map_err(|e| Error::invalid(format!("string length does not fit in memory: {e}")))?;

        let (head, tail) = self
            .remaining
            .split_at_checked(len)
            .ok_or_else(|| Error::invalid("data ends in the middle of a string"))?;

        self.remaining = tail;

        String::from_utf8(head.to_vec())
            .map_err(|e| Error::invalid(format!("string is not valid UTF-8: {e}")))
    }
}
