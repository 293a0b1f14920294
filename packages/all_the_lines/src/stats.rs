//! Line timing statistics.

use std::collections::BTreeMap;

use crate::FunctionId;

/// Accumulated measurements for one source line.
///
/// Both values only ever grow during a session. A line with zero hits always has zero ticks,
/// whereas a line that was hit may still have zero ticks if it executed faster than the timer
/// resolution.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct LineTiming {
    hits: u64,
    total_ticks: u64,
}

impl LineTiming {
    /// Creates a line timing with the given totals.
    ///
    /// # Panics
    ///
    /// Panics if `hits` is zero but `total_ticks` is not.
    #[must_use]
    pub fn new(hits: u64, total_ticks: u64) -> Self {
        assert!(
            hits != 0 || total_ticks == 0,
            "a line without hits cannot have accumulated time"
        );

        Self { hits, total_ticks }
    }

    /// How many times the line finished executing.
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Total time spent on the line, in timer ticks.
    #[must_use]
    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    /// Records one more execution of the line that took `ticks` timer ticks.
    pub(crate) fn record(&mut self, ticks: u64) {
        self.hits = self
            .hits
            .checked_add(1)
            .expect("line hit count overflows u64 - this indicates an unrealistic scenario");

        self.total_ticks = self.total_ticks.checked_add(ticks).expect(
            "line time accumulation overflows u64 - this indicates an unrealistic scenario",
        );
    }

    /// Adds the totals of another timing of the same line.
    pub(crate) fn merge_from(&mut self, other: &Self) {
        self.hits = self
            .hits
            .checked_add(other.hits)
            .expect("merging hit counts overflows u64 - this indicates an unrealistic scenario");

        self.total_ticks = self
            .total_ticks
            .checked_add(other.total_ticks)
            .expect("merging line times overflows u64 - this indicates an unrealistic scenario");
    }
}

/// An immutable snapshot of line timing statistics.
///
/// A `Stats` maps each tracked function to the timings of its lines, keyed by line number.
/// The `unit` converts timer ticks to seconds. Every snapshot is an independent copy, so
/// collecting more data afterwards does not change a snapshot already taken.
///
/// # Examples
///
/// ```
/// use all_the_lines::{FunctionId, LineTiming, Stats};
///
/// let function = FunctionId::new("src/lib.rs", 10, "work");
///
/// let mut stats = Stats::new(1e-6);
/// stats.insert(function.clone(), 11, LineTiming::new(2, 400));
/// stats.insert(function.clone(), 12, LineTiming::new(1, 100));
///
/// assert_eq!(stats.total_ticks(&function), 500);
/// assert!((stats.total_seconds(&function) - 0.0005).abs() < 1e-12);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Stats {
    unit: f64,
    timings: BTreeMap<FunctionId, BTreeMap<u32, LineTiming>>,
}

impl Stats {
    /// Creates an empty snapshot whose ticks last `unit` seconds each.
    #[must_use]
    pub fn new(unit: f64) -> Self {
        Self {
            unit,
            timings: BTreeMap::new(),
        }
    }

    /// Seconds per timer tick.
    #[must_use]
    pub fn unit(&self) -> f64 {
        self.unit
    }

    /// Adds a function with no line samples, if it is not already present.
    pub fn insert_function(&mut self, function: FunctionId) {
        self.timings.entry(function).or_default();
    }

    /// Sets the timing of one line of a function, replacing any previous value.
    pub fn insert(&mut self, function: FunctionId, line: u32, timing: LineTiming) {
        self.timings.entry(function).or_default().insert(line, timing);
    }

    /// Iterates over the functions in the snapshot and their line timings, ordered by
    /// function identity.
    pub fn functions(&self) -> impl Iterator<Item = (&FunctionId, &BTreeMap<u32, LineTiming>)> {
        self.timings.iter()
    }

    /// The line timings of one function, ordered by line number.
    #[must_use]
    pub fn lines(&self, function: &FunctionId) -> Option<&BTreeMap<u32, LineTiming>> {
        self.timings.get(function)
    }

    /// The timing of one line, if it was sampled.
    #[must_use]
    pub fn line(&self, function: &FunctionId, line: u32) -> Option<LineTiming> {
        self.timings
            .get(function)
            .and_then(|lines| lines.get(&line))
            .copied()
    }

    /// The total ticks measured across all lines of a function.
    #[must_use]
    pub fn total_ticks(&self, function: &FunctionId) -> u64 {
        self.timings.get(function).map_or(0, |lines| {
            lines
                .values()
                .map(LineTiming::total_ticks)
                .fold(0_u64, u64::saturating_add)
        })
    }

    /// The total time measured across all lines of a function, in seconds.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        reason = "tick totals beyond 2^53 are unrealistic and the report only needs approximate seconds"
    )]
    pub fn total_seconds(&self, function: &FunctionId) -> f64 {
        self.total_ticks(function) as f64 * self.unit
    }

    /// Whether no line of any function has been hit.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timings
            .values()
            .all(|lines| lines.values().all(|timing| timing.hits() == 0))
    }

    /// Merges two snapshots into a new one.
    ///
    /// Timings of the same line of the same function are added together. The unit of `a` is
    /// kept; both snapshots are expected to come from collectors with the same timer.
    ///
    /// # Examples
    ///
    /// ```
    /// use all_the_lines::{FunctionId, LineTiming, Stats};
    ///
    /// let function = FunctionId::new("src/lib.rs", 1, "work");
    ///
    /// let mut first = Stats::new(1e-9);
    /// first.insert(function.clone(), 2, LineTiming::new(1, 10));
    ///
    /// let mut second = Stats::new(1e-9);
    /// second.insert(function.clone(), 2, LineTiming::new(3, 30));
    ///
    /// let merged = Stats::merge(&first, &second);
    /// assert_eq!(merged.line(&function, 2), Some(LineTiming::new(4, 40)));
    /// ```
    #[must_use]
    pub fn merge(a: &Self, b: &Self) -> Self {
        let mut merged = a.clone();

        for (function, lines) in &b.timings {
            let merged_lines = merged.timings.entry(function.clone()).or_default();

            for (line, timing) in lines {
                merged_lines
                    .entry(*line)
                    .and_modify(|existing| existing.merge_from(timing))
                    .or_insert(*timing);
            }
        }

        merged
    }
}
