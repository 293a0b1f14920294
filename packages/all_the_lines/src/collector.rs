//! Per-line timing collection.

use std::fmt::Debug;
use std::mem;
use std::sync::Mutex;

use foldhash::HashMap;

use crate::pal::{Clock, ClockFacade};
use crate::{ERR_POISONED_LOCK, FunctionId, LineTiming, Stats};

/// Options passed to a collector when a profiling session begins.
///
/// # Examples
///
/// ```
/// use all_the_lines::BeginOptions;
///
/// let options = BeginOptions::new().with_builtins(false);
///
/// assert!(options.subcalls());
/// assert!(!options.builtins());
/// ```
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct BeginOptions {
    subcalls: bool,
    builtins: bool,
}

impl BeginOptions {
    /// Creates options with every kind of code included.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subcalls: true,
            builtins: true,
        }
    }

    /// Sets whether time spent in calls made from a profiled line is attributed to that line.
    #[must_use]
    pub fn with_subcalls(self, subcalls: bool) -> Self {
        Self { subcalls, ..self }
    }

    /// Sets whether functions without a source file are measured.
    #[must_use]
    pub fn with_builtins(self, builtins: bool) -> Self {
        Self { builtins, ..self }
    }

    /// Whether time spent in calls made from a profiled line is attributed to that line.
    #[must_use]
    pub fn subcalls(&self) -> bool {
        self.subcalls
    }

    /// Whether functions without a source file are measured.
    #[must_use]
    pub fn builtins(&self) -> bool {
        self.builtins
    }
}

impl Default for BeginOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// The per-line timing hook that a profiling session drives.
///
/// A collector only measures while it is between [`begin()`](Self::begin) and
/// [`end()`](Self::end). The [`SessionGate`](crate::SessionGate) guarantees that these calls
/// alternate, starting with `begin()`, no matter how many profiled regions overlap.
#[cfg_attr(test, mockall::automock)]
pub trait TimingCollector: Debug + Send + Sync {
    /// Starts measuring lines of `function`. Tracking the same function again has no effect.
    fn track(&self, function: &FunctionId);

    /// Activates measurement.
    fn begin(&self, options: BeginOptions);

    /// Deactivates measurement. Line spans still open at this point are closed at the moment of
    /// deactivation, so nothing is measured while profiled code is suspended.
    fn end(&self);

    /// Takes an independent copy of everything measured so far.
    fn snapshot(&self) -> Stats;
}

/// A collector fed by explicit line marks placed in the profiled code.
///
/// Each invocation of a profiled function opens a [`Frame`] and marks every line it reaches
/// with [`Frame::line()`]. The time between two marks is attributed to the earlier line and
/// the time between the last mark and the end of the frame is attributed to the last line.
///
/// A frame may outlive an activation, for example when a generator holding it yields. The line
/// marked last before deactivation is then closed when the collector is deactivated and the
/// next mark after reactivation starts a new line.
///
/// # Examples
///
/// ```
/// use all_the_lines::{BeginOptions, LineCollector, TimingCollector, function_id};
///
/// let collector = LineCollector::new();
/// let work = function_id!("work");
/// collector.track(&work);
///
/// collector.begin(BeginOptions::new());
/// {
///     let mut frame = collector.frame(&work);
///     frame.line(line!());
///     std::hint::black_box(40 + 2);
///     frame.line(line!());
/// }
/// collector.end();
///
/// let stats = collector.snapshot();
/// assert_eq!(stats.lines(&work).unwrap().len(), 2);
/// ```
#[derive(Debug)]
pub struct LineCollector {
    clock: ClockFacade,
    state: Mutex<CollectorState>,
}

#[derive(Debug, Default)]
struct CollectorState {
    records: HashMap<FunctionId, FunctionRecord>,

    // Present while measuring.
    active: Option<BeginOptions>,

    // Lines marked by frames and not yet closed. Only populated while measuring.
    open_spans: HashMap<u64, OpenSpan>,
    next_span_id: u64,
}

#[derive(Debug, Default)]
struct FunctionRecord {
    // Lines in the order they were first observed.
    order: Vec<u32>,
    timings: HashMap<u32, LineTiming>,
}

#[derive(Debug)]
struct OpenSpan {
    function: FunctionId,
    line: u32,
    started: u64,
}

impl CollectorState {
    fn open_span(&mut self, function: &FunctionId, line: u32, now: u64) -> Option<u64> {
        let options = self.active?;

        if (!options.builtins() && function.file().is_synthetic())
            || !self.records.contains_key(function)
        {
            return None;
        }

        let id = self.next_span_id;
        self.next_span_id = id
            .checked_add(1)
            .expect("line span id overflows u64 - this indicates an unrealistic scenario");

        self.open_spans.insert(
            id,
            OpenSpan {
                function: function.clone(),
                line,
                started: now,
            },
        );

        Some(id)
    }

    fn close_span(&mut self, id: u64, now: u64) {
        // Missing if a deactivation already closed it.
        if let Some(span) = self.open_spans.remove(&id) {
            self.record(&span, now);
        }
    }

    fn close_all_spans(&mut self, now: u64) {
        let mut spans: Vec<_> = mem::take(&mut self.open_spans).into_iter().collect();
        spans.sort_unstable_by_key(|(id, _)| *id);

        for (_, span) in &spans {
            self.record(span, now);
        }
    }

    fn record(&mut self, span: &OpenSpan, now: u64) {
        let Some(record) = self.records.get_mut(&span.function) else {
            return;
        };

        if !record.timings.contains_key(&span.line) {
            record.order.push(span.line);
        }

        record
            .timings
            .entry(span.line)
            .or_default()
            .record(now.saturating_sub(span.started));
    }
}

impl LineCollector {
    /// Creates a collector that measures wall-clock time in nanoseconds.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(ClockFacade::real())
    }

    pub(crate) fn with_clock(clock: ClockFacade) -> Self {
        Self {
            clock,
            state: Mutex::new(CollectorState::default()),
        }
    }

    /// Opens a frame for one invocation of `function`.
    ///
    /// The frame records nothing unless the function is tracked and the collector is active.
    #[must_use]
    pub fn frame(&self, function: &FunctionId) -> Frame<'_> {
        Frame {
            collector: self,
            function: function.clone(),
            pending: None,
        }
    }

    /// The lines of `function` that have been measured, in the order they were first reached.
    #[must_use]
    pub fn observed_lines(&self, function: &FunctionId) -> Vec<u32> {
        self.state
            .lock()
            .expect(ERR_POISONED_LOCK)
            .records
            .get(function)
            .map(|record| record.order.clone())
            .unwrap_or_default()
    }

    // Closes the pending span, if any, and opens a span for `next_line`, if any.
    fn advance(
        &self,
        function: &FunctionId,
        pending: Option<u64>,
        next_line: Option<u32>,
    ) -> Option<u64> {
        let now = self.clock.now();
        let mut state = self.state.lock().expect(ERR_POISONED_LOCK);

        if let Some(id) = pending {
            state.close_span(id, now);
        }

        state.open_span(function, next_line?, now)
    }
}

impl Default for LineCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingCollector for LineCollector {
    fn track(&self, function: &FunctionId) {
        let mut state = self.state.lock().expect(ERR_POISONED_LOCK);

        if !state.records.contains_key(function) {
            tracing::debug!(%function, "tracking function");
            state
                .records
                .insert(function.clone(), FunctionRecord::default());
        }
    }

    fn begin(&self, options: BeginOptions) {
        let mut state = self.state.lock().expect(ERR_POISONED_LOCK);
        state.active = Some(options);
    }

    fn end(&self) {
        let now = self.clock.now();
        let mut state = self.state.lock().expect(ERR_POISONED_LOCK);

        state.close_all_spans(now);
        state.active = None;
    }

    fn snapshot(&self) -> Stats {
        let state = self.state.lock().expect(ERR_POISONED_LOCK);

        let mut stats = Stats::new(self.clock.unit());

        for (function, record) in &state.records {
            stats.insert_function(function.clone());

            for line in &record.order {
                if let Some(timing) = record.timings.get(line) {
                    stats.insert(function.clone(), *line, *timing);
                }
            }
        }

        stats
    }
}

/// Marks the lines reached by one invocation of a profiled function.
///
/// Dropping the frame attributes the time since the last mark to the last marked line.
#[derive(Debug)]
pub struct Frame<'a> {
    collector: &'a LineCollector,
    function: FunctionId,

    // Id of the span of the last marked line.
    pending: Option<u64>,
}

impl Frame<'_> {
    /// Marks that execution has reached `line`, completing the previously marked line.
    pub fn line(&mut self, line: u32) {
        self.pending = self
            .collector
            .advance(&self.function, self.pending.take(), Some(line));
    }

    /// The function this frame belongs to.
    #[must_use]
    pub fn function(&self) -> &FunctionId {
        &self.function
    }
}

impl Drop for Frame<'_> {
    fn drop(&mut self) {
        if let Some(id) = self.pending.take() {
            self.collector.advance(&self.function, Some(id), None);
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;
    use crate::pal::FakeClock;

    assert_impl_all!(LineCollector: Send, Sync);
    assert_impl_all!(BeginOptions: Send, Sync, Copy);

    fn collector_with_fake_clock() -> (LineCollector, FakeClock) {
        let clock = FakeClock::new(1e-6);
        let collector = LineCollector::with_clock(clock.clone().into());
        (collector, clock)
    }

    #[test]
    fn begin_options_default_includes_everything() {
        let options = BeginOptions::default();

        assert!(options.subcalls());
        assert!(options.builtins());
        assert_eq!(options, BeginOptions::new());
    }

    #[test]
    fn time_between_marks_goes_to_earlier_line() {
        let (collector, clock) = collector_with_fake_clock();
        let function = FunctionId::new("src/a.rs", 10, "a");
        collector.track(&function);
        collector.begin(BeginOptions::new());

        {
            let mut frame = collector.frame(&function);
            frame.line(11);
            clock.advance(5);
            frame.line(12);
            clock.advance(7);
        }

        collector.end();

        let stats = collector.snapshot();
        assert_eq!(stats.line(&function, 11), Some(LineTiming::new(1, 5)));
        assert_eq!(stats.line(&function, 12), Some(LineTiming::new(1, 7)));
    }

    #[test]
    fn repeated_lines_accumulate() {
        let (collector, clock) = collector_with_fake_clock();
        let function = FunctionId::new("src/a.rs", 1, "looping");
        collector.track(&function);
        collector.begin(BeginOptions::new());

        {
            let mut frame = collector.frame(&function);
            for _ in 0..3 {
                frame.line(2);
                clock.advance(2);
                frame.line(3);
                clock.advance(10);
            }
        }

        collector.end();

        let stats = collector.snapshot();
        assert_eq!(stats.line(&function, 2), Some(LineTiming::new(3, 6)));
        assert_eq!(stats.line(&function, 3), Some(LineTiming::new(3, 30)));
        assert_eq!(collector.observed_lines(&function), [2, 3]);
    }

    #[test]
    fn records_nothing_while_inactive() {
        let (collector, clock) = collector_with_fake_clock();
        let function = FunctionId::new("src/a.rs", 1, "idle");
        collector.track(&function);

        {
            let mut frame = collector.frame(&function);
            frame.line(2);
            clock.advance(3);
            frame.line(3);
        }

        let stats = collector.snapshot();
        assert!(stats.is_empty());
        assert_eq!(stats.lines(&function).map(|lines| lines.len()), Some(0));
    }

    #[test]
    fn untracked_functions_are_ignored() {
        let (collector, _clock) = collector_with_fake_clock();
        let function = FunctionId::new("src/a.rs", 1, "stranger");
        collector.begin(BeginOptions::new());

        {
            let mut frame = collector.frame(&function);
            frame.line(2);
            frame.line(3);
        }

        collector.end();

        assert_eq!(collector.snapshot().functions().count(), 0);
    }

    #[test]
    fn deactivation_closes_pending_span() {
        let (collector, clock) = collector_with_fake_clock();
        let function = FunctionId::new("src/a.rs", 1, "suspends");
        collector.track(&function);

        let mut frame = collector.frame(&function);

        collector.begin(BeginOptions::new());
        frame.line(2);
        clock.advance(100);
        collector.end();

        // Suspended here. Resumption starts a new activation.
        clock.advance(1000);
        collector.begin(BeginOptions::new());
        frame.line(3);
        clock.advance(4);
        drop(frame);
        collector.end();

        let stats = collector.snapshot();
        assert_eq!(stats.line(&function, 2), Some(LineTiming::new(1, 100)));
        assert_eq!(stats.line(&function, 3), Some(LineTiming::new(1, 4)));
    }

    #[test]
    fn frame_dropped_after_deactivation_records_nothing_more() {
        let (collector, clock) = collector_with_fake_clock();
        let function = FunctionId::new("src/a.rs", 1, "abandoned");
        collector.track(&function);

        let mut frame = collector.frame(&function);

        collector.begin(BeginOptions::new());
        frame.line(2);
        clock.advance(10);
        collector.end();

        clock.advance(500);
        drop(frame);

        assert_eq!(
            collector.snapshot().line(&function, 2),
            Some(LineTiming::new(1, 10))
        );
    }

    #[test]
    fn deactivation_closes_spans_of_every_open_frame() {
        let (collector, clock) = collector_with_fake_clock();
        let outer = FunctionId::new("src/a.rs", 1, "outer");
        let inner = FunctionId::new("src/a.rs", 20, "inner");
        collector.track(&outer);
        collector.track(&inner);

        collector.begin(BeginOptions::new());
        let mut outer_frame = collector.frame(&outer);
        outer_frame.line(2);
        clock.advance(3);
        let mut inner_frame = collector.frame(&inner);
        inner_frame.line(21);
        clock.advance(5);
        collector.end();

        drop(inner_frame);
        drop(outer_frame);

        let stats = collector.snapshot();
        assert_eq!(stats.line(&outer, 2), Some(LineTiming::new(1, 8)));
        assert_eq!(stats.line(&inner, 21), Some(LineTiming::new(1, 5)));
    }

    #[test]
    fn builtins_can_be_excluded() {
        let (collector, _clock) = collector_with_fake_clock();
        let builtin = FunctionId::synthetic(0, "builtin");
        let real = FunctionId::new("src/a.rs", 1, "real");
        collector.track(&builtin);
        collector.track(&real);
        collector.begin(BeginOptions::new().with_builtins(false));

        {
            let mut frame = collector.frame(&builtin);
            frame.line(1);
        }
        {
            let mut frame = collector.frame(&real);
            frame.line(2);
        }

        collector.end();

        let stats = collector.snapshot();
        assert_eq!(stats.line(&builtin, 1), None);
        assert_eq!(stats.line(&real, 2), Some(LineTiming::new(1, 0)));
    }

    #[test]
    fn tracking_twice_keeps_existing_data() {
        let (collector, _clock) = collector_with_fake_clock();
        let function = FunctionId::new("src/a.rs", 1, "f");
        collector.track(&function);
        collector.begin(BeginOptions::new());
        collector.frame(&function).line(2);
        collector.end();

        collector.track(&function);

        let stats = collector.snapshot();
        assert_eq!(stats.functions().count(), 1);
        assert_eq!(stats.line(&function, 2), Some(LineTiming::new(1, 0)));
    }

    #[test]
    fn snapshots_are_independent() {
        let (collector, _clock) = collector_with_fake_clock();
        let function = FunctionId::new("src/a.rs", 1, "f");
        collector.track(&function);
        collector.begin(BeginOptions::new());

        collector.frame(&function).line(2);
        let before = collector.snapshot();
        collector.frame(&function).line(2);
        let after = collector.snapshot();

        collector.end();

        assert_eq!(before.line(&function, 2).map(|t| t.hits()), Some(1));
        assert_eq!(after.line(&function, 2).map(|t| t.hits()), Some(2));
    }
}
