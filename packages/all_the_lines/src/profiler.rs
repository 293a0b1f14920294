use std::future::Future;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::instrument::{InstrumentedCoroutine, InstrumentedFn, InstrumentedGenerator};
use crate::{
    BeginOptions, ERR_POISONED_LOCK, Frame, FunctionId, GateGuard, Generator, LineCollector,
    Report, ReportOptions, Result, SessionGate, Stats, TimingCollector, save_stats,
};

/// A line profiling session.
///
/// The profiler owns a [`TimingCollector`] and the [`SessionGate`] that activates it. Functions
/// are registered with the collector when they are wrapped, and every wrapped callable
/// activates the gate while it runs. Activation is reentrant, so wrapped functions may call
/// each other freely.
///
/// There is no global profiler. Profiled code that marks its own lines needs access to the
/// profiler, typically by capturing a reference to it in the wrapped closure.
///
/// # Examples
///
/// ```
/// use all_the_lines::{Profiler, ReportOptions, function_id};
///
/// let profiler = Profiler::new();
/// let checksum_id = function_id!("checksum");
///
/// let checksum = profiler.wrap_function(checksum_id.clone(), |data: &[u8]| {
///     let mut frame = profiler.frame(&checksum_id);
///     frame.line(line!());
///     let mut sum = 0_u32;
///     frame.line(line!());
///     for byte in data {
///         sum = sum.wrapping_add(u32::from(*byte));
///     }
///     frame.line(line!());
///     sum
/// });
///
/// let data = [1_u8, 2, 3];
/// assert_eq!(checksum.call(&data[..]), 6);
///
/// let stats = profiler.stats();
/// assert_eq!(stats.lines(&checksum_id).unwrap().len(), 3);
///
/// // Output statistics of all profiled functions to the console.
/// profiler.print_stats(&mut std::io::stdout(), ReportOptions::new()).unwrap();
/// ```
#[derive(Debug)]
pub struct Profiler<C: TimingCollector + 'static = LineCollector> {
    collector: Arc<C>,
    gate: Arc<SessionGate>,

    // In registration order.
    functions: Mutex<Vec<FunctionId>>,
}

impl Profiler<LineCollector> {
    /// Creates a profiler that measures wall-clock time with a [`LineCollector`].
    #[expect(
        clippy::new_without_default,
        reason = "to avoid ambiguity with the notion of a 'default profiler' that is not actually a default profiler"
    )]
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(BeginOptions::new())
    }

    /// Creates a profiler with a [`LineCollector`] that is activated with `options`.
    #[must_use]
    pub fn with_options(options: BeginOptions) -> Self {
        Self::with_collector(Arc::new(LineCollector::new()), options)
    }

    /// Opens a frame for one invocation of `function`, used to mark the lines it reaches.
    #[must_use]
    pub fn frame(&self, function: &FunctionId) -> Frame<'_> {
        self.collector.frame(function)
    }
}

impl<C: TimingCollector + 'static> Profiler<C> {
    /// Creates a profiler around an existing collector.
    #[must_use]
    pub fn with_collector(collector: Arc<C>, options: BeginOptions) -> Self {
        let gate = Arc::new(SessionGate::new(
            Arc::clone(&collector) as Arc<dyn TimingCollector>,
            options,
        ));

        Self {
            collector,
            gate,
            functions: Mutex::new(Vec::new()),
        }
    }

    /// Registers a function for profiling without wrapping it.
    ///
    /// Registering a function that is already registered has no effect.
    pub fn add_function(&self, function: &FunctionId) {
        let mut functions = self.functions.lock().expect(ERR_POISONED_LOCK);

        if functions.contains(function) {
            return;
        }

        self.collector.track(function);
        functions.push(function.clone());

        tracing::debug!(%function, "registered function for line profiling");
    }

    /// Registers a plain function and wraps it so each call is profiled.
    #[must_use]
    pub fn wrap_function<F>(&self, function: FunctionId, f: F) -> InstrumentedFn<F> {
        self.add_function(&function);
        InstrumentedFn::new(function, Arc::clone(&self.gate), f)
    }

    /// Registers a function that creates a [`Generator`] and wraps it so each resumption of
    /// each created generator is profiled.
    #[must_use]
    pub fn wrap_generator<Args, G, F>(
        &self,
        function: FunctionId,
        factory: F,
    ) -> InstrumentedGenerator<F>
    where
        F: Fn(Args) -> G,
        G: Generator,
    {
        self.add_function(&function);
        InstrumentedGenerator::new(function, Arc::clone(&self.gate), factory)
    }

    /// Registers an async function and wraps it so each poll of each returned future is
    /// profiled.
    #[must_use]
    pub fn wrap_coroutine<Args, Fut, F>(
        &self,
        function: FunctionId,
        factory: F,
    ) -> InstrumentedCoroutine<F>
    where
        F: Fn(Args) -> Fut,
        Fut: Future,
    {
        self.add_function(&function);
        InstrumentedCoroutine::new(function, Arc::clone(&self.gate), factory)
    }

    /// Calls `f` with the gate active, profiling any registered function it reaches.
    pub fn run_call<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.gate.activate();
        f()
    }

    /// Activates profiling until the returned guard is dropped.
    pub fn activate(&self) -> GateGuard<'_> {
        self.gate.activate()
    }

    /// Activates profiling. Each call must be balanced by a call to
    /// [`disable_by_count()`](Self::disable_by_count).
    pub fn enable_by_count(&self) {
        self.gate.enter();
    }

    /// Deactivates profiling once every [`enable_by_count()`](Self::enable_by_count) has been
    /// balanced. Extra calls have no effect.
    pub fn disable_by_count(&self) {
        self.gate.exit();
    }

    /// The registered functions, in registration order.
    #[must_use]
    pub fn functions(&self) -> Vec<FunctionId> {
        self.functions.lock().expect(ERR_POISONED_LOCK).clone()
    }

    /// The collector that measures the registered functions.
    #[must_use]
    pub fn collector(&self) -> &C {
        &self.collector
    }

    /// The gate that activates the collector.
    #[must_use]
    pub fn gate(&self) -> &SessionGate {
        &self.gate
    }

    /// Takes a snapshot of the statistics collected so far.
    #[must_use]
    pub fn stats(&self) -> Stats {
        self.collector.snapshot()
    }

    /// Saves a snapshot of the statistics collected so far to a `.lprof` file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if the file cannot be written.
    pub fn dump_stats(&self, path: impl AsRef<Path>) -> Result<()> {
        save_stats(&self.stats(), path)
    }

    /// Writes a report of the statistics collected so far.
    ///
    /// # Errors
    ///
    /// Returns any error reported by `out`.
    pub fn print_stats(&self, out: &mut impl io::Write, options: ReportOptions) -> io::Result<()> {
        Report::new(&self.stats(), options).write_to(out)
    }
}
