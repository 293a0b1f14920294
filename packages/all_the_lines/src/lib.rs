//! Line-by-line execution time profiling.
//!
//! This package measures how much time is spent on each line of selected functions and renders
//! the results as a report that shows every line of the function's source next to its hit
//! count and timing.
//!
//! # Profiling
//!
//! A [`Profiler`] owns a [`TimingCollector`] and a reentrant [`SessionGate`]. Wrapping a
//! function, generator or coroutine registers it with the collector and returns an instrumented
//! callable that activates the gate for as long as the wrapped code runs. Nested and recursive
//! calls keep the collector active until the outermost call returns.
//!
//! Profiled code marks the lines it executes through a [`Frame`]. Time is attributed to a line
//! from the moment it is marked until the next line is marked or the frame is dropped.
//!
//! ```
//! use all_the_lines::{Profiler, function_id};
//!
//! let profiler = Profiler::new();
//! let sum_id = function_id!("sum_of_squares");
//!
//! let sum_of_squares = profiler.wrap_function(sum_id.clone(), |n: u64| {
//!     let mut frame = profiler.frame(&sum_id);
//!     frame.line(line!());
//!     let mut total = 0;
//!     for i in 0..n {
//!         frame.line(line!());
//!         total += i * i;
//!     }
//!     total
//! });
//!
//! assert_eq!(sum_of_squares.call(4), 14);
//!
//! let stats = profiler.stats();
//! let hits: Vec<u64> = stats
//!     .lines(&sum_id)
//!     .unwrap()
//!     .values()
//!     .map(|timing| timing.hits())
//!     .collect();
//! assert_eq!(hits, [1, 4]);
//! ```
//!
//! # Reports
//!
//! [`Stats`] can be rendered in-process with [`Report`] or saved with [`save_stats`] and rendered
//! later by the `all_the_lines` binary. With [`ReportOptions::with_block_sums`] the report also
//! shows the inclusive time of each loop, conditional and function block on its opening line.
//!
//! ```text
//! Timer unit: 1e-09 s
//!
//! File: src/lib.rs
//! Function: sum_of_squares at line 22
//! Total time: 4.2e-05 s
//!
//! Line #      Hits         Time  Per Hit   % Time  Line Contents
//! ==============================================================
//!     22                                           let sum_of_squares = ...
//! ```

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod codec;
mod collector;
mod error;
mod function_id;
mod gate;
mod instrument;
mod pal;
mod profiler;
mod report;
mod stats;
mod view;

pub use codec::{decode, encode, load_stats, save_stats};
#[cfg(test)]
pub(crate) use collector::MockTimingCollector;
pub use collector::{BeginOptions, Frame, LineCollector, TimingCollector};
pub use error::{Error, Result};
pub use function_id::{FunctionId, SYNTHETIC_FILE_MARKER, SourceFile};
pub use gate::{GateGuard, SessionGate};
pub use instrument::{
    CallableKind, Generator, InstrumentedCoroutine, InstrumentedFn, InstrumentedGenerator,
    ProfiledFuture, ProfiledGenerator,
};
pub use profiler::Profiler;
pub use report::{Report, ReportOptions};
pub use stats::{LineTiming, Stats};
#[doc(hidden)]
pub use view::{ViewInput, view};

pub(crate) const ERR_POISONED_LOCK: &str =
    "encountered poisoned lock - recorded line timings can no longer be trusted";
