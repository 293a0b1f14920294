//! Integration tests for `all_the_lines` against the real clock and file system.
//!
//! The profiled functions mark lines of a small source file written to a temporary directory,
//! so the reports can show real source text next to the measurements.

use std::fs;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::thread;
use std::time::Duration;

use all_the_lines::{
    BeginOptions, Frame, FunctionId, Generator, Profiler, Report, ReportOptions, SourceFile,
    TimingCollector, load_stats,
};
use futures::executor::block_on;

const PROCESS_SOURCE: &str = "\
fn process(items: &[u64]) -> u64 {
    let mut total = 0;
    for item in items {
        total += item;
    }
    total
}
";

fn write_source(dir: &Path) -> FunctionId {
    let path = dir.join("process.rs");
    fs::write(&path, PROCESS_SOURCE).unwrap();

    FunctionId::new(path, 1, "process")
}

/// Runs `process` under `profiler`, marking the lines of `PROCESS_SOURCE` as it goes.
fn run_process(profiler: &Profiler, function: &FunctionId, items: &[u64]) -> u64 {
    let process = profiler.wrap_function(function.clone(), |items: &[u64]| {
        let mut frame = profiler.frame(function);

        frame.line(2);
        let mut total = 0;

        for item in items {
            frame.line(3);
            frame.line(4);
            total += item;
        }

        frame.line(3);
        frame.line(6);
        total
    });

    process.call(items)
}

fn hits(profiler: &Profiler, function: &FunctionId) -> Vec<(u32, u64)> {
    profiler
        .stats()
        .lines(function)
        .unwrap()
        .iter()
        .map(|(line, timing)| (*line, timing.hits()))
        .collect()
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot use the real operating system APIs.
fn wrapped_function_counts_hits_per_line() {
    let dir = tempfile::tempdir().unwrap();
    let function = write_source(dir.path());
    let profiler = Profiler::new();

    let total = run_process(&profiler, &function, &[1, 2, 3]);

    assert_eq!(total, 6);
    assert_eq!(hits(&profiler, &function), [(2, 1), (3, 4), (4, 3), (6, 1)]);
    assert_eq!(profiler.gate().enable_count(), 0);
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot use the real operating system APIs.
fn slow_line_dominates_function_time() {
    let function = FunctionId::new("sleepy.rs", 1, "sleepy");
    let profiler = Profiler::new();

    let sleepy = profiler.wrap_function(function.clone(), |()| {
        let mut frame = profiler.frame(&function);
        frame.line(2);
        frame.line(3);
        thread::sleep(Duration::from_millis(20));
        frame.line(4);
    });

    sleepy.call(());

    let stats = profiler.stats();
    let slow = stats.line(&function, 3).unwrap();

    // The monotonic clock counts nanoseconds.
    assert!(slow.total_ticks() >= 20_000_000, "got {slow:?}");
    assert!(slow.total_ticks() * 2 > stats.total_ticks(&function));
    assert!(stats.total_seconds(&function) >= 0.02);
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot use the real operating system APIs.
fn report_shows_source_next_to_hits() {
    let dir = tempfile::tempdir().unwrap();
    let function = write_source(dir.path());
    let profiler = Profiler::new();

    run_process(&profiler, &function, &[5, 6, 7]);

    let mut out = Vec::new();
    profiler.print_stats(&mut out, ReportOptions::new()).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(text.starts_with("Timer unit: 1e-09 s\n"), "got: {text}");
    assert!(text.contains("Function: process at line 1\n"), "got: {text}");

    let row = |number: u32| {
        text.lines()
            .find(|row| row.starts_with(&format!("{number:>6} ")))
            .unwrap_or_else(|| panic!("no row for line {number} in: {text}"))
    };

    assert!(row(1).ends_with("  fn process(items: &[u64]) -> u64 {"));
    assert!(row(4).starts_with("     4         3 "), "got: {}", row(4));
    assert!(row(4).ends_with("  total += item;"));
    assert!(row(7).ends_with("  }"));
    assert!(!text.contains("Could not find file"));
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot use the real operating system APIs.
fn block_sums_include_nested_lines() {
    let dir = tempfile::tempdir().unwrap();
    let function = write_source(dir.path());
    let profiler = Profiler::new();

    run_process(&profiler, &function, &[1, 2]);

    let stats = profiler.stats();
    let ticks = |line| stats.line(&function, line).unwrap().total_ticks();
    let loop_total = ticks(3) + ticks(4);

    let text = Report::new(
        &stats,
        ReportOptions::new()
            .with_block_sums(true)
            .with_top_blocks(2),
    )
    .to_string();

    let loop_row = text
        .lines()
        .find(|row| row.starts_with("     3 "))
        .unwrap();
    let block_column = loop_row
        .split_whitespace()
        .nth(5)
        .unwrap()
        .parse::<u64>()
        .unwrap();

    assert_eq!(block_column, loop_total);
    assert!(text.contains("Top 2 blocks by time:"), "got: {text}");
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot use the real operating system APIs.
fn dumped_stats_render_like_live_stats() {
    let dir = tempfile::tempdir().unwrap();
    let function = write_source(dir.path());
    let profiler = Profiler::new();

    run_process(&profiler, &function, &[1, 2, 3, 4]);

    let stats_file = dir.path().join("process.lprof");
    profiler.dump_stats(&stats_file).unwrap();

    let loaded = load_stats(&stats_file).unwrap();
    let live = profiler.stats();

    assert_eq!(loaded, live);
    assert_eq!(
        Report::new(&loaded, ReportOptions::new()).to_string(),
        Report::new(&live, ReportOptions::new()).to_string()
    );
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot use the real operating system APIs.
fn missing_source_renders_placeholders() {
    let function = FunctionId::new("definitely/not/here.rs", 10, "ghost");
    let profiler = Profiler::new();

    let ghost = profiler.wrap_function(function.clone(), |()| {
        let mut frame = profiler.frame(&function);
        frame.line(11);
        frame.line(13);
    });
    ghost.call(());

    let text = Report::new(&profiler.stats(), ReportOptions::new()).to_string();

    assert!(text.contains("Could not find file definitely/not/here.rs"));
    assert!(text.contains("Continuing without the function's contents."));

    // Lines 10 through 13.
    let rows: Vec<_> = text
        .lines()
        .skip_while(|row| !row.starts_with("====="))
        .skip(1)
        .take_while(|row| !row.is_empty())
        .collect();
    assert_eq!(rows.len(), 4, "got: {text}");
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot use the real operating system APIs.
fn recursive_calls_keep_collector_active_until_outermost_returns() {
    let function = FunctionId::new("fib.rs", 1, "fib");
    let profiler = Profiler::new();

    fn fib(profiler: &Profiler, function: &FunctionId, n: u64) -> u64 {
        let wrapped = profiler.wrap_function(function.clone(), |n: u64| {
            let mut frame = profiler.frame(function);
            frame.line(2);
            if n < 2 {
                return n;
            }
            frame.line(3);
            fib(profiler, function, n - 1) + fib(profiler, function, n - 2)
        });

        wrapped.call(n)
    }

    assert_eq!(fib(&profiler, &function, 6), 8);
    assert_eq!(profiler.gate().enable_count(), 0);
    assert!(!profiler.gate().is_active());

    // fib(6) makes 25 calls, 12 of which recurse further.
    assert_eq!(hits(&profiler, &function), [(2, 25), (3, 12)]);
    assert_eq!(profiler.functions(), [function]);
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot use the real operating system APIs.
fn lines_marked_outside_profiled_calls_are_ignored() {
    let function = FunctionId::new("outside.rs", 1, "outside");
    let profiler = Profiler::new();
    profiler.add_function(&function);

    {
        let mut frame = profiler.frame(&function);
        frame.line(2);
        frame.line(3);
    }

    assert!(profiler.stats().is_empty());

    profiler.run_call(|| {
        let mut frame = profiler.frame(&function);
        frame.line(2);
    });

    assert_eq!(hits(&profiler, &function), [(2, 1)]);
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot use the real operating system APIs.
fn enable_by_count_nests() {
    let function = FunctionId::new("manual.rs", 1, "manual");
    let profiler = Profiler::new();
    profiler.add_function(&function);

    profiler.enable_by_count();
    profiler.enable_by_count();
    profiler.disable_by_count();

    {
        let mut frame = profiler.frame(&function);
        frame.line(2);
    }

    profiler.disable_by_count();
    profiler.disable_by_count();

    {
        let mut frame = profiler.frame(&function);
        frame.line(3);
    }

    assert_eq!(hits(&profiler, &function), [(2, 1)]);
    assert_eq!(profiler.gate().enable_count(), 0);
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot use the real operating system APIs.
fn generator_and_coroutine_lines_are_measured() {
    let generator_id = FunctionId::new("gen.rs", 1, "squares");
    let coroutine_id = FunctionId::new("co.rs", 1, "double");
    let profiler = Profiler::new();

    let squares = profiler.wrap_generator(generator_id.clone(), |limit: u64| {
        let profiler = &profiler;
        let generator_id = &generator_id;
        (1..=limit).map(move |n| {
            let mut frame = profiler.frame(generator_id);
            frame.line(2);
            n * n
        })
    });

    let double = profiler.wrap_coroutine(coroutine_id.clone(), |n: u64| {
        let profiler = &profiler;
        let coroutine_id = &coroutine_id;
        async move {
            let mut frame = profiler.frame(coroutine_id);
            frame.line(2);
            n * 2
        }
    });

    assert_eq!(squares.start(3).collect::<Vec<_>>(), [1, 4, 9]);
    assert_eq!(block_on(double.call(21)), 42);

    assert_eq!(hits(&profiler, &generator_id), [(2, 3)]);
    assert_eq!(hits(&profiler, &coroutine_id), [(2, 1)]);
    assert_eq!(profiler.gate().enable_count(), 0);
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot use the real operating system APIs.
fn synthetic_functions_need_builtins() {
    let function = FunctionId::synthetic(1, "native");
    assert!(matches!(function.file(), SourceFile::Synthetic));

    for (builtins, expected_empty) in [(false, true), (true, false)] {
        let profiler = Profiler::with_options(BeginOptions::new().with_builtins(builtins));

        let native = profiler.wrap_function(function.clone(), |()| {
            let mut frame = profiler.frame(&function);
            frame.line(1);
        });
        native.call(());

        assert_eq!(profiler.stats().is_empty(), expected_empty);
        assert_eq!(profiler.collector().snapshot().is_empty(), expected_empty);
    }
}

/// Yields its first value, then the value sent to it plus twenty, marking one line per step
/// through a single frame that lives across the suspensions.
struct AddTwenty<'a> {
    frame: Frame<'a>,
    first: u64,
    step: u8,
}

impl Generator for AddTwenty<'_> {
    type Yield = u64;
    type Resume = u64;

    fn resume(&mut self, sent: Option<u64>) -> Option<u64> {
        self.step = self.step.saturating_add(1);

        match self.step {
            1 => {
                self.frame.line(2);
                Some(self.first)
            }
            2 => {
                self.frame.line(3);
                sent.map(|value| value + 20)
            }
            _ => {
                self.frame.line(4);
                None
            }
        }
    }
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot use the real operating system APIs.
fn frame_held_across_yields_counts_every_step() {
    let function = FunctionId::new("add_twenty.rs", 1, "add_twenty");
    let profiler = Profiler::new();

    let add_twenty = profiler.wrap_generator(function.clone(), |first: u64| AddTwenty {
        frame: profiler.frame(&function),
        first,
        step: 0,
    });

    let mut generator = add_twenty.start(20);
    assert_eq!(generator.next(), Some(20));
    assert_eq!(generator.send(30), Some(50));
    assert_eq!(generator.next(), None);
    drop(generator);

    assert_eq!(hits(&profiler, &function), [(2, 1), (3, 1), (4, 1)]);
}

struct YieldOnce {
    yielded: bool,
}

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

#[test]
#[cfg_attr(miri, ignore)] // Miri cannot use the real operating system APIs.
fn frame_held_across_await_counts_line_before_await() {
    let function = FunctionId::new("fetch.rs", 1, "fetch");
    let profiler = Profiler::new();

    let fetch = profiler.wrap_coroutine(function.clone(), |(): ()| {
        let profiler = &profiler;
        let function = &function;

        async move {
            let mut frame = profiler.frame(function);
            frame.line(2);
            YieldOnce { yielded: false }.await;
            frame.line(3);
        }
    });

    block_on(fetch.call(()));

    assert_eq!(hits(&profiler, &function), [(2, 1), (3, 1)]);
    assert_eq!(profiler.gate().enable_count(), 0);
}
