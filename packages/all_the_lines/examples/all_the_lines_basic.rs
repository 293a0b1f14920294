//! Profiles a small function line by line and prints the report.
//!
//! Each line mark records the time spent until the next mark on the mark's own line, so in the
//! report the timings appear next to the `frame.line(line!())` calls that precede each
//! statement.
//!
//! The report reads this file to show the source next to the timings. Paths from `file!()` are
//! relative to the workspace root, so run it from there.
//!
//! Run with: `cargo run --example all_the_lines_basic`.
#![expect(
    clippy::arithmetic_side_effects,
    reason = "this is example code that does not need production-level safety"
)]

use std::hint::black_box;
use std::io;

use all_the_lines::{FunctionId, Profiler, ReportOptions};

const COLLATZ_FIRST_LINE: u32 = line!() + 1;
fn collatz_steps(profiler: &Profiler, function: &FunctionId, start: u64) -> u64 {
    let mut frame = profiler.frame(function);
    frame.line(line!());
    let mut value = start;
    let mut steps = 0;
    while value != 1 {
        frame.line(line!());
        if value % 2 == 0 {
            frame.line(line!());
            value /= 2;
        } else {
            frame.line(line!());
            value = 3 * value + 1;
        }
        steps += 1;
    }
    frame.line(line!());
    black_box(steps)
}

fn main() {
    let profiler = Profiler::new();
    let function = FunctionId::new(file!(), COLLATZ_FIRST_LINE, "collatz_steps");

    let steps = profiler.wrap_function(function.clone(), |start: u64| {
        collatz_steps(&profiler, &function, start)
    });

    let total: u64 = (1..2_000).map(|start| steps.call(start)).sum();
    println!("Total Collatz steps: {total}");
    println!();

    profiler
        .print_stats(
            &mut io::stdout(),
            ReportOptions::new().with_block_sums(true).with_top_blocks(3),
        )
        .expect("writing to stdout should not fail");
}
