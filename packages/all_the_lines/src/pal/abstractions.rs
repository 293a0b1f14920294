use std::fmt::Debug;
use std::io;
use std::path::Path;

/// A monotonic source of timer ticks.
pub(crate) trait Clock: Debug + Send + Sync + 'static {
    /// The current tick count. Never decreases.
    fn now(&self) -> u64;

    /// Seconds per tick.
    fn unit(&self) -> f64;
}

/// Read access to the source files that profiled functions are defined in.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait SourceFiles: Debug + Send + Sync + 'static {
    /// Reads a text file as a list of lines without line terminators.
    fn read_lines(&self, path: &Path) -> io::Result<Vec<String>>;
}
