use std::fs;
use std::io;
use std::path::Path;
use std::time::Instant;

use crate::pal::{Clock, SourceFiles};

/// Nanosecond ticks measured from the moment the clock was created.
#[derive(Clone, Copy, Debug)]
pub(crate) struct MonotonicClock {
    anchor: Instant,
}

impl MonotonicClock {
    pub(crate) fn new() -> Self {
        Self {
            anchor: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> u64 {
        u64::try_from(self.anchor.elapsed().as_nanos())
            .expect("clock ran for more than 584 years - this indicates an unrealistic scenario")
    }

    fn unit(&self) -> f64 {
        1e-9
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct FileSystemSourceFiles;

impl SourceFiles for FileSystemSourceFiles {
    fn read_lines(&self, path: &Path) -> io::Result<Vec<String>> {
        let contents = fs::read_to_string(path)?;

        Ok(contents.lines().map(str::to_string).collect())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();

        let first = clock.now();
        let second = clock.now();

        assert!(second >= first);
    }

    #[test]
    fn reads_lines_without_terminators() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "fn main() {{\r\n    work();\n}}\n").unwrap();

        let lines = FileSystemSourceFiles.read_lines(file.path()).unwrap();

        assert_eq!(lines, ["fn main() {", "    work();", "}"]);
    }

    #[test]
    fn missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();

        let result = FileSystemSourceFiles.read_lines(&dir.path().join("gone.rs"));

        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotFound);
    }
}
