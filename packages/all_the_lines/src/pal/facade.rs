// Dispatches to the real platform or, in tests, to a fake clock or mocked file system.

use std::fmt;
use std::io;
use std::path::Path;
#[cfg(test)]
use std::sync::Arc;

#[cfg(test)]
use crate::pal::{FakeClock, MockSourceFiles};
use crate::pal::{Clock, FileSystemSourceFiles, MonotonicClock, SourceFiles};

#[derive(Clone, Debug)]
pub(crate) enum ClockFacade {
    Real(MonotonicClock),

    #[cfg(test)]
    Fake(FakeClock),
}

impl ClockFacade {
    pub(crate) fn real() -> Self {
        Self::Real(MonotonicClock::new())
    }
}

#[cfg(test)]
impl From<FakeClock> for ClockFacade {
    fn from(clock: FakeClock) -> Self {
        Self::Fake(clock)
    }
}

impl Clock for ClockFacade {
    fn now(&self) -> u64 {
        match self {
            Self::Real(clock) => clock.now(),
            #[cfg(test)]
            Self::Fake(clock) => clock.now(),
        }
    }

    fn unit(&self) -> f64 {
        match self {
            Self::Real(clock) => clock.unit(),
            #[cfg(test)]
            Self::Fake(clock) => clock.unit(),
        }
    }
}

#[derive(Clone)]
pub(crate) enum SourceFilesFacade {
    Real(FileSystemSourceFiles),

    #[cfg(test)]
    Mock(Arc<MockSourceFiles>),
}

// Debug implementations have no API contract to test.
#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg_attr(test, mutants::skip)]
impl fmt::Debug for SourceFilesFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real(_) => f.debug_struct("SourceFilesFacade::Real").finish(),
            #[cfg(test)]
            Self::Mock(_) => f.debug_struct("SourceFilesFacade::Mock").finish(),
        }
    }
}

impl SourceFilesFacade {
    pub(crate) fn real() -> Self {
        Self::Real(FileSystemSourceFiles)
    }
}

#[cfg(test)]
impl From<MockSourceFiles> for SourceFilesFacade {
    fn from(mock: MockSourceFiles) -> Self {
        Self::Mock(Arc::new(mock))
    }
}

impl SourceFiles for SourceFilesFacade {
    fn read_lines(&self, path: &Path) -> io::Result<Vec<String>> {
        match self {
            Self::Real(files) => files.read_lines(path),
            #[cfg(test)]
            Self::Mock(files) => files.read_lines(path),
        }
    }
}
