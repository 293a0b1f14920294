use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when persisting, loading or exporting line timing statistics.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The data did not match the layout of a line timing stats file.
    #[error("invalid line timing stats data: {problem}")]
    InvalidStatsFile {
        /// A human-readable description of the problem.
        problem: String,
    },

    /// A stats file could not be read or written.
    #[error("failed to access stats file '{}': {source}", path.display())]
    Io {
        /// The file that was being accessed.
        path: PathBuf,

        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The stats could not be converted to JSON.
    #[error("failed to export stats as JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A report could not be written to its destination.
    #[error("failed to write report: {0}")]
    Output(#[source] io::Error),
}

impl Error {
    pub(crate) fn invalid(problem: impl Into<String>) -> Self {
        Self::InvalidStatsFile {
            problem: problem.into(),
        }
    }
}

/// A specialized `Result` type for stats operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn invalid_stats_file_mentions_problem() {
        let error = Error::invalid("bad magic");

        assert!(error.to_string().contains("bad magic"));
    }

    #[test]
    fn io_error_mentions_path() {
        let error = Error::Io {
            path: PathBuf::from("/tmp/missing.lprof"),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };

        let message = error.to_string();
        assert!(message.contains("missing.lprof"), "got: {message}");
        assert!(message.contains("not found"), "got: {message}");
    }
}
