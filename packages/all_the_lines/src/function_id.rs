//! Identity of profiled functions.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// The file identifier used for functions that have no backing source file.
pub const SYNTHETIC_FILE_MARKER: &str = "<synthetic>";

/// The source file that a profiled function is defined in.
///
/// Synthetic (builtin or generated) code has no file on disk. It is represented by a sentinel
/// that sorts after every real path, so reports list real code first.
///
/// Paths compare by their exact text, not by their components, so `a.rs` sorts before
/// `a/b.rs` just as the strings do and `a//b.rs` is a different file from `a/b.rs`. This keeps
/// the order of live stats the same as the order of stats loaded back from their
/// [`identifier()`](Self::identifier) strings.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum SourceFile {
    /// A file on disk, as it was named when the function was registered.
    Path(PathBuf),

    /// Code without a backing source file.
    Synthetic,
}

impl SourceFile {
    /// The path of the file, if the code has one.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            Self::Synthetic => None,
        }
    }

    /// Whether this is the synthetic sentinel.
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        matches!(self, Self::Synthetic)
    }

    /// The string form used in persisted stats.
    ///
    /// Persisted stats store text, so a path that is not valid Unicode is written with
    /// replacement characters in place of the invalid parts and does not load back as the
    /// same file.
    #[must_use]
    pub fn identifier(&self) -> String {
        match self {
            Self::Path(path) => path.to_string_lossy().into_owned(),
            Self::Synthetic => SYNTHETIC_FILE_MARKER.to_string(),
        }
    }
}

impl PartialEq for SourceFile {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SourceFile {}

impl PartialOrd for SourceFile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SourceFile {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            // Byte order of the text, which matches string order for Unicode paths.
            (Self::Path(a), Self::Path(b)) => a.as_os_str().cmp(b.as_os_str()),
            (Self::Path(_), Self::Synthetic) => Ordering::Less,
            (Self::Synthetic, Self::Path(_)) => Ordering::Greater,
            (Self::Synthetic, Self::Synthetic) => Ordering::Equal,
        }
    }
}

impl Hash for SourceFile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::Path(path) => path.as_os_str().hash(state),
            Self::Synthetic => SYNTHETIC_FILE_MARKER.hash(state),
        }
    }
}

impl From<&str> for SourceFile {
    fn from(value: &str) -> Self {
        if value == SYNTHETIC_FILE_MARKER {
            Self::Synthetic
        } else {
            Self::Path(PathBuf::from(value))
        }
    }
}

impl From<String> for SourceFile {
    fn from(value: String) -> Self {
        if value == SYNTHETIC_FILE_MARKER {
            Self::Synthetic
        } else {
            Self::Path(PathBuf::from(value))
        }
    }
}

impl From<PathBuf> for SourceFile {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for SourceFile {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl fmt::Display for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Synthetic => f.write_str(SYNTHETIC_FILE_MARKER),
        }
    }
}

/// Identifies a profiled function by where it is defined and what it is called.
///
/// Ordering is by file, then first line, then name. This is the order in which functions
/// appear in reports and in persisted stats.
///
/// The [`function_id!`](crate::function_id) macro captures the file and line of its call site,
/// which is the usual way to name a function from inside its own body.
///
/// # Examples
///
/// ```
/// use all_the_lines::{FunctionId, SourceFile};
///
/// let id = FunctionId::new("src/parse.rs", 42, "parse_header");
///
/// assert_eq!(id.name(), "parse_header");
/// assert_eq!(id.first_line(), 42);
/// assert_eq!(id.file(), &SourceFile::from("src/parse.rs"));
/// ```
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct FunctionId {
    file: SourceFile,
    first_line: u32,
    name: String,
}

impl FunctionId {
    /// Creates a function identity from its defining file, first line and display name.
    #[must_use]
    pub fn new(file: impl Into<SourceFile>, first_line: u32, name: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            first_line,
            name: name.into(),
        }
    }

    /// Creates the identity of a function that has no source file.
    #[must_use]
    pub fn synthetic(first_line: u32, name: impl Into<String>) -> Self {
        Self::new(SourceFile::Synthetic, first_line, name)
    }

    /// The file the function is defined in.
    #[must_use]
    pub fn file(&self) -> &SourceFile {
        &self.file
    }

    /// The line number the function's source block starts at.
    #[must_use]
    pub fn first_line(&self) -> u32 {
        self.first_line
    }

    /// The display name of the function.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}:{}", self.name, self.file, self.first_line)
    }
}

/// Creates a [`FunctionId`] for the given name, defined at the file and line of the macro call.
///
/// # Examples
///
/// ```
/// use all_the_lines::function_id;
///
/// let id = function_id!("checksum");
///
/// assert_eq!(id.name(), "checksum");
/// assert!(id.file().path().is_some());
/// ```
#[macro_export]
macro_rules! function_id {
    ($name:expr) => {
        $crate::FunctionId::new($crate::SourceFile::from(file!()), line!(), $name)
    };
}
