//! Error types for archive storage operations.

use std::path::PathBuf;
use thiserror::Error;

/// Broad failure category, used by callers to decide whether to recover.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad magic, truncated tables, offsets past end-of-file.
    StructuralCorruption,
    /// Missing child, property or name.
    NotFound,
    /// Sample index or time lookup outside the valid range.
    OutOfRange,
    /// DataType or schema mismatch.
    TypeMismatch,
    /// Writing into something that is already frozen.
    OrderViolation,
    /// Caller passed an unusable argument (duplicate name, bad buffer size).
    InvalidArgument,
    /// Underlying I/O failure.
    Io,
}

/// Main error type for archive operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Invalid magic bytes at start of file
    #[error("Invalid archive: expected Ogawa magic bytes")]
    InvalidMagic,

    /// Unsupported container version
    #[error("Unsupported container version: {0}")]
    UnsupportedVersion(u16),

    /// Archive was never finalized by its writer
    #[error("Archive was not finalized (frozen flag not set)")]
    NotFrozen,

    /// Read past end of file
    #[error("Unexpected end of file at position {0}")]
    UnexpectedEof(u64),

    /// Invalid data structure in file
    #[error("Invalid file structure: {0}")]
    InvalidStructure(String),

    /// Property not found by name
    #[error("Property not found: {0}")]
    PropertyNotFound(String),

    /// Object not found by name or path
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    /// Type mismatch when reading data
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Schema title, base type or version mismatch
    #[error("Schema mismatch: expected {expected}, got {actual}")]
    SchemaMismatch { expected: String, actual: String },

    /// Sample index out of bounds
    #[error("Sample index {index} out of bounds (count: {count})")]
    SampleOutOfBounds { index: usize, count: usize },

    /// Child index out of bounds
    #[error("Child index {index} out of bounds (count: {count})")]
    ChildOutOfBounds { index: usize, count: usize },

    /// Time sampling index not present in the archive table
    #[error("Time sampling {index} out of bounds (count: {count})")]
    TimeSamplingOutOfBounds { index: usize, count: usize },

    /// Floor/ceil/near lookup on a property with no samples
    #[error("Time lookup is invalid for an empty sampling")]
    EmptyTimeSampling,

    /// Caller buffer does not match the sample size
    #[error("Buffer size {actual} does not match sample size {expected}")]
    BufferSize { expected: usize, actual: usize },

    /// Name already used by a sibling
    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    /// Invalid metadata format
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Write attempted on a frozen group, object, property or archive
    #[error("Cannot write to frozen {0}")]
    Frozen(String),

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }

    /// Create a frozen-write error naming what was frozen.
    pub fn frozen(what: impl Into<String>) -> Self {
        Self::Frozen(what.into())
    }

    /// Create a type mismatch error from two displayable descriptions.
    pub fn mismatch(expected: impl ToString, actual: impl ToString) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Failure category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidMagic
            | Self::UnsupportedVersion(_)
            | Self::NotFrozen
            | Self::UnexpectedEof(_)
            | Self::InvalidStructure(_)
            | Self::InvalidMetadata(_)
            | Self::Utf8(_) => ErrorKind::StructuralCorruption,
            Self::FileNotFound(_) | Self::PropertyNotFound(_) | Self::ObjectNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::SampleOutOfBounds { .. }
            | Self::ChildOutOfBounds { .. }
            | Self::TimeSamplingOutOfBounds { .. }
            | Self::EmptyTimeSampling => ErrorKind::OutOfRange,
            Self::TypeMismatch { .. } | Self::SchemaMismatch { .. } => ErrorKind::TypeMismatch,
            Self::Frozen(_) => ErrorKind::OrderViolation,
            Self::BufferSize { .. } | Self::DuplicateName(_) | Self::Other(_) => {
                ErrorKind::InvalidArgument
            }
            Self::MmapFailed(_) | Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Corruption and ordering errors are never recovered locally.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::StructuralCorruption | ErrorKind::OrderViolation
        )
    }
}

/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::InvalidMagic;
        assert!(e.to_string().contains("magic"));

        let e = Error::SampleOutOfBounds { index: 5, count: 3 };
        assert!(e.to_string().contains('5'));
        assert!(e.to_string().contains('3'));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(Error::UnexpectedEof(10).kind(), ErrorKind::StructuralCorruption);
        assert_eq!(Error::ObjectNotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(Error::EmptyTimeSampling.kind(), ErrorKind::OutOfRange);
        assert_eq!(Error::mismatch("a", "b").kind(), ErrorKind::TypeMismatch);
        assert_eq!(Error::frozen("group").kind(), ErrorKind::OrderViolation);

        assert!(Error::InvalidMagic.is_fatal());
        assert!(Error::frozen("property").is_fatal());
        assert!(!Error::PropertyNotFound("p".into()).is_fatal());
    }
}
