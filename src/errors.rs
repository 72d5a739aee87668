use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;

#[derive(Debug)]
pub enum ComparatorError {
    /// A block or row whose geometry cannot be indexed safely
    Format {
        path: String,
        line: Option<u64>,
        reason: String,
    },

    /// Declared sequence lengths or pair counts disagree with the parsed data
    ExpectationMismatch {
        what: String,
        declared: String,
        actual: String,
    },

    /// The reports being merged came from incompatible comparator configurations
    ShapeMismatch(String),

    /// Missing or inconsistent command line configuration
    Configuration(String),

    /// Error variant when we couldn't read from or write to a file
    IoError(io::Error),

    /// Error variant when a report could not be (de)serialized
    SerializationError { source: serde_json::Error },
}

impl Error for ComparatorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match *self {
            Self::IoError(ref source) => Some(source),
            Self::SerializationError { ref source } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for ComparatorError {
    fn from(value: io::Error) -> Self {
        Self::IoError(value)
    }
}

impl From<serde_json::Error> for ComparatorError {
    fn from(value: serde_json::Error) -> Self {
        Self::SerializationError { source: value }
    }
}

impl Display for ComparatorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Format { ref path, line, ref reason } => match line {
                Some(line) => write!(f, "{path}:{line}: {reason}"),
                None => write!(f, "{path}: {reason}"),
            },
            Self::ExpectationMismatch { ref what, ref declared, ref actual } =>
                write!(f, "declared {what} ({declared}) does not match the parsed data ({actual})"),
            Self::ShapeMismatch(ref reason) =>
                write!(f, "reports cannot be merged: {reason}"),
            Self::Configuration(ref reason) =>
                write!(f, "{reason}"),
            Self::IoError(ref err) =>
                err.fmt(f),
            Self::SerializationError { ref source } =>
                write!(f, "could not read or write the report: {source}"),
        }
    }
}
