//! Error types for CSV reading

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, CsvError>;

/// Errors raised while configuring or reading CSV data
#[derive(Debug, Error)]
pub enum CsvError {
    /// Configuration rejected at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A record violates the CSV grammar or the field-count policy
    #[error("Malformed CSV (line {line}, field {field}): {reason}")]
    Malformed {
        /// 1-based line where the problem was detected
        line: u64,
        /// 1-based field number within the record
        field: usize,
        /// What went wrong
        reason: MalformedReason,
    },

    /// The character source was closed or failed with an I/O error
    #[error("Stream closed{}", display_cause(.source))]
    StreamClosed {
        /// Underlying I/O error, if the stream failed rather than being closed
        #[source]
        source: Option<io::Error>,
    },
}

impl CsvError {
    pub(crate) fn closed() -> Self {
        CsvError::StreamClosed { source: None }
    }

    pub(crate) fn io(err: io::Error) -> Self {
        CsvError::StreamClosed { source: Some(err) }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        CsvError::InvalidConfiguration(msg.into())
    }

    /// True for grammar and field-count errors, which lenient mode may skip
    pub fn is_malformed(&self) -> bool {
        matches!(self, CsvError::Malformed { .. })
    }

    /// True when no further records can be read from this source
    pub fn is_fatal(&self) -> bool {
        !self.is_malformed()
    }

    /// Line number attached to a malformed-record error
    pub fn line(&self) -> Option<u64> {
        match self {
            CsvError::Malformed { line, .. } => Some(*line),
            _ => None,
        }
    }
}

fn display_cause(source: &Option<io::Error>) -> String {
    match source {
        Some(err) => format!(": {}", err),
        None => String::new(),
    }
}

/// Reason attached to [`CsvError::Malformed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    /// End of input reached inside a quoted field
    UnterminatedQuote,
    /// Quote character inside an unquoted field
    UnexpectedQuote,
    /// Characters between a closing quote and the next delimiter
    TrailingCharacters,
    /// Record width differs from the header (or first record)
    FieldCount {
        /// Width of the header or first record
        expected: usize,
        /// Width of the offending record
        found: usize,
    },
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::UnterminatedQuote => write!(f, "unterminated quoted field"),
            MalformedReason::UnexpectedQuote => write!(
                f,
                "unescaped quotation mark or leading characters before quoted field"
            ),
            MalformedReason::TrailingCharacters => write!(
                f,
                "unescaped quotation mark or trailing characters after quoted field"
            ),
            MalformedReason::FieldCount { expected, found } => {
                write!(f, "expected {} fields, found {}", expected, found)
            }
        }
    }
}
