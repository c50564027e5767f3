//! # csvstream
//!
//! Streaming CSV reader with RFC 4180 quoting and constant memory usage.
//!
//! Characters are pulled from a caller-supplied source, split into fields by
//! an explicit tokenizer state machine, and grouped into records one at a
//! time. The reader never opens files itself; hand it anything implementing
//! [`std::io::Read`] or a `&str`.
//!
//! ## Quick Start
//!
//! ```
//! use csvstream::{CsvConfig, CsvReader};
//!
//! let data = "name,quote\nAlice,\"Say \"\"hi\"\"\"\nBob,\"multi\nline\"\n";
//! let mut reader = CsvReader::from_text(data, CsvConfig::default());
//!
//! let records = reader.read_all()?;
//! assert_eq!(records.len(), 3);
//! assert_eq!(&records[1][1], "Say \"hi\"");
//! assert_eq!(records[2].get(1), Some("multi\nline"));
//! assert_eq!(records[2].line(), 3);
//! # Ok::<(), csvstream::CsvError>(())
//! ```
//!
//! ## Lenient mode
//!
//! ```
//! use csvstream::{CsvConfig, CsvReader};
//!
//! let config = CsvConfig::builder().skip_malformed(true).build()?;
//! let mut reader = CsvReader::from_text("a,b\nbro\"ken,x\n1,2\n", config);
//!
//! let records = reader.read_all()?;
//! assert_eq!(records.len(), 2);
//! assert_eq!(reader.skipped(), 1);
//! # Ok::<(), csvstream::CsvError>(())
//! ```

pub mod config;
pub mod csv;
pub mod csv_reader;
pub mod error;
pub mod types;

pub use config::{CsvConfig, CsvConfigBuilder, Escape, Terminator};
pub use csv::{CharSource, ReaderSource, StrSource, Token, Tokenizer};
pub use csv_reader::{CsvReader, RecordIterator};
pub use error::{CsvError, MalformedReason, Result};
pub use types::{Field, Headers, Record};
