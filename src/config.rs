//! Reader configuration
//!
//! [`CsvConfig`] is an immutable value validated when it is built. Every
//! reader receives its own copy; there is no global default instance.

use crate::error::{CsvError, Result};

/// How a quote character is escaped inside a quoted field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Escape {
    /// RFC 4180: `""` inside a quoted field is one literal quote
    #[default]
    Doubled,
    /// `\x` yields a literal `x`, inside and outside quotes
    Backslash,
}

/// Record terminator recognized outside quoted fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Terminator {
    /// Accept both `\n` and `\r\n`; neither is kept in field content
    #[default]
    Auto,
    /// A single fixed terminator character
    Any(char),
}

impl Terminator {
    /// Whether `ch` can end a line under this terminator mode
    pub fn is_line_char(&self, ch: char) -> bool {
        match self {
            Terminator::Auto => ch == '\n' || ch == '\r',
            Terminator::Any(t) => ch == *t || ch == '\n' || ch == '\r',
        }
    }
}

const BACKSLASH: char = '\\';

/// Validated CSV reader configuration
///
/// # Examples
///
/// ```
/// use csvstream::config::{CsvConfig, Terminator};
///
/// let config = CsvConfig::builder()
///     .delimiter(';')
///     .terminator(Terminator::Any('\n'))
///     .trim(true)
///     .build()
///     .unwrap();
///
/// assert_eq!(config.delimiter(), ';');
/// assert!(config.trim());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "CsvConfigBuilder")
)]
pub struct CsvConfig {
    delimiter: char,
    quote: char,
    escape: Escape,
    terminator: Terminator,
    comment: Option<char>,
    skip_blank_lines: bool,
    trim: bool,
    strict_quotes: bool,
    flexible: bool,
    skip_malformed: bool,
    has_header: bool,
}

impl Default for CsvConfig {
    fn default() -> Self {
        CsvConfig {
            delimiter: ',',
            quote: '"',
            escape: Escape::Doubled,
            terminator: Terminator::Auto,
            comment: None,
            skip_blank_lines: false,
            trim: false,
            strict_quotes: true,
            flexible: false,
            skip_malformed: false,
            has_header: false,
        }
    }
}

impl CsvConfig {
    /// Start a builder from the RFC 4180 defaults
    pub fn builder() -> CsvConfigBuilder {
        CsvConfigBuilder::default()
    }

    /// Field delimiter (default `,`)
    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Quote character (default `"`)
    pub fn quote(&self) -> char {
        self.quote
    }

    /// Escape mode inside quoted fields
    pub fn escape(&self) -> Escape {
        self.escape
    }

    /// Record terminator mode
    pub fn terminator(&self) -> Terminator {
        self.terminator
    }

    /// Comment character; records starting with it are skipped
    pub fn comment(&self) -> Option<char> {
        self.comment
    }

    /// Whether lines with no content are dropped instead of yielding empty records
    pub fn skip_blank_lines(&self) -> bool {
        self.skip_blank_lines
    }

    /// Whether whitespace around unquoted fields is trimmed
    pub fn trim(&self) -> bool {
        self.trim
    }

    /// Whether stray quotes are errors (true) or literal text (false)
    pub fn strict_quotes(&self) -> bool {
        self.strict_quotes
    }

    /// Whether records may differ in width from the header
    pub fn flexible(&self) -> bool {
        self.flexible
    }

    /// Lenient mode: malformed records are skipped and counted
    pub fn skip_malformed(&self) -> bool {
        self.skip_malformed
    }

    /// Whether the first record is a header row
    pub fn has_header(&self) -> bool {
        self.has_header
    }

    fn validate(&self) -> Result<()> {
        if self.delimiter == self.quote {
            return Err(CsvError::config(format!(
                "delimiter and quote character are both {:?}",
                self.delimiter
            )));
        }
        for (name, ch) in [("delimiter", self.delimiter), ("quote character", self.quote)] {
            if self.terminator.is_line_char(ch) {
                return Err(CsvError::config(format!(
                    "{} {:?} is a line terminator character",
                    name, ch
                )));
            }
            if self.escape == Escape::Backslash && ch == BACKSLASH {
                return Err(CsvError::config(format!(
                    "{} cannot be the backslash escape character",
                    name
                )));
            }
        }
        if let Some(comment) = self.comment {
            if comment == self.delimiter
                || comment == self.quote
                || self.terminator.is_line_char(comment)
            {
                return Err(CsvError::config(format!(
                    "comment character {:?} collides with delimiter, quote or terminator",
                    comment
                )));
            }
        }
        Ok(())
    }
}

/// Builder for [`CsvConfig`]
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct CsvConfigBuilder {
    delimiter: char,
    quote: char,
    escape: Escape,
    terminator: Terminator,
    comment: Option<char>,
    skip_blank_lines: bool,
    trim: bool,
    strict_quotes: bool,
    flexible: bool,
    skip_malformed: bool,
    has_header: bool,
}

impl Default for CsvConfigBuilder {
    fn default() -> Self {
        let d = CsvConfig::default();
        CsvConfigBuilder {
            delimiter: d.delimiter,
            quote: d.quote,
            escape: d.escape,
            terminator: d.terminator,
            comment: d.comment,
            skip_blank_lines: d.skip_blank_lines,
            trim: d.trim,
            strict_quotes: d.strict_quotes,
            flexible: d.flexible,
            skip_malformed: d.skip_malformed,
            has_header: d.has_header,
        }
    }
}

impl CsvConfigBuilder {
    /// Set field delimiter
    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set quote character
    pub fn quote(mut self, quote: char) -> Self {
        self.quote = quote;
        self
    }

    /// Set escape mode
    pub fn escape(mut self, escape: Escape) -> Self {
        self.escape = escape;
        self
    }

    /// Set terminator mode
    pub fn terminator(mut self, terminator: Terminator) -> Self {
        self.terminator = terminator;
        self
    }

    /// Treat records starting with `comment` as comments
    pub fn comment(mut self, comment: Option<char>) -> Self {
        self.comment = comment;
        self
    }

    pub fn skip_blank_lines(mut self, skip: bool) -> Self {
        self.skip_blank_lines = skip;
        self
    }

    pub fn trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    pub fn strict_quotes(mut self, strict: bool) -> Self {
        self.strict_quotes = strict;
        self
    }

    pub fn flexible(mut self, flexible: bool) -> Self {
        self.flexible = flexible;
        self
    }

    /// Lenient mode: skip malformed records instead of failing
    pub fn skip_malformed(mut self, skip: bool) -> Self {
        self.skip_malformed = skip;
        self
    }

    /// Indicate that the first row contains headers
    ///
    /// When set to `true`, the first record is stored and accessible via
    /// `CsvReader::headers()`; it is not yielded as a data record.
    pub fn has_header(mut self, has: bool) -> Self {
        self.has_header = has;
        self
    }

    /// Validate and freeze the configuration
    pub fn build(self) -> Result<CsvConfig> {
        let config = CsvConfig {
            delimiter: self.delimiter,
            quote: self.quote,
            escape: self.escape,
            terminator: self.terminator,
            comment: self.comment,
            skip_blank_lines: self.skip_blank_lines,
            trim: self.trim,
            strict_quotes: self.strict_quotes,
            flexible: self.flexible,
            skip_malformed: self.skip_malformed,
            has_header: self.has_header,
        };
        config.validate()?;
        Ok(config)
    }
}

impl TryFrom<CsvConfigBuilder> for CsvConfig {
    type Error = CsvError;

    fn try_from(builder: CsvConfigBuilder) -> Result<Self> {
        builder.build()
    }
}
