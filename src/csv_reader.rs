//! Record assembly on top of the CSV tokenizer

use crate::config::CsvConfig;
use crate::csv::{CharSource, ReaderSource, StrSource, Token, Tokenizer};
use crate::error::{CsvError, MalformedReason, Result};
use crate::types::{Headers, Record};
use std::io::Read;
use std::iter::FusedIterator;
use tracing::warn;

/// Streaming CSV reader
///
/// Pulls one record at a time from a caller-supplied source. Memory usage
/// is bounded by the largest record; the file is never loaded whole.
///
/// # Examples
///
/// ```
/// use csvstream::{CsvConfig, CsvReader};
///
/// let mut reader = CsvReader::from_text("a,b,c\n1,2,3\n", CsvConfig::default());
///
/// while let Some(record) = reader.next_record().unwrap() {
///     println!("line {}: {:?}", record.line(), record.to_strings());
/// }
/// ```
///
/// # With Headers
///
/// ```
/// use csvstream::{CsvConfig, CsvReader};
///
/// let config = CsvConfig::builder().has_header(true).build().unwrap();
/// let mut reader = CsvReader::from_reader("id,name\n1,Alice\n".as_bytes(), config);
///
/// for record in reader.records() {
///     let record = record.unwrap();
///     assert_eq!(record.get(1), Some("Alice"));
/// }
/// let headers = reader.headers().unwrap();
/// assert_eq!(headers.index_of("name"), Some(1));
/// ```
pub struct CsvReader<S> {
    tokenizer: Tokenizer<S>,
    headers: Option<Headers>,
    expected_fields: Option<usize>,
    records_read: u64,
    skipped: u64,
    finished: bool,
}

impl<R: Read> CsvReader<ReaderSource<R>> {
    /// Read from any byte stream (file, socket, buffer); bytes are decoded as UTF-8
    pub fn from_reader(reader: R, config: CsvConfig) -> Self {
        Self::with_source(ReaderSource::new(reader), config)
    }
}

impl<'a> CsvReader<StrSource<'a>> {
    /// Read from in-memory text
    pub fn from_text(text: &'a str, config: CsvConfig) -> Self {
        Self::with_source(StrSource::new(text), config)
    }
}

impl<S: CharSource> CsvReader<S> {
    /// Read from a custom character source
    pub fn with_source(source: S, config: CsvConfig) -> Self {
        CsvReader {
            tokenizer: Tokenizer::new(source, config),
            headers: None,
            expected_fields: None,
            records_read: 0,
            skipped: 0,
            finished: false,
        }
    }

    pub fn config(&self) -> &CsvConfig {
        self.tokenizer.config()
    }

    /// Header row, once it has been read
    ///
    /// Returns `None` until the first record has been pulled or when the
    /// configuration has no header row.
    pub fn headers(&self) -> Option<&Headers> {
        self.headers.as_ref()
    }

    /// Current 1-based line in the source
    pub fn line(&self) -> u64 {
        self.tokenizer.line()
    }

    /// Number of data records returned so far
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Number of malformed records skipped in lenient mode
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Close the underlying source
    ///
    /// Unless the end of the stream was already reached, the next call to
    /// [`next_record`](Self::next_record) fails with `StreamClosed`.
    pub fn close(&mut self) {
        self.tokenizer.close();
    }

    /// Give back the character source
    pub fn into_source(self) -> S {
        self.tokenizer.into_source()
    }

    /// Read the next record
    ///
    /// Returns `Ok(None)` at the end of the stream, and keeps returning it on
    /// later calls. A malformed record is returned as an error unless lenient
    /// mode is configured, in which case it is skipped and counted; either
    /// way reading can continue with the next record.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            if self.finished {
                return Ok(None);
            }
            let result = self.assemble().and_then(|record| match record {
                Some(record) => self.accept(record),
                None => {
                    self.finished = true;
                    Ok(None)
                }
            });

            match result {
                Ok(Some(record)) => {
                    self.records_read += 1;
                    return Ok(Some(record));
                }
                Ok(None) if self.finished => return Ok(None),
                Ok(None) => continue,
                Err(e) if e.is_malformed() && self.config().skip_malformed() => {
                    self.skipped += 1;
                    warn!(
                        line = e.line().unwrap_or_default(),
                        error = %e,
                        "Skipping record due to parsing error"
                    );
                }
                Err(e) => {
                    if e.is_malformed() {
                        warn!(
                            line = e.line().unwrap_or_default(),
                            error = %e,
                            "Stopping at record due to parsing error"
                        );
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Collect tokens up to the end of one record
    fn assemble(&mut self) -> Result<Option<Record>> {
        let mut fields = Vec::new();
        loop {
            match self.tokenizer.next_token()? {
                Token::Field(field) => fields.push(field),
                Token::EndOfRecord => {
                    return Ok(Some(Record::new(fields, self.tokenizer.record_line())));
                }
                Token::EndOfStream => {
                    // The tokenizer always closes a record before the stream ends
                    debug_assert!(fields.is_empty());
                    return Ok(None);
                }
            }
        }
    }

    /// Apply blank-line, header and field-count policies; `None` means skip
    fn accept(&mut self, record: Record) -> Result<Option<Record>> {
        // A whitespace-only line trims down to one empty unquoted field
        let record = match record.fields() {
            [only] if self.config().trim() && only.is_empty() && !only.is_quoted() => {
                Record::new(Vec::new(), record.line())
            }
            _ => record,
        };
        if record.is_empty() {
            return Ok(if self.config().skip_blank_lines() {
                None
            } else {
                Some(record)
            });
        }

        if self.config().has_header() && self.headers.is_none() {
            self.expected_fields = Some(record.len());
            self.headers = Some(Headers::from_record(record));
            return Ok(None);
        }

        if self.config().flexible() {
            return Ok(Some(record));
        }
        match self.expected_fields {
            None => {
                self.expected_fields = Some(record.len());
                Ok(Some(record))
            }
            Some(expected) if expected == record.len() => Ok(Some(record)),
            Some(expected) => Err(CsvError::Malformed {
                line: record.line(),
                // First missing or extra column
                field: expected.min(record.len()) + 1,
                reason: MalformedReason::FieldCount {
                    expected,
                    found: record.len(),
                },
            }),
        }
    }

    /// Iterate over the remaining records
    ///
    /// The iterator stops after yielding a fatal error such as
    /// `StreamClosed`; malformed-record errors do not end it.
    pub fn records(&mut self) -> RecordIterator<'_, S> {
        RecordIterator {
            reader: self,
            done: false,
        }
    }

    /// Read all remaining records
    ///
    /// Stops at the first error unless lenient mode is configured.
    pub fn read_all(&mut self) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record()? {
            records.push(record);
        }
        Ok(records)
    }
}

/// Iterator over CSV records
pub struct RecordIterator<'a, S> {
    reader: &'a mut CsvReader<S>,
    done: bool,
}

impl<S: CharSource> Iterator for RecordIterator<'_, S> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = e.is_fatal();
                Some(Err(e))
            }
        }
    }
}

impl<S: CharSource> FusedIterator for RecordIterator<'_, S> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Terminator;

    fn read(input: &str) -> Vec<Vec<String>> {
        read_with(input, CsvConfig::builder().flexible(true).build().unwrap())
    }

    fn read_with(input: &str, config: CsvConfig) -> Vec<Vec<String>> {
        CsvReader::from_text(input, config)
            .read_all()
            .unwrap()
            .iter()
            .map(Record::to_strings)
            .collect()
    }

    fn rows(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_two_records_with_lines() {
        let mut reader = CsvReader::from_text("a,b,c\n1,2,3\n", CsvConfig::default());
        let first = reader.next_record().unwrap().unwrap();
        assert_eq!(first.to_strings(), vec!["a", "b", "c"]);
        assert_eq!(first.line(), 1);
        let second = reader.next_record().unwrap().unwrap();
        assert_eq!(second.to_strings(), vec!["1", "2", "3"]);
        assert_eq!(second.line(), 2);
        assert!(reader.next_record().unwrap().is_none());
        assert_eq!(reader.records_read(), 2);
    }

    #[test]
    fn test_close_after_last_unterminated_record() {
        let mut reader = CsvReader::from_text("a,b", CsvConfig::default());
        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(record.to_strings(), vec!["a", "b"]);
        reader.close();
        let err = reader.next_record().unwrap_err();
        assert!(matches!(err, CsvError::StreamClosed { source: None }));
    }

    #[test]
    fn test_end_of_stream_is_idempotent() {
        let mut reader = CsvReader::from_text("a\n", CsvConfig::default());
        assert!(reader.next_record().unwrap().is_some());
        for _ in 0..3 {
            assert!(reader.next_record().unwrap().is_none());
        }
        // Closing after the end does not turn EndOfStream into an error
        reader.close();
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_delimiter_inside_quotes() {
        assert_eq!(read("\"a,b\",c\n"), rows(&[&["a,b", "c"]]));
    }

    #[test]
    fn test_doubled_quote() {
        assert_eq!(read("\"a\"\"b\",c\n"), rows(&[&["a\"b", "c"]]));
    }

    #[test]
    fn test_multiline_field_advances_line() {
        let mut reader = CsvReader::from_text("a,\"b\nc\",d\nx,y,z\n", CsvConfig::default());
        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(record.to_strings(), vec!["a", "b\nc", "d"]);
        assert_eq!(record.line(), 1);
        assert_eq!(reader.line(), 3);
        let next = reader.next_record().unwrap().unwrap();
        assert_eq!(next.line(), 3);
    }

    #[test]
    fn test_unterminated_is_error() {
        let mut reader = CsvReader::from_text("\"unterminated", CsvConfig::default());
        let err = reader.next_record().unwrap_err();
        assert!(matches!(
            err,
            CsvError::Malformed {
                reason: MalformedReason::UnterminatedQuote,
                ..
            }
        ));
        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_blank_lines() {
        assert_eq!(read(""), rows(&[]));
        assert_eq!(read("\n"), rows(&[&[]]));
        assert_eq!(read("\r\n"), rows(&[&[]]));
        assert_eq!(read("Cell 1\n"), rows(&[&["Cell 1"]]));
        assert_eq!(read("Cell 1\r\n"), rows(&[&["Cell 1"]]));
        assert_eq!(read("\nCell 1"), rows(&[&[], &["Cell 1"]]));
        assert_eq!(
            read("Cell 1\r\n\r\nCell 2"),
            rows(&[&["Cell 1"], &[], &["Cell 2"]])
        );

        let skip = CsvConfig::builder().skip_blank_lines(true).build().unwrap();
        assert_eq!(
            read_with("\nCell 1\n\n\nCell 2\n", skip),
            rows(&[&["Cell 1"], &["Cell 2"]])
        );
    }

    #[test]
    fn test_no_space_trimming_by_default() {
        assert_eq!(read("Cell 1, Cell 2"), rows(&[&["Cell 1", " Cell 2"]]));
        assert_eq!(read(" Cell 1,Cell 2 "), rows(&[&[" Cell 1", "Cell 2 "]]));
    }

    #[test]
    fn test_empty_cells() {
        assert_eq!(read(",Cell 2"), rows(&[&["", "Cell 2"]]));
        assert_eq!(read("Cell 1,"), rows(&[&["Cell 1", ""]]));
        assert_eq!(read("Cell 1,,Cell 3"), rows(&[&["Cell 1", "", "Cell 3"]]));
    }

    #[test]
    fn test_utf8_lookalikes_are_plain_text() {
        assert_eq!(read("x\u{042c}x"), rows(&[&["xЬx"]]));
        assert_eq!(read("x\u{040a}x"), rows(&[&["xЊx"]]));
        assert_eq!(
            read("\u{201c}Cell 1,Cell 2\u{201d}"),
            rows(&[&["\u{201c}Cell 1", "Cell 2\u{201d}"]])
        );
    }

    #[test]
    fn test_quote_escaping_variants() {
        assert_eq!(read("\"\"\" B\""), rows(&[&["\" B"]]));
        assert_eq!(read("\"A \"\"\""), rows(&[&["A \""]]));
        assert_eq!(read("\"\"\"\""), rows(&[&["\""]]));
        assert_eq!(read("\"\"\"\"\"\""), rows(&[&["\"\""]]));
        assert_eq!(read("\"\"\"Cell\"\"\""), rows(&[&["\"Cell\""]]));
        assert_eq!(
            read("\"Bob \"\"The Cheese\"\" Windsor\""),
            rows(&[&["Bob \"The Cheese\" Windsor"]])
        );
    }

    #[test]
    fn test_multiline_quoted_positions() {
        assert_eq!(read("\"A\nB\",C"), rows(&[&["A\nB", "C"]]));
        assert_eq!(read("X,\"A\r\nB\""), rows(&[&["X", "A\r\nB"]]));
        assert_eq!(read("X,\"A\nB\",C"), rows(&[&["X", "A\nB", "C"]]));
        assert_eq!(read("\"\r\nB\""), rows(&[&["\r\nB"]]));
        assert_eq!(read("\"A\r\n\""), rows(&[&["A\r\n"]]));
    }

    #[test]
    fn test_field_count_enforced() {
        let mut reader = CsvReader::from_text("a,b\n1,2\n3\n4,5\n", CsvConfig::default());
        assert!(reader.next_record().unwrap().is_some());
        assert!(reader.next_record().unwrap().is_some());
        let err = reader.next_record().unwrap_err();
        assert!(matches!(
            err,
            CsvError::Malformed {
                line: 3,
                field: 2,
                reason: MalformedReason::FieldCount {
                    expected: 2,
                    found: 1
                },
            }
        ));
        // Caller may carry on past the bad record
        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(record.to_strings(), vec!["4", "5"]);
    }

    #[test]
    fn test_field_count_points_at_extra_column() {
        let mut reader = CsvReader::from_text("a,b
1,2,3
", CsvConfig::default());
        assert!(reader.next_record().unwrap().is_some());
        let err = reader.next_record().unwrap_err();
        assert!(matches!(
            err,
            CsvError::Malformed {
                line: 2,
                field: 3,
                reason: MalformedReason::FieldCount {
                    expected: 2,
                    found: 3
                },
            }
        ));
    }

    #[test]
    fn test_trimmed_whitespace_line_is_blank() {
        let skip = CsvConfig::builder()
            .trim(true)
            .skip_blank_lines(true)
            .build()
            .unwrap();
        assert_eq!(
            read_with("a,b\n   \n1,2\n", skip),
            rows(&[&["a", "b"], &["1", "2"]])
        );

        let keep = CsvConfig::builder().trim(true).build().unwrap();
        assert_eq!(
            read_with("a,b\n \t \n1,2\n", keep),
            rows(&[&["a", "b"], &[], &["1", "2"]])
        );

        // A quoted empty field is data, not a blank line
        let quoted = CsvConfig::builder().trim(true).flexible(true).build().unwrap();
        assert_eq!(read_with(" \"\" \n", quoted), rows(&[&[""]]));
    }

    #[test]
    fn test_blank_records_exempt_from_field_count() {
        let records = read_with("a,b\n\n1,2\n", CsvConfig::default());
        assert_eq!(records, rows(&[&["a", "b"], &[], &["1", "2"]]));
    }

    #[test]
    fn test_lenient_mode_skips_and_counts() {
        let config = CsvConfig::builder().skip_malformed(true).build().unwrap();
        let mut reader = CsvReader::from_text(
            "a,b\n1,2\nbad\"quote,x\n3\n\"ok\",4\n\"open,5\n",
            config,
        );
        let records = reader.read_all().unwrap();
        let values: Vec<Vec<String>> = records.iter().map(Record::to_strings).collect();
        assert_eq!(values, rows(&[&["a", "b"], &["1", "2"], &["ok", "4"]]));
        assert_eq!(records[2].line(), 5);
        assert_eq!(reader.skipped(), 3);
    }

    #[test]
    fn test_lenient_skip_after_trailing_characters_respects_quotes() {
        let config = CsvConfig::builder()
            .skip_malformed(true)
            .flexible(true)
            .build()
            .unwrap();
        let mut reader = CsvReader::from_text("\"a\"x,\"b\nc\"\nd\n", config);
        let records = reader.read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].to_strings(), vec!["d"]);
        assert_eq!(records[0].line(), 3);
        assert_eq!(reader.skipped(), 1);
    }

    #[test]
    fn test_headers() {
        let config = CsvConfig::builder().has_header(true).build().unwrap();
        let mut reader = CsvReader::from_text("ID,Name\n1,Alice\n2,Bob\n", config);
        assert!(reader.headers().is_none());

        let records: Vec<Record> = reader.records().collect::<Result<_>>().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].to_strings(), vec!["1", "Alice"]);
        assert_eq!(records[0].line(), 2);

        let headers = reader.headers().unwrap();
        assert_eq!(headers.as_slice(), &["ID".to_string(), "Name".to_string()]);
        assert_eq!(headers.field(&records[1], "Name"), Some("Bob"));
    }

    #[test]
    fn test_header_sets_field_count() {
        let config = CsvConfig::builder().has_header(true).build().unwrap();
        let mut reader = CsvReader::from_text("a,b,c\n1,2\n", config);
        assert!(reader.next_record().unwrap_err().is_malformed());
    }

    #[test]
    fn test_close_mid_stream() {
        let mut reader = CsvReader::from_reader("a,b\nc,d\n".as_bytes(), CsvConfig::default());
        assert!(reader.next_record().unwrap().is_some());
        reader.close();
        let err = reader.next_record().unwrap_err();
        assert!(matches!(err, CsvError::StreamClosed { .. }));
        assert!(reader.next_record().is_err());
    }

    #[test]
    fn test_iterator_fuses_on_fatal_error() {
        let mut reader = CsvReader::from_text("a\nb\n", CsvConfig::default());
        reader.close();
        let results: Vec<_> = reader.records().collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[test]
    fn test_iterator_stays_done_after_end() {
        fn assert_fused<I: FusedIterator>(_: &I) {}

        let mut reader = CsvReader::from_text("a\n", CsvConfig::default());
        let mut records = reader.records();
        assert_fused(&records);
        assert!(records.next().unwrap().is_ok());
        assert!(records.next().is_none());
        assert!(records.next().is_none());
        assert!(records.next().is_none());
    }

    #[test]
    fn test_iterator_continues_after_malformed() {
        let mut reader = CsvReader::from_text("a\"\nb\n", CsvConfig::default());
        let results: Vec<_> = reader.records().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_err());
        assert_eq!(results[1].as_ref().unwrap().get(0), Some("b"));
    }

    #[test]
    fn test_fixed_terminator_keeps_cr() {
        let config = CsvConfig::builder()
            .terminator(Terminator::Any('\n'))
            .build()
            .unwrap();
        assert_eq!(read_with("a,b\r\nc,d\n", config), rows(&[&["a", "b\r"], &["c", "d"]]));
    }

    #[test]
    fn test_quoted_flag_survives_assembly() {
        let mut reader = CsvReader::from_text("\"\",\n", CsvConfig::default());
        let record = reader.next_record().unwrap().unwrap();
        assert!(record.field(0).unwrap().is_quoted());
        assert!(!record.field(1).unwrap().is_quoted());
        assert_eq!(record.get(0), Some(""));
    }
}
