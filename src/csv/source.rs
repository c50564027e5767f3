//! Character sources feeding the tokenizer
//!
//! A source hands out one `char` at a time with a single character of
//! lookahead. `Ok(None)` marks the end of input. Once closed, every read
//! fails with [`CsvError::StreamClosed`].

use crate::error::{CsvError, Result};
use std::io::{self, BufRead, BufReader, Read};
use std::iter::Peekable;
use std::str::Chars;

/// Pull-based stream of decoded characters
pub trait CharSource {
    /// Look at the next character without consuming it
    fn peek(&mut self) -> Result<Option<char>>;

    /// Consume the next character
    fn next_char(&mut self) -> Result<Option<char>>;

    /// Close the source; subsequent reads fail
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

impl<S: CharSource + ?Sized> CharSource for Box<S> {
    fn peek(&mut self) -> Result<Option<char>> {
        (**self).peek()
    }

    fn next_char(&mut self) -> Result<Option<char>> {
        (**self).next_char()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}

/// In-memory text source
pub struct StrSource<'a> {
    chars: Peekable<Chars<'a>>,
    closed: bool,
}

impl<'a> StrSource<'a> {
    pub fn new(text: &'a str) -> Self {
        StrSource {
            chars: text.chars().peekable(),
            closed: false,
        }
    }
}

impl CharSource for StrSource<'_> {
    fn peek(&mut self) -> Result<Option<char>> {
        if self.closed {
            return Err(CsvError::closed());
        }
        Ok(self.chars.peek().copied())
    }

    fn next_char(&mut self) -> Result<Option<char>> {
        if self.closed {
            return Err(CsvError::closed());
        }
        Ok(self.chars.next())
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// UTF-8 decoding source over any byte reader
///
/// Bytes are pulled through a `BufReader`. Invalid or truncated UTF-8
/// sequences decode to U+FFFD, the same way `String::from_utf8_lossy` does.
/// An I/O error closes the source.
pub struct ReaderSource<R> {
    inner: BufReader<R>,
    peeked: Option<Option<char>>,
    closed: bool,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        ReaderSource {
            inner: BufReader::new(reader),
            peeked: None,
            closed: false,
        }
    }

    pub fn with_capacity(capacity: usize, reader: R) -> Self {
        ReaderSource {
            inner: BufReader::with_capacity(capacity, reader),
            peeked: None,
            closed: false,
        }
    }

    /// Unwrap the underlying reader, discarding buffered bytes
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }

    fn peek_byte(&mut self) -> Result<Option<u8>> {
        loop {
            match self.inner.fill_buf() {
                Ok(buf) => return Ok(buf.first().copied()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.closed = true;
                    return Err(CsvError::io(e));
                }
            }
        }
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        let byte = self.peek_byte()?;
        if byte.is_some() {
            self.inner.consume(1);
        }
        Ok(byte)
    }

    fn decode(&mut self) -> Result<Option<char>> {
        let lead = match self.read_byte()? {
            Some(b) => b,
            None => return Ok(None),
        };
        if lead < 0x80 {
            return Ok(Some(lead as char));
        }
        let width = match lead {
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => return Ok(Some(char::REPLACEMENT_CHARACTER)),
        };

        let mut buf = [lead, 0, 0, 0];
        for slot in buf.iter_mut().take(width).skip(1) {
            match self.peek_byte()? {
                Some(b @ 0x80..=0xBF) => {
                    self.inner.consume(1);
                    *slot = b;
                }
                // Leave the offending byte for the next call
                _ => return Ok(Some(char::REPLACEMENT_CHARACTER)),
            }
        }

        Ok(Some(
            std::str::from_utf8(&buf[..width])
                .ok()
                .and_then(|s| s.chars().next())
                .unwrap_or(char::REPLACEMENT_CHARACTER),
        ))
    }
}

impl<R: Read> CharSource for ReaderSource<R> {
    fn peek(&mut self) -> Result<Option<char>> {
        if self.closed {
            return Err(CsvError::closed());
        }
        if let Some(ch) = self.peeked {
            return Ok(ch);
        }
        let ch = self.decode()?;
        self.peeked = Some(ch);
        Ok(ch)
    }

    fn next_char(&mut self) -> Result<Option<char>> {
        if self.closed {
            return Err(CsvError::closed());
        }
        match self.peeked.take() {
            Some(ch) => Ok(ch),
            None => self.decode(),
        }
    }

    fn close(&mut self) {
        self.closed = true;
        self.peeked = None;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain<S: CharSource>(source: &mut S) -> String {
        let mut out = String::new();
        while let Some(ch) = source.next_char().unwrap() {
            out.push(ch);
        }
        out
    }

    #[test]
    fn test_str_source_peek() {
        let mut source = StrSource::new("ab");
        assert_eq!(source.peek().unwrap(), Some('a'));
        assert_eq!(source.peek().unwrap(), Some('a'));
        assert_eq!(source.next_char().unwrap(), Some('a'));
        assert_eq!(source.next_char().unwrap(), Some('b'));
        assert_eq!(source.next_char().unwrap(), None);
        assert_eq!(source.peek().unwrap(), None);
    }

    #[test]
    fn test_reader_source_decodes_utf8() {
        let text = "aꜬbꜢd\u{10322}e∛f,Юнікод";
        let mut source = ReaderSource::new(text.as_bytes());
        assert_eq!(drain(&mut source), text);
    }

    #[test]
    fn test_reader_source_small_buffer() {
        // Multi-byte characters split across buffer refills
        let text = "Юнікод∛\u{10322}";
        let mut source = ReaderSource::with_capacity(1, text.as_bytes());
        assert_eq!(drain(&mut source), text);
    }

    #[test]
    fn test_reader_source_invalid_utf8() {
        let bytes: &[u8] = &[b'a', 0xFF, b'b', 0xE2, 0x88, b'c', 0xC0, 0x80];
        let mut source = ReaderSource::new(bytes);
        assert_eq!(drain(&mut source), "a\u{FFFD}b\u{FFFD}c\u{FFFD}\u{FFFD}");
    }

    #[test]
    fn test_close_fails_reads() {
        let mut source = ReaderSource::new("abc".as_bytes());
        assert_eq!(source.peek().unwrap(), Some('a'));
        source.close();
        assert!(source.is_closed());
        assert!(matches!(
            source.next_char(),
            Err(CsvError::StreamClosed { source: None })
        ));
        assert!(source.peek().is_err());
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        }
    }

    #[test]
    fn test_io_error_closes_source() {
        let mut source = ReaderSource::new(FailingReader);
        let err = source.next_char().unwrap_err();
        assert!(matches!(err, CsvError::StreamClosed { source: Some(_) }));
        assert!(source.is_closed());
        assert!(matches!(
            source.next_char(),
            Err(CsvError::StreamClosed { source: None })
        ));
    }
}
