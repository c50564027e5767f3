//! CSV tokenizer with RFC 4180 quoting
//!
//! The tokenizer is an explicit state machine over a [`CharSource`]. Each
//! call to [`Tokenizer::next_token`] consumes characters until one token is
//! complete; only the field currently being built is buffered.

use super::source::CharSource;
use crate::config::{CsvConfig, Escape, Terminator};
use crate::error::{CsvError, MalformedReason, Result};
use crate::types::Field;
use tracing::{debug, trace};

/// Unit produced by the tokenizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// One complete field
    Field(Field),
    /// The current record has no more fields
    EndOfRecord,
    /// Input is exhausted; returned again on every later call
    EndOfStream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    RecordStart,
    FieldStart,
    Unquoted,
    Quoted,
    /// Quote seen inside a quoted field: either an escaped quote or the close
    QuoteSeen,
    /// Whitespace after a closing quote (trim mode)
    AfterQuote,
    Escaped { quoted: bool },
    RecordEnd { at_eof: bool },
    /// A malformed token was reported; skip to the next terminator.
    /// `in_record` is set when the error happened outside quotes, so the
    /// skip can honour quoted fields later on the same record.
    Failed { in_record: bool },
    Finished,
}

/// Streaming CSV tokenizer
pub struct Tokenizer<S> {
    source: S,
    config: CsvConfig,
    state: State,
    buffer: String,
    quoted: bool,
    line: u64,
    record_line: u64,
    field_num: usize,
    end_reported: bool,
}

impl<S: CharSource> Tokenizer<S> {
    /// Create a tokenizer that owns `source` for one read pass
    pub fn new(source: S, config: CsvConfig) -> Self {
        Tokenizer {
            source,
            config,
            state: State::RecordStart,
            buffer: String::new(),
            quoted: false,
            line: 1,
            record_line: 1,
            field_num: 0,
            end_reported: false,
        }
    }

    pub fn config(&self) -> &CsvConfig {
        &self.config
    }

    /// Current 1-based line; advances on every terminator, quoted or not
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Line on which the current (or last) record started
    pub fn record_line(&self) -> u64 {
        self.record_line
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Close the underlying source
    pub fn close(&mut self) {
        self.source.close();
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// Produce the next token
    ///
    /// After [`Token::EndOfStream`] this keeps returning `EndOfStream`, even
    /// once the source is closed. Closing before that makes the next call
    /// fail with `StreamClosed`.
    /// After a malformed-field error the rest of the offending line is
    /// discarded and tokenizing resumes at the next record.
    pub fn next_token(&mut self) -> Result<Token> {
        loop {
            match self.state {
                State::Finished => {
                    // Input may be exhausted before the caller has seen it end
                    if !self.end_reported && self.source.is_closed() {
                        return Err(CsvError::closed());
                    }
                    self.end_reported = true;
                    return Ok(Token::EndOfStream);
                }
                State::RecordEnd { at_eof } => {
                    self.state = if at_eof {
                        State::Finished
                    } else {
                        State::RecordStart
                    };
                    self.field_num = 0;
                    return Ok(Token::EndOfRecord);
                }
                State::Failed { in_record } => {
                    self.resync(in_record)?;
                    continue;
                }
                _ => {}
            }

            let ch = self.source.next_char()?;
            if let Some(token) = self.step(ch)? {
                trace!(line = self.line, token = ?token, "token");
                return Ok(token);
            }
        }
    }

    fn step(&mut self, ch: Option<char>) -> Result<Option<Token>> {
        match self.state {
            State::RecordStart => self.record_start(ch),
            State::FieldStart => self.field_start(ch),
            State::Unquoted => self.unquoted(ch),
            State::Quoted => self.quoted_field(ch),
            State::QuoteSeen => self.quote_seen(ch),
            State::AfterQuote => self.after_quote(ch),
            State::Escaped { quoted } => self.escaped(ch, quoted),
            State::RecordEnd { .. } | State::Failed { .. } | State::Finished => Ok(None),
        }
    }

    fn record_start(&mut self, ch: Option<char>) -> Result<Option<Token>> {
        let c = match ch {
            None => {
                self.state = State::Finished;
                return Ok(None);
            }
            Some(c) => c,
        };
        if Some(c) == self.config.comment() {
            self.skip_line()?;
            return Ok(None);
        }
        self.record_line = self.line;
        self.field_num = 0;
        if self.is_terminator(c)? {
            // Blank line
            return Ok(Some(Token::EndOfRecord));
        }
        self.state = State::FieldStart;
        self.field_start(Some(c))
    }

    fn field_start(&mut self, ch: Option<char>) -> Result<Option<Token>> {
        let c = match ch {
            None => return Ok(Some(self.finish_field(State::RecordEnd { at_eof: true }))),
            Some(c) => c,
        };
        if c == self.config.delimiter() {
            return Ok(Some(self.finish_field(State::FieldStart)));
        }
        if c == self.config.quote() {
            self.quoted = true;
            self.state = State::Quoted;
            return Ok(None);
        }
        if self.is_terminator(c)? {
            return Ok(Some(self.finish_field(State::RecordEnd { at_eof: false })));
        }
        if self.config.trim() && c.is_whitespace() {
            return Ok(None);
        }
        if self.is_escape(c) {
            self.state = State::Escaped { quoted: false };
            return Ok(None);
        }
        self.buffer.push(c);
        self.state = State::Unquoted;
        Ok(None)
    }

    fn unquoted(&mut self, ch: Option<char>) -> Result<Option<Token>> {
        let c = match ch {
            None => return Ok(Some(self.finish_field(State::RecordEnd { at_eof: true }))),
            Some(c) => c,
        };
        if c == self.config.delimiter() {
            return Ok(Some(self.finish_field(State::FieldStart)));
        }
        if self.is_terminator(c)? {
            return Ok(Some(self.finish_field(State::RecordEnd { at_eof: false })));
        }
        if c == self.config.quote() && self.config.strict_quotes() {
            return Err(self.malformed(MalformedReason::UnexpectedQuote));
        }
        if self.is_escape(c) {
            self.state = State::Escaped { quoted: false };
            return Ok(None);
        }
        self.buffer.push(c);
        Ok(None)
    }

    fn quoted_field(&mut self, ch: Option<char>) -> Result<Option<Token>> {
        let c = match ch {
            None => return Err(self.unterminated()),
            Some(c) => c,
        };
        if c == self.config.quote() {
            self.state = State::QuoteSeen;
            return Ok(None);
        }
        if self.is_escape(c) {
            self.state = State::Escaped { quoted: true };
            return Ok(None);
        }
        self.push_literal(c);
        Ok(None)
    }

    fn quote_seen(&mut self, ch: Option<char>) -> Result<Option<Token>> {
        let c = match ch {
            None => return Ok(Some(self.finish_field(State::RecordEnd { at_eof: true }))),
            Some(c) => c,
        };
        if c == self.config.quote() && self.config.escape() == Escape::Doubled {
            self.buffer.push(c);
            self.state = State::Quoted;
            return Ok(None);
        }
        self.after_quote(Some(c))
    }

    fn after_quote(&mut self, ch: Option<char>) -> Result<Option<Token>> {
        let c = match ch {
            None => return Ok(Some(self.finish_field(State::RecordEnd { at_eof: true }))),
            Some(c) => c,
        };
        if c == self.config.delimiter() {
            return Ok(Some(self.finish_field(State::FieldStart)));
        }
        if self.is_terminator(c)? {
            return Ok(Some(self.finish_field(State::RecordEnd { at_eof: false })));
        }
        if self.config.trim() && c.is_whitespace() {
            self.state = State::AfterQuote;
            return Ok(None);
        }
        if self.config.strict_quotes() {
            return Err(self.malformed(MalformedReason::TrailingCharacters));
        }
        // Lenient: text after the closing quote joins the field
        self.buffer.push(c);
        self.state = State::Unquoted;
        Ok(None)
    }

    fn escaped(&mut self, ch: Option<char>, quoted: bool) -> Result<Option<Token>> {
        match ch {
            None if quoted => Err(self.unterminated()),
            None => {
                self.buffer.push('\\');
                Ok(Some(self.finish_field(State::RecordEnd { at_eof: true })))
            }
            Some(c) => {
                self.push_literal(c);
                self.state = if quoted {
                    State::Quoted
                } else {
                    State::Unquoted
                };
                Ok(None)
            }
        }
    }

    /// Push a character that is field content, counting embedded line breaks
    fn push_literal(&mut self, c: char) {
        if self.count_line_break(c) {
            debug!(
                line = self.line,
                field = self.field_num + 1,
                "quoted field contains a line break"
            );
        }
        self.buffer.push(c);
    }

    /// Advance the line counter if `c` breaks a line inside quotes
    fn count_line_break(&mut self, c: char) -> bool {
        let breaks_line = match self.config.terminator() {
            Terminator::Auto => c == '\n',
            Terminator::Any(t) => c == t,
        };
        if breaks_line {
            self.line += 1;
        }
        breaks_line
    }

    /// Consume a terminator starting with `c`, if it is one
    fn is_terminator(&mut self, c: char) -> Result<bool> {
        let matched = match self.config.terminator() {
            Terminator::Auto => match c {
                '\n' => true,
                '\r' if self.source.peek()? == Some('\n') => {
                    self.source.next_char()?;
                    true
                }
                _ => false,
            },
            Terminator::Any(t) => c == t,
        };
        if matched {
            self.line += 1;
        }
        Ok(matched)
    }

    fn is_escape(&self, c: char) -> bool {
        c == '\\' && self.config.escape() == Escape::Backslash
    }

    fn finish_field(&mut self, next: State) -> Token {
        let mut value = std::mem::take(&mut self.buffer);
        if self.config.trim() && !self.quoted {
            let end = value.trim_end().len();
            value.truncate(end);
        }
        let field = Field::new(value, self.quoted);
        self.quoted = false;
        self.field_num += 1;
        self.state = next;
        Token::Field(field)
    }

    fn malformed(&mut self, reason: MalformedReason) -> CsvError {
        let err = CsvError::Malformed {
            line: self.line,
            field: self.field_num + 1,
            reason,
        };
        debug!(line = self.line, field = self.field_num + 1, %reason, "malformed field");
        self.buffer.clear();
        self.quoted = false;
        self.field_num = 0;
        self.state = State::Failed {
            in_record: reason == MalformedReason::TrailingCharacters,
        };
        err
    }

    fn unterminated(&mut self) -> CsvError {
        let err = self.malformed(MalformedReason::UnterminatedQuote);
        self.state = State::Finished;
        err
    }

    /// Discard input up to and including the next terminator
    ///
    /// With `in_record` the rest of the record is still well quoted, so
    /// terminators inside later quoted fields do not end the skip. After a
    /// stray quote in an unquoted field quoting cannot be trusted and the
    /// skip stops at the first terminator.
    fn resync(&mut self, in_record: bool) -> Result<()> {
        debug!(line = self.line, in_record, "skipping to next record");
        if in_record {
            self.skip_record()
        } else {
            self.skip_line()
        }
    }

    fn skip_record(&mut self) -> Result<()> {
        let mut in_quotes = false;
        loop {
            let c = match self.source.next_char()? {
                None => {
                    self.state = State::Finished;
                    return Ok(());
                }
                Some(c) => c,
            };
            if c == self.config.quote() {
                in_quotes = !in_quotes;
            } else if in_quotes {
                if self.is_escape(c) {
                    if let Some(escaped) = self.source.next_char()? {
                        self.count_line_break(escaped);
                    }
                } else {
                    self.count_line_break(c);
                }
            } else if self.is_terminator(c)? {
                self.state = State::RecordStart;
                return Ok(());
            }
        }
    }

    fn skip_line(&mut self) -> Result<()> {
        loop {
            match self.source.next_char()? {
                None => {
                    self.state = State::Finished;
                    return Ok(());
                }
                Some(c) => {
                    if self.is_terminator(c)? {
                        self.state = State::RecordStart;
                        return Ok(());
                    }
                }
            }
        }
    }
}
