//! Type definitions for CSV data

use indexmap::IndexMap;
use std::fmt;
use std::ops::Index;

/// A single decoded CSV cell
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Field {
    value: String,
    quoted: bool,
}

impl Field {
    /// Create a field from its decoded text
    pub fn new(value: impl Into<String>, quoted: bool) -> Self {
        Field {
            value: value.into(),
            quoted,
        }
    }

    /// Decoded text of the field
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Whether the field was enclosed in quotes in the source
    ///
    /// Distinguishes `""` (quoted, empty) from a missing value.
    pub fn is_quoted(&self) -> bool {
        self.quoted
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn into_string(self) -> String {
        self.value
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl AsRef<str> for Field {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

impl PartialEq<str> for Field {
    fn eq(&self, other: &str) -> bool {
        self.value == other
    }
}

impl PartialEq<&str> for Field {
    fn eq(&self, other: &&str) -> bool {
        self.value == *other
    }
}

/// One logical row: an ordered list of fields and the line it starts on
///
/// A record owns its fields; the reader keeps no reference to it once
/// yielded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    fields: Vec<Field>,
    line: u64,
}

impl Record {
    /// Create a record starting at 1-based `line`
    pub fn new(fields: Vec<Field>, line: u64) -> Self {
        Record { fields, line }
    }

    /// 1-based line number on which the record starts
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True for a blank line
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Text of the field at `index`
    pub fn get(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(Field::as_str)
    }

    /// Field at `index`, including its quoting flag
    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Iterate over field texts
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(Field::as_str)
    }

    /// Convert all fields to owned strings
    pub fn to_strings(&self) -> Vec<String> {
        self.iter().map(str::to_string).collect()
    }

    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }
}

impl Index<usize> for Record {
    type Output = str;

    fn index(&self, index: usize) -> &str {
        self.fields[index].as_str()
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Header row with name lookup
///
/// When a name appears more than once, lookups resolve to its first column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headers {
    names: Vec<String>,
    index: IndexMap<String, usize>,
}

impl Headers {
    pub(crate) fn from_record(record: Record) -> Self {
        let names: Vec<String> = record.into_fields().into_iter().map(Field::into_string).collect();
        let mut index = IndexMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            index.entry(name.clone()).or_insert(i);
        }
        Headers { names, index }
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Column name at `index`
    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Column index for `name`
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Look up a record's field by column name
    pub fn field<'r>(&self, record: &'r Record, name: &str) -> Option<&'r str> {
        self.index_of(name).and_then(|i| record.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.names
    }
}
