//! CSV character sources and tokenizing

mod source;
mod tokenizer;

pub use source::{CharSource, ReaderSource, StrSource};
pub use tokenizer::{Token, Tokenizer};
