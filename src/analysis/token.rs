//! Token spans produced by analyzers.

use serde::{Deserialize, Serialize};

/// Classification of a token's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TokenType {
    /// Alphabetic or mixed word.
    #[default]
    Word,
    /// Purely numeric word.
    Number,
    /// Untokenized value (keyword analysis).
    Keyword,
}

/// A token: a byte range inside the analyzer's words buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Token {
    pub offset: u32,
    pub length: u32,
    pub token_type: TokenType,
}

impl Token {
    pub fn new(offset: usize, length: usize, token_type: TokenType) -> Self {
        Token {
            offset: offset as u32,
            length: length as u32,
            token_type,
        }
    }

    /// Byte range of the token in the words buffer.
    pub fn range(&self) -> std::ops::Range<usize> {
        let start = self.offset as usize;
        start..start + self.length as usize
    }
}
