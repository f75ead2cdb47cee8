//! Standard analyzer that provides good defaults for most use cases.
//!
//! Splits text on Unicode word boundaries (UAX #29) and lowercases every
//! word. Punctuation and whitespace segments are dropped.
//!
//! # Examples
//!
//! ```
//! use tessera::analysis::analyzer::AnalyzerBuffers;
//! use tessera::analysis::analyzer::standard::StandardAnalyzer;
//!
//! let mut buffers = AnalyzerBuffers::default();
//! let count = buffers.run(&StandardAnalyzer::new(), "Café RÉSUMÉ".as_bytes()).unwrap();
//!
//! assert_eq!(count, 2);
//! assert_eq!(buffers.token_bytes(0), "café".as_bytes());
//! assert_eq!(buffers.token_bytes(1), "résumé".as_bytes());
//! ```

use unicode_segmentation::UnicodeSegmentation;

use crate::analysis::analyzer::{AnalyzeStatus, Analyzer};
use crate::analysis::token::{Token, TokenType};
use crate::error::{Result, TesseraError};

/// Unicode word tokenizer followed by lowercasing.
#[derive(Debug, Clone, Default)]
pub struct StandardAnalyzer;

impl StandardAnalyzer {
    pub fn new() -> Self {
        StandardAnalyzer
    }
}

impl Analyzer for StandardAnalyzer {
    fn execute(
        &self,
        input: &[u8],
        words: &mut [u8],
        tokens: &mut [Token],
    ) -> Result<AnalyzeStatus> {
        let text = std::str::from_utf8(input)
            .map_err(|e| TesseraError::analysis(format!("standard analyzer expects UTF-8: {e}")))?;

        let mut words_len = 0;
        let mut token_count = 0;
        let mut lowered = String::new();

        for word in text.unicode_words() {
            lowered.clear();
            lowered.extend(word.chars().flat_map(char::to_lowercase));

            if token_count == tokens.len() || words_len + lowered.len() > words.len() {
                return Ok(AnalyzeStatus::BufferTooSmall);
            }

            words[words_len..words_len + lowered.len()].copy_from_slice(lowered.as_bytes());
            let token_type = if word.chars().all(char::is_numeric) {
                TokenType::Number
            } else {
                TokenType::Word
            };
            tokens[token_count] = Token::new(words_len, lowered.len(), token_type);
            words_len += lowered.len();
            token_count += 1;
        }

        Ok(AnalyzeStatus::Done {
            words_len,
            token_count,
        })
    }

    fn output_buffers_size(&self, input_len: usize) -> (usize, usize) {
        (input_len + input_len / 2 + 8, input_len / 2 + 1)
    }

    fn name(&self) -> &'static str {
        "standard"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyzer::AnalyzerBuffers;

    fn analyze(text: &str) -> Vec<String> {
        let mut buffers = AnalyzerBuffers::default();
        let count = buffers.run(&StandardAnalyzer::new(), text.as_bytes()).unwrap();
        (0..count)
            .map(|i| String::from_utf8(buffers.token_bytes(i).to_vec()).unwrap())
            .collect()
    }

    #[test]
    fn test_splits_and_lowercases() {
        assert_eq!(analyze("The Quick, brown FOX!"), ["the", "quick", "brown", "fox"]);
    }

    #[test]
    fn test_numbers_are_classified() {
        let mut buffers = AnalyzerBuffers::default();
        buffers.run(&StandardAnalyzer::new(), b"route 66").unwrap();
        assert_eq!(buffers.tokens()[1].token_type, TokenType::Number);
    }

    #[test]
    fn test_expanding_lowercase_fits() {
        // 'İ' lowercases to two chars occupying three bytes.
        let input = "İ".repeat(64);
        assert_eq!(analyze(&input).len(), 1);
    }

    #[test]
    fn test_rejects_invalid_utf8() {
        let mut buffers = AnalyzerBuffers::default();
        let err = buffers.run(&StandardAnalyzer::new(), &[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, TesseraError::Analysis(_)));
    }
}
