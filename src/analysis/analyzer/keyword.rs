//! Keyword analyzer that treats the entire input as a single token.
//!
//! Suitable for identifiers, tags and codes that must match exactly.

use crate::analysis::analyzer::{AnalyzeStatus, Analyzer};
use crate::analysis::token::{Token, TokenType};
use crate::error::Result;

/// Emits the whole value, unchanged, as one token. Empty input yields no
/// tokens.
#[derive(Debug, Clone, Default)]
pub struct KeywordAnalyzer;

impl KeywordAnalyzer {
    pub fn new() -> Self {
        KeywordAnalyzer
    }
}

impl Analyzer for KeywordAnalyzer {
    fn execute(
        &self,
        input: &[u8],
        words: &mut [u8],
        tokens: &mut [Token],
    ) -> Result<AnalyzeStatus> {
        if input.is_empty() {
            return Ok(AnalyzeStatus::Done {
                words_len: 0,
                token_count: 0,
            });
        }
        if words.len() < input.len() || tokens.is_empty() {
            return Ok(AnalyzeStatus::BufferTooSmall);
        }

        words[..input.len()].copy_from_slice(input);
        tokens[0] = Token::new(0, input.len(), TokenType::Keyword);
        Ok(AnalyzeStatus::Done {
            words_len: input.len(),
            token_count: 1,
        })
    }

    fn output_buffers_size(&self, input_len: usize) -> (usize, usize) {
        (input_len, 1)
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyzer::AnalyzerBuffers;

    #[test]
    fn test_keyword_analyzer() {
        let mut buffers = AnalyzerBuffers::default();
        let count = buffers.run(&KeywordAnalyzer::new(), b"user-123 ABC").unwrap();

        assert_eq!(count, 1);
        assert_eq!(buffers.token_bytes(0), b"user-123 ABC");
        assert_eq!(buffers.tokens()[0].token_type, TokenType::Keyword);
    }

    #[test]
    fn test_empty_input_has_no_tokens() {
        let mut buffers = AnalyzerBuffers::default();
        assert_eq!(buffers.run(&KeywordAnalyzer::new(), b"").unwrap(), 0);
    }
}
