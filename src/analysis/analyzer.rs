//! Analyzer trait and the reusable buffers it writes into.

use std::fmt::Debug;

use crate::analysis::token::Token;
use crate::error::{Result, TesseraError};

pub mod keyword;
pub mod standard;

/// Outcome of one [`Analyzer::execute`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzeStatus {
    /// Analysis finished; `words_len` bytes and `token_count` tokens written.
    Done { words_len: usize, token_count: usize },
    /// The supplied buffers cannot hold the output; grow them and retry.
    BufferTooSmall,
}

/// Turns a field value into token spans.
///
/// Implementations write normalized token bytes into `words` and one
/// [`Token`] per emitted token into `tokens`. They must not write past the
/// slices they are given; when the output does not fit they return
/// [`AnalyzeStatus::BufferTooSmall`].
pub trait Analyzer: Send + Sync + Debug {
    fn execute(&self, input: &[u8], words: &mut [u8], tokens: &mut [Token])
    -> Result<AnalyzeStatus>;

    /// Buffer sizes (words bytes, token slots) sufficient for most inputs of
    /// `input_len` bytes.
    fn output_buffers_size(&self, input_len: usize) -> (usize, usize);

    /// Name of this analyzer.
    fn name(&self) -> &'static str;
}

const MAX_ANALYZE_ATTEMPTS: usize = 8;

/// Words and token buffers shared across analyzer runs. Grown on demand,
/// never shrunk.
#[derive(Debug, Default)]
pub struct AnalyzerBuffers {
    words: Vec<u8>,
    tokens: Vec<Token>,
    words_len: usize,
    token_count: usize,
}

impl AnalyzerBuffers {
    pub fn with_capacity(words: usize, tokens: usize) -> Self {
        AnalyzerBuffers {
            words: vec![0; words],
            tokens: vec![Token::default(); tokens],
            words_len: 0,
            token_count: 0,
        }
    }

    /// Analyze `input`, returning the number of tokens produced.
    pub fn run(&mut self, analyzer: &dyn Analyzer, input: &[u8]) -> Result<usize> {
        let (words_hint, tokens_hint) = analyzer.output_buffers_size(input.len());
        self.grow(words_hint, tokens_hint);

        for _ in 0..MAX_ANALYZE_ATTEMPTS {
            match analyzer.execute(input, &mut self.words, &mut self.tokens)? {
                AnalyzeStatus::Done {
                    words_len,
                    token_count,
                } => {
                    self.words_len = words_len;
                    self.token_count = token_count;
                    return Ok(token_count);
                }
                AnalyzeStatus::BufferTooSmall => {
                    let words = (self.words.len() * 2).max(16);
                    let tokens = (self.tokens.len() * 2).max(4);
                    self.grow(words, tokens);
                }
            }
        }

        Err(TesseraError::analysis(format!(
            "analyzer '{}' kept reporting small buffers for a {} byte input",
            analyzer.name(),
            input.len()
        )))
    }

    fn grow(&mut self, words: usize, tokens: usize) {
        if self.words.len() < words {
            self.words.resize(words, 0);
        }
        if self.tokens.len() < tokens {
            self.tokens.resize(tokens, Token::default());
        }
    }

    pub fn token_count(&self) -> usize {
        self.token_count
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens[..self.token_count]
    }

    /// Bytes of the `index`-th token of the last run.
    pub fn token_bytes(&self, index: usize) -> &[u8] {
        &self.words[..self.words_len][self.tokens[index].range()]
    }

    pub fn words_capacity(&self) -> usize {
        self.words.len()
    }

    pub fn tokens_capacity(&self) -> usize {
        self.tokens.len()
    }
}
