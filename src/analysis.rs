//! Field analysis: turning text into token streams.
//!
//! The [`Analyzer`] trait is the boundary the engine depends on; the
//! [`StandardAnalyzer`] that ships with the crate segments on Unicode word
//! boundaries and optionally lowercases, which is enough for the default
//! query DSL. Hosts with their own analysis chain implement the trait.
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::config::AnalyzerConfig;
use crate::error::AnalysisError;

/// A single term emitted by analysis, with its ordinal position in the
/// field. Positions feed the ephemeral index's postings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The (possibly lowercased) term text.
    pub term: String,
    /// Zero-based position of the token within its field.
    pub position: u32,
}

impl Token {
    /// Build a token from a term and position.
    pub fn new(term: impl Into<String>, position: u32) -> Self {
        Self {
            term: term.into(),
            position,
        }
    }
}

/// Tokenizes field text into a reusable token stream.
///
/// Implementations must be deterministic for a given input: percolation
/// correctness relies on query-time and index-time analysis agreeing.
pub trait Analyzer: Send + Sync {
    /// Analyze `text` as the content of `field`.
    fn analyze(&self, field: &str, text: &str) -> Result<Vec<Token>, AnalysisError>;
}

/// Unicode word-boundary analyzer with optional lowercasing.
#[derive(Debug, Clone)]
pub struct StandardAnalyzer {
    cfg: AnalyzerConfig,
}

impl StandardAnalyzer {
    /// Build an analyzer from explicit settings.
    pub fn new(cfg: AnalyzerConfig) -> Self {
        Self { cfg }
    }
}

impl Default for StandardAnalyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}

impl Analyzer for StandardAnalyzer {
    fn analyze(&self, field: &str, text: &str) -> Result<Vec<Token>, AnalysisError> {
        let mut tokens = Vec::new();
        let mut position = 0u32;
        for word in text.unicode_words() {
            // Oversized tokens are dropped, not truncated, so query-time and
            // index-time analysis stay symmetric.
            if word.chars().count() > self.cfg.max_token_len {
                continue;
            }
            if tokens.len() >= self.cfg.max_token_count {
                return Err(AnalysisError::TokenLimitExceeded {
                    field: field.to_string(),
                    limit: self.cfg.max_token_count,
                });
            }
            let term = if self.cfg.lowercase {
                word.to_lowercase()
            } else {
                word.to_string()
            };
            tokens.push(Token::new(term, position));
            position += 1;
        }
        Ok(tokens)
    }
}
