//! Configuration for the percolation engine.
//!
//! [`PercolatorConfig`] bundles the knobs for the two default collaborators
//! that ship with the crate: the analyzer used to tokenize document fields
//! and `match` query text, and the dynamic document mapper. The structs are
//! cheap to clone and serde-friendly so they can be loaded from external
//! configuration formats.
//!
//! ```rust
//! use percolate::PercolatorConfig;
//!
//! let cfg = PercolatorConfig::default();
//! cfg.validate().expect("default config is valid");
//! ```
use serde::{Deserialize, Serialize};

use crate::error::PercolateError;

/// Tokenization knobs for the standard analyzer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalyzerConfig {
    /// Lowercase every token. Disable for case-sensitive matching.
    #[serde(default = "AnalyzerConfig::default_lowercase")]
    pub lowercase: bool,
    /// Tokens longer than this many characters are dropped.
    #[serde(default = "AnalyzerConfig::default_max_token_len")]
    pub max_token_len: usize,
    /// A single field producing more tokens than this fails analysis and
    /// aborts the percolate call.
    #[serde(default = "AnalyzerConfig::default_max_token_count")]
    pub max_token_count: usize,
}

impl AnalyzerConfig {
    pub(crate) fn default_lowercase() -> bool {
        true
    }

    pub(crate) fn default_max_token_len() -> usize {
        255
    }

    pub(crate) fn default_max_token_count() -> usize {
        10_000
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            lowercase: Self::default_lowercase(),
            max_token_len: Self::default_max_token_len(),
            max_token_count: Self::default_max_token_count(),
        }
    }
}

/// Knobs for the dynamic document mapper.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MapperConfig {
    /// When `true`, previously unseen types and fields are auto-created and
    /// reported via the response's schema-change flag. When `false`, unseen
    /// types or fields are rejected.
    #[serde(default = "MapperConfig::default_dynamic")]
    pub dynamic: bool,
    /// Upper bound on the number of flattened fields in one document.
    #[serde(default = "MapperConfig::default_max_fields_per_document")]
    pub max_fields_per_document: usize,
}

impl MapperConfig {
    pub(crate) fn default_dynamic() -> bool {
        true
    }

    pub(crate) fn default_max_fields_per_document() -> usize {
        1_000
    }
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            dynamic: Self::default_dynamic(),
            max_fields_per_document: Self::default_max_fields_per_document(),
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PercolatorConfig {
    /// Analyzer settings shared by field indexing and `match` query parsing.
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    /// Document mapper settings.
    #[serde(default)]
    pub mapper: MapperConfig,
}

impl PercolatorConfig {
    /// Validate the configuration before constructing an engine.
    pub fn validate(&self) -> Result<(), PercolateError> {
        if self.analyzer.max_token_len == 0 {
            return Err(PercolateError::InvalidConfig(
                "analyzer.max_token_len must be greater than zero".into(),
            ));
        }
        if self.analyzer.max_token_count == 0 {
            return Err(PercolateError::InvalidConfig(
                "analyzer.max_token_count must be greater than zero".into(),
            ));
        }
        if self.mapper.max_fields_per_document == 0 {
            return Err(PercolateError::InvalidConfig(
                "mapper.max_fields_per_document must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = PercolatorConfig::default();
        assert!(cfg.validate().is_ok());
        assert!(cfg.analyzer.lowercase);
        assert!(cfg.mapper.dynamic);
    }

    #[test]
    fn zero_token_budget_rejected() {
        let cfg = PercolatorConfig {
            analyzer: AnalyzerConfig {
                max_token_count: 0,
                ..AnalyzerConfig::default()
            },
            ..PercolatorConfig::default()
        };
        let err = cfg.validate().expect_err("config should be invalid");
        match err {
            PercolateError::InvalidConfig(msg) => assert!(msg.contains("max_token_count")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn config_round_trips_through_serde() {
        let cfg = PercolatorConfig::default();
        let json = serde_json::to_string(&cfg).expect("serialize");
        let back: PercolatorConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(cfg, back);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let cfg: PercolatorConfig = serde_json::from_str("{}").expect("deserialize");
        assert_eq!(cfg, PercolatorConfig::default());
    }
}
