// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Encoder configuration.

use serde::{Deserialize, Serialize};

/// Default upper bound on dictionary cardinality. Beyond this the column
/// degrades to plain encoding instead of widening the index type again.
pub const DEFAULT_DICTIONARY_MAX_CARD: u32 = u16::MAX as u32;

/// Settings recognized by the metrics encoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// When true, the optimizer orders metrics by name (ascending, byte-wise)
    /// within each scope before encoding. Improves dictionary and
    /// run-length behavior on the name columns at the cost of a sort.
    pub sort_metrics: bool,

    /// When true, the optimizer records batch-shape distributions that can be
    /// read back from [`crate::stats::BatchStats`].
    pub stats: bool,

    /// Dictionary encoding settings shared by all string and binary columns.
    pub dictionary: DictionaryConfig,
}

/// Dictionary encoding settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DictionaryConfig {
    /// Upper bound on the number of distinct values a dictionary column may
    /// hold. A column whose cardinality crosses this bound is re-emitted with
    /// plain encoding on the next schema revision.
    pub max_card: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sort_metrics: false,
            stats: false,
            dictionary: DictionaryConfig::default(),
        }
    }
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            max_card: DEFAULT_DICTIONARY_MAX_CARD,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.sort_metrics);
        assert!(!config.stats);
        assert_eq!(config.dictionary.max_card, 65535);
    }
}
