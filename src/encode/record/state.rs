// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Per-record adaptive schema state.

use ahash::RandomState;
use std::collections::{HashMap, HashSet};

use crate::schema::update::{DictIndex, SchemaChange, SchemaUpdate};

/// The evolving part of one record's schema: dictionary index widths and
/// abandoned delta contracts, keyed by column path.
///
/// The state persists across batches. A batch that overflows a dictionary is
/// replayed against the widened width, and later batches keep using it, so a
/// given input encoded twice produces no second schema-not-up-to-date signal.
pub struct SchemaState {
    dict: HashMap<String, DictIndex, RandomState>,
    no_delta: HashSet<String, RandomState>,
    max_card: u32,
}

impl SchemaState {
    /// A fresh state with every column at its declared encoding.
    #[must_use]
    pub fn new(max_card: u32) -> Self {
        Self {
            dict: HashMap::default(),
            no_delta: HashSet::default(),
            max_card,
        }
    }

    /// The configured dictionary cardinality bound.
    #[must_use]
    pub fn max_card(&self) -> u32 {
        self.max_card
    }

    /// Current index width for the column at `path`, starting at `declared`.
    #[must_use]
    pub fn dict_index(&self, path: &str, declared: DictIndex) -> DictIndex {
        self.dict.get(path).copied().unwrap_or(declared)
    }

    /// Whether the column at `path` still honors its delta contract.
    #[must_use]
    pub fn delta_enabled(&self, path: &str) -> bool {
        !self.no_delta.contains(path)
    }

    /// Fold a batch's updates into the state and return the affected paths.
    pub fn apply(&mut self, updates: &[SchemaUpdate]) -> Vec<String> {
        let mut fields = Vec::with_capacity(updates.len());
        for update in updates {
            match update.change {
                SchemaChange::DictOverflow { to } => {
                    let _ = self.dict.insert(update.path.clone(), to);
                }
                SchemaChange::NoDelta => {
                    let _ = self.no_delta.insert(update.path.clone());
                }
            }
            fields.push(update.path.clone());
        }
        fields
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_updates_are_sticky() {
        let mut state = SchemaState::new(65535);
        assert_eq!(state.dict_index("name", DictIndex::U8), DictIndex::U8);

        let fields = state.apply(&[SchemaUpdate {
            path: "name".to_owned(),
            change: SchemaChange::DictOverflow { to: DictIndex::U16 },
        }]);
        assert_eq!(fields, vec!["name".to_owned()]);
        assert_eq!(state.dict_index("name", DictIndex::U8), DictIndex::U16);
    }

    #[test]
    fn test_delta_contract_abandonment() {
        let mut state = SchemaState::new(65535);
        assert!(state.delta_enabled("id"));
        let _ = state.apply(&[SchemaUpdate {
            path: "id".to_owned(),
            change: SchemaChange::NoDelta,
        }]);
        assert!(!state.delta_enabled("id"));
    }
}
