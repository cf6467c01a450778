// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Schema update requests.
//!
//! Dictionary-overflow and delta-contract violations detected during a batch
//! do not surface to the caller directly: the record builder collects them,
//! applies them to its schema state, and fails materialization with a
//! schema-not-up-to-date signal so the batch can be replayed against the
//! updated schema.

use std::fmt;

/// Width of a dictionary index, or plain encoding once dictionaries have
/// been abandoned for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DictIndex {
    /// 8-bit dictionary keys.
    #[default]
    U8,
    /// 16-bit dictionary keys.
    U16,
    /// No dictionary; values stored inline.
    Native,
}

impl DictIndex {
    /// The number of distinct values this index width may address, one slot
    /// reserved, bounded by the configured cardinality limit.
    #[must_use]
    pub fn capacity(&self, max_card: u32) -> usize {
        let width_cap: u32 = match self {
            DictIndex::U8 => u8::MAX as u32,
            DictIndex::U16 => u16::MAX as u32,
            DictIndex::Native => u32::MAX,
        };
        width_cap.min(max_card) as usize
    }

    /// The next state after an overflow at this width.
    #[must_use]
    pub fn widened(&self, max_card: u32) -> DictIndex {
        match self {
            DictIndex::U8 if max_card > u8::MAX as u32 => DictIndex::U16,
            _ => DictIndex::Native,
        }
    }
}

/// One schema change detected during a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaUpdate {
    /// Dotted path of the column the change applies to.
    pub path: String,
    /// The change.
    pub change: SchemaChange,
}

/// The kind of a [`SchemaUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaChange {
    /// The column's dictionary overflowed; re-emit with this index width.
    DictOverflow {
        /// The index width to use from the next materialization on.
        to: DictIndex,
    },
    /// The column violated its delta contract; re-emit without delta
    /// encoding.
    NoDelta,
}

impl fmt::Display for SchemaUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.change {
            SchemaChange::DictOverflow { to } => {
                write!(f, "{}: dictionary overflow -> {:?}", self.path, to)
            }
            SchemaChange::NoDelta => write!(f, "{}: delta exceeded -> plain", self.path),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_capacity_reserves_one_slot() {
        assert_eq!(DictIndex::U8.capacity(u32::MAX), 255);
        assert_eq!(DictIndex::U16.capacity(u32::MAX), 65535);
    }

    #[test]
    fn test_capacity_bounded_by_max_card() {
        assert_eq!(DictIndex::U16.capacity(1000), 1000);
        assert_eq!(DictIndex::U8.capacity(100), 100);
    }

    #[test]
    fn test_widening_respects_max_card() {
        assert_eq!(DictIndex::U8.widened(65535), DictIndex::U16);
        // a cardinality cap below u16 range skips the 16-bit stage
        assert_eq!(DictIndex::U8.widened(200), DictIndex::Native);
        assert_eq!(DictIndex::U16.widened(65535), DictIndex::Native);
    }
}
