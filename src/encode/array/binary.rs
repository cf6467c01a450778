// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Adaptive dictionary builder for binary columns.

use arrow::array::{ArrayBuilder, ArrayRef, BinaryBuilder, BinaryDictionaryBuilder};
use arrow::datatypes::{DataType, UInt8Type, UInt16Type};
use std::sync::Arc;

use crate::schema::dictionary_binary;
use crate::schema::update::{DictIndex, SchemaChange, SchemaUpdate};

enum Repr {
    Dict8(BinaryDictionaryBuilder<UInt8Type>),
    Dict16(BinaryDictionaryBuilder<UInt16Type>),
    Native(BinaryBuilder),
}

/// A binary column that starts dictionary-encoded and reports an overflow
/// update when its cardinality crosses the capacity of the current index
/// width. Counterpart of [`super::AdaptiveStringBuilder`] for byte values.
pub struct AdaptiveBinaryBuilder {
    path: String,
    index: DictIndex,
    capacity: usize,
    max_card: u32,
    repr: Repr,
    overflowed: bool,
    non_null: usize,
}

impl AdaptiveBinaryBuilder {
    /// A builder for the column at `path`, starting at the given index width.
    #[must_use]
    pub fn new(path: impl Into<String>, index: DictIndex, max_card: u32) -> Self {
        let repr = match index {
            DictIndex::U8 => Repr::Dict8(BinaryDictionaryBuilder::new()),
            DictIndex::U16 => Repr::Dict16(BinaryDictionaryBuilder::new()),
            DictIndex::Native => Repr::Native(BinaryBuilder::new()),
        };
        Self {
            path: path.into(),
            index,
            capacity: index.capacity(max_card),
            max_card,
            repr,
            overflowed: false,
            non_null: 0,
        }
    }

    /// The Arrow data type of the materialized column.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self.index {
            DictIndex::U8 => dictionary_binary(DataType::UInt8),
            DictIndex::U16 => dictionary_binary(DataType::UInt16),
            DictIndex::Native => DataType::Binary,
        }
    }

    /// Append a value.
    pub fn append_slice(&mut self, value: &[u8]) {
        self.non_null += 1;
        let capacity = self.capacity;
        let (key, failed) = match &mut self.repr {
            Repr::Dict8(builder) => match builder.append(value) {
                Ok(key) => (key as usize, false),
                Err(_) => (0, true),
            },
            Repr::Dict16(builder) => match builder.append(value) {
                Ok(key) => (key as usize, false),
                Err(_) => (0, true),
            },
            Repr::Native(builder) => {
                builder.append_value(value);
                return;
            }
        };
        if failed {
            self.append_null();
            self.overflowed = true;
        } else if key >= capacity {
            self.overflowed = true;
        }
    }

    /// Append the value when non-empty, a null otherwise.
    pub fn append_non_empty(&mut self, value: &[u8]) {
        if value.is_empty() {
            self.append_null();
        } else {
            self.append_slice(value);
        }
    }

    /// Append a null.
    pub fn append_null(&mut self) {
        match &mut self.repr {
            Repr::Dict8(builder) => builder.append_null(),
            Repr::Dict16(builder) => builder.append_null(),
            Repr::Native(builder) => builder.append_null(),
        }
    }

    /// Number of rows appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Dict8(builder) => builder.len(),
            Repr::Dict16(builder) => builder.len(),
            Repr::Native(builder) => builder.len(),
        }
    }

    /// Whether any non-null value was appended.
    #[must_use]
    pub fn has_values(&self) -> bool {
        self.non_null > 0
    }

    /// The pending schema update, when the dictionary overflowed during this
    /// batch.
    #[must_use]
    pub fn update(&self) -> Option<SchemaUpdate> {
        self.overflowed.then(|| SchemaUpdate {
            path: self.path.clone(),
            change: SchemaChange::DictOverflow {
                to: self.index.widened(self.max_card),
            },
        })
    }

    /// Materialize the column and reset the builder.
    pub fn finish(&mut self) -> ArrayRef {
        self.non_null = 0;
        match &mut self.repr {
            Repr::Dict8(builder) => Arc::new(builder.finish()),
            Repr::Dict16(builder) => Arc::new(builder.finish()),
            Repr::Native(builder) => Arc::new(builder.finish()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_overflow_detection() {
        let mut builder = AdaptiveBinaryBuilder::new("bytes", DictIndex::U8, u16::MAX as u32);
        for i in 0u32..=255 {
            builder.append_slice(&i.to_be_bytes());
        }
        let update = builder.update().expect("overflow expected");
        assert_eq!(
            update.change,
            SchemaChange::DictOverflow { to: DictIndex::U16 }
        );
    }

    #[test]
    fn test_empty_slice_elision() {
        let mut builder = AdaptiveBinaryBuilder::new("bytes", DictIndex::U8, u16::MAX as u32);
        builder.append_non_empty(b"");
        builder.append_non_empty(b"x");
        assert_eq!(builder.len(), 2);
        assert!(builder.has_values());
    }
}
