// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Adaptive dictionary builder for string columns.

use arrow::array::{ArrayBuilder, ArrayRef, StringBuilder, StringDictionaryBuilder};
use arrow::datatypes::{DataType, UInt8Type, UInt16Type};
use std::sync::Arc;

use crate::schema::dictionary_utf8;
use crate::schema::update::{DictIndex, SchemaChange, SchemaUpdate};

enum Repr {
    Dict8(StringDictionaryBuilder<UInt8Type>),
    Dict16(StringDictionaryBuilder<UInt16Type>),
    Native(StringBuilder),
}

/// A string column that starts dictionary-encoded and reports an overflow
/// update when its cardinality crosses the capacity of the current index
/// width. The overflowing batch is never materialized; the record builder
/// retries it against the widened schema.
pub struct AdaptiveStringBuilder {
    path: String,
    index: DictIndex,
    capacity: usize,
    max_card: u32,
    repr: Repr,
    overflowed: bool,
    non_null: usize,
}

impl AdaptiveStringBuilder {
    /// A builder for the column at `path`, starting at the given index width.
    #[must_use]
    pub fn new(path: impl Into<String>, index: DictIndex, max_card: u32) -> Self {
        let repr = match index {
            DictIndex::U8 => Repr::Dict8(StringDictionaryBuilder::new()),
            DictIndex::U16 => Repr::Dict16(StringDictionaryBuilder::new()),
            DictIndex::Native => Repr::Native(StringBuilder::new()),
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
            DictIndex::U8 => dictionary_utf8(DataType::UInt8),
            DictIndex::U16 => dictionary_utf8(DataType::UInt16),
            DictIndex::Native => DataType::Utf8,
        }
    }

    /// Append a value.
    pub fn append_str(&mut self, value: &str) {
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
            // The key space itself is exhausted; keep row counts aligned, the
            // batch is replayed after the schema update anyway.
            self.append_null_inner();
            self.overflowed = true;
        } else if key >= capacity {
            self.overflowed = true;
        }
    }

    /// Append a value or a null.
    pub fn append_option(&mut self, value: Option<&str>) {
        match value {
            Some(value) => self.append_str(value),
            None => self.append_null(),
        }
    }

    /// Append the value when non-empty, a null otherwise. Used for optional
    /// string columns where the empty string means "unset".
    pub fn append_non_empty(&mut self, value: &str) {
        if value.is_empty() {
            self.append_null();
        } else {
            self.append_str(value);
        }
    }

    /// Append a null.
    pub fn append_null(&mut self) {
        self.append_null_inner();
    }

    fn append_null_inner(&mut self) {
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
    fn test_dict8_overflow_detection() {
        let mut builder = AdaptiveStringBuilder::new("name", DictIndex::U8, u16::MAX as u32);
        for i in 0..255 {
            builder.append_str(&format!("value-{i}"));
        }
        assert!(builder.update().is_none());

        // the 256th distinct value crosses the reserved-slot boundary
        builder.append_str("value-255");
        let update = builder.update().expect("overflow expected");
        assert_eq!(
            update.change,
            SchemaChange::DictOverflow { to: DictIndex::U16 }
        );
    }

    #[test]
    fn test_repeated_values_do_not_overflow() {
        let mut builder = AdaptiveStringBuilder::new("name", DictIndex::U8, u16::MAX as u32);
        for _ in 0..1000 {
            builder.append_str("same");
        }
        assert!(builder.update().is_none());
        assert_eq!(builder.len(), 1000);
    }

    #[test]
    fn test_max_card_skips_u16_stage() {
        let mut builder = AdaptiveStringBuilder::new("name", DictIndex::U8, 10);
        for i in 0..=10 {
            builder.append_str(&format!("value-{i}"));
        }
        let update = builder.update().expect("overflow expected");
        assert_eq!(
            update.change,
            SchemaChange::DictOverflow {
                to: DictIndex::Native
            }
        );
    }

    #[test]
    fn test_native_never_overflows() {
        let mut builder = AdaptiveStringBuilder::new("name", DictIndex::Native, 10);
        for i in 0..100 {
            builder.append_str(&format!("value-{i}"));
        }
        assert!(builder.update().is_none());
        assert_eq!(builder.data_type(), DataType::Utf8);
    }

    #[test]
    fn test_non_empty_elision() {
        let mut builder = AdaptiveStringBuilder::new("unit", DictIndex::U8, u16::MAX as u32);
        builder.append_non_empty("");
        builder.append_non_empty("ms");
        assert_eq!(builder.len(), 2);
        assert!(builder.has_values());
    }
}
