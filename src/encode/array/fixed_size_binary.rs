// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Adaptive dictionary builder for fixed-size binary columns.
//!
//! Arrow has no stock dictionary builder for fixed-size binary values, so
//! this one interns values itself: a key builder per index width plus a
//! values builder, assembled into a `DictionaryArray` at finish time. Used
//! for the span-id and trace-id exemplar columns.

use ahash::RandomState;
use arrow::array::{
    ArrayRef, DictionaryArray, FixedSizeBinaryBuilder, UInt8Builder, UInt16Builder,
};
use arrow::datatypes::{DataType, UInt8Type, UInt16Type};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::schema::update::{DictIndex, SchemaChange, SchemaUpdate};

/// An interning dictionary builder over fixed-size binary values.
pub struct FixedSizeBinaryDictBuilder {
    path: String,
    byte_width: i32,
    index: DictIndex,
    capacity: usize,
    max_card: u32,
    interned: HashMap<Vec<u8>, usize, RandomState>,
    keys8: UInt8Builder,
    keys16: UInt16Builder,
    values: FixedSizeBinaryBuilder,
    overflowed: bool,
    non_null: usize,
    len: usize,
}

impl FixedSizeBinaryDictBuilder {
    /// A builder for `byte_width`-sized values at the given index width.
    #[must_use]
    pub fn new(path: impl Into<String>, byte_width: i32, index: DictIndex, max_card: u32) -> Self {
        Self {
            path: path.into(),
            byte_width,
            index,
            capacity: index.capacity(max_card),
            max_card,
            interned: HashMap::default(),
            keys8: UInt8Builder::new(),
            keys16: UInt16Builder::new(),
            values: FixedSizeBinaryBuilder::new(byte_width),
            overflowed: false,
            non_null: 0,
            len: 0,
        }
    }

    /// The Arrow data type of the materialized column.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        let value = DataType::FixedSizeBinary(self.byte_width);
        match self.index {
            DictIndex::U8 => DataType::Dictionary(Box::new(DataType::UInt8), Box::new(value)),
            DictIndex::U16 => DataType::Dictionary(Box::new(DataType::UInt16), Box::new(value)),
            DictIndex::Native => value,
        }
    }

    /// Append a value of exactly `byte_width` bytes.
    pub fn append(&mut self, value: &[u8]) -> Result<()> {
        self.len += 1;
        self.non_null += 1;
        if self.index == DictIndex::Native {
            return self
                .values
                .append_value(value)
                .map_err(|e| self.build_error(e));
        }

        let next = self.interned.len();
        let key = *self.interned.entry(value.to_vec()).or_insert(next);
        if key == next {
            // first sighting, store the dictionary value
            self.values
                .append_value(value)
                .map_err(|e| self.build_error(e))?;
            if next >= self.capacity {
                self.overflowed = true;
            }
        }
        match self.index {
            DictIndex::U8 => self.keys8.append_value(key.min(u8::MAX as usize) as u8),
            DictIndex::U16 => self.keys16.append_value(key.min(u16::MAX as usize) as u16),
            DictIndex::Native => {}
        }
        Ok(())
    }

    /// Append a null.
    pub fn append_null(&mut self) {
        self.len += 1;
        match self.index {
            DictIndex::U8 => self.keys8.append_null(),
            DictIndex::U16 => self.keys16.append_null(),
            DictIndex::Native => self.values.append_null(),
        }
    }

    /// Number of rows appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
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
    pub fn finish(&mut self) -> Result<ArrayRef> {
        self.interned.clear();
        self.non_null = 0;
        self.len = 0;
        let values: ArrayRef = Arc::new(self.values.finish());
        match self.index {
            DictIndex::U8 => {
                let keys = self.keys8.finish();
                let array = DictionaryArray::<UInt8Type>::try_new(keys, values)
                    .map_err(|e| self.build_error(e))?;
                Ok(Arc::new(array))
            }
            DictIndex::U16 => {
                let keys = self.keys16.finish();
                let array = DictionaryArray::<UInt16Type>::try_new(keys, values)
                    .map_err(|e| self.build_error(e))?;
                Ok(Arc::new(array))
            }
            DictIndex::Native => Ok(values),
        }
    }

    fn build_error(&self, source: arrow::error::ArrowError) -> Error {
        Error::BuildArray {
            name: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use arrow::array::Array;

    #[test]
    fn test_interning_reuses_keys() {
        let mut builder =
            FixedSizeBinaryDictBuilder::new("span_id", 8, DictIndex::U8, u16::MAX as u32);
        builder.append(&[1u8; 8]).unwrap();
        builder.append(&[2u8; 8]).unwrap();
        builder.append(&[1u8; 8]).unwrap();
        builder.append_null();

        let array = builder.finish().unwrap();
        assert_eq!(array.len(), 4);
        assert!(array.is_null(3));
        let dict = array
            .as_any()
            .downcast_ref::<DictionaryArray<UInt8Type>>()
            .unwrap();
        assert_eq!(dict.values().len(), 2);
    }

    #[test]
    fn test_overflow_detection() {
        let mut builder = FixedSizeBinaryDictBuilder::new("trace_id", 8, DictIndex::U8, 4);
        for i in 0u64..5 {
            builder.append(&i.to_be_bytes()).unwrap();
        }
        let update = builder.update().expect("overflow expected");
        assert_eq!(
            update.change,
            SchemaChange::DictOverflow {
                to: DictIndex::Native
            }
        );
    }
}
