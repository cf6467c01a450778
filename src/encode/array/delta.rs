// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Delta builder for sorted u32 ID columns.

use arrow::array::{ArrayBuilder, ArrayRef, UInt32Builder};
use std::sync::Arc;

use crate::schema::update::{SchemaChange, SchemaUpdate};

/// Stores first-order differences of a non-decreasing u32 sequence. The
/// first value is stored as-is. IDs assigned after the sort step are
/// `0,1,…,N-1`, so every stored delta is 1 and the column compresses to
/// almost nothing.
///
/// A decreasing value or a delta above `max_delta` breaks the contract; the
/// violation is reported as a schema update that removes delta encoding on
/// the next materialization.
pub struct U32DeltaBuilder {
    path: String,
    inner: UInt32Builder,
    delta_encoding: bool,
    max_delta: u32,
    prev: Option<u32>,
    violated: bool,
}

impl U32DeltaBuilder {
    /// A delta builder with the given contract. `delta_encoding` false means
    /// the contract was already abandoned and raw values are stored.
    #[must_use]
    pub fn new(path: impl Into<String>, max_delta: u32, delta_encoding: bool) -> Self {
        Self {
            path: path.into(),
            inner: UInt32Builder::new(),
            delta_encoding,
            max_delta,
            prev: None,
            violated: false,
        }
    }

    /// Whether the column currently stores deltas.
    #[must_use]
    pub fn is_delta_encoded(&self) -> bool {
        self.delta_encoding
    }

    /// Append the next ID.
    pub fn append(&mut self, value: u32) {
        if !self.delta_encoding {
            self.inner.append_value(value);
            return;
        }
        match self.prev {
            None => self.inner.append_value(value),
            Some(prev) => {
                if value < prev || value - prev > self.max_delta {
                    self.violated = true;
                }
                self.inner.append_value(value.wrapping_sub(prev));
            }
        }
        self.prev = Some(value);
    }

    /// Number of rows appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// The pending schema update, when the delta contract was violated
    /// during this batch.
    #[must_use]
    pub fn update(&self) -> Option<SchemaUpdate> {
        self.violated.then(|| SchemaUpdate {
            path: self.path.clone(),
            change: SchemaChange::NoDelta,
        })
    }

    /// Materialize the column and reset the builder.
    pub fn finish(&mut self) -> ArrayRef {
        self.prev = None;
        Arc::new(self.inner.finish())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use arrow::array::UInt32Array;

    #[test]
    fn test_sorted_ids_store_unit_deltas() {
        let mut builder = U32DeltaBuilder::new("id", 1, true);
        for id in 0..5u32 {
            builder.append(id);
        }
        assert!(builder.update().is_none());

        let array = builder.finish();
        let array = array.as_any().downcast_ref::<UInt32Array>().unwrap();
        assert_eq!(array.values().as_ref(), &[0, 1, 1, 1, 1]);
    }

    #[test]
    fn test_violation_reports_update() {
        let mut builder = U32DeltaBuilder::new("id", 1, true);
        builder.append(0);
        builder.append(2);
        let update = builder.update().expect("violation expected");
        assert_eq!(update.change, SchemaChange::NoDelta);
    }

    #[test]
    fn test_decreasing_value_is_a_violation() {
        let mut builder = U32DeltaBuilder::new("id", 1, true);
        builder.append(3);
        builder.append(1);
        assert!(builder.update().is_some());
    }

    #[test]
    fn test_plain_mode_stores_raw_values() {
        let mut builder = U32DeltaBuilder::new("id", 1, false);
        builder.append(7);
        builder.append(3);
        assert!(builder.update().is_none());

        let array = builder.finish();
        let array = array.as_any().downcast_ref::<UInt32Array>().unwrap();
        assert_eq!(array.values().as_ref(), &[7, 3]);
    }
}
