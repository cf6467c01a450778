// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Builder for primitive columns with optionality support.

use arrow::array::{ArrayBuilder, ArrayRef, PrimitiveBuilder};
use arrow::datatypes::ArrowPrimitiveType;
use std::sync::Arc;

/// Wraps an Arrow primitive builder, counting non-null appends and offering
/// "append only when non-zero" semantics for optional columns.
pub struct PrimitiveColumnBuilder<T: ArrowPrimitiveType> {
    inner: PrimitiveBuilder<T>,
    non_null: usize,
}

impl<T: ArrowPrimitiveType> Default for PrimitiveColumnBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ArrowPrimitiveType> PrimitiveColumnBuilder<T> {
    /// An empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: PrimitiveBuilder::new(),
            non_null: 0,
        }
    }

    /// Append a value.
    pub fn append_value(&mut self, value: T::Native) {
        self.inner.append_value(value);
        self.non_null += 1;
    }

    /// Append a value or a null.
    pub fn append_option(&mut self, value: Option<T::Native>) {
        match value {
            Some(value) => self.append_value(value),
            None => self.append_null(),
        }
    }

    /// Append a null.
    pub fn append_null(&mut self) {
        self.inner.append_null();
    }

    /// Number of rows appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether any non-null value was appended.
    #[must_use]
    pub fn has_values(&self) -> bool {
        self.non_null > 0
    }

    /// Materialize the column and reset the builder.
    pub fn finish(&mut self) -> ArrayRef {
        self.non_null = 0;
        Arc::new(self.inner.finish())
    }
}

impl<T> PrimitiveColumnBuilder<T>
where
    T: ArrowPrimitiveType,
    T::Native: Default + PartialEq,
{
    /// Append the value when it is non-zero, a null otherwise. Used for
    /// optional counters and flags where zero means "unset".
    pub fn append_non_zero(&mut self, value: T::Native) {
        if value == T::Native::default() {
            self.append_null();
        } else {
            self.append_value(value);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use arrow::array::Array;
    use arrow::datatypes::UInt32Type;

    #[test]
    fn test_non_zero_elision() {
        let mut builder = PrimitiveColumnBuilder::<UInt32Type>::new();
        builder.append_non_zero(0);
        builder.append_non_zero(7);
        assert!(builder.has_values());

        let array = builder.finish();
        assert_eq!(array.len(), 2);
        assert!(array.is_null(0));
        assert!(array.is_valid(1));
    }

    #[test]
    fn test_all_null_column_reports_no_values() {
        let mut builder = PrimitiveColumnBuilder::<UInt32Type>::new();
        builder.append_non_zero(0);
        builder.append_null();
        assert!(!builder.has_values());
        assert_eq!(builder.len(), 2);
    }

    #[test]
    fn test_finish_resets() {
        let mut builder = PrimitiveColumnBuilder::<UInt32Type>::new();
        builder.append_value(1);
        let _ = builder.finish();
        assert_eq!(builder.len(), 0);
        assert!(!builder.has_values());
    }
}
