// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Builder for boolean columns with optionality support.

use arrow::array::{ArrayBuilder, ArrayRef, BooleanBuilder};
use std::sync::Arc;

/// Wraps an Arrow boolean builder, counting non-null appends and offering
/// "append only when true" semantics for optional columns.
#[derive(Default)]
pub struct BooleanColumnBuilder {
    inner: BooleanBuilder,
    non_null: usize,
}

impl BooleanColumnBuilder {
    /// An empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value.
    pub fn append_value(&mut self, value: bool) {
        self.inner.append_value(value);
        self.non_null += 1;
    }

    /// Append a value or a null.
    pub fn append_option(&mut self, value: Option<bool>) {
        match value {
            Some(value) => self.append_value(value),
            None => self.append_null(),
        }
    }

    /// Append the value when true, a null otherwise.
    pub fn append_non_false(&mut self, value: bool) {
        if value {
            self.append_value(true);
        } else {
            self.append_null();
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

#[cfg(test)]
mod test {
    use super::*;
    use arrow::array::Array;

    #[test]
    fn test_non_false_elision() {
        let mut builder = BooleanColumnBuilder::new();
        builder.append_non_false(false);
        builder.append_non_false(true);
        let array = builder.finish();
        assert!(array.is_null(0));
        assert!(array.is_valid(1));
    }
}
