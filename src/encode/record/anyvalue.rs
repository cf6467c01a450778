// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Builders for the inline value encodings: the metric-value sparse union,
//! the any-value sparse union, and the `map<string, any-value>` column used
//! by exemplar attributes and hoisted shared attributes.

use arrow::array::{
    ArrayRef, BinaryBuilder, BooleanBuilder, Float64Builder, Int64Builder, MapArray,
    NullBufferBuilder, StringBuilder, StructArray, UnionArray,
};
use arrow::buffer::{OffsetBuffer, ScalarBuffer};
use arrow::datatypes::{DataType, Field, Fields, UnionFields, UnionMode};
use lazy_static::lazy_static;
use std::sync::Arc;

use super::cbor;
use crate::error::{Error, Result};
use crate::otlp::common::{AnyValue, KeyValue};
use crate::otlp::metrics::NumberValue;
use crate::schema::{any_value_codes, value_type_codes};

lazy_static! {
    /// Child fields of the metric-value sparse union.
    pub static ref METRIC_VALUE_FIELDS: UnionFields = UnionFields::new(
        vec![value_type_codes::I64, value_type_codes::F64],
        vec![
            Field::new("i64", DataType::Int64, true),
            Field::new("f64", DataType::Float64, true),
        ],
    );

    /// Child fields of the inline any-value sparse union.
    pub static ref ANY_VALUE_FIELDS: UnionFields = UnionFields::new(
        vec![
            any_value_codes::STR,
            any_value_codes::INT,
            any_value_codes::DOUBLE,
            any_value_codes::BOOL,
            any_value_codes::BYTES,
            any_value_codes::SER,
        ],
        vec![
            Field::new("str", DataType::Utf8, true),
            Field::new("int", DataType::Int64, true),
            Field::new("double", DataType::Float64, true),
            Field::new("bool", DataType::Boolean, true),
            Field::new("bytes", DataType::Binary, true),
            Field::new("ser", DataType::Binary, true),
        ],
    );

    /// Entry field of the inline attributes map.
    pub static ref MAP_ENTRY_FIELD: Field = Field::new(
        "entries",
        DataType::Struct(Fields::from(vec![
            Field::new("key", DataType::Utf8, false),
            Field::new("value", any_value_data_type(), true),
        ])),
        false,
    );
}

/// The data type of the metric-value sparse union.
#[must_use]
pub fn metric_value_data_type() -> DataType {
    DataType::Union(METRIC_VALUE_FIELDS.clone(), UnionMode::Sparse)
}

/// The data type of the inline any-value sparse union.
#[must_use]
pub fn any_value_data_type() -> DataType {
    DataType::Union(ANY_VALUE_FIELDS.clone(), UnionMode::Sparse)
}

/// The data type of the inline attributes map.
#[must_use]
pub fn attributes_map_data_type() -> DataType {
    DataType::Map(Arc::new(MAP_ENTRY_FIELD.clone()), false)
}

/// Builder for the metric-value sparse union.
///
/// One tag per row; the non-selected child is null by construction. A
/// missing measurement is stored as the i64 tag over a null child.
#[derive(Default)]
pub struct MetricValueBuilder {
    type_ids: Vec<i8>,
    int: Int64Builder,
    double: Float64Builder,
}

impl MetricValueBuilder {
    /// An empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a measurement.
    pub fn append(&mut self, value: Option<NumberValue>) {
        match value {
            Some(NumberValue::Int(v)) => {
                self.type_ids.push(value_type_codes::I64);
                self.int.append_value(v);
                self.double.append_null();
            }
            Some(NumberValue::Double(v)) => {
                self.type_ids.push(value_type_codes::F64);
                self.int.append_null();
                self.double.append_value(v);
            }
            None => {
                self.type_ids.push(value_type_codes::I64);
                self.int.append_null();
                self.double.append_null();
            }
        }
    }

    /// Number of rows appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.type_ids.len()
    }

    /// Materialize the column and reset the builder.
    pub fn finish(&mut self, path: &str) -> Result<ArrayRef> {
        let type_ids = ScalarBuffer::from(std::mem::take(&mut self.type_ids));
        let children: Vec<ArrayRef> =
            vec![Arc::new(self.int.finish()), Arc::new(self.double.finish())];
        let array = UnionArray::try_new(METRIC_VALUE_FIELDS.clone(), type_ids, None, children)
            .map_err(|source| Error::BuildArray {
                name: path.to_owned(),
                source,
            })?;
        Ok(Arc::new(array))
    }
}

/// Builder for the inline any-value sparse union.
#[derive(Default)]
pub struct AnyValueUnionBuilder {
    type_ids: Vec<i8>,
    str: StringBuilder,
    int: Int64Builder,
    double: Float64Builder,
    bool: BooleanBuilder,
    bytes: BinaryBuilder,
    ser: BinaryBuilder,
}

impl AnyValueUnionBuilder {
    /// An empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value. Nested lists and maps are CBOR-serialized into the
    /// `ser` child; an empty value is the str tag over a null child.
    pub fn append(&mut self, value: &AnyValue) -> Result<()> {
        let tag = match value {
            AnyValue::Empty => any_value_codes::STR,
            AnyValue::Str(_) => any_value_codes::STR,
            AnyValue::Int(_) => any_value_codes::INT,
            AnyValue::Double(_) => any_value_codes::DOUBLE,
            AnyValue::Bool(_) => any_value_codes::BOOL,
            AnyValue::Bytes(_) => any_value_codes::BYTES,
            AnyValue::Array(_) | AnyValue::KvList(_) => any_value_codes::SER,
        };
        self.type_ids.push(tag);

        match value {
            AnyValue::Str(s) => self.str.append_value(s),
            _ => self.str.append_null(),
        }
        match value {
            AnyValue::Int(i) => self.int.append_value(*i),
            _ => self.int.append_null(),
        }
        match value {
            AnyValue::Double(d) => self.double.append_value(*d),
            _ => self.double.append_null(),
        }
        match value {
            AnyValue::Bool(b) => self.bool.append_value(*b),
            _ => self.bool.append_null(),
        }
        match value {
            AnyValue::Bytes(b) => self.bytes.append_value(b),
            _ => self.bytes.append_null(),
        }
        match value {
            AnyValue::Array(values) => self.ser.append_value(cbor::serialize_array(values)?),
            AnyValue::KvList(entries) => self.ser.append_value(cbor::serialize_kv_list(entries)?),
            _ => self.ser.append_null(),
        }
        Ok(())
    }

    /// Number of rows appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.type_ids.len()
    }

    /// Materialize the column and reset the builder.
    pub fn finish(&mut self, path: &str) -> Result<ArrayRef> {
        let type_ids = ScalarBuffer::from(std::mem::take(&mut self.type_ids));
        let children: Vec<ArrayRef> = vec![
            Arc::new(self.str.finish()),
            Arc::new(self.int.finish()),
            Arc::new(self.double.finish()),
            Arc::new(self.bool.finish()),
            Arc::new(self.bytes.finish()),
            Arc::new(self.ser.finish()),
        ];
        let array = UnionArray::try_new(ANY_VALUE_FIELDS.clone(), type_ids, None, children)
            .map_err(|source| Error::BuildArray {
                name: path.to_owned(),
                source,
            })?;
        Ok(Arc::new(array))
    }
}

/// Builder for the inline `map<string, any-value>` column.
pub struct MapColumnBuilder {
    offsets: Vec<i32>,
    validity: NullBufferBuilder,
    keys: StringBuilder,
    values: AnyValueUnionBuilder,
    non_null: usize,
}

impl MapColumnBuilder {
    /// An empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            offsets: vec![0],
            validity: NullBufferBuilder::new(0),
            keys: StringBuilder::new(),
            values: AnyValueUnionBuilder::new(),
            non_null: 0,
        }
    }

    /// Append a map row. An empty map is stored as null.
    pub fn append(&mut self, entries: &[KeyValue]) -> Result<()> {
        if entries.is_empty() {
            self.append_null();
            return Ok(());
        }
        for kv in entries {
            self.keys.append_value(&kv.key);
            self.values.append(&kv.value)?;
        }
        self.offsets.push(self.values.len() as i32);
        self.validity.append_non_null();
        self.non_null += 1;
        Ok(())
    }

    /// Append a map row from borrowed entries, preserving iteration order.
    pub fn append_pairs<'kv>(
        &mut self,
        entries: impl Iterator<Item = (&'kv str, &'kv AnyValue)>,
    ) -> Result<()> {
        let mut appended = 0;
        for (key, value) in entries {
            self.keys.append_value(key);
            self.values.append(value)?;
            appended += 1;
        }
        if appended == 0 {
            self.append_null();
            return Ok(());
        }
        self.offsets.push(self.values.len() as i32);
        self.validity.append_non_null();
        self.non_null += 1;
        Ok(())
    }

    /// Append a null map row.
    pub fn append_null(&mut self) {
        self.offsets.push(*self.offsets.last().unwrap_or(&0));
        self.validity.append_null();
    }

    /// Number of rows appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Whether any non-null row was appended.
    #[must_use]
    pub fn has_values(&self) -> bool {
        self.non_null > 0
    }

    /// Materialize the column and reset the builder.
    pub fn finish(&mut self, path: &str) -> Result<ArrayRef> {
        let build_error = |source| Error::BuildArray {
            name: path.to_owned(),
            source,
        };

        let entry_fields = match MAP_ENTRY_FIELD.data_type() {
            DataType::Struct(fields) => fields.clone(),
            _ => unreachable!("map entry field is a struct"),
        };
        let keys: ArrayRef = Arc::new(self.keys.finish());
        let values = self.values.finish(path)?;
        let entries =
            StructArray::try_new(entry_fields, vec![keys, values], None).map_err(build_error)?;

        let offsets = OffsetBuffer::new(ScalarBuffer::from(std::mem::replace(
            &mut self.offsets,
            vec![0],
        )));
        let nulls = self.validity.finish();
        self.non_null = 0;

        let array = MapArray::try_new(
            Arc::new(MAP_ENTRY_FIELD.clone()),
            offsets,
            entries,
            nulls,
            false,
        )
        .map_err(build_error)?;
        Ok(Arc::new(array))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use arrow::array::Array;

    #[test]
    fn test_metric_value_union_tags() {
        let mut builder = MetricValueBuilder::new();
        builder.append(Some(NumberValue::Int(3)));
        builder.append(Some(NumberValue::Double(1.5)));
        builder.append(None);

        let array = builder.finish("value").unwrap();
        let union = array.as_any().downcast_ref::<UnionArray>().unwrap();
        assert_eq!(union.type_id(0), 0);
        assert_eq!(union.type_id(1), 1);
        assert_eq!(union.type_id(2), 0);
        assert!(union.child(0).is_null(2));
    }

    #[test]
    fn test_map_column_empty_rows_are_null() {
        let mut builder = MapColumnBuilder::new();
        builder
            .append(&[KeyValue::new("k", AnyValue::new_string("v"))])
            .unwrap();
        builder.append(&[]).unwrap();

        assert!(builder.has_values());
        let array = builder.finish("attributes").unwrap();
        assert_eq!(array.len(), 2);
        assert!(array.is_valid(0));
        assert!(array.is_null(1));
    }

    #[test]
    fn test_nested_values_serialize_into_ser_child() {
        let mut builder = MapColumnBuilder::new();
        builder
            .append(&[KeyValue::new(
                "nested",
                AnyValue::Array(vec![AnyValue::new_int(1)]),
            )])
            .unwrap();
        let array = builder.finish("attributes").unwrap();
        let map = array.as_any().downcast_ref::<MapArray>().unwrap();
        let entries = map.value(0);
        let value = entries.column(1);
        let union = value.as_any().downcast_ref::<UnionArray>().unwrap();
        assert_eq!(union.type_id(0), any_value_codes::SER);
    }
}
