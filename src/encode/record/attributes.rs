// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Attribute records.
//!
//! An attribute record holds one row per key-value pair, keyed by the ID of
//! the parent row it belongs to. Before emission the accumulator sorts rows
//! by (key, value, parent id), which clusters identical pairs across parents
//! and maximizes dictionary and run-length wins downstream. The parent ID is
//! the sole point of contact between records: readers index the attribute
//! record by its `parent_id` column.

use arrow::array::{ArrayRef, RecordBatch};
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Field, Float64Type, Int64Type, Schema, UInt8Type, UInt16Type,
    UInt32Type,
};
use std::sync::Arc;

use super::cbor;
use super::state::SchemaState;
use crate::encode::array::{
    AdaptiveBinaryBuilder, AdaptiveStringBuilder, BooleanColumnBuilder, PrimitiveColumnBuilder,
};
use crate::error::{Error, Result};
use crate::otlp::common::AnyValue;
use crate::payload::PayloadType;
use crate::schema::update::{DictIndex, SchemaUpdate};
use crate::schema::{AttributeValueType, consts, optional, schema_id};

/// Width of the parent-id column: u16 for resource/scope records, u32 for
/// data-point records.
pub trait ParentId: Copy + Ord + std::hash::Hash {
    /// The Arrow primitive type of the parent-id column.
    type Arrow: ArrowPrimitiveType<Native = Self>;
}

impl ParentId for u16 {
    type Arrow = UInt16Type;
}

impl ParentId for u32 {
    type Arrow = UInt32Type;
}

/// Buffered attribute rows for one record, prior to the sort.
pub struct AttributesAccumulator<'a, P> {
    rows: Vec<(P, &'a str, &'a AnyValue)>,
}

impl<'a, P: ParentId> AttributesAccumulator<'a, P> {
    /// An empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// Append every pair of `attributes` under the given parent, in
    /// insertion order.
    pub fn append(
        &mut self,
        parent_id: P,
        attributes: impl Iterator<Item = (&'a str, &'a AnyValue)>,
    ) {
        for (key, value) in attributes {
            self.rows.push((parent_id, key, value));
        }
    }

    /// Number of buffered rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Drop all buffered rows.
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Sort by (key, value, parent id) and append every row into the record
    /// builder. Non-destructive on failure; safe to call again after a
    /// schema update.
    pub fn emit(&mut self, builder: &mut AttributesRecordBuilder<P>) -> Result<()> {
        self.rows.sort_by(|a, b| {
            a.1.cmp(b.1)
                .then_with(|| a.2.canonical_cmp(b.2))
                .then_with(|| a.0.cmp(&b.0))
        });
        for (parent_id, key, value) in &self.rows {
            builder.append(*parent_id, key, value)?;
        }
        Ok(())
    }
}

impl<P: ParentId> Default for AttributesAccumulator<'_, P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Record builder for one attribute payload type.
pub struct AttributesRecordBuilder<P: ParentId> {
    payload_type: PayloadType,
    state: SchemaState,
    parent_id: PrimitiveColumnBuilder<P::Arrow>,
    key: AdaptiveStringBuilder,
    value_type: PrimitiveColumnBuilder<UInt8Type>,
    str: AdaptiveStringBuilder,
    int: PrimitiveColumnBuilder<Int64Type>,
    double: PrimitiveColumnBuilder<Float64Type>,
    bool: BooleanColumnBuilder,
    bytes: AdaptiveBinaryBuilder,
    ser: AdaptiveBinaryBuilder,
}

impl<P: ParentId> AttributesRecordBuilder<P> {
    /// A builder for the given attribute payload type.
    #[must_use]
    pub fn new(payload_type: PayloadType, max_card: u32) -> Self {
        let state = SchemaState::new(max_card);
        let mut builder = Self {
            payload_type,
            state,
            parent_id: PrimitiveColumnBuilder::new(),
            key: AdaptiveStringBuilder::new(consts::ATTRS_KEY, DictIndex::U8, max_card),
            value_type: PrimitiveColumnBuilder::new(),
            str: AdaptiveStringBuilder::new(consts::ATTRS_STR, DictIndex::U16, max_card),
            int: PrimitiveColumnBuilder::new(),
            double: PrimitiveColumnBuilder::new(),
            bool: BooleanColumnBuilder::new(),
            bytes: AdaptiveBinaryBuilder::new(consts::ATTRS_BYTES, DictIndex::U16, max_card),
            ser: AdaptiveBinaryBuilder::new(consts::ATTRS_SER, DictIndex::Native, max_card),
        };
        builder.reset();
        builder
    }

    /// The payload type this builder produces.
    #[must_use]
    pub fn payload_type(&self) -> PayloadType {
        self.payload_type
    }

    /// Number of rows appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.value_type.len()
    }

    /// Append one key-value row.
    pub fn append(&mut self, parent_id: P, key: &str, value: &AnyValue) -> Result<()> {
        self.parent_id.append_value(parent_id);
        self.key.append_str(key);

        let value_type = match value {
            AnyValue::Empty => AttributeValueType::Empty,
            AnyValue::Str(_) => AttributeValueType::Str,
            AnyValue::Int(_) => AttributeValueType::Int,
            AnyValue::Double(_) => AttributeValueType::Double,
            AnyValue::Bool(_) => AttributeValueType::Bool,
            AnyValue::KvList(_) => AttributeValueType::Map,
            AnyValue::Array(_) => AttributeValueType::Slice,
            AnyValue::Bytes(_) => AttributeValueType::Bytes,
        };
        self.value_type.append_value(value_type as u8);

        match value {
            AnyValue::Str(s) => self.str.append_str(s),
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
            AnyValue::Bytes(b) => self.bytes.append_slice(b),
            _ => self.bytes.append_null(),
        }
        match value {
            AnyValue::Array(values) => self.ser.append_slice(&cbor::serialize_array(values)?),
            AnyValue::KvList(entries) => self.ser.append_slice(&cbor::serialize_kv_list(entries)?),
            _ => self.ser.append_null(),
        }
        Ok(())
    }

    /// Materialize the record, or fail with a schema-not-up-to-date signal
    /// when a dictionary overflowed during this batch.
    pub fn finish(&mut self) -> Result<(RecordBatch, String)> {
        let updates: Vec<SchemaUpdate> =
            [self.key.update(), self.str.update(), self.bytes.update()]
                .into_iter()
                .flatten()
                .collect();
        if !updates.is_empty() {
            let fields = self.state.apply(&updates);
            return Err(Error::SchemaNotUpToDate {
                payload_type: self.payload_type,
                fields,
            });
        }

        let mut fields = vec![
            Field::new(consts::PARENT_ID, P::Arrow::DATA_TYPE, false),
            Field::new(consts::ATTRS_KEY, self.key.data_type(), false),
            Field::new(consts::ATTRS_TYPE, DataType::UInt8, false),
        ];
        let mut columns: Vec<ArrayRef> = vec![
            self.parent_id.finish(),
            self.key.finish(),
            self.value_type.finish(),
        ];

        // value columns are optional: a batch only carries the ones it used
        if self.str.has_values() {
            fields.push(optional(Field::new(
                consts::ATTRS_STR,
                self.str.data_type(),
                true,
            )));
            columns.push(self.str.finish());
        }
        if self.int.has_values() {
            fields.push(optional(Field::new(
                consts::ATTRS_INT,
                DataType::Int64,
                true,
            )));
            columns.push(self.int.finish());
        }
        if self.double.has_values() {
            fields.push(optional(Field::new(
                consts::ATTRS_DOUBLE,
                DataType::Float64,
                true,
            )));
            columns.push(self.double.finish());
        }
        if self.bool.has_values() {
            fields.push(optional(Field::new(
                consts::ATTRS_BOOL,
                DataType::Boolean,
                true,
            )));
            columns.push(self.bool.finish());
        }
        if self.bytes.has_values() {
            fields.push(optional(Field::new(
                consts::ATTRS_BYTES,
                self.bytes.data_type(),
                true,
            )));
            columns.push(self.bytes.finish());
        }
        if self.ser.has_values() {
            fields.push(optional(Field::new(
                consts::ATTRS_SER,
                self.ser.data_type(),
                true,
            )));
            columns.push(self.ser.finish());
        }

        let schema = Arc::new(Schema::new(fields));
        let id = schema_id(&schema);
        let batch =
            RecordBatch::try_new(schema, columns).map_err(|source| Error::BuildRecordBatch {
                payload_type: self.payload_type,
                source,
            })?;
        self.reset();
        Ok((batch, id))
    }

    /// Drop buffered rows and rebuild the column builders against the
    /// current schema state.
    pub fn reset(&mut self) {
        let max_card = self.state.max_card();
        self.parent_id = PrimitiveColumnBuilder::new();
        self.key = AdaptiveStringBuilder::new(
            consts::ATTRS_KEY,
            self.state.dict_index(consts::ATTRS_KEY, DictIndex::U8),
            max_card,
        );
        self.value_type = PrimitiveColumnBuilder::new();
        self.str = AdaptiveStringBuilder::new(
            consts::ATTRS_STR,
            self.state.dict_index(consts::ATTRS_STR, DictIndex::U16),
            max_card,
        );
        self.int = PrimitiveColumnBuilder::new();
        self.double = PrimitiveColumnBuilder::new();
        self.bool = BooleanColumnBuilder::new();
        self.bytes = AdaptiveBinaryBuilder::new(
            consts::ATTRS_BYTES,
            self.state.dict_index(consts::ATTRS_BYTES, DictIndex::U16),
            max_card,
        );
        self.ser = AdaptiveBinaryBuilder::new(consts::ATTRS_SER, DictIndex::Native, max_card);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::otlp::common::KeyValue;
    use arrow::array::{Array, DictionaryArray, StringArray, UInt8Array, UInt32Array};

    fn kvs(pairs: &[(&str, AnyValue)]) -> Vec<KeyValue> {
        pairs
            .iter()
            .map(|(k, v)| KeyValue::new(*k, v.clone()))
            .collect()
    }

    #[test]
    fn test_rows_cluster_by_key_then_value() {
        let attrs0 = kvs(&[
            ("zone", AnyValue::new_string("b")),
            ("host", AnyValue::new_string("x")),
        ]);
        let attrs1 = kvs(&[
            ("host", AnyValue::new_string("x")),
            ("zone", AnyValue::new_string("a")),
        ]);

        let mut acc = AttributesAccumulator::<u32>::new();
        acc.append(0, attrs0.iter().map(|kv| (kv.key.as_str(), &kv.value)));
        acc.append(1, attrs1.iter().map(|kv| (kv.key.as_str(), &kv.value)));

        let mut builder =
            AttributesRecordBuilder::<u32>::new(PayloadType::IntGaugeAttrs, u16::MAX as u32);
        acc.emit(&mut builder).unwrap();
        let (batch, _) = builder.finish().unwrap();

        let parent_ids = batch
            .column(0)
            .as_any()
            .downcast_ref::<UInt32Array>()
            .unwrap();
        // host/x rows first (parents 0 then 1), then zone/a (1), zone/b (0)
        assert_eq!(parent_ids.values().as_ref(), &[0, 1, 1, 0]);

        let keys = batch
            .column(1)
            .as_any()
            .downcast_ref::<DictionaryArray<UInt8Type>>()
            .unwrap();
        let key_values = keys
            .values()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        let resolved: Vec<&str> = keys
            .keys()
            .iter()
            .map(|k| key_values.value(k.unwrap() as usize))
            .collect();
        assert_eq!(resolved, vec!["host", "host", "zone", "zone"]);
    }

    #[test]
    fn test_unused_value_columns_are_elided() {
        let mut builder =
            AttributesRecordBuilder::<u16>::new(PayloadType::ResourceAttrs, u16::MAX as u32);
        builder.append(0, "k", &AnyValue::new_string("v")).unwrap();
        let (batch, _) = builder.finish().unwrap();

        let schema = batch.schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["parent_id", "key", "type", "str"]);
    }

    #[test]
    fn test_value_type_tags() {
        let mut builder =
            AttributesRecordBuilder::<u16>::new(PayloadType::ScopeAttrs, u16::MAX as u32);
        builder.append(0, "a", &AnyValue::new_int(1)).unwrap();
        builder.append(0, "b", &AnyValue::Empty).unwrap();
        let (batch, _) = builder.finish().unwrap();

        let types = batch
            .column(2)
            .as_any()
            .downcast_ref::<UInt8Array>()
            .unwrap();
        assert_eq!(types.value(0), AttributeValueType::Int as u8);
        assert_eq!(types.value(1), AttributeValueType::Empty as u8);
    }

    #[test]
    fn test_nested_values_take_the_ser_column() {
        let mut builder =
            AttributesRecordBuilder::<u32>::new(PayloadType::SummaryAttrs, u16::MAX as u32);
        builder
            .append(
                0,
                "nested",
                &AnyValue::KvList(kvs(&[("inner", AnyValue::new_bool(true))])),
            )
            .unwrap();
        let (batch, _) = builder.finish().unwrap();
        let schema = batch.schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["parent_id", "key", "type", "ser"]);
    }

    #[test]
    fn test_schema_id_changes_after_overflow() {
        let mut builder =
            AttributesRecordBuilder::<u32>::new(PayloadType::IntSumAttrs, u16::MAX as u32);
        // 256 distinct keys overflow the u8 key dictionary
        for i in 0..256u32 {
            builder
                .append(i, &format!("key-{i}"), &AnyValue::new_int(1))
                .unwrap();
        }
        let err = builder.finish().err().expect("schema update expected");
        assert!(matches!(err, Error::SchemaNotUpToDate { .. }));

        // replay against the widened schema succeeds
        builder.reset();
        for i in 0..256u32 {
            builder
                .append(i, &format!("key-{i}"), &AnyValue::new_int(1))
                .unwrap();
        }
        let (batch, _) = builder.finish().unwrap();
        assert_eq!(batch.num_rows(), 256);
        assert_eq!(
            batch.schema().field(1).data_type(),
            &DataType::Dictionary(Box::new(DataType::UInt16), Box::new(DataType::Utf8))
        );
    }
}
