// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Inline exemplar list column.
//!
//! Exemplars ride inside their data-point record as a `list<struct>` column
//! rather than as a separate payload. The span-id and trace-id children are
//! dictionary-encoded fixed-size binary and participate in schema evolution
//! like any other dictionary column.

use arrow::array::{Array, ArrayRef, ListArray, NullBufferBuilder, StructArray};
use arrow::buffer::{OffsetBuffer, ScalarBuffer};
use arrow::datatypes::{DataType, Field, Fields, TimeUnit, TimestampNanosecondType};
use std::sync::Arc;

use super::anyvalue::{
    MapColumnBuilder, MetricValueBuilder, attributes_map_data_type, metric_value_data_type,
};
use super::state::SchemaState;
use crate::encode::array::{FixedSizeBinaryDictBuilder, PrimitiveColumnBuilder};
use crate::error::{Error, Result};
use crate::otlp::metrics::Exemplar;
use crate::schema::update::{DictIndex, SchemaUpdate};
use crate::schema::{consts, optional};

const SPAN_ID_PATH: &str = "exemplars.span_id";
const TRACE_ID_PATH: &str = "exemplars.trace_id";

/// Builder for the `exemplars` list column of a data-point record.
pub struct ExemplarsBuilder {
    offsets: Vec<i32>,
    validity: NullBufferBuilder,
    attributes: MapColumnBuilder,
    time: PrimitiveColumnBuilder<TimestampNanosecondType>,
    value: MetricValueBuilder,
    span_id: FixedSizeBinaryDictBuilder,
    trace_id: FixedSizeBinaryDictBuilder,
    items: usize,
    non_null_rows: usize,
}

impl ExemplarsBuilder {
    /// A builder whose dictionary widths come from the record's schema
    /// state.
    #[must_use]
    pub fn new(state: &SchemaState) -> Self {
        let max_card = state.max_card();
        Self {
            offsets: vec![0],
            validity: NullBufferBuilder::new(0),
            attributes: MapColumnBuilder::new(),
            time: PrimitiveColumnBuilder::new(),
            value: MetricValueBuilder::new(),
            span_id: FixedSizeBinaryDictBuilder::new(
                SPAN_ID_PATH,
                8,
                state.dict_index(SPAN_ID_PATH, DictIndex::U8),
                max_card,
            ),
            trace_id: FixedSizeBinaryDictBuilder::new(
                TRACE_ID_PATH,
                16,
                state.dict_index(TRACE_ID_PATH, DictIndex::U8),
                max_card,
            ),
            items: 0,
            non_null_rows: 0,
        }
    }

    /// Append one list row. An empty exemplar list is stored as null.
    pub fn append(&mut self, exemplars: &[Exemplar]) -> Result<()> {
        if exemplars.is_empty() {
            self.offsets.push(self.items as i32);
            self.validity.append_null();
            return Ok(());
        }
        for exemplar in exemplars {
            self.attributes.append(&exemplar.filtered_attributes)?;
            if exemplar.time_unix_nano == 0 {
                self.time.append_null();
            } else {
                self.time.append_value(exemplar.time_unix_nano as i64);
            }
            self.value.append(exemplar.value);

            match exemplar.span_id.as_slice() {
                [] => self.span_id.append_null(),
                bytes if bytes.len() == 8 => self.span_id.append(bytes)?,
                bytes => {
                    return Err(Error::InvalidSpanId { given: bytes.len() });
                }
            }
            match exemplar.trace_id.as_slice() {
                [] => self.trace_id.append_null(),
                bytes if bytes.len() == 16 => self.trace_id.append(bytes)?,
                bytes => {
                    return Err(Error::InvalidTraceId { given: bytes.len() });
                }
            }
            self.items += 1;
        }
        self.offsets.push(self.items as i32);
        self.validity.append_non_null();
        self.non_null_rows += 1;
        Ok(())
    }

    /// Number of list rows appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Whether any row holds at least one exemplar.
    #[must_use]
    pub fn has_values(&self) -> bool {
        self.non_null_rows > 0
    }

    /// Pending dictionary updates from the span-id and trace-id children.
    #[must_use]
    pub fn updates(&self) -> Vec<SchemaUpdate> {
        [self.span_id.update(), self.trace_id.update()]
            .into_iter()
            .flatten()
            .collect()
    }

    /// The data type of the materialized column.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        DataType::List(Arc::new(Field::new("item", self.struct_data_type(), true)))
    }

    fn struct_fields(&self) -> Fields {
        Fields::from(vec![
            optional(Field::new(
                consts::ATTRIBUTES,
                attributes_map_data_type(),
                true,
            )),
            optional(Field::new(
                consts::TIME_UNIX_NANO,
                DataType::Timestamp(TimeUnit::Nanosecond, None),
                true,
            )),
            Field::new(consts::VALUE, metric_value_data_type(), false),
            optional(Field::new(consts::SPAN_ID, self.span_id.data_type(), true)),
            optional(Field::new(
                consts::TRACE_ID,
                self.trace_id.data_type(),
                true,
            )),
        ])
    }

    fn struct_data_type(&self) -> DataType {
        DataType::Struct(self.struct_fields())
    }

    /// Materialize the column and reset the builder.
    pub fn finish(&mut self, path: &str) -> Result<ArrayRef> {
        let fields = self.struct_fields();
        let arrays: Vec<ArrayRef> = vec![
            self.attributes.finish(&format!("{path}.attributes"))?,
            self.time.finish(),
            self.value.finish(&format!("{path}.value"))?,
            self.span_id.finish()?,
            self.trace_id.finish()?,
        ];
        let build_error = |source| Error::BuildArray {
            name: path.to_owned(),
            source,
        };
        let entries = StructArray::try_new(fields, arrays, None).map_err(build_error)?;

        let item_field = Arc::new(Field::new("item", entries.data_type().clone(), true));
        let offsets = OffsetBuffer::new(ScalarBuffer::from(std::mem::replace(
            &mut self.offsets,
            vec![0],
        )));
        let nulls = self.validity.finish();
        self.items = 0;
        self.non_null_rows = 0;

        let array = ListArray::try_new(item_field, offsets, Arc::new(entries), nulls)
            .map_err(build_error)?;
        Ok(Arc::new(array))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::otlp::common::{AnyValue, KeyValue};
    use crate::otlp::metrics::NumberValue;
    use arrow::array::Array;

    fn state() -> SchemaState {
        SchemaState::new(u16::MAX as u32)
    }

    #[test]
    fn test_empty_lists_are_null_rows() {
        let mut builder = ExemplarsBuilder::new(&state());
        builder.append(&[]).unwrap();
        builder
            .append(&[Exemplar {
                time_unix_nano: 7,
                value: Some(NumberValue::Double(1.5)),
                ..Default::default()
            }])
            .unwrap();

        assert!(builder.has_values());
        let array = builder.finish("exemplars").unwrap();
        assert_eq!(array.len(), 2);
        assert!(array.is_null(0));
        assert!(array.is_valid(1));
    }

    #[test]
    fn test_span_id_length_is_validated() {
        let mut builder = ExemplarsBuilder::new(&state());
        let err = builder
            .append(&[Exemplar {
                span_id: vec![1, 2, 3],
                ..Default::default()
            }])
            .err()
            .expect("length error expected");
        assert!(matches!(err, Error::InvalidSpanId { given: 3 }));
    }

    #[test]
    fn test_trace_id_length_is_validated() {
        let mut builder = ExemplarsBuilder::new(&state());
        let err = builder
            .append(&[Exemplar {
                trace_id: vec![0; 15],
                ..Default::default()
            }])
            .err()
            .expect("length error expected");
        assert!(matches!(err, Error::InvalidTraceId { given: 15 }));
    }

    #[test]
    fn test_exemplar_with_ids_and_attributes() {
        let mut builder = ExemplarsBuilder::new(&state());
        builder
            .append(&[Exemplar {
                filtered_attributes: vec![KeyValue::new("k", AnyValue::new_string("v"))],
                time_unix_nano: 678,
                value: Some(NumberValue::Int(234)),
                span_id: (17..25).collect(),
                trace_id: (0..16).collect(),
            }])
            .unwrap();
        assert!(builder.updates().is_empty());
        let array = builder.finish("exemplars").unwrap();
        assert_eq!(array.len(), 1);
    }
}
