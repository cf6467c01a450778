// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Summary data-point record.

use arrow::array::{
    Array, ArrayRef, Float64Builder, ListArray, NullBufferBuilder, RecordBatch, StructArray,
};
use arrow::buffer::{OffsetBuffer, ScalarBuffer};
use arrow::datatypes::{DataType, Field, Fields, Float64Type, Schema, UInt32Type, UInt64Type};
use std::sync::Arc;

use super::super::attributes::AttributesAccumulator;
use super::super::state::SchemaState;
use super::{DpCommonColumns, MetricIdentity};
use crate::encode::array::PrimitiveColumnBuilder;
use crate::encode::shared::SharedValues;
use crate::error::{Error, Result};
use crate::otlp::metrics::SummaryDataPoint;
use crate::payload::PayloadType;
use crate::schema::{consts, optional, schema_id};

/// One buffered summary point.
pub struct SummaryDpEntry<'a> {
    /// ID of the metric row in the main record.
    pub parent_id: u16,
    /// Denormalized metric scalars.
    pub metric: MetricIdentity<'a>,
    /// The point itself.
    pub point: &'a SummaryDataPoint,
}

/// Accumulator for the summary payload.
#[derive(Default)]
pub struct SummaryDpAccumulator<'a> {
    entries: Vec<SummaryDpEntry<'a>>,
}

impl<'a> SummaryDpAccumulator<'a> {
    /// An empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer one point.
    pub fn append(&mut self, entry: SummaryDpEntry<'a>) {
        self.entries.push(entry);
    }

    /// Number of buffered points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Sort, assign IDs, and append rows; see the module docs.
    pub fn emit(
        &mut self,
        hoisted: &[SharedValues<'_>],
        builder: &mut SummaryDataPointsBuilder,
        attrs: &mut AttributesAccumulator<'a, u32>,
    ) -> Result<()> {
        if self.entries.len() > u32::MAX as usize {
            return Err(Error::DataPointCountOverflow {
                payload_type: PayloadType::Summary,
            });
        }
        self.entries.sort_by(|a, b| {
            a.metric
                .name
                .cmp(b.metric.name)
                .then_with(|| a.parent_id.cmp(&b.parent_id))
                .then_with(|| a.point.time_unix_nano.cmp(&b.point.time_unix_nano))
        });

        for (id, entry) in self.entries.iter().enumerate() {
            let id = id as u32;
            let shared = &hoisted[entry.parent_id as usize];
            builder.append(id, entry, shared);
            attrs.append(
                id,
                entry
                    .point
                    .attributes
                    .iter()
                    .filter(|kv| !shared.contains_key(&kv.key))
                    .map(|kv| (kv.key.as_str(), &kv.value)),
            );
        }
        Ok(())
    }
}

/// `list<struct{quantile, value}>` column.
struct QuantileValuesBuilder {
    offsets: Vec<i32>,
    validity: NullBufferBuilder,
    quantile: Float64Builder,
    value: Float64Builder,
    items: usize,
}

impl QuantileValuesBuilder {
    fn new() -> Self {
        Self {
            offsets: vec![0],
            validity: NullBufferBuilder::new(0),
            quantile: Float64Builder::new(),
            value: Float64Builder::new(),
            items: 0,
        }
    }

    fn fields() -> Fields {
        Fields::from(vec![
            Field::new(consts::QUANTILE, DataType::Float64, true),
            Field::new(consts::VALUE, DataType::Float64, true),
        ])
    }

    fn data_type() -> DataType {
        DataType::List(Arc::new(Field::new(
            "item",
            DataType::Struct(Self::fields()),
            true,
        )))
    }

    fn append(&mut self, values: &[crate::otlp::metrics::ValueAtQuantile]) {
        if values.is_empty() {
            self.offsets.push(self.items as i32);
            self.validity.append_null();
            return;
        }
        for qv in values {
            self.quantile.append_value(qv.quantile);
            self.value.append_value(qv.value);
            self.items += 1;
        }
        self.offsets.push(self.items as i32);
        self.validity.append_non_null();
    }

    fn finish(&mut self) -> Result<ArrayRef> {
        let build_error = |source| Error::BuildArray {
            name: consts::QUANTILE_VALUES.to_owned(),
            source,
        };
        let entries = StructArray::try_new(
            Self::fields(),
            vec![
                Arc::new(self.quantile.finish()) as ArrayRef,
                Arc::new(self.value.finish()) as ArrayRef,
            ],
            None,
        )
        .map_err(build_error)?;
        let offsets = OffsetBuffer::new(ScalarBuffer::from(std::mem::replace(
            &mut self.offsets,
            vec![0],
        )));
        let nulls = self.validity.finish();
        self.items = 0;
        let array = ListArray::try_new(
            Arc::new(Field::new("item", entries.data_type().clone(), true)),
            offsets,
            Arc::new(entries),
            nulls,
        )
        .map_err(build_error)?;
        Ok(Arc::new(array))
    }
}

/// Record builder for the summary payload.
pub struct SummaryDataPointsBuilder {
    state: SchemaState,
    common: DpCommonColumns,
    count: PrimitiveColumnBuilder<UInt64Type>,
    sum: PrimitiveColumnBuilder<Float64Type>,
    quantiles: QuantileValuesBuilder,
    flags: PrimitiveColumnBuilder<UInt32Type>,
}

impl SummaryDataPointsBuilder {
    /// A builder for the summary payload.
    #[must_use]
    pub fn new(max_card: u32) -> Self {
        let state = SchemaState::new(max_card);
        let common = DpCommonColumns::new(&state);
        Self {
            state,
            common,
            count: PrimitiveColumnBuilder::new(),
            sum: PrimitiveColumnBuilder::new(),
            quantiles: QuantileValuesBuilder::new(),
            flags: PrimitiveColumnBuilder::new(),
        }
    }

    /// Number of rows appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count.len()
    }

    fn append(&mut self, id: u32, entry: &SummaryDpEntry<'_>, hoisted: &SharedValues<'_>) {
        self.common
            .append_identity(id, entry.parent_id, &entry.metric);
        let (start, time) = DpCommonColumns::point_times(
            hoisted,
            entry.point.start_time_unix_nano,
            entry.point.time_unix_nano,
        );
        self.common.append_times(start, time);
        self.count.append_non_zero(entry.point.count);
        self.sum.append_non_zero(entry.point.sum);
        self.quantiles.append(&entry.point.quantile_values);
        self.flags.append_non_zero(entry.point.flags);
    }

    /// Materialize the record, or fail with a schema-not-up-to-date signal.
    pub fn finish(&mut self) -> Result<(RecordBatch, String)> {
        let updates = self.common.updates();
        if !updates.is_empty() {
            let fields = self.state.apply(&updates);
            return Err(Error::SchemaNotUpToDate {
                payload_type: PayloadType::Summary,
                fields,
            });
        }

        let mut fields = Vec::new();
        let mut columns: Vec<ArrayRef> = Vec::new();
        self.common.finish_into(&mut fields, &mut columns);

        if self.count.has_values() {
            fields.push(optional(Field::new(consts::COUNT, DataType::UInt64, true)));
            columns.push(self.count.finish());
        }
        if self.sum.has_values() {
            fields.push(optional(Field::new(consts::SUM, DataType::Float64, true)));
            columns.push(self.sum.finish());
        }
        fields.push(Field::new(
            consts::QUANTILE_VALUES,
            QuantileValuesBuilder::data_type(),
            true,
        ));
        columns.push(self.quantiles.finish()?);
        super::flags_column(&mut self.flags, &mut fields, &mut columns);

        let schema = Arc::new(Schema::new(fields));
        let id = schema_id(&schema);
        let batch =
            RecordBatch::try_new(schema, columns).map_err(|source| Error::BuildRecordBatch {
                payload_type: PayloadType::Summary,
                source,
            })?;
        self.reset();
        Ok((batch, id))
    }

    /// Drop buffered rows and rebuild the column builders against the
    /// current schema state.
    pub fn reset(&mut self) {
        self.common = DpCommonColumns::new(&self.state);
        self.count = PrimitiveColumnBuilder::new();
        self.sum = PrimitiveColumnBuilder::new();
        self.quantiles = QuantileValuesBuilder::new();
        self.flags = PrimitiveColumnBuilder::new();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::otlp::metrics::ValueAtQuantile;

    #[test]
    fn test_summary_record_shape() {
        let point = SummaryDataPoint {
            start_time_unix_nano: 543,
            time_unix_nano: 765,
            count: 23,
            sum: 34.0,
            quantile_values: vec![
                ValueAtQuantile::new(0.0, 123.0),
                ValueAtQuantile::new(0.5, 29.0),
            ],
            flags: 2,
            ..Default::default()
        };
        let mut acc = SummaryDpAccumulator::new();
        acc.append(SummaryDpEntry {
            parent_id: 0,
            metric: MetricIdentity {
                name: "a summary",
                description: "",
                unit: "",
                temporality: None,
                monotonic: None,
            },
            point: &point,
        });

        let mut builder = SummaryDataPointsBuilder::new(u16::MAX as u32);
        let mut attrs = AttributesAccumulator::<u32>::new();
        acc.emit(&[SharedValues::default()], &mut builder, &mut attrs)
            .unwrap();
        let (batch, _) = builder.finish().unwrap();

        let schema = batch.schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(
            names,
            vec![
                "id",
                "parent_id",
                "name",
                "start_time_unix_nano",
                "time_unix_nano",
                "count",
                "sum",
                "quantile_values",
                "flags"
            ]
        );
        assert_eq!(batch.num_rows(), 1);
    }
}
