// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Exponential-histogram data-point record.

use arrow::array::{ArrayRef, NullBufferBuilder, RecordBatch, StructArray};
use arrow::datatypes::{
    DataType, Field, Fields, Float64Type, Int32Type, Schema, UInt32Type, UInt64Type,
};
use std::sync::Arc;

use super::super::attributes::AttributesAccumulator;
use super::super::exemplars::ExemplarsBuilder;
use super::super::state::SchemaState;
use super::{DpCommonColumns, MetricIdentity, U64ListBuilder};
use crate::encode::array::PrimitiveColumnBuilder;
use crate::encode::shared::SharedValues;
use crate::error::{Error, Result};
use crate::otlp::metrics::{Buckets, ExponentialHistogramDataPoint};
use crate::payload::PayloadType;
use crate::schema::update::SchemaUpdate;
use crate::schema::{consts, optional, schema_id};

/// One buffered exponential-histogram point.
pub struct ExpHistogramDpEntry<'a> {
    /// ID of the metric row in the main record.
    pub parent_id: u16,
    /// Denormalized metric scalars.
    pub metric: MetricIdentity<'a>,
    /// The point itself.
    pub point: &'a ExponentialHistogramDataPoint,
}

/// Accumulator for the exponential-histogram payload.
#[derive(Default)]
pub struct ExpHistogramDpAccumulator<'a> {
    entries: Vec<ExpHistogramDpEntry<'a>>,
}

impl<'a> ExpHistogramDpAccumulator<'a> {
    /// An empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer one point.
    pub fn append(&mut self, entry: ExpHistogramDpEntry<'a>) {
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
        builder: &mut ExpHistogramDataPointsBuilder,
        attrs: &mut AttributesAccumulator<'a, u32>,
    ) -> Result<()> {
        if self.entries.len() > u32::MAX as usize {
            return Err(Error::DataPointCountOverflow {
                payload_type: PayloadType::ExpHistogram,
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
            builder.append(id, entry, shared)?;
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

/// `struct{offset, bucket_counts}` column for one bucket range.
struct BucketsColumnBuilder {
    path: &'static str,
    validity: NullBufferBuilder,
    offset: PrimitiveColumnBuilder<Int32Type>,
    counts: U64ListBuilder,
    non_null: usize,
}

impl BucketsColumnBuilder {
    fn new(path: &'static str) -> Self {
        Self {
            path,
            validity: NullBufferBuilder::new(0),
            offset: PrimitiveColumnBuilder::new(),
            counts: U64ListBuilder::new(),
            non_null: 0,
        }
    }

    fn fields(&self) -> Fields {
        Fields::from(vec![
            Field::new(consts::OFFSET, DataType::Int32, true),
            Field::new(consts::BUCKET_COUNTS, self.counts.data_type(), true),
        ])
    }

    fn data_type(&self) -> DataType {
        DataType::Struct(self.fields())
    }

    fn append(&mut self, buckets: Option<&Buckets>) {
        match buckets {
            Some(buckets) => {
                self.offset.append_value(buckets.offset);
                self.counts.append(&buckets.bucket_counts);
                self.validity.append_non_null();
                self.non_null += 1;
            }
            None => {
                self.offset.append_null();
                self.counts.append(&[]);
                self.validity.append_null();
            }
        }
    }

    fn has_values(&self) -> bool {
        self.non_null > 0
    }

    fn finish(&mut self) -> Result<ArrayRef> {
        let fields = self.fields();
        let arrays = vec![self.offset.finish(), self.counts.finish()];
        let nulls = self.validity.finish();
        self.non_null = 0;
        let array =
            StructArray::try_new(fields, arrays, nulls).map_err(|source| Error::BuildArray {
                name: self.path.to_owned(),
                source,
            })?;
        Ok(Arc::new(array))
    }
}

/// Record builder for the exponential-histogram payload.
pub struct ExpHistogramDataPointsBuilder {
    state: SchemaState,
    common: DpCommonColumns,
    count: PrimitiveColumnBuilder<UInt64Type>,
    sum: PrimitiveColumnBuilder<Float64Type>,
    scale: PrimitiveColumnBuilder<Int32Type>,
    zero_count: PrimitiveColumnBuilder<UInt64Type>,
    positive: BucketsColumnBuilder,
    negative: BucketsColumnBuilder,
    exemplars: ExemplarsBuilder,
    flags: PrimitiveColumnBuilder<UInt32Type>,
    min: PrimitiveColumnBuilder<Float64Type>,
    max: PrimitiveColumnBuilder<Float64Type>,
}

impl ExpHistogramDataPointsBuilder {
    /// A builder for the exponential-histogram payload.
    #[must_use]
    pub fn new(max_card: u32) -> Self {
        let state = SchemaState::new(max_card);
        let common = DpCommonColumns::new(&state);
        let exemplars = ExemplarsBuilder::new(&state);
        Self {
            state,
            common,
            count: PrimitiveColumnBuilder::new(),
            sum: PrimitiveColumnBuilder::new(),
            scale: PrimitiveColumnBuilder::new(),
            zero_count: PrimitiveColumnBuilder::new(),
            positive: BucketsColumnBuilder::new(consts::POSITIVE),
            negative: BucketsColumnBuilder::new(consts::NEGATIVE),
            exemplars,
            flags: PrimitiveColumnBuilder::new(),
            min: PrimitiveColumnBuilder::new(),
            max: PrimitiveColumnBuilder::new(),
        }
    }

    /// Number of rows appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count.len()
    }

    fn append(
        &mut self,
        id: u32,
        entry: &ExpHistogramDpEntry<'_>,
        hoisted: &SharedValues<'_>,
    ) -> Result<()> {
        self.common
            .append_identity(id, entry.parent_id, &entry.metric);
        let (start, time) = DpCommonColumns::point_times(
            hoisted,
            entry.point.start_time_unix_nano,
            entry.point.time_unix_nano,
        );
        self.common.append_times(start, time);
        self.count.append_non_zero(entry.point.count);
        self.sum.append_option(entry.point.sum);
        self.scale.append_non_zero(entry.point.scale);
        self.zero_count.append_non_zero(entry.point.zero_count);
        self.positive.append(entry.point.positive.as_ref());
        self.negative.append(entry.point.negative.as_ref());
        self.exemplars.append(&entry.point.exemplars)?;
        self.flags.append_non_zero(entry.point.flags);
        self.min.append_option(entry.point.min);
        self.max.append_option(entry.point.max);
        Ok(())
    }

    /// Materialize the record, or fail with a schema-not-up-to-date signal.
    pub fn finish(&mut self) -> Result<(RecordBatch, String)> {
        let updates: Vec<SchemaUpdate> = self
            .common
            .updates()
            .into_iter()
            .chain(self.exemplars.updates())
            .collect();
        if !updates.is_empty() {
            let fields = self.state.apply(&updates);
            return Err(Error::SchemaNotUpToDate {
                payload_type: PayloadType::ExpHistogram,
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
        if self.scale.has_values() {
            fields.push(optional(Field::new(consts::SCALE, DataType::Int32, true)));
            columns.push(self.scale.finish());
        }
        if self.zero_count.has_values() {
            fields.push(optional(Field::new(
                consts::ZERO_COUNT,
                DataType::UInt64,
                true,
            )));
            columns.push(self.zero_count.finish());
        }
        if self.positive.has_values() {
            fields.push(optional(Field::new(
                consts::POSITIVE,
                self.positive.data_type(),
                true,
            )));
            columns.push(self.positive.finish()?);
        }
        if self.negative.has_values() {
            fields.push(optional(Field::new(
                consts::NEGATIVE,
                self.negative.data_type(),
                true,
            )));
            columns.push(self.negative.finish()?);
        }
        if self.exemplars.has_values() {
            fields.push(optional(Field::new(
                consts::EXEMPLARS,
                self.exemplars.data_type(),
                true,
            )));
            columns.push(self.exemplars.finish(consts::EXEMPLARS)?);
        }
        super::flags_column(&mut self.flags, &mut fields, &mut columns);
        if self.min.has_values() {
            fields.push(optional(Field::new(consts::MIN, DataType::Float64, true)));
            columns.push(self.min.finish());
        }
        if self.max.has_values() {
            fields.push(optional(Field::new(consts::MAX, DataType::Float64, true)));
            columns.push(self.max.finish());
        }

        let schema = Arc::new(Schema::new(fields));
        let id = schema_id(&schema);
        let batch =
            RecordBatch::try_new(schema, columns).map_err(|source| Error::BuildRecordBatch {
                payload_type: PayloadType::ExpHistogram,
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
        self.scale = PrimitiveColumnBuilder::new();
        self.zero_count = PrimitiveColumnBuilder::new();
        self.positive = BucketsColumnBuilder::new(consts::POSITIVE);
        self.negative = BucketsColumnBuilder::new(consts::NEGATIVE);
        self.exemplars = ExemplarsBuilder::new(&self.state);
        self.flags = PrimitiveColumnBuilder::new();
        self.min = PrimitiveColumnBuilder::new();
        self.max = PrimitiveColumnBuilder::new();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::otlp::metrics::AggregationTemporality;

    #[test]
    fn test_exp_histogram_record_shape() {
        let point = ExponentialHistogramDataPoint {
            start_time_unix_nano: 234,
            time_unix_nano: 345,
            count: 9999,
            sum: Some(123.0),
            scale: 67,
            zero_count: 7,
            positive: Some(Buckets::new(2, vec![34, 45, 67])),
            negative: None,
            flags: 5,
            min: Some(4.0),
            max: Some(44.0),
            ..Default::default()
        };
        let mut acc = ExpHistogramDpAccumulator::new();
        acc.append(ExpHistogramDpEntry {
            parent_id: 0,
            metric: MetricIdentity {
                name: "exp hist",
                description: "",
                unit: "",
                temporality: Some(AggregationTemporality::Cumulative),
                monotonic: None,
            },
            point: &point,
        });

        let mut builder = ExpHistogramDataPointsBuilder::new(u16::MAX as u32);
        let mut attrs = AttributesAccumulator::<u32>::new();
        acc.emit(&[SharedValues::default()], &mut builder, &mut attrs)
            .unwrap();
        let (batch, _) = builder.finish().unwrap();
        assert_eq!(batch.num_rows(), 1);

        let schema = batch.schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        // negative buckets never appeared, so the column is elided
        assert!(!names.contains(&"negative"));
        assert!(names.contains(&"positive"));
        assert!(names.contains(&"zero_count"));
    }
}
