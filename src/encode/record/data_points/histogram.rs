// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Histogram data-point record.

use arrow::array::{ArrayRef, RecordBatch};
use arrow::datatypes::{DataType, Field, Float64Type, Schema, UInt32Type, UInt64Type};
use std::sync::Arc;

use super::super::attributes::AttributesAccumulator;
use super::super::exemplars::ExemplarsBuilder;
use super::super::state::SchemaState;
use super::{DpCommonColumns, F64ListBuilder, MetricIdentity, U64ListBuilder};
use crate::encode::array::PrimitiveColumnBuilder;
use crate::encode::shared::SharedValues;
use crate::error::{Error, Result};
use crate::otlp::metrics::HistogramDataPoint;
use crate::payload::PayloadType;
use crate::schema::update::SchemaUpdate;
use crate::schema::{consts, optional, schema_id};

/// One buffered histogram point.
pub struct HistogramDpEntry<'a> {
    /// ID of the metric row in the main record.
    pub parent_id: u16,
    /// Denormalized metric scalars.
    pub metric: MetricIdentity<'a>,
    /// The point itself.
    pub point: &'a HistogramDataPoint,
}

/// Accumulator for the histogram payload.
#[derive(Default)]
pub struct HistogramDpAccumulator<'a> {
    entries: Vec<HistogramDpEntry<'a>>,
}

impl<'a> HistogramDpAccumulator<'a> {
    /// An empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer one point.
    pub fn append(&mut self, entry: HistogramDpEntry<'a>) {
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
        builder: &mut HistogramDataPointsBuilder,
        attrs: &mut AttributesAccumulator<'a, u32>,
    ) -> Result<()> {
        if self.entries.len() > u32::MAX as usize {
            return Err(Error::DataPointCountOverflow {
                payload_type: PayloadType::Histogram,
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

/// Record builder for the histogram payload.
pub struct HistogramDataPointsBuilder {
    state: SchemaState,
    common: DpCommonColumns,
    count: PrimitiveColumnBuilder<UInt64Type>,
    sum: PrimitiveColumnBuilder<Float64Type>,
    bucket_counts: U64ListBuilder,
    explicit_bounds: F64ListBuilder,
    exemplars: ExemplarsBuilder,
    flags: PrimitiveColumnBuilder<UInt32Type>,
    min: PrimitiveColumnBuilder<Float64Type>,
    max: PrimitiveColumnBuilder<Float64Type>,
}

impl HistogramDataPointsBuilder {
    /// A builder for the histogram payload.
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
            bucket_counts: U64ListBuilder::new(),
            explicit_bounds: F64ListBuilder::new(),
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
        entry: &HistogramDpEntry<'_>,
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
        self.bucket_counts.append(&entry.point.bucket_counts);
        self.explicit_bounds.append(&entry.point.explicit_bounds);
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
                payload_type: PayloadType::Histogram,
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
        if self.bucket_counts.has_values() {
            fields.push(optional(Field::new(
                consts::BUCKET_COUNTS,
                self.bucket_counts.data_type(),
                true,
            )));
            columns.push(self.bucket_counts.finish());
        }
        if self.explicit_bounds.has_values() {
            fields.push(optional(Field::new(
                consts::EXPLICIT_BOUNDS,
                self.explicit_bounds.data_type(),
                true,
            )));
            columns.push(self.explicit_bounds.finish());
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
                payload_type: PayloadType::Histogram,
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
        self.bucket_counts = U64ListBuilder::new();
        self.explicit_bounds = F64ListBuilder::new();
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
    fn test_min_equal_max_round_trip_shape() {
        let point = HistogramDataPoint {
            time_unix_nano: 10,
            count: 1,
            sum: Some(2.5),
            bucket_counts: vec![0, 1, 0],
            explicit_bounds: vec![1.0, 2.0],
            min: Some(2.5),
            max: Some(2.5),
            ..Default::default()
        };
        let mut acc = HistogramDpAccumulator::new();
        acc.append(HistogramDpEntry {
            parent_id: 0,
            metric: MetricIdentity {
                name: "h",
                description: "",
                unit: "",
                temporality: Some(AggregationTemporality::Delta),
                monotonic: None,
            },
            point: &point,
        });

        let mut builder = HistogramDataPointsBuilder::new(u16::MAX as u32);
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
                "aggregation_temporality",
                "time_unix_nano",
                "count",
                "sum",
                "bucket_counts",
                "explicit_bounds",
                "min",
                "max"
            ]
        );
    }
}
