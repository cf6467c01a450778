// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Number data-point records (gauges and sums, integer and double).
//!
//! Gauge and sum points are routed to one of four payloads by metric type
//! and by each point's value variant: `INT_GAUGE`, `DOUBLE_GAUGE`,
//! `INT_SUM`, `DOUBLE_SUM`.

use arrow::array::{ArrayRef, RecordBatch};
use arrow::datatypes::{Field, Schema, UInt32Type};
use std::sync::Arc;

use super::super::anyvalue::{MetricValueBuilder, metric_value_data_type};
use super::super::attributes::AttributesAccumulator;
use super::super::exemplars::ExemplarsBuilder;
use super::super::state::SchemaState;
use super::{DpCommonColumns, MetricIdentity};
use crate::encode::array::PrimitiveColumnBuilder;
use crate::encode::shared::SharedValues;
use crate::error::{Error, Result};
use crate::otlp::metrics::NumberDataPoint;
use crate::payload::PayloadType;
use crate::schema::update::SchemaUpdate;
use crate::schema::{consts, optional, schema_id};

/// One buffered number point.
pub struct NumberDpEntry<'a> {
    /// ID of the metric row in the main record.
    pub parent_id: u16,
    /// Denormalized metric scalars.
    pub metric: MetricIdentity<'a>,
    /// The point itself.
    pub point: &'a NumberDataPoint,
}

/// Accumulator for one number payload type.
pub struct NumberDpAccumulator<'a> {
    entries: Vec<NumberDpEntry<'a>>,
}

impl<'a> NumberDpAccumulator<'a> {
    /// An empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Buffer one point.
    pub fn append(&mut self, entry: NumberDpEntry<'a>) {
        self.entries.push(entry);
    }

    /// Number of buffered points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Sort, assign IDs in sorted order, and append every row into the
    /// record builder, forwarding each row's attributes under its assigned
    /// ID. Non-destructive: a schema-not-up-to-date failure leaves the
    /// accumulator intact for the replay.
    pub fn emit(
        &mut self,
        hoisted: &[SharedValues<'_>],
        builder: &mut NumberDataPointsBuilder,
        attrs: &mut AttributesAccumulator<'a, u32>,
    ) -> Result<()> {
        if self.entries.len() > u32::MAX as usize {
            return Err(Error::DataPointCountOverflow {
                payload_type: builder.payload_type(),
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

impl Default for NumberDpAccumulator<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Record builder for one number payload type.
pub struct NumberDataPointsBuilder {
    payload_type: PayloadType,
    state: SchemaState,
    common: DpCommonColumns,
    value: MetricValueBuilder,
    exemplars: ExemplarsBuilder,
    flags: PrimitiveColumnBuilder<UInt32Type>,
}

impl NumberDataPointsBuilder {
    /// A builder for the given number payload type.
    #[must_use]
    pub fn new(payload_type: PayloadType, max_card: u32) -> Self {
        let state = SchemaState::new(max_card);
        let common = DpCommonColumns::new(&state);
        let exemplars = ExemplarsBuilder::new(&state);
        Self {
            payload_type,
            state,
            common,
            value: MetricValueBuilder::new(),
            exemplars,
            flags: PrimitiveColumnBuilder::new(),
        }
    }

    /// The payload type this builder produces.
    #[must_use]
    pub fn payload_type(&self) -> PayloadType {
        self.payload_type
    }

    /// Number of rows appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.value.len()
    }

    fn append(
        &mut self,
        id: u32,
        entry: &NumberDpEntry<'_>,
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
        self.value.append(entry.point.value);
        self.exemplars.append(&entry.point.exemplars)?;
        self.flags.append_non_zero(entry.point.flags);
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
                payload_type: self.payload_type,
                fields,
            });
        }

        let mut fields = Vec::new();
        let mut columns: Vec<ArrayRef> = Vec::new();
        self.common.finish_into(&mut fields, &mut columns);

        fields.push(Field::new(consts::VALUE, metric_value_data_type(), false));
        columns.push(self.value.finish(consts::VALUE)?);

        if self.exemplars.has_values() {
            fields.push(optional(Field::new(
                consts::EXEMPLARS,
                self.exemplars.data_type(),
                true,
            )));
            columns.push(self.exemplars.finish(consts::EXEMPLARS)?);
        }
        super::flags_column(&mut self.flags, &mut fields, &mut columns);

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
        self.common = DpCommonColumns::new(&self.state);
        self.value = MetricValueBuilder::new();
        self.exemplars = ExemplarsBuilder::new(&self.state);
        self.flags = PrimitiveColumnBuilder::new();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::otlp::common::{AnyValue, KeyValue};
    use arrow::array::UInt32Array;

    fn identity(name: &'static str) -> MetricIdentity<'static> {
        MetricIdentity {
            name,
            description: "",
            unit: "",
            temporality: None,
            monotonic: None,
        }
    }

    #[test]
    fn test_ids_are_assigned_in_sorted_order() {
        let p1 = NumberDataPoint::new_int(9, 1);
        let p2 = NumberDataPoint::new_int(3, 2);
        let p3 = NumberDataPoint::new_int(5, 3);

        let mut acc = NumberDpAccumulator::new();
        // out of order on (name, time)
        acc.append(NumberDpEntry {
            parent_id: 1,
            metric: identity("zz"),
            point: &p1,
        });
        acc.append(NumberDpEntry {
            parent_id: 0,
            metric: identity("aa"),
            point: &p2,
        });
        acc.append(NumberDpEntry {
            parent_id: 0,
            metric: identity("aa"),
            point: &p3,
        });

        let hoisted = vec![SharedValues::default(), SharedValues::default()];
        let mut builder = NumberDataPointsBuilder::new(PayloadType::IntGauge, u16::MAX as u32);
        let mut attrs = AttributesAccumulator::new();
        acc.emit(&hoisted, &mut builder, &mut attrs).unwrap();
        let (batch, _) = builder.finish().unwrap();

        // delta-encoded id column: first value raw, then unit deltas
        let ids = batch
            .column(0)
            .as_any()
            .downcast_ref::<UInt32Array>()
            .unwrap();
        assert_eq!(ids.values().as_ref(), &[0, 1, 1]);

        let parents = batch
            .column(1)
            .as_any()
            .downcast_ref::<arrow::array::UInt16Array>()
            .unwrap();
        assert_eq!(parents.values().as_ref(), &[0, 0, 1]);
    }

    #[test]
    fn test_hoisted_attributes_are_not_forwarded() {
        let attrs_point = vec![
            KeyValue::new("shared", AnyValue::new_string("s")),
            KeyValue::new("own", AnyValue::new_int(1)),
        ];
        let point = NumberDataPoint {
            attributes: attrs_point,
            ..NumberDataPoint::new_int(5, 1)
        };

        let mut hoisted = SharedValues::default();
        let shared_value = AnyValue::new_string("s");
        let _ = hoisted.attributes.insert("shared", &shared_value);

        let mut acc = NumberDpAccumulator::new();
        acc.append(NumberDpEntry {
            parent_id: 0,
            metric: identity("m"),
            point: &point,
        });

        let mut builder = NumberDataPointsBuilder::new(PayloadType::IntSum, u16::MAX as u32);
        let mut attrs = AttributesAccumulator::<u32>::new();
        acc.emit(&[hoisted], &mut builder, &mut attrs).unwrap();
        assert_eq!(attrs.len(), 1);
    }

    #[test]
    fn test_gauge_record_elides_sum_only_columns() {
        let point = NumberDataPoint::new_double(5, 1.5);
        let mut acc = NumberDpAccumulator::new();
        acc.append(NumberDpEntry {
            parent_id: 0,
            metric: identity("g"),
            point: &point,
        });

        let mut builder = NumberDataPointsBuilder::new(PayloadType::DoubleGauge, u16::MAX as u32);
        let mut attrs = AttributesAccumulator::<u32>::new();
        acc.emit(&[SharedValues::default()], &mut builder, &mut attrs)
            .unwrap();
        let (batch, _) = builder.finish().unwrap();
        let schema = batch.schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(
            names,
            vec!["id", "parent_id", "name", "time_unix_nano", "value"]
        );
    }
}
