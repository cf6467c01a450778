// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Data-point records.
//!
//! Each metric type gets its own record, built in three steps: append into a
//! plain accumulator while walking the batch, sort by (metric name, parent
//! id, timestamp), then assign IDs `0..N-1` in sorted order and emit the
//! rows. The sort is what makes the ID column delta-encodable with a
//! maximum delta of 1 and clusters same-metric rows for dictionary and
//! run-length wins.
//!
//! Emission is non-destructive: when a dictionary overflow fails the
//! materialization, the accumulator still holds the batch and the producer
//! replays it against the updated schema.

pub mod exp_histogram;
pub mod histogram;
pub mod number;
pub mod summary;

use arrow::array::{
    ArrayRef, Float64Builder, ListBuilder, PrimitiveDictionaryBuilder, UInt64Builder,
};
use arrow::datatypes::{
    DataType, Field, Int32Type, TimeUnit, TimestampNanosecondType, UInt8Type, UInt16Type,
    UInt32Type,
};
use std::sync::Arc;

use super::state::SchemaState;
use crate::encode::array::{
    AdaptiveStringBuilder, BooleanColumnBuilder, PrimitiveColumnBuilder, U32DeltaBuilder,
};
use crate::encode::shared::SharedValues;
use crate::otlp::metrics::AggregationTemporality;
use crate::schema::update::{DictIndex, SchemaUpdate};
use crate::schema::{consts, delta_encoded, optional};

/// The metric-level scalars a data-point row denormalizes. Copied out of the
/// metric at append time so the accumulator carries no reference to the
/// optimizer output beyond the borrowed strings.
#[derive(Debug, Clone, Copy)]
pub struct MetricIdentity<'a> {
    /// The metric name.
    pub name: &'a str,
    /// The metric description.
    pub description: &'a str,
    /// The metric unit.
    pub unit: &'a str,
    /// The aggregation temporality, for sums and histograms.
    pub temporality: Option<AggregationTemporality>,
    /// Monotonicity, for sums.
    pub monotonic: Option<bool>,
}

/// Dictionary-encoded aggregation-temporality column. Unspecified values are
/// stored as null, never as zero.
pub(crate) struct TemporalityBuilder {
    inner: PrimitiveDictionaryBuilder<UInt8Type, Int32Type>,
    non_null: usize,
}

impl TemporalityBuilder {
    fn new() -> Self {
        Self {
            inner: PrimitiveDictionaryBuilder::new(),
            non_null: 0,
        }
    }

    fn append(&mut self, value: Option<AggregationTemporality>) {
        match value {
            None | Some(AggregationTemporality::Unspecified) => self.inner.append_null(),
            Some(t) => {
                // three possible values can never overflow the u8 keys
                let _ = self.inner.append(t as i32);
                self.non_null += 1;
            }
        }
    }

    fn has_values(&self) -> bool {
        self.non_null > 0
    }

    fn data_type(&self) -> DataType {
        DataType::Dictionary(Box::new(DataType::UInt8), Box::new(DataType::Int32))
    }

    fn finish(&mut self) -> ArrayRef {
        self.non_null = 0;
        Arc::new(self.inner.finish())
    }
}

/// `list<u64>` column; empty lists are stored as null.
pub(crate) struct U64ListBuilder {
    inner: ListBuilder<UInt64Builder>,
    non_null: usize,
}

impl U64ListBuilder {
    pub(crate) fn new() -> Self {
        Self {
            inner: ListBuilder::new(UInt64Builder::new()),
            non_null: 0,
        }
    }

    pub(crate) fn append(&mut self, values: &[u64]) {
        if values.is_empty() {
            self.inner.append(false);
            return;
        }
        self.inner.values().append_slice(values);
        self.inner.append(true);
        self.non_null += 1;
    }

    pub(crate) fn has_values(&self) -> bool {
        self.non_null > 0
    }

    pub(crate) fn data_type(&self) -> DataType {
        DataType::List(Arc::new(Field::new("item", DataType::UInt64, true)))
    }

    pub(crate) fn finish(&mut self) -> ArrayRef {
        self.non_null = 0;
        Arc::new(self.inner.finish())
    }
}

/// `list<f64>` column; empty lists are stored as null.
pub(crate) struct F64ListBuilder {
    inner: ListBuilder<Float64Builder>,
    non_null: usize,
}

impl F64ListBuilder {
    pub(crate) fn new() -> Self {
        Self {
            inner: ListBuilder::new(Float64Builder::new()),
            non_null: 0,
        }
    }

    pub(crate) fn append(&mut self, values: &[f64]) {
        if values.is_empty() {
            self.inner.append(false);
            return;
        }
        self.inner.values().append_slice(values);
        self.inner.append(true);
        self.non_null += 1;
    }

    pub(crate) fn has_values(&self) -> bool {
        self.non_null > 0
    }

    pub(crate) fn data_type(&self) -> DataType {
        DataType::List(Arc::new(Field::new("item", DataType::Float64, true)))
    }

    pub(crate) fn finish(&mut self) -> ArrayRef {
        self.non_null = 0;
        Arc::new(self.inner.finish())
    }
}

/// The columns every data-point record starts with: the delta-encoded row
/// ID, the parent metric ID, the denormalized metric identity and the
/// timing columns.
pub(crate) struct DpCommonColumns {
    id: U32DeltaBuilder,
    parent_id: PrimitiveColumnBuilder<UInt16Type>,
    name: AdaptiveStringBuilder,
    description: AdaptiveStringBuilder,
    unit: AdaptiveStringBuilder,
    temporality: TemporalityBuilder,
    monotonic: BooleanColumnBuilder,
    start_time: PrimitiveColumnBuilder<TimestampNanosecondType>,
    time: PrimitiveColumnBuilder<TimestampNanosecondType>,
}

impl DpCommonColumns {
    pub(crate) fn new(state: &SchemaState) -> Self {
        let max_card = state.max_card();
        Self {
            id: U32DeltaBuilder::new(consts::ID, 1, state.delta_enabled(consts::ID)),
            parent_id: PrimitiveColumnBuilder::new(),
            name: AdaptiveStringBuilder::new(
                consts::NAME,
                state.dict_index(consts::NAME, DictIndex::U8),
                max_card,
            ),
            description: AdaptiveStringBuilder::new(
                consts::DESCRIPTION,
                state.dict_index(consts::DESCRIPTION, DictIndex::U8),
                max_card,
            ),
            unit: AdaptiveStringBuilder::new(
                consts::UNIT,
                state.dict_index(consts::UNIT, DictIndex::U8),
                max_card,
            ),
            temporality: TemporalityBuilder::new(),
            monotonic: BooleanColumnBuilder::new(),
            start_time: PrimitiveColumnBuilder::new(),
            time: PrimitiveColumnBuilder::new(),
        }
    }

    /// Append the ID, parent and identity columns for one row.
    pub(crate) fn append_identity(&mut self, id: u32, parent_id: u16, metric: &MetricIdentity<'_>) {
        self.id.append(id);
        self.parent_id.append_value(parent_id);
        self.name.append_non_empty(metric.name);
        self.description.append_non_empty(metric.description);
        self.unit.append_non_empty(metric.unit);
        self.temporality.append(metric.temporality);
        self.monotonic.append_option(metric.monotonic);
    }

    /// Append the timing columns for one row. Values hoisted to an outer
    /// level arrive here as `None` and are stored as null.
    pub(crate) fn append_times(&mut self, start_time: Option<u64>, time: Option<u64>) {
        match start_time {
            Some(v) if v != 0 => self.start_time.append_value(v as i64),
            _ => self.start_time.append_null(),
        }
        match time {
            Some(v) if v != 0 => self.time.append_value(v as i64),
            _ => self.time.append_null(),
        }
    }

    /// Timing values for one point, with hoisted levels removed.
    pub(crate) fn point_times(
        hoisted: &SharedValues<'_>,
        start_time: u64,
        time: u64,
    ) -> (Option<u64>, Option<u64>) {
        let start = if hoisted.start_time.is_some() {
            None
        } else {
            Some(start_time)
        };
        let time = if hoisted.time.is_some() {
            None
        } else {
            Some(time)
        };
        (start, time)
    }

    pub(crate) fn updates(&self) -> Vec<SchemaUpdate> {
        [
            self.id.update(),
            self.name.update(),
            self.description.update(),
            self.unit.update(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// Push the present common fields and columns, in declared order.
    pub(crate) fn finish_into(&mut self, fields: &mut Vec<Field>, columns: &mut Vec<ArrayRef>) {
        let id_field = Field::new(consts::ID, DataType::UInt32, false);
        fields.push(if self.id.is_delta_encoded() {
            delta_encoded(id_field)
        } else {
            id_field
        });
        columns.push(self.id.finish());

        fields.push(Field::new(consts::PARENT_ID, DataType::UInt16, false));
        columns.push(self.parent_id.finish());

        fields.push(Field::new(consts::NAME, self.name.data_type(), true));
        columns.push(self.name.finish());

        if self.description.has_values() {
            fields.push(optional(Field::new(
                consts::DESCRIPTION,
                self.description.data_type(),
                true,
            )));
            columns.push(self.description.finish());
        }
        if self.unit.has_values() {
            fields.push(optional(Field::new(
                consts::UNIT,
                self.unit.data_type(),
                true,
            )));
            columns.push(self.unit.finish());
        }
        if self.temporality.has_values() {
            fields.push(optional(Field::new(
                consts::AGGREGATION_TEMPORALITY,
                self.temporality.data_type(),
                true,
            )));
            columns.push(self.temporality.finish());
        }
        if self.monotonic.has_values() {
            fields.push(optional(Field::new(
                consts::IS_MONOTONIC,
                DataType::Boolean,
                true,
            )));
            columns.push(self.monotonic.finish());
        }
        if self.start_time.has_values() {
            fields.push(optional(Field::new(
                consts::START_TIME_UNIX_NANO,
                DataType::Timestamp(TimeUnit::Nanosecond, None),
                true,
            )));
            columns.push(self.start_time.finish());
        }
        if self.time.has_values() {
            fields.push(optional(Field::new(
                consts::TIME_UNIX_NANO,
                DataType::Timestamp(TimeUnit::Nanosecond, None),
                true,
            )));
            columns.push(self.time.finish());
        }
    }
}

/// Flags column helper shared by the data-point records.
pub(crate) fn flags_column(
    flags: &mut PrimitiveColumnBuilder<UInt32Type>,
    fields: &mut Vec<Field>,
    columns: &mut Vec<ArrayRef>,
) {
    if flags.has_values() {
        fields.push(optional(Field::new(consts::FLAGS, DataType::UInt32, true)));
        columns.push(flags.finish());
    }
}
