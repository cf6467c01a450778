// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Readers for the data-point records.
//!
//! Each reader walks its record row by row (rows are in assigned-ID order),
//! resolves per-point attributes through the bound attribute store, and
//! returns plain rows for the main decoder to group by parent metric.

use arrow::array::{Array, ListArray, RecordBatch, StructArray};

use super::attributes::{AttributeStore, read_attrs_map, read_number_value};
use crate::arrays;
use crate::error::{Error, Result};
use crate::otlp::metrics::{
    AggregationTemporality, Buckets, Exemplar, ExponentialHistogramDataPoint, HistogramDataPoint,
    NumberDataPoint, SummaryDataPoint, ValueAtQuantile,
};
use crate::schema::consts;

/// The metric-level scalars denormalized onto a data-point row.
#[derive(Debug, Clone, Default)]
pub(crate) struct MetricInfo {
    pub name: String,
    pub description: String,
    pub unit: String,
    pub temporality: Option<AggregationTemporality>,
    pub monotonic: Option<bool>,
}

pub(crate) struct NumberRow {
    pub parent_id: u16,
    pub info: MetricInfo,
    pub point: NumberDataPoint,
}

pub(crate) struct SummaryRow {
    pub parent_id: u16,
    pub info: MetricInfo,
    pub point: SummaryDataPoint,
}

pub(crate) struct HistogramRow {
    pub parent_id: u16,
    pub info: MetricInfo,
    pub point: HistogramDataPoint,
}

pub(crate) struct ExpHistogramRow {
    pub parent_id: u16,
    pub info: MetricInfo,
    pub point: ExponentialHistogramDataPoint,
}

/// Shared per-row machinery for the common columns.
struct CommonReader<'a> {
    ids: Vec<u32>,
    parents: &'a arrow::array::UInt16Array,
    name: arrays::StrCol<'a>,
    description: Option<arrays::StrCol<'a>>,
    unit: Option<arrays::StrCol<'a>>,
    temporality: Option<&'a arrow::array::ArrayRef>,
    monotonic: Option<&'a arrow::array::BooleanArray>,
    start_time: Option<&'a arrow::array::TimestampNanosecondArray>,
    time: Option<&'a arrow::array::TimestampNanosecondArray>,
}

impl<'a> CommonReader<'a> {
    fn read(batch: &'a RecordBatch) -> Result<Self> {
        let schema = batch.schema_ref();
        let (id_idx, id_field) =
            schema
                .column_with_name(consts::ID)
                .ok_or_else(|| Error::ColumnNotFound {
                    name: consts::ID.to_owned(),
                })?;
        let ids = arrays::read_u32_ids(id_field, batch.column(id_idx).as_ref())?;

        let parents = arrays::as_u16(
            consts::PARENT_ID,
            arrays::column(batch, consts::PARENT_ID)?.as_ref(),
        )?;
        let name = arrays::str_col(consts::NAME, arrays::column(batch, consts::NAME)?.as_ref())?;
        let description = match arrays::maybe_column(batch, consts::DESCRIPTION) {
            Some(col) => Some(arrays::str_col(consts::DESCRIPTION, col.as_ref())?),
            None => None,
        };
        let unit = match arrays::maybe_column(batch, consts::UNIT) {
            Some(col) => Some(arrays::str_col(consts::UNIT, col.as_ref())?),
            None => None,
        };
        let temporality = arrays::maybe_column(batch, consts::AGGREGATION_TEMPORALITY);
        let monotonic = match arrays::maybe_column(batch, consts::IS_MONOTONIC) {
            Some(col) => Some(arrays::as_bool(consts::IS_MONOTONIC, col.as_ref())?),
            None => None,
        };
        let start_time = match arrays::maybe_column(batch, consts::START_TIME_UNIX_NANO) {
            Some(col) => Some(arrays::as_timestamp(
                consts::START_TIME_UNIX_NANO,
                col.as_ref(),
            )?),
            None => None,
        };
        let time = match arrays::maybe_column(batch, consts::TIME_UNIX_NANO) {
            Some(col) => Some(arrays::as_timestamp(consts::TIME_UNIX_NANO, col.as_ref())?),
            None => None,
        };
        Ok(Self {
            ids,
            parents,
            name,
            description,
            unit,
            temporality,
            monotonic,
            start_time,
            time,
        })
    }

    fn info(&self, row: usize) -> Result<MetricInfo> {
        let temporality = match self.temporality {
            Some(col) => {
                arrays::dict_i32_value(consts::AGGREGATION_TEMPORALITY, col.as_ref(), row)?
                    .map(AggregationTemporality::from_wire)
            }
            None => None,
        };
        Ok(MetricInfo {
            name: self.name.value(row).unwrap_or_default().to_owned(),
            description: self
                .description
                .as_ref()
                .and_then(|col| col.value(row))
                .unwrap_or_default()
                .to_owned(),
            unit: self
                .unit
                .as_ref()
                .and_then(|col| col.value(row))
                .unwrap_or_default()
                .to_owned(),
            temporality,
            monotonic: self.monotonic.and_then(|col| {
                if col.is_null(row) {
                    None
                } else {
                    Some(col.value(row))
                }
            }),
        })
    }

    fn times(&self, row: usize) -> (u64, u64) {
        let start = self
            .start_time
            .filter(|col| col.is_valid(row))
            .map(|col| col.value(row) as u64)
            .unwrap_or(0);
        let time = self
            .time
            .filter(|col| col.is_valid(row))
            .map(|col| col.value(row) as u64)
            .unwrap_or(0);
        (start, time)
    }
}

fn opt_f64(batch: &RecordBatch, name: &'static str) -> Result<Option<arrow::array::Float64Array>> {
    match arrays::maybe_column(batch, name) {
        Some(col) => Ok(Some(arrays::as_f64(name, col.as_ref())?.clone())),
        None => Ok(None),
    }
}

fn f64_at(col: &Option<arrow::array::Float64Array>, row: usize) -> Option<f64> {
    col.as_ref()
        .filter(|col| col.is_valid(row))
        .map(|col| col.value(row))
}

fn opt_u64_value(batch: &RecordBatch, name: &'static str, row: usize) -> Result<u64> {
    match arrays::maybe_column(batch, name) {
        Some(col) => {
            let col = arrays::as_u64(name, col.as_ref())?;
            Ok(if col.is_null(row) { 0 } else { col.value(row) })
        }
        None => Ok(0),
    }
}

fn read_exemplars_at(list: Option<&ListArray>, row: usize) -> Result<Vec<Exemplar>> {
    let Some(list) = list else {
        return Ok(Vec::new());
    };
    if list.is_null(row) {
        return Ok(Vec::new());
    }
    let value = list.value(row);
    let entries = arrays::as_struct(consts::EXEMPLARS, value.as_ref())?;

    let attrs = match entries.column_by_name(consts::ATTRIBUTES) {
        Some(col) => Some(arrays::as_map(consts::ATTRIBUTES, col.as_ref())?),
        None => None,
    };
    let time = match entries.column_by_name(consts::TIME_UNIX_NANO) {
        Some(col) => Some(arrays::as_timestamp(consts::TIME_UNIX_NANO, col.as_ref())?),
        None => None,
    };
    let value_union = arrays::as_union(
        consts::VALUE,
        entries
            .column_by_name(consts::VALUE)
            .ok_or_else(|| Error::ColumnNotFound {
                name: consts::VALUE.to_owned(),
            })?
            .as_ref(),
    )?;
    let span_id = match entries.column_by_name(consts::SPAN_ID) {
        Some(col) => Some(arrays::fsb_col(consts::SPAN_ID, col.as_ref())?),
        None => None,
    };
    let trace_id = match entries.column_by_name(consts::TRACE_ID) {
        Some(col) => Some(arrays::fsb_col(consts::TRACE_ID, col.as_ref())?),
        None => None,
    };

    let mut out = Vec::with_capacity(entries.len());
    for i in 0..entries.len() {
        out.push(Exemplar {
            filtered_attributes: match attrs {
                Some(map) => read_attrs_map(map, i)?,
                None => Vec::new(),
            },
            time_unix_nano: time
                .filter(|col| col.is_valid(i))
                .map(|col| col.value(i) as u64)
                .unwrap_or(0),
            value: read_number_value(value_union, i)?,
            span_id: span_id
                .as_ref()
                .and_then(|col| col.value(i))
                .map(<[u8]>::to_vec)
                .unwrap_or_default(),
            trace_id: trace_id
                .as_ref()
                .and_then(|col| col.value(i))
                .map(<[u8]>::to_vec)
                .unwrap_or_default(),
        });
    }
    Ok(out)
}

fn opt_list<'a>(batch: &'a RecordBatch, name: &'static str) -> Result<Option<&'a ListArray>> {
    match arrays::maybe_column(batch, name) {
        Some(col) => Ok(Some(arrays::as_list(name, col.as_ref())?)),
        None => Ok(None),
    }
}

fn flags_at(batch: &RecordBatch, row: usize) -> Result<u32> {
    match arrays::maybe_column(batch, consts::FLAGS) {
        Some(col) => {
            let col = arrays::as_u32(consts::FLAGS, col.as_ref())?;
            Ok(if col.is_null(row) { 0 } else { col.value(row) })
        }
        None => Ok(0),
    }
}

/// Decode a number data-point record.
pub(crate) fn read_number_rows(
    batch: &RecordBatch,
    attrs: &AttributeStore,
) -> Result<Vec<NumberRow>> {
    let common = CommonReader::read(batch)?;
    let values = arrays::as_union(
        consts::VALUE,
        arrays::column(batch, consts::VALUE)?.as_ref(),
    )?;
    let exemplars = opt_list(batch, consts::EXEMPLARS)?;

    let mut rows = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let (start_time_unix_nano, time_unix_nano) = common.times(row);
        rows.push(NumberRow {
            parent_id: common.parents.value(row),
            info: common.info(row)?,
            point: NumberDataPoint {
                attributes: attrs.get(common.ids[row]).to_vec(),
                start_time_unix_nano,
                time_unix_nano,
                value: read_number_value(values, row)?,
                exemplars: read_exemplars_at(exemplars, row)?,
                flags: flags_at(batch, row)?,
            },
        });
    }
    Ok(rows)
}

/// Decode the summary data-point record.
pub(crate) fn read_summary_rows(
    batch: &RecordBatch,
    attrs: &AttributeStore,
) -> Result<Vec<SummaryRow>> {
    let common = CommonReader::read(batch)?;
    let sums = opt_f64(batch, consts::SUM)?;
    let quantiles = opt_list(batch, consts::QUANTILE_VALUES)?;

    let mut rows = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let (start_time_unix_nano, time_unix_nano) = common.times(row);
        let quantile_values = match quantiles {
            Some(list) if list.is_valid(row) => {
                let value = list.value(row);
                let entries = arrays::as_struct(consts::QUANTILE_VALUES, value.as_ref())?;
                let q = arrays::as_f64(
                    consts::QUANTILE,
                    entries
                        .column_by_name(consts::QUANTILE)
                        .ok_or_else(|| Error::ColumnNotFound {
                            name: consts::QUANTILE.to_owned(),
                        })?
                        .as_ref(),
                )?;
                let v = arrays::as_f64(
                    consts::VALUE,
                    entries
                        .column_by_name(consts::VALUE)
                        .ok_or_else(|| Error::ColumnNotFound {
                            name: consts::VALUE.to_owned(),
                        })?
                        .as_ref(),
                )?;
                (0..entries.len())
                    .map(|i| ValueAtQuantile::new(q.value(i), v.value(i)))
                    .collect()
            }
            _ => Vec::new(),
        };

        rows.push(SummaryRow {
            parent_id: common.parents.value(row),
            info: common.info(row)?,
            point: SummaryDataPoint {
                attributes: attrs.get(common.ids[row]).to_vec(),
                start_time_unix_nano,
                time_unix_nano,
                count: opt_u64_value(batch, consts::COUNT, row)?,
                sum: f64_at(&sums, row).unwrap_or(0.0),
                quantile_values,
                flags: flags_at(batch, row)?,
            },
        });
    }
    Ok(rows)
}

/// Decode the histogram data-point record.
pub(crate) fn read_histogram_rows(
    batch: &RecordBatch,
    attrs: &AttributeStore,
) -> Result<Vec<HistogramRow>> {
    let common = CommonReader::read(batch)?;
    let sums = opt_f64(batch, consts::SUM)?;
    let mins = opt_f64(batch, consts::MIN)?;
    let maxs = opt_f64(batch, consts::MAX)?;
    let bucket_counts = opt_list(batch, consts::BUCKET_COUNTS)?;
    let explicit_bounds = opt_list(batch, consts::EXPLICIT_BOUNDS)?;
    let exemplars = opt_list(batch, consts::EXEMPLARS)?;

    let mut rows = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let (start_time_unix_nano, time_unix_nano) = common.times(row);
        rows.push(HistogramRow {
            parent_id: common.parents.value(row),
            info: common.info(row)?,
            point: HistogramDataPoint {
                attributes: attrs.get(common.ids[row]).to_vec(),
                start_time_unix_nano,
                time_unix_nano,
                count: opt_u64_value(batch, consts::COUNT, row)?,
                sum: f64_at(&sums, row),
                bucket_counts: read_u64_list(bucket_counts, consts::BUCKET_COUNTS, row)?,
                explicit_bounds: read_f64_list(explicit_bounds, consts::EXPLICIT_BOUNDS, row)?,
                exemplars: read_exemplars_at(exemplars, row)?,
                flags: flags_at(batch, row)?,
                min: f64_at(&mins, row),
                max: f64_at(&maxs, row),
            },
        });
    }
    Ok(rows)
}

/// Decode the exponential-histogram data-point record.
pub(crate) fn read_exp_histogram_rows(
    batch: &RecordBatch,
    attrs: &AttributeStore,
) -> Result<Vec<ExpHistogramRow>> {
    let common = CommonReader::read(batch)?;
    let sums = opt_f64(batch, consts::SUM)?;
    let mins = opt_f64(batch, consts::MIN)?;
    let maxs = opt_f64(batch, consts::MAX)?;
    let exemplars = opt_list(batch, consts::EXEMPLARS)?;
    let positive = opt_buckets(batch, consts::POSITIVE)?;
    let negative = opt_buckets(batch, consts::NEGATIVE)?;

    let mut rows = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let (start_time_unix_nano, time_unix_nano) = common.times(row);
        let scale = match arrays::maybe_column(batch, consts::SCALE) {
            Some(col) => {
                let col = arrays::as_i32(consts::SCALE, col.as_ref())?;
                if col.is_null(row) { 0 } else { col.value(row) }
            }
            None => 0,
        };
        rows.push(ExpHistogramRow {
            parent_id: common.parents.value(row),
            info: common.info(row)?,
            point: ExponentialHistogramDataPoint {
                attributes: attrs.get(common.ids[row]).to_vec(),
                start_time_unix_nano,
                time_unix_nano,
                count: opt_u64_value(batch, consts::COUNT, row)?,
                sum: f64_at(&sums, row),
                scale,
                zero_count: opt_u64_value(batch, consts::ZERO_COUNT, row)?,
                positive: read_buckets_at(&positive, row)?,
                negative: read_buckets_at(&negative, row)?,
                exemplars: read_exemplars_at(exemplars, row)?,
                flags: flags_at(batch, row)?,
                min: f64_at(&mins, row),
                max: f64_at(&maxs, row),
            },
        });
    }
    Ok(rows)
}

fn read_u64_list(list: Option<&ListArray>, name: &'static str, row: usize) -> Result<Vec<u64>> {
    match list {
        Some(list) if list.is_valid(row) => {
            let value = list.value(row);
            Ok(arrays::as_u64(name, value.as_ref())?.values().to_vec())
        }
        _ => Ok(Vec::new()),
    }
}

fn read_f64_list(list: Option<&ListArray>, name: &'static str, row: usize) -> Result<Vec<f64>> {
    match list {
        Some(list) if list.is_valid(row) => {
            let value = list.value(row);
            Ok(arrays::as_f64(name, value.as_ref())?.values().to_vec())
        }
        _ => Ok(Vec::new()),
    }
}

fn opt_buckets<'a>(batch: &'a RecordBatch, name: &'static str) -> Result<Option<&'a StructArray>> {
    match arrays::maybe_column(batch, name) {
        Some(col) => Ok(Some(arrays::as_struct(name, col.as_ref())?)),
        None => Ok(None),
    }
}

fn read_buckets_at(buckets: &Option<&StructArray>, row: usize) -> Result<Option<Buckets>> {
    let Some(buckets) = buckets else {
        return Ok(None);
    };
    if buckets.is_null(row) {
        return Ok(None);
    }
    let offset = match buckets.column_by_name(consts::OFFSET) {
        Some(col) => {
            let col = arrays::as_i32(consts::OFFSET, col.as_ref())?;
            if col.is_null(row) { 0 } else { col.value(row) }
        }
        None => 0,
    };
    let counts = match buckets.column_by_name(consts::BUCKET_COUNTS) {
        Some(col) => {
            let list = arrays::as_list(consts::BUCKET_COUNTS, col.as_ref())?;
            read_u64_list(Some(list), consts::BUCKET_COUNTS, row)?
        }
        None => Vec::new(),
    };
    Ok(Some(Buckets::new(offset, counts)))
}
