// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The metrics decoder.
//!
//! Takes the record message set of one batch, indexes the related records by
//! parent ID, then walks the main record row by row, rebuilding the
//! resource/scope/metric tree and re-inflating hoisted shared values onto
//! each data point.

use ahash::RandomState;
use arrow::array::{Array, MapArray, RecordBatch, StructArray, UnionArray};
use std::collections::HashMap;

use super::attributes::{AttributeStore, read_attrs_map};
use super::data_points::{
    ExpHistogramRow, HistogramRow, MetricInfo, NumberRow, SummaryRow, read_exp_histogram_rows,
    read_histogram_rows, read_number_rows, read_summary_rows,
};
use crate::arrays;
use crate::encode::record::DECLARATIONS;
use crate::error::{Error, Result};
use crate::otlp::common::{InstrumentationScope, KeyValue, Resource};
use crate::otlp::metrics::{
    AggregationTemporality, ExponentialHistogram, Gauge, Histogram, Metric, MetricData,
    MetricsData, ResourceMetrics, ScopeMetrics, Sum, Summary,
};
use crate::payload::{PayloadType, RecordMessage};
use crate::schema::{MetricType, consts};

/// Decode one batch's record message set into the OTLP-equivalent tree.
pub fn decode_metrics(messages: &[RecordMessage]) -> Result<MetricsData> {
    let mut by_type: HashMap<PayloadType, &RecordBatch, RandomState> = HashMap::default();
    for message in messages {
        if !DECLARATIONS
            .iter()
            .any(|(payload, _)| *payload == message.payload_type)
        {
            return Err(Error::UnsupportedPayloadType {
                actual: message.payload_type as i32,
            });
        }
        if by_type
            .insert(message.payload_type, &message.record)
            .is_some()
        {
            return Err(Error::DuplicatePayloadType {
                payload_type: message.payload_type,
            });
        }
    }

    let main = *by_type
        .get(&PayloadType::Metrics)
        .ok_or(Error::MetricRecordNotFound)?;

    let attr_store = |payload: PayloadType| -> Result<AttributeStore> {
        match by_type.get(&payload) {
            Some(batch) => AttributeStore::read(batch),
            None => Ok(AttributeStore::empty()),
        }
    };
    let resource_attrs = attr_store(PayloadType::ResourceAttrs)?;
    let scope_attrs = attr_store(PayloadType::ScopeAttrs)?;

    let number_rows = |payload: PayloadType| -> Result<Vec<NumberRow>> {
        match by_type.get(&payload) {
            Some(batch) => {
                let attrs = attr_store(payload.attrs_payload().unwrap_or(payload))?;
                read_number_rows(batch, &attrs)
            }
            None => Ok(Vec::new()),
        }
    };
    let int_gauge = number_rows(PayloadType::IntGauge)?;
    let double_gauge = number_rows(PayloadType::DoubleGauge)?;
    let int_sum = number_rows(PayloadType::IntSum)?;
    let double_sum = number_rows(PayloadType::DoubleSum)?;
    let summary = match by_type.get(&PayloadType::Summary) {
        Some(batch) => read_summary_rows(batch, &attr_store(PayloadType::SummaryAttrs)?)?,
        None => Vec::new(),
    };
    let histogram = match by_type.get(&PayloadType::Histogram) {
        Some(batch) => read_histogram_rows(batch, &attr_store(PayloadType::HistogramAttrs)?)?,
        None => Vec::new(),
    };
    let exp_histogram = match by_type.get(&PayloadType::ExpHistogram) {
        Some(batch) => {
            read_exp_histogram_rows(batch, &attr_store(PayloadType::ExpHistogramAttrs)?)?
        }
        None => Vec::new(),
    };

    let walker = MainRecordWalker::read(main)?;
    walker.validate_parents(&[
        (
            PayloadType::IntGauge,
            index_parents(&int_gauge, |r| r.parent_id),
        ),
        (
            PayloadType::DoubleGauge,
            index_parents(&double_gauge, |r| r.parent_id),
        ),
        (
            PayloadType::IntSum,
            index_parents(&int_sum, |r| r.parent_id),
        ),
        (
            PayloadType::DoubleSum,
            index_parents(&double_sum, |r| r.parent_id),
        ),
        (
            PayloadType::Summary,
            index_parents(&summary, |r| r.parent_id),
        ),
        (
            PayloadType::Histogram,
            index_parents(&histogram, |r| r.parent_id),
        ),
        (
            PayloadType::ExpHistogram,
            index_parents(&exp_histogram, |r| r.parent_id),
        ),
    ])?;

    walker.walk(&DataPointRows {
        int_gauge,
        double_gauge,
        int_sum,
        double_sum,
        summary,
        histogram,
        exp_histogram,
        resource_attrs,
        scope_attrs,
    })
}

fn index_parents<T>(rows: &[T], parent: impl Fn(&T) -> u16) -> Vec<u16> {
    rows.iter().map(parent).collect()
}

struct DataPointRows {
    int_gauge: Vec<NumberRow>,
    double_gauge: Vec<NumberRow>,
    int_sum: Vec<NumberRow>,
    double_sum: Vec<NumberRow>,
    summary: Vec<SummaryRow>,
    histogram: Vec<HistogramRow>,
    exp_histogram: Vec<ExpHistogramRow>,
    resource_attrs: AttributeStore,
    scope_attrs: AttributeStore,
}

/// Column handles over the main record.
struct MainRecordWalker<'a> {
    batch: &'a RecordBatch,
    ids: &'a arrow::array::UInt16Array,

    resource_ids: &'a arrow::array::UInt16Array,
    resource_schema_url: arrays::StrCol<'a>,
    resource_dropped: &'a arrow::array::UInt32Array,

    scope_ids: &'a arrow::array::UInt16Array,
    scope_name: arrays::StrCol<'a>,
    scope_version: arrays::StrCol<'a>,
    scope_dropped: &'a arrow::array::UInt32Array,
    scope_shared_attrs: &'a MapArray,
    scope_shared_start: &'a arrow::array::TimestampNanosecondArray,
    scope_shared_time: &'a arrow::array::TimestampNanosecondArray,

    schema_url: Option<arrays::StrCol<'a>>,
    data: &'a UnionArray,
}

/// One union child: the metric-level hoisted values.
struct SharedChild<'a> {
    attrs: &'a MapArray,
    start: &'a arrow::array::TimestampNanosecondArray,
    time: &'a arrow::array::TimestampNanosecondArray,
}

impl<'a> MainRecordWalker<'a> {
    fn read(batch: &'a RecordBatch) -> Result<Self> {
        let ids = arrays::as_u16(consts::ID, arrays::column(batch, consts::ID)?.as_ref())?;

        let resource = arrays::as_struct(
            consts::RESOURCE,
            arrays::column(batch, consts::RESOURCE)?.as_ref(),
        )?;
        let resource_ids = arrays::as_u16(consts::ID, struct_child(resource, consts::ID)?)?;
        let resource_schema_url = arrays::str_col(
            consts::SCHEMA_URL,
            struct_child(resource, consts::SCHEMA_URL)?,
        )?;
        let resource_dropped = arrays::as_u32(
            consts::DROPPED_ATTRIBUTES_COUNT,
            struct_child(resource, consts::DROPPED_ATTRIBUTES_COUNT)?,
        )?;

        let scope = arrays::as_struct(
            consts::SCOPE,
            arrays::column(batch, consts::SCOPE)?.as_ref(),
        )?;
        let scope_ids = arrays::as_u16(consts::ID, struct_child(scope, consts::ID)?)?;
        let scope_name = arrays::str_col(consts::NAME, struct_child(scope, consts::NAME)?)?;
        let scope_version =
            arrays::str_col(consts::VERSION, struct_child(scope, consts::VERSION)?)?;
        let scope_dropped = arrays::as_u32(
            consts::DROPPED_ATTRIBUTES_COUNT,
            struct_child(scope, consts::DROPPED_ATTRIBUTES_COUNT)?,
        )?;
        let scope_shared_attrs = arrays::as_map(
            consts::SHARED_ATTRIBUTES,
            struct_child(scope, consts::SHARED_ATTRIBUTES)?,
        )?;
        let scope_shared_start = arrays::as_timestamp(
            consts::SHARED_START_TIME_UNIX_NANO,
            struct_child(scope, consts::SHARED_START_TIME_UNIX_NANO)?,
        )?;
        let scope_shared_time = arrays::as_timestamp(
            consts::SHARED_TIME_UNIX_NANO,
            struct_child(scope, consts::SHARED_TIME_UNIX_NANO)?,
        )?;

        let schema_url = match arrays::maybe_column(batch, consts::SCHEMA_URL) {
            Some(col) => Some(arrays::str_col(consts::SCHEMA_URL, col.as_ref())?),
            None => None,
        };
        let data = arrays::as_union(consts::DATA, arrays::column(batch, consts::DATA)?.as_ref())?;

        Ok(Self {
            batch,
            ids,
            resource_ids,
            resource_schema_url,
            resource_dropped,
            scope_ids,
            scope_name,
            scope_version,
            scope_dropped,
            scope_shared_attrs,
            scope_shared_start,
            scope_shared_time,
            schema_url,
            data,
        })
    }

    /// Every parent ID referenced by a child record must name a row of this
    /// record.
    fn validate_parents(&self, children: &[(PayloadType, Vec<u16>)]) -> Result<()> {
        let known: std::collections::HashSet<u16, RandomState> =
            self.ids.values().iter().copied().collect();
        for (payload_type, parents) in children {
            for parent in parents {
                if !known.contains(parent) {
                    return Err(Error::ParentIdNotFound {
                        parent_id: *parent as u32,
                        payload_type: *payload_type,
                    });
                }
            }
        }
        Ok(())
    }

    fn shared_child(&self, metric_type: MetricType) -> Result<SharedChild<'a>> {
        let child = self.data.child(metric_type as i8);
        let name = match metric_type {
            MetricType::Gauge => "gauge",
            MetricType::Sum => "sum",
            MetricType::Summary => "summary",
            MetricType::Histogram => "histogram",
            MetricType::ExpHistogram => "exp_histogram",
        };
        let entries = arrays::as_struct(name, child.as_ref())?;
        Ok(SharedChild {
            attrs: arrays::as_map(
                consts::SHARED_ATTRIBUTES,
                struct_child(entries, consts::SHARED_ATTRIBUTES)?,
            )?,
            start: arrays::as_timestamp(
                consts::SHARED_START_TIME_UNIX_NANO,
                struct_child(entries, consts::SHARED_START_TIME_UNIX_NANO)?,
            )?,
            time: arrays::as_timestamp(
                consts::SHARED_TIME_UNIX_NANO,
                struct_child(entries, consts::SHARED_TIME_UNIX_NANO)?,
            )?,
        })
    }

    fn walk(&self, rows: &DataPointRows) -> Result<MetricsData> {
        // group child rows by parent, preserving assigned-ID order
        let int_gauge = group_by_parent(&rows.int_gauge, |r| r.parent_id);
        let double_gauge = group_by_parent(&rows.double_gauge, |r| r.parent_id);
        let int_sum = group_by_parent(&rows.int_sum, |r| r.parent_id);
        let double_sum = group_by_parent(&rows.double_sum, |r| r.parent_id);
        let summary = group_by_parent(&rows.summary, |r| r.parent_id);
        let histogram = group_by_parent(&rows.histogram, |r| r.parent_id);
        let exp_histogram = group_by_parent(&rows.exp_histogram, |r| r.parent_id);

        let mut result = MetricsData::default();
        let mut prev_resource: Option<u16> = None;
        let mut prev_scope: Option<u16> = None;

        for row in 0..self.batch.num_rows() {
            let resource_id = self.resource_ids.value(row);
            if prev_resource != Some(resource_id) {
                result.resource_metrics.push(ResourceMetrics {
                    resource: self.build_resource(rows, row, resource_id),
                    scope_metrics: Vec::new(),
                    schema_url: self
                        .resource_schema_url
                        .value(row)
                        .unwrap_or_default()
                        .to_owned(),
                });
                prev_resource = Some(resource_id);
                prev_scope = None;
            }
            let resource_metrics = result.resource_metrics.last_mut().ok_or_else(|| {
                Error::UnexpectedRecordBatchState {
                    reason: "resource group missing".to_owned(),
                }
            })?;

            let scope_id = self.scope_ids.value(row);
            if prev_scope != Some(scope_id) {
                resource_metrics.scope_metrics.push(ScopeMetrics {
                    scope: self.build_scope(rows, row, scope_id),
                    metrics: Vec::new(),
                    schema_url: self
                        .schema_url
                        .as_ref()
                        .and_then(|col| col.value(row))
                        .unwrap_or_default()
                        .to_owned(),
                });
                prev_scope = Some(scope_id);
            }
            let scope_metrics = resource_metrics.scope_metrics.last_mut().ok_or_else(|| {
                Error::UnexpectedRecordBatchState {
                    reason: "scope group missing".to_owned(),
                }
            })?;

            // hoisted values of this row
            let metric_type = MetricType::try_from_wire(self.data.type_id(row))?;
            let shared = self.shared_child(metric_type)?;
            let metric_shared_attrs = read_attrs_map(shared.attrs, row)?;
            let metric_shared_start = valid_ts(shared.start, row);
            let metric_shared_time = valid_ts(shared.time, row);
            let scope_shared_attrs = read_attrs_map(self.scope_shared_attrs, row)?;
            let scope_shared_start = valid_ts(self.scope_shared_start, row);
            let scope_shared_time = valid_ts(self.scope_shared_time, row);

            let inflate = Inflate {
                attrs: {
                    let mut attrs = scope_shared_attrs;
                    attrs.extend(metric_shared_attrs);
                    attrs
                },
                start_time: metric_shared_start.or(scope_shared_start),
                time: metric_shared_time.or(scope_shared_time),
            };

            let metric_id = self.ids.value(row);
            let metric = match metric_type {
                MetricType::Gauge => {
                    let mut points = Vec::new();
                    let mut info: Option<MetricInfo> = None;
                    for &idx in int_gauge.get(&metric_id).into_iter().flatten() {
                        let row = &rows.int_gauge[idx];
                        info.get_or_insert_with(|| row.info.clone());
                        points.push(inflate.number_point(&row.point));
                    }
                    for &idx in double_gauge.get(&metric_id).into_iter().flatten() {
                        let row = &rows.double_gauge[idx];
                        info.get_or_insert_with(|| row.info.clone());
                        points.push(inflate.number_point(&row.point));
                    }
                    let info = info.unwrap_or_default();
                    Metric {
                        name: info.name,
                        description: info.description,
                        unit: info.unit,
                        data: Some(MetricData::Gauge(Gauge::new(points))),
                    }
                }
                MetricType::Sum => {
                    let mut points = Vec::new();
                    let mut info: Option<MetricInfo> = None;
                    for &idx in int_sum.get(&metric_id).into_iter().flatten() {
                        let row = &rows.int_sum[idx];
                        info.get_or_insert_with(|| row.info.clone());
                        points.push(inflate.number_point(&row.point));
                    }
                    for &idx in double_sum.get(&metric_id).into_iter().flatten() {
                        let row = &rows.double_sum[idx];
                        info.get_or_insert_with(|| row.info.clone());
                        points.push(inflate.number_point(&row.point));
                    }
                    let info = info.unwrap_or_default();
                    Metric {
                        name: info.name.clone(),
                        description: info.description.clone(),
                        unit: info.unit.clone(),
                        data: Some(MetricData::Sum(Sum::new(
                            info.temporality
                                .unwrap_or(AggregationTemporality::Unspecified),
                            info.monotonic.unwrap_or(false),
                            points,
                        ))),
                    }
                }
                MetricType::Summary => {
                    let mut points = Vec::new();
                    let mut info: Option<MetricInfo> = None;
                    for &idx in summary.get(&metric_id).into_iter().flatten() {
                        let row = &rows.summary[idx];
                        info.get_or_insert_with(|| row.info.clone());
                        let mut point = row.point.clone();
                        inflate.apply(
                            &mut point.attributes,
                            &mut point.start_time_unix_nano,
                            &mut point.time_unix_nano,
                        );
                        points.push(point);
                    }
                    let info = info.unwrap_or_default();
                    Metric {
                        name: info.name,
                        description: info.description,
                        unit: info.unit,
                        data: Some(MetricData::Summary(Summary::new(points))),
                    }
                }
                MetricType::Histogram => {
                    let mut points = Vec::new();
                    let mut info: Option<MetricInfo> = None;
                    for &idx in histogram.get(&metric_id).into_iter().flatten() {
                        let row = &rows.histogram[idx];
                        info.get_or_insert_with(|| row.info.clone());
                        let mut point = row.point.clone();
                        inflate.apply(
                            &mut point.attributes,
                            &mut point.start_time_unix_nano,
                            &mut point.time_unix_nano,
                        );
                        points.push(point);
                    }
                    let info = info.unwrap_or_default();
                    Metric {
                        name: info.name.clone(),
                        description: info.description.clone(),
                        unit: info.unit.clone(),
                        data: Some(MetricData::Histogram(Histogram::new(
                            info.temporality
                                .unwrap_or(AggregationTemporality::Unspecified),
                            points,
                        ))),
                    }
                }
                MetricType::ExpHistogram => {
                    let mut points = Vec::new();
                    let mut info: Option<MetricInfo> = None;
                    for &idx in exp_histogram.get(&metric_id).into_iter().flatten() {
                        let row = &rows.exp_histogram[idx];
                        info.get_or_insert_with(|| row.info.clone());
                        let mut point = row.point.clone();
                        inflate.apply(
                            &mut point.attributes,
                            &mut point.start_time_unix_nano,
                            &mut point.time_unix_nano,
                        );
                        points.push(point);
                    }
                    let info = info.unwrap_or_default();
                    Metric {
                        name: info.name.clone(),
                        description: info.description.clone(),
                        unit: info.unit.clone(),
                        data: Some(MetricData::ExponentialHistogram(ExponentialHistogram::new(
                            info.temporality
                                .unwrap_or(AggregationTemporality::Unspecified),
                            points,
                        ))),
                    }
                }
            };

            scope_metrics.metrics.push(metric);
        }

        Ok(result)
    }

    fn build_resource(
        &self,
        rows: &DataPointRows,
        row: usize,
        resource_id: u16,
    ) -> Option<Resource> {
        let attributes = rows.resource_attrs.get(resource_id as u32).to_vec();
        let dropped = if self.resource_dropped.is_null(row) {
            0
        } else {
            self.resource_dropped.value(row)
        };
        if attributes.is_empty() && dropped == 0 {
            None
        } else {
            Some(Resource {
                attributes,
                dropped_attributes_count: dropped,
            })
        }
    }

    fn build_scope(
        &self,
        rows: &DataPointRows,
        row: usize,
        scope_id: u16,
    ) -> Option<InstrumentationScope> {
        let name = self.scope_name.value(row).unwrap_or_default().to_owned();
        let version = self.scope_version.value(row).unwrap_or_default().to_owned();
        let attributes = rows.scope_attrs.get(scope_id as u32).to_vec();
        let dropped = if self.scope_dropped.is_null(row) {
            0
        } else {
            self.scope_dropped.value(row)
        };
        if name.is_empty() && version.is_empty() && attributes.is_empty() && dropped == 0 {
            None
        } else {
            Some(InstrumentationScope {
                name,
                version,
                attributes,
                dropped_attributes_count: dropped,
            })
        }
    }
}

/// Hoisted values to re-inflate onto each data point of one metric.
struct Inflate {
    attrs: Vec<KeyValue>,
    start_time: Option<u64>,
    time: Option<u64>,
}

impl Inflate {
    fn apply(&self, attributes: &mut Vec<KeyValue>, start_time: &mut u64, time: &mut u64) {
        attributes.extend(self.attrs.iter().cloned());
        if *start_time == 0 {
            *start_time = self.start_time.unwrap_or(0);
        }
        if *time == 0 {
            *time = self.time.unwrap_or(0);
        }
    }

    fn number_point(
        &self,
        point: &crate::otlp::metrics::NumberDataPoint,
    ) -> crate::otlp::metrics::NumberDataPoint {
        let mut point = point.clone();
        self.apply(
            &mut point.attributes,
            &mut point.start_time_unix_nano,
            &mut point.time_unix_nano,
        );
        point
    }
}

fn group_by_parent<T>(
    rows: &[T],
    parent: impl Fn(&T) -> u16,
) -> HashMap<u16, Vec<usize>, RandomState> {
    let mut index: HashMap<u16, Vec<usize>, RandomState> = HashMap::default();
    for (i, row) in rows.iter().enumerate() {
        index.entry(parent(row)).or_default().push(i);
    }
    index
}

fn struct_child<'a>(parent: &'a StructArray, name: &str) -> Result<&'a dyn Array> {
    parent
        .column_by_name(name)
        .map(|col| col.as_ref())
        .ok_or_else(|| Error::ColumnNotFound {
            name: name.to_owned(),
        })
}

fn valid_ts(col: &arrow::array::TimestampNanosecondArray, row: usize) -> Option<u64> {
    if col.is_null(row) {
        None
    } else {
        Some(col.value(row) as u64)
    }
}
