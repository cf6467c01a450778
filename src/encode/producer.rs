// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The top-level metrics encoder.
//!
//! `produce` runs the whole pipeline for one batch: optimize, analyze shared
//! values, fill the accumulators, then emit. When any record builder reports
//! schema-not-up-to-date (dictionary overflow, delta violation), the partial
//! output is discarded and the same accumulated batch is replayed against
//! the updated schema, up to a fixed retry bound.

use tracing::{debug, warn};

use crate::config::Config;
use crate::encode::optimizer::{MetricsOptimized, optimize};
use crate::encode::record::RelatedRecords;
use crate::encode::record::attributes::AttributesAccumulator;
use crate::encode::record::data_points::MetricIdentity;
use crate::encode::record::data_points::exp_histogram::{
    ExpHistogramDpAccumulator, ExpHistogramDpEntry,
};
use crate::encode::record::data_points::histogram::{HistogramDpAccumulator, HistogramDpEntry};
use crate::encode::record::data_points::number::{NumberDpAccumulator, NumberDpEntry};
use crate::encode::record::data_points::summary::{SummaryDpAccumulator, SummaryDpEntry};
use crate::encode::record::metrics::MetricEntry;
use crate::encode::shared::{SharedValues, metric_shared, scope_shared};
use crate::error::{Error, Result};
use crate::otlp::metrics::{Metric, MetricData, MetricsData, NumberValue};
use crate::payload::RecordMessage;
use crate::schema::MetricType;
use crate::stats::BatchStats;
use crate::views::metrics::MetricsView;

/// Bound on consecutive schema-not-up-to-date replays of one batch.
/// Exceeding it means the schema never converged, which is a bug.
pub const MAX_SCHEMA_RETRIES: usize = 5;

/// Encoder for the metrics signal. One instance handles one batch at a
/// time; the adaptive schema state carries over between batches.
pub struct MetricsProducer {
    config: Config,
    records: RelatedRecords,
    stats: BatchStats,
    batch_seq: u64,
}

impl Default for MetricsProducer {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

/// Everything accumulated for one batch before emission.
struct Accumulators<'a> {
    metric_entries: Vec<MetricEntry<'a>>,
    scope_shared_by_metric: Vec<SharedValues<'a>>,
    hoisted_by_metric: Vec<SharedValues<'a>>,
    resource_attrs: AttributesAccumulator<'a, u16>,
    scope_attrs: AttributesAccumulator<'a, u16>,
    int_gauge: NumberDpAccumulator<'a>,
    double_gauge: NumberDpAccumulator<'a>,
    int_sum: NumberDpAccumulator<'a>,
    double_sum: NumberDpAccumulator<'a>,
    summary: SummaryDpAccumulator<'a>,
    histogram: HistogramDpAccumulator<'a>,
    exp_histogram: ExpHistogramDpAccumulator<'a>,
}

impl MetricsProducer {
    /// A producer with the given configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let records = RelatedRecords::new(config.dictionary.max_card);
        Self {
            config,
            records,
            stats: BatchStats::new(),
            batch_seq: 0,
        }
    }

    /// Batch-shape statistics recorded so far. Only populated when the
    /// `stats` option is on.
    #[must_use]
    pub fn stats(&self) -> &BatchStats {
        &self.stats
    }

    /// Release the producer. Idempotent; `produce` after release fails with
    /// builder-already-released.
    pub fn release(&mut self) {
        self.records.release();
    }

    /// Encode any view-backed metrics tree.
    pub fn encode<T: MetricsView>(&mut self, view: &T) -> Result<Vec<RecordMessage>> {
        let data = MetricsData::from_view(view);
        self.produce(&data)
    }

    /// Encode one batch into its record message set.
    pub fn produce(&mut self, data: &MetricsData) -> Result<Vec<RecordMessage>> {
        if self.records.is_released() {
            return Err(Error::BuilderAlreadyReleased);
        }

        let optimized = optimize(data, self.config.sort_metrics);
        if self.config.stats {
            self.stats.observe(&optimized);
        }

        let mut acc = self.accumulate(&optimized)?;

        let mut retries = 0;
        loop {
            match self.emit(&mut acc) {
                Ok(messages) => {
                    debug!(
                        batch_id = self.batch_seq,
                        records = messages.len(),
                        metrics = acc.metric_entries.len(),
                        "encoded metrics batch"
                    );
                    self.batch_seq += 1;
                    return Ok(messages);
                }
                Err(Error::SchemaNotUpToDate {
                    payload_type,
                    fields,
                }) => {
                    retries += 1;
                    self.records.reset();
                    if retries > MAX_SCHEMA_RETRIES {
                        return Err(Error::TooManySchemaUpdates { attempts: retries });
                    }
                    warn!(
                        ?payload_type,
                        ?fields,
                        retries,
                        "schema not up to date, replaying batch"
                    );
                }
                Err(e) => {
                    // release every partially filled builder before surfacing
                    self.records.reset();
                    return Err(e);
                }
            }
        }
    }

    /// Walk the optimized tree once, assigning IDs and filling every
    /// accumulator. No Arrow builder is touched here; the result can be
    /// emitted any number of times.
    fn accumulate<'a>(&self, optimized: &MetricsOptimized<'a>) -> Result<Accumulators<'a>> {
        let mut acc = Accumulators {
            metric_entries: Vec::with_capacity(optimized.metric_count()),
            scope_shared_by_metric: Vec::new(),
            hoisted_by_metric: Vec::new(),
            resource_attrs: AttributesAccumulator::new(),
            scope_attrs: AttributesAccumulator::new(),
            int_gauge: NumberDpAccumulator::new(),
            double_gauge: NumberDpAccumulator::new(),
            int_sum: NumberDpAccumulator::new(),
            double_sum: NumberDpAccumulator::new(),
            summary: SummaryDpAccumulator::new(),
            histogram: HistogramDpAccumulator::new(),
            exp_histogram: ExpHistogramDpAccumulator::new(),
        };

        let mut metric_seq: u32 = 0;
        let mut scope_seq: u32 = 0;

        for (resource_idx, group) in optimized.resource_groups.iter().enumerate() {
            let resource_id = u16::try_from(resource_idx).map_err(|_| Error::GroupCountOverflow)?;
            if let Some(resource) = group.resource {
                acc.resource_attrs.append(
                    resource_id,
                    resource
                        .attributes
                        .iter()
                        .map(|kv| (kv.key.as_str(), &kv.value)),
                );
            }

            for scope_group in &group.scopes {
                let scope_id = u16::try_from(scope_seq).map_err(|_| Error::GroupCountOverflow)?;
                scope_seq += 1;
                if let Some(scope) = scope_group.scope {
                    acc.scope_attrs.append(
                        scope_id,
                        scope
                            .attributes
                            .iter()
                            .map(|kv| (kv.key.as_str(), &kv.value)),
                    );
                }

                let mut metric_shareds: Vec<SharedValues<'a>> = scope_group
                    .metrics
                    .iter()
                    .copied()
                    .map(metric_shared)
                    .collect();
                let scope_sh = scope_shared(&mut metric_shareds);

                for (metric, m_shared) in scope_group
                    .metrics
                    .iter()
                    .copied()
                    .zip(metric_shareds.into_iter())
                {
                    let metric_id =
                        u16::try_from(metric_seq).map_err(|_| Error::MetricCountOverflow)?;
                    metric_seq += 1;

                    let hoisted = SharedValues::merged(&scope_sh, &m_shared);
                    route_data_points(&mut acc, metric, metric_id);

                    acc.metric_entries.push(MetricEntry {
                        id: metric_id,
                        resource_id,
                        resource: group.resource,
                        resource_schema_url: group.schema_url,
                        scope_id,
                        scope: scope_group.scope,
                        schema_url: scope_group.schema_url,
                        metric_type: metric_type_of(metric),
                        shared: m_shared,
                    });
                    acc.scope_shared_by_metric.push(scope_sh.clone());
                    acc.hoisted_by_metric.push(hoisted);
                }
            }
        }
        Ok(acc)
    }

    /// Replay the accumulators into the record builders and materialize.
    /// Non-destructive on the accumulators; on schema-not-up-to-date the
    /// caller resets the builders and calls again.
    fn emit(&mut self, acc: &mut Accumulators<'_>) -> Result<Vec<RecordMessage>> {
        let batch_id = self.batch_seq.to_string();

        for entry in &acc.metric_entries {
            let scope_sh = &acc.scope_shared_by_metric[entry.id as usize];
            self.records.metrics.append(entry, scope_sh)?;
        }

        acc.resource_attrs.emit(&mut self.records.resource_attrs)?;
        acc.scope_attrs.emit(&mut self.records.scope_attrs)?;

        // data-point attribute accumulators are refilled on every attempt:
        // the assigned IDs they key on are recomputed by each emit pass
        let hoisted = &acc.hoisted_by_metric;

        let mut int_gauge_attrs = AttributesAccumulator::new();
        acc.int_gauge
            .emit(hoisted, &mut self.records.int_gauge, &mut int_gauge_attrs)?;
        int_gauge_attrs.emit(&mut self.records.int_gauge_attrs)?;

        let mut double_gauge_attrs = AttributesAccumulator::new();
        acc.double_gauge.emit(
            hoisted,
            &mut self.records.double_gauge,
            &mut double_gauge_attrs,
        )?;
        double_gauge_attrs.emit(&mut self.records.double_gauge_attrs)?;

        let mut int_sum_attrs = AttributesAccumulator::new();
        acc.int_sum
            .emit(hoisted, &mut self.records.int_sum, &mut int_sum_attrs)?;
        int_sum_attrs.emit(&mut self.records.int_sum_attrs)?;

        let mut double_sum_attrs = AttributesAccumulator::new();
        acc.double_sum
            .emit(hoisted, &mut self.records.double_sum, &mut double_sum_attrs)?;
        double_sum_attrs.emit(&mut self.records.double_sum_attrs)?;

        let mut summary_attrs = AttributesAccumulator::new();
        acc.summary
            .emit(hoisted, &mut self.records.summary, &mut summary_attrs)?;
        summary_attrs.emit(&mut self.records.summary_attrs)?;

        let mut histogram_attrs = AttributesAccumulator::new();
        acc.histogram
            .emit(hoisted, &mut self.records.histogram, &mut histogram_attrs)?;
        histogram_attrs.emit(&mut self.records.histogram_attrs)?;

        let mut exp_histogram_attrs = AttributesAccumulator::new();
        acc.exp_histogram.emit(
            hoisted,
            &mut self.records.exp_histogram,
            &mut exp_histogram_attrs,
        )?;
        exp_histogram_attrs.emit(&mut self.records.exp_histogram_attrs)?;

        self.records.finish(&batch_id)
    }
}

/// Route every data point of one metric into the accumulator of its payload
/// type. Gauge and sum points split by value variant into the INT and
/// DOUBLE payloads.
fn route_data_points<'a>(acc: &mut Accumulators<'a>, metric: &'a Metric, metric_id: u16) {
    let identity = |temporality, monotonic| MetricIdentity {
        name: &metric.name,
        description: &metric.description,
        unit: &metric.unit,
        temporality,
        monotonic,
    };

    match &metric.data {
        Some(MetricData::Gauge(gauge)) => {
            for point in &gauge.data_points {
                let entry = NumberDpEntry {
                    parent_id: metric_id,
                    metric: identity(None, None),
                    point,
                };
                match point.value {
                    Some(NumberValue::Double(_)) => acc.double_gauge.append(entry),
                    _ => acc.int_gauge.append(entry),
                }
            }
        }
        Some(MetricData::Sum(sum)) => {
            for point in &sum.data_points {
                let entry = NumberDpEntry {
                    parent_id: metric_id,
                    metric: identity(Some(sum.aggregation_temporality), Some(sum.is_monotonic)),
                    point,
                };
                match point.value {
                    Some(NumberValue::Double(_)) => acc.double_sum.append(entry),
                    _ => acc.int_sum.append(entry),
                }
            }
        }
        Some(MetricData::Summary(summary)) => {
            for point in &summary.data_points {
                acc.summary.append(SummaryDpEntry {
                    parent_id: metric_id,
                    metric: identity(None, None),
                    point,
                });
            }
        }
        Some(MetricData::Histogram(histogram)) => {
            for point in &histogram.data_points {
                acc.histogram.append(HistogramDpEntry {
                    parent_id: metric_id,
                    metric: identity(Some(histogram.aggregation_temporality), None),
                    point,
                });
            }
        }
        Some(MetricData::ExponentialHistogram(histogram)) => {
            for point in &histogram.data_points {
                acc.exp_histogram.append(ExpHistogramDpEntry {
                    parent_id: metric_id,
                    metric: identity(Some(histogram.aggregation_temporality), None),
                    point,
                });
            }
        }
        None => {}
    }
}

fn metric_type_of(metric: &Metric) -> MetricType {
    match &metric.data {
        Some(MetricData::Gauge(_)) | None => MetricType::Gauge,
        Some(MetricData::Sum(_)) => MetricType::Sum,
        Some(MetricData::Summary(_)) => MetricType::Summary,
        Some(MetricData::Histogram(_)) => MetricType::Histogram,
        Some(MetricData::ExponentialHistogram(_)) => MetricType::ExpHistogram,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::otlp::common::{AnyValue, KeyValue, Resource};
    use crate::otlp::metrics::{Gauge, NumberDataPoint, ResourceMetrics, ScopeMetrics};
    use crate::payload::PayloadType;

    fn one_gauge_batch() -> MetricsData {
        MetricsData::new(vec![ResourceMetrics {
            resource: Some(Resource::new(vec![KeyValue::new(
                "host",
                AnyValue::new_string("a"),
            )])),
            scope_metrics: vec![ScopeMetrics {
                scope: None,
                metrics: vec![Metric::new_gauge(
                    "m",
                    Gauge::new(vec![NumberDataPoint {
                        attributes: vec![KeyValue::new("k", AnyValue::new_string("v"))],
                        ..NumberDataPoint::new_int(2, 3)
                    }]),
                )],
                schema_url: String::new(),
            }],
            schema_url: String::new(),
        }])
    }

    #[test]
    fn test_single_gauge_emits_expected_payloads() {
        let mut producer = MetricsProducer::default();
        let messages = producer.produce(&one_gauge_batch()).unwrap();
        let payloads: Vec<PayloadType> = messages.iter().map(|m| m.payload_type).collect();
        assert_eq!(
            payloads,
            vec![
                PayloadType::Metrics,
                PayloadType::ResourceAttrs,
                PayloadType::IntGauge,
                PayloadType::IntGaugeAttrs,
            ]
        );
        assert_eq!(messages[0].record.num_rows(), 1);
        assert_eq!(messages[2].record.num_rows(), 1);
    }

    #[test]
    fn test_batch_ids_increase() {
        let mut producer = MetricsProducer::default();
        let first = producer.produce(&one_gauge_batch()).unwrap();
        let second = producer.produce(&one_gauge_batch()).unwrap();
        assert_eq!(first[0].batch_id, "0");
        assert_eq!(second[0].batch_id, "1");
    }

    #[test]
    fn test_produce_after_release_fails() {
        let mut producer = MetricsProducer::default();
        producer.release();
        producer.release(); // idempotent
        let err = producer
            .produce(&one_gauge_batch())
            .err()
            .expect("release error expected");
        assert!(matches!(err, Error::BuilderAlreadyReleased));
    }

    #[test]
    fn test_empty_batch_is_one_empty_record() {
        let mut producer = MetricsProducer::default();
        let messages = producer.produce(&MetricsData::default()).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].payload_type, PayloadType::Metrics);
        assert_eq!(messages[0].record.num_rows(), 0);
    }
}
