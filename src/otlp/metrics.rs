// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Owned equivalent of the OTLP metrics tree.

use crate::otlp::common::{InstrumentationScope, KeyValue, Resource};

/// Top level container: one export request worth of metrics.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetricsData {
    /// Metrics grouped by the resource that produced them.
    pub resource_metrics: Vec<ResourceMetrics>,
}

impl MetricsData {
    /// Wrap a list of `ResourceMetrics`.
    #[must_use]
    pub fn new(resource_metrics: Vec<ResourceMetrics>) -> MetricsData {
        MetricsData { resource_metrics }
    }
}

/// Metrics produced by one resource.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceMetrics {
    /// The resource. Absent when the producer did not describe it.
    pub resource: Option<Resource>,
    /// Metrics grouped by instrumentation scope.
    pub scope_metrics: Vec<ScopeMetrics>,
    /// Schema URL of the resource description. Empty when unknown.
    pub schema_url: String,
}

/// Metrics produced by one instrumentation scope within a resource.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScopeMetrics {
    /// The instrumentation scope. Absent when unknown.
    pub scope: Option<InstrumentationScope>,
    /// The metrics.
    pub metrics: Vec<Metric>,
    /// Schema URL of the metric definitions. Empty when unknown.
    pub schema_url: String,
}

/// One metric: identity plus a type-discriminated payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Metric {
    /// The metric name. Non-empty for well-formed input.
    pub name: String,
    /// Optional free-form description. Empty when unset.
    pub description: String,
    /// Optional unit, UCUM style. Empty when unset.
    pub unit: String,
    /// The payload. Absent for an "empty" metric.
    pub data: Option<MetricData>,
}

impl Metric {
    /// A gauge metric.
    pub fn new_gauge(name: impl Into<String>, gauge: Gauge) -> Metric {
        Metric {
            name: name.into(),
            data: Some(MetricData::Gauge(gauge)),
            ..Default::default()
        }
    }

    /// A sum metric.
    pub fn new_sum(name: impl Into<String>, sum: Sum) -> Metric {
        Metric {
            name: name.into(),
            data: Some(MetricData::Sum(sum)),
            ..Default::default()
        }
    }

    /// A summary metric.
    pub fn new_summary(name: impl Into<String>, summary: Summary) -> Metric {
        Metric {
            name: name.into(),
            data: Some(MetricData::Summary(summary)),
            ..Default::default()
        }
    }

    /// A histogram metric.
    pub fn new_histogram(name: impl Into<String>, histogram: Histogram) -> Metric {
        Metric {
            name: name.into(),
            data: Some(MetricData::Histogram(histogram)),
            ..Default::default()
        }
    }

    /// An exponential histogram metric.
    pub fn new_exponential_histogram(
        name: impl Into<String>,
        histogram: ExponentialHistogram,
    ) -> Metric {
        Metric {
            name: name.into(),
            data: Some(MetricData::ExponentialHistogram(histogram)),
            ..Default::default()
        }
    }

    /// Number of data points across the payload, any variant.
    #[must_use]
    pub fn data_point_count(&self) -> usize {
        match &self.data {
            Some(MetricData::Gauge(g)) => g.data_points.len(),
            Some(MetricData::Sum(s)) => s.data_points.len(),
            Some(MetricData::Summary(s)) => s.data_points.len(),
            Some(MetricData::Histogram(h)) => h.data_points.len(),
            Some(MetricData::ExponentialHistogram(h)) => h.data_points.len(),
            None => 0,
        }
    }
}

/// The type-discriminated body of a metric.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricData {
    /// Current-value scalar points.
    Gauge(Gauge),
    /// Aggregated scalar points.
    Sum(Sum),
    /// Quantile summaries.
    Summary(Summary),
    /// Bucketed distributions with explicit bounds.
    Histogram(Histogram),
    /// Bucketed distributions with exponential bounds.
    ExponentialHistogram(ExponentialHistogram),
}

/// How aggregated values relate to the interval they were aggregated over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum AggregationTemporality {
    /// Default value, must not be used in well-formed data.
    #[default]
    Unspecified = 0,
    /// Values report changes since the previous report.
    Delta = 1,
    /// Values report changes since a fixed start time.
    Cumulative = 2,
}

impl AggregationTemporality {
    /// Decode the wire representation, mapping unknown values to
    /// `Unspecified`.
    #[must_use]
    pub fn from_wire(value: i32) -> AggregationTemporality {
        match value {
            1 => AggregationTemporality::Delta,
            2 => AggregationTemporality::Cumulative,
            _ => AggregationTemporality::Unspecified,
        }
    }
}

/// Gauge payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Gauge {
    /// The data points.
    pub data_points: Vec<NumberDataPoint>,
}

impl Gauge {
    /// Wrap a list of points.
    #[must_use]
    pub fn new(data_points: Vec<NumberDataPoint>) -> Gauge {
        Gauge { data_points }
    }
}

/// Sum payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sum {
    /// Temporality of the aggregation.
    pub aggregation_temporality: AggregationTemporality,
    /// True when the sum never decreases.
    pub is_monotonic: bool,
    /// The data points.
    pub data_points: Vec<NumberDataPoint>,
}

impl Sum {
    /// A sum with the given temporality and monotonicity.
    #[must_use]
    pub fn new(
        aggregation_temporality: AggregationTemporality,
        is_monotonic: bool,
        data_points: Vec<NumberDataPoint>,
    ) -> Sum {
        Sum {
            aggregation_temporality,
            is_monotonic,
            data_points,
        }
    }
}

/// Summary payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Summary {
    /// The data points.
    pub data_points: Vec<SummaryDataPoint>,
}

impl Summary {
    /// Wrap a list of points.
    #[must_use]
    pub fn new(data_points: Vec<SummaryDataPoint>) -> Summary {
        Summary { data_points }
    }
}

/// Histogram payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Histogram {
    /// Temporality of the aggregation.
    pub aggregation_temporality: AggregationTemporality,
    /// The data points.
    pub data_points: Vec<HistogramDataPoint>,
}

impl Histogram {
    /// A histogram with the given temporality.
    #[must_use]
    pub fn new(
        aggregation_temporality: AggregationTemporality,
        data_points: Vec<HistogramDataPoint>,
    ) -> Histogram {
        Histogram {
            aggregation_temporality,
            data_points,
        }
    }
}

/// Exponential histogram payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExponentialHistogram {
    /// Temporality of the aggregation.
    pub aggregation_temporality: AggregationTemporality,
    /// The data points.
    pub data_points: Vec<ExponentialHistogramDataPoint>,
}

impl ExponentialHistogram {
    /// An exponential histogram with the given temporality.
    #[must_use]
    pub fn new(
        aggregation_temporality: AggregationTemporality,
        data_points: Vec<ExponentialHistogramDataPoint>,
    ) -> ExponentialHistogram {
        ExponentialHistogram {
            aggregation_temporality,
            data_points,
        }
    }
}

/// The recorded measurement of a number data point or exemplar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberValue {
    /// A 64-bit signed integer measurement.
    Int(i64),
    /// A double precision measurement.
    Double(f64),
}

impl NumberValue {
    /// The integer payload, if this is an integer value.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            NumberValue::Int(v) => Some(*v),
            NumberValue::Double(_) => None,
        }
    }

    /// The double payload, if this is a double value.
    #[must_use]
    pub fn as_double(&self) -> Option<f64> {
        match self {
            NumberValue::Double(v) => Some(*v),
            NumberValue::Int(_) => None,
        }
    }
}

/// A scalar measurement at one point in time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NumberDataPoint {
    /// The point attributes.
    pub attributes: Vec<KeyValue>,
    /// Start of the aggregation interval, unix nanos. 0 when unset.
    pub start_time_unix_nano: u64,
    /// Time of the measurement, unix nanos.
    pub time_unix_nano: u64,
    /// The measurement. Absent when no value was recorded.
    pub value: Option<NumberValue>,
    /// Exemplars attached to this point.
    pub exemplars: Vec<Exemplar>,
    /// Data point flags.
    pub flags: u32,
}

impl NumberDataPoint {
    /// An integer point measured at `time_unix_nano`.
    #[must_use]
    pub fn new_int(time_unix_nano: u64, value: i64) -> NumberDataPoint {
        NumberDataPoint {
            time_unix_nano,
            value: Some(NumberValue::Int(value)),
            ..Default::default()
        }
    }

    /// A double point measured at `time_unix_nano`.
    #[must_use]
    pub fn new_double(time_unix_nano: u64, value: f64) -> NumberDataPoint {
        NumberDataPoint {
            time_unix_nano,
            value: Some(NumberValue::Double(value)),
            ..Default::default()
        }
    }
}

/// A quantile summary measurement at one point in time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SummaryDataPoint {
    /// The point attributes.
    pub attributes: Vec<KeyValue>,
    /// Start of the aggregation interval, unix nanos. 0 when unset.
    pub start_time_unix_nano: u64,
    /// Time of the measurement, unix nanos.
    pub time_unix_nano: u64,
    /// Number of observed values.
    pub count: u64,
    /// Sum of observed values.
    pub sum: f64,
    /// The quantile/value pairs.
    pub quantile_values: Vec<ValueAtQuantile>,
    /// Data point flags.
    pub flags: u32,
}

/// One quantile of a summary distribution.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ValueAtQuantile {
    /// The quantile, in [0.0, 1.0].
    pub quantile: f64,
    /// The value at that quantile.
    pub value: f64,
}

impl ValueAtQuantile {
    /// Pair a quantile with its value.
    #[must_use]
    pub fn new(quantile: f64, value: f64) -> ValueAtQuantile {
        ValueAtQuantile { quantile, value }
    }
}

/// A bucketed distribution measurement with explicit bounds.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistogramDataPoint {
    /// The point attributes.
    pub attributes: Vec<KeyValue>,
    /// Start of the aggregation interval, unix nanos. 0 when unset.
    pub start_time_unix_nano: u64,
    /// Time of the measurement, unix nanos.
    pub time_unix_nano: u64,
    /// Number of observed values.
    pub count: u64,
    /// Sum of observed values, when recorded.
    pub sum: Option<f64>,
    /// Per-bucket counts; one more entry than `explicit_bounds`.
    pub bucket_counts: Vec<u64>,
    /// Upper bucket bounds.
    pub explicit_bounds: Vec<f64>,
    /// Exemplars attached to this point.
    pub exemplars: Vec<Exemplar>,
    /// Data point flags.
    pub flags: u32,
    /// Minimum observed value, when recorded.
    pub min: Option<f64>,
    /// Maximum observed value, when recorded.
    pub max: Option<f64>,
}

/// A bucketed distribution measurement on an exponential scale.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExponentialHistogramDataPoint {
    /// The point attributes.
    pub attributes: Vec<KeyValue>,
    /// Start of the aggregation interval, unix nanos. 0 when unset.
    pub start_time_unix_nano: u64,
    /// Time of the measurement, unix nanos.
    pub time_unix_nano: u64,
    /// Number of observed values.
    pub count: u64,
    /// Sum of observed values, when recorded.
    pub sum: Option<f64>,
    /// Resolution of the histogram: bucket bounds grow as 2^(2^-scale).
    pub scale: i32,
    /// Count of values in the zero region.
    pub zero_count: u64,
    /// Positive value buckets.
    pub positive: Option<Buckets>,
    /// Negative value buckets.
    pub negative: Option<Buckets>,
    /// Exemplars attached to this point.
    pub exemplars: Vec<Exemplar>,
    /// Data point flags.
    pub flags: u32,
    /// Minimum observed value, when recorded.
    pub min: Option<f64>,
    /// Maximum observed value, when recorded.
    pub max: Option<f64>,
}

/// A contiguous run of exponential-histogram buckets.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Buckets {
    /// Bucket index of the first entry.
    pub offset: i32,
    /// The bucket counts.
    pub bucket_counts: Vec<u64>,
}

impl Buckets {
    /// Buckets starting at `offset`.
    #[must_use]
    pub fn new(offset: i32, bucket_counts: Vec<u64>) -> Buckets {
        Buckets {
            offset,
            bucket_counts,
        }
    }
}

/// A sampled measurement correlated with the trace that produced it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Exemplar {
    /// Attributes removed from the point by filtering.
    pub filtered_attributes: Vec<KeyValue>,
    /// Time of the sample, unix nanos.
    pub time_unix_nano: u64,
    /// The sampled measurement.
    pub value: Option<NumberValue>,
    /// Span id of the recording span; 8 bytes, or empty when unset.
    pub span_id: Vec<u8>,
    /// Trace id of the recording trace; 16 bytes, or empty when unset.
    pub trace_id: Vec<u8>,
}
