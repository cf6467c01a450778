// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Reader traits for the OTLP metrics tree.
//!
//! ```text
//! MetricsData
//! └── ResourceMetrics
//!     ├── Resource
//!     ├── SchemaURL
//!     └── ScopeMetrics
//!         ├── Scope
//!         ├── SchemaURL
//!         └── Metric
//!             ├── Name / Description / Unit
//!             └── Data (gauge | sum | summary | histogram | exp histogram)
//! ```

use crate::otlp::metrics::{AggregationTemporality, NumberValue};
use crate::views::common::{AttributeView, InstrumentationScopeView, Str};
use crate::views::resource::ResourceView;

/// View for the top level MetricsData.
pub trait MetricsView {
    /// The resource-metrics view type of this implementation.
    type ResourceMetrics<'res>: ResourceMetricsView
    where
        Self: 'res;

    /// Iterator over resource-metrics entries.
    type ResourceMetricsIter<'res>: Iterator<Item = Self::ResourceMetrics<'res>>
    where
        Self: 'res;

    /// The resource-metrics entries of this batch.
    fn resources(&self) -> Self::ResourceMetricsIter<'_>;
}

/// View for ResourceMetrics.
pub trait ResourceMetricsView {
    /// The resource view type of this implementation.
    type Resource<'res>: ResourceView
    where
        Self: 'res;

    /// The scope-metrics view type of this implementation.
    type ScopeMetrics<'scp>: ScopeMetricsView
    where
        Self: 'scp;

    /// Iterator over scope-metrics entries.
    type ScopesIter<'scp>: Iterator<Item = Self::ScopeMetrics<'scp>>
    where
        Self: 'scp;

    /// The resource, when described.
    fn resource(&self) -> Option<Self::Resource<'_>>;

    /// The scope-metrics entries of this resource.
    fn scopes(&self) -> Self::ScopesIter<'_>;

    /// The resource schema URL. Empty when unknown.
    fn schema_url(&self) -> Str<'_>;
}

/// View for ScopeMetrics.
pub trait ScopeMetricsView {
    /// The scope view type of this implementation.
    type Scope<'scp>: InstrumentationScopeView
    where
        Self: 'scp;

    /// The metric view type of this implementation.
    type Metric<'met>: MetricView
    where
        Self: 'met;

    /// Iterator over metrics.
    type MetricIter<'met>: Iterator<Item = Self::Metric<'met>>
    where
        Self: 'met;

    /// The instrumentation scope, when known.
    fn scope(&self) -> Option<Self::Scope<'_>>;

    /// The metrics of this scope.
    fn metrics(&self) -> Self::MetricIter<'_>;

    /// The metrics schema URL. Empty when unknown.
    fn schema_url(&self) -> Str<'_>;
}

/// View for one Metric.
pub trait MetricView {
    /// The data view type of this implementation.
    type Data<'dat>: DataView<'dat>
    where
        Self: 'dat;

    /// The metric name.
    fn name(&self) -> Str<'_>;

    /// The metric description. Empty when unset.
    fn description(&self) -> Str<'_>;

    /// The metric unit. Empty when unset.
    fn unit(&self) -> Str<'_>;

    /// The type-discriminated payload. `None` for an empty metric.
    fn data(&self) -> Option<Self::Data<'_>>;
}

/// View for the type-discriminated metric payload.
///
/// Exactly one of the `as_*` accessors returns `Some` for a given payload.
pub trait DataView<'val> {
    /// The gauge view type of this implementation.
    type Gauge<'gauge>: GaugeView
    where
        Self: 'gauge;

    /// The sum view type of this implementation.
    type Sum<'sum>: SumView
    where
        Self: 'sum;

    /// The summary view type of this implementation.
    type Summary<'summary>: SummaryView
    where
        Self: 'summary;

    /// The histogram view type of this implementation.
    type Histogram<'histogram>: HistogramView
    where
        Self: 'histogram;

    /// The exponential-histogram view type of this implementation.
    type ExponentialHistogram<'exp>: ExponentialHistogramView
    where
        Self: 'exp;

    /// The gauge payload.
    fn as_gauge(&self) -> Option<Self::Gauge<'_>>;

    /// The sum payload.
    fn as_sum(&self) -> Option<Self::Sum<'_>>;

    /// The summary payload.
    fn as_summary(&self) -> Option<Self::Summary<'_>>;

    /// The histogram payload.
    fn as_histogram(&self) -> Option<Self::Histogram<'_>>;

    /// The exponential-histogram payload.
    fn as_exponential_histogram(&self) -> Option<Self::ExponentialHistogram<'_>>;
}

/// View for Gauge.
pub trait GaugeView {
    /// The number-data-point view type of this implementation.
    type NumberDataPoint<'dp>: NumberDataPointView
    where
        Self: 'dp;

    /// Iterator over data points.
    type NumberDataPointIter<'dp>: Iterator<Item = Self::NumberDataPoint<'dp>>
    where
        Self: 'dp;

    /// The gauge's data points.
    fn data_points(&self) -> Self::NumberDataPointIter<'_>;
}

/// View for Sum.
pub trait SumView {
    /// The number-data-point view type of this implementation.
    type NumberDataPoint<'dp>: NumberDataPointView
    where
        Self: 'dp;

    /// Iterator over data points.
    type NumberDataPointIter<'dp>: Iterator<Item = Self::NumberDataPoint<'dp>>
    where
        Self: 'dp;

    /// The sum's data points.
    fn data_points(&self) -> Self::NumberDataPointIter<'_>;

    /// The aggregation temporality.
    fn aggregation_temporality(&self) -> AggregationTemporality;

    /// Whether the sum is monotonic.
    fn is_monotonic(&self) -> bool;
}

/// View for Summary.
pub trait SummaryView {
    /// The summary-data-point view type of this implementation.
    type SummaryDataPoint<'dp>: SummaryDataPointView
    where
        Self: 'dp;

    /// Iterator over data points.
    type SummaryDataPointIter<'dp>: Iterator<Item = Self::SummaryDataPoint<'dp>>
    where
        Self: 'dp;

    /// The summary's data points.
    fn data_points(&self) -> Self::SummaryDataPointIter<'_>;
}

/// View for Histogram.
pub trait HistogramView {
    /// The histogram-data-point view type of this implementation.
    type HistogramDataPoint<'dp>: HistogramDataPointView
    where
        Self: 'dp;

    /// Iterator over data points.
    type HistogramDataPointIter<'dp>: Iterator<Item = Self::HistogramDataPoint<'dp>>
    where
        Self: 'dp;

    /// The histogram's data points.
    fn data_points(&self) -> Self::HistogramDataPointIter<'_>;

    /// The aggregation temporality.
    fn aggregation_temporality(&self) -> AggregationTemporality;
}

/// View for ExponentialHistogram.
pub trait ExponentialHistogramView {
    /// The data-point view type of this implementation.
    type ExponentialHistogramDataPoint<'edp>: ExponentialHistogramDataPointView
    where
        Self: 'edp;

    /// Iterator over data points.
    type ExponentialHistogramDataPointIter<'edp>: Iterator<
        Item = Self::ExponentialHistogramDataPoint<'edp>,
    >
    where
        Self: 'edp;

    /// The histogram's data points.
    fn data_points(&self) -> Self::ExponentialHistogramDataPointIter<'_>;

    /// The aggregation temporality.
    fn aggregation_temporality(&self) -> AggregationTemporality;
}

/// View for NumberDataPoint.
pub trait NumberDataPointView {
    /// The attribute view type of this implementation.
    type Attribute<'att>: AttributeView
    where
        Self: 'att;

    /// Iterator over attributes.
    type AttributeIter<'att>: Iterator<Item = Self::Attribute<'att>>
    where
        Self: 'att;

    /// The exemplar view type of this implementation.
    type Exemplar<'ex>: ExemplarView
    where
        Self: 'ex;

    /// Iterator over exemplars.
    type ExemplarIter<'ex>: Iterator<Item = Self::Exemplar<'ex>>
    where
        Self: 'ex;

    /// The point attributes.
    fn attributes(&self) -> Self::AttributeIter<'_>;

    /// Start of the aggregation interval, unix nanos. 0 when unset.
    fn start_time_unix_nano(&self) -> u64;

    /// Time of the measurement, unix nanos.
    fn time_unix_nano(&self) -> u64;

    /// The measurement. `None` when no value was recorded.
    fn value(&self) -> Option<NumberValue>;

    /// The point's exemplars.
    fn exemplars(&self) -> Self::ExemplarIter<'_>;

    /// The data point flags.
    fn flags(&self) -> u32;
}

/// View for Exemplar.
pub trait ExemplarView {
    /// The attribute view type of this implementation.
    type Attribute<'att>: AttributeView
    where
        Self: 'att;

    /// Iterator over attributes.
    type AttributeIter<'att>: Iterator<Item = Self::Attribute<'att>>
    where
        Self: 'att;

    /// The attributes removed from the point by filtering.
    fn filtered_attributes(&self) -> Self::AttributeIter<'_>;

    /// Time of the sample, unix nanos.
    fn time_unix_nano(&self) -> u64;

    /// The sampled measurement.
    fn value(&self) -> Option<NumberValue>;

    /// Raw span id bytes. `None` when unset. Length is validated by the
    /// encoder, not the view.
    fn span_id(&self) -> Option<&[u8]>;

    /// Raw trace id bytes. `None` when unset. Length is validated by the
    /// encoder, not the view.
    fn trace_id(&self) -> Option<&[u8]>;
}

/// View for SummaryDataPoint.
pub trait SummaryDataPointView {
    /// The attribute view type of this implementation.
    type Attribute<'att>: AttributeView
    where
        Self: 'att;

    /// Iterator over attributes.
    type AttributeIter<'att>: Iterator<Item = Self::Attribute<'att>>
    where
        Self: 'att;

    /// The quantile-value view type of this implementation.
    type ValueAtQuantile<'vaq>: ValueAtQuantileView
    where
        Self: 'vaq;

    /// Iterator over quantile values.
    type ValueAtQuantileIter<'vaq>: Iterator<Item = Self::ValueAtQuantile<'vaq>>
    where
        Self: 'vaq;

    /// The point attributes.
    fn attributes(&self) -> Self::AttributeIter<'_>;

    /// Start of the aggregation interval, unix nanos. 0 when unset.
    fn start_time_unix_nano(&self) -> u64;

    /// Time of the measurement, unix nanos.
    fn time_unix_nano(&self) -> u64;

    /// Number of observed values.
    fn count(&self) -> u64;

    /// Sum of observed values.
    fn sum(&self) -> f64;

    /// The quantile/value pairs.
    fn quantile_values(&self) -> Self::ValueAtQuantileIter<'_>;

    /// The data point flags.
    fn flags(&self) -> u32;
}

/// View for one quantile of a summary distribution.
pub trait ValueAtQuantileView {
    /// The quantile, in [0.0, 1.0].
    fn quantile(&self) -> f64;

    /// The value at that quantile.
    fn value(&self) -> f64;
}

/// View for HistogramDataPoint.
pub trait HistogramDataPointView {
    /// The attribute view type of this implementation.
    type Attribute<'att>: AttributeView
    where
        Self: 'att;

    /// Iterator over attributes.
    type AttributeIter<'att>: Iterator<Item = Self::Attribute<'att>>
    where
        Self: 'att;

    /// Iterator over bucket counts.
    type BucketCountIter<'bc>: Iterator<Item = u64>
    where
        Self: 'bc;

    /// Iterator over explicit bounds.
    type ExplicitBoundsIter<'eb>: Iterator<Item = f64>
    where
        Self: 'eb;

    /// The exemplar view type of this implementation.
    type Exemplar<'ex>: ExemplarView
    where
        Self: 'ex;

    /// Iterator over exemplars.
    type ExemplarIter<'ex>: Iterator<Item = Self::Exemplar<'ex>>
    where
        Self: 'ex;

    /// The point attributes.
    fn attributes(&self) -> Self::AttributeIter<'_>;

    /// Start of the aggregation interval, unix nanos. 0 when unset.
    fn start_time_unix_nano(&self) -> u64;

    /// Time of the measurement, unix nanos.
    fn time_unix_nano(&self) -> u64;

    /// Number of observed values.
    fn count(&self) -> u64;

    /// Sum of observed values, when recorded.
    fn sum(&self) -> Option<f64>;

    /// The per-bucket counts.
    fn bucket_counts(&self) -> Self::BucketCountIter<'_>;

    /// The explicit bucket bounds.
    fn explicit_bounds(&self) -> Self::ExplicitBoundsIter<'_>;

    /// The point's exemplars.
    fn exemplars(&self) -> Self::ExemplarIter<'_>;

    /// The data point flags.
    fn flags(&self) -> u32;

    /// Minimum observed value, when recorded.
    fn min(&self) -> Option<f64>;

    /// Maximum observed value, when recorded.
    fn max(&self) -> Option<f64>;
}

/// View for ExponentialHistogramDataPoint.
pub trait ExponentialHistogramDataPointView {
    /// The attribute view type of this implementation.
    type Attribute<'att>: AttributeView
    where
        Self: 'att;

    /// Iterator over attributes.
    type AttributeIter<'att>: Iterator<Item = Self::Attribute<'att>>
    where
        Self: 'att;

    /// The buckets view type of this implementation.
    type Buckets<'b>: BucketsView
    where
        Self: 'b;

    /// The exemplar view type of this implementation.
    type Exemplar<'ex>: ExemplarView
    where
        Self: 'ex;

    /// Iterator over exemplars.
    type ExemplarIter<'ex>: Iterator<Item = Self::Exemplar<'ex>>
    where
        Self: 'ex;

    /// The point attributes.
    fn attributes(&self) -> Self::AttributeIter<'_>;

    /// Start of the aggregation interval, unix nanos. 0 when unset.
    fn start_time_unix_nano(&self) -> u64;

    /// Time of the measurement, unix nanos.
    fn time_unix_nano(&self) -> u64;

    /// Number of observed values.
    fn count(&self) -> u64;

    /// Sum of observed values, when recorded.
    fn sum(&self) -> Option<f64>;

    /// The histogram resolution.
    fn scale(&self) -> i32;

    /// Count of values in the zero region.
    fn zero_count(&self) -> u64;

    /// Positive value buckets.
    fn positive(&self) -> Option<Self::Buckets<'_>>;

    /// Negative value buckets.
    fn negative(&self) -> Option<Self::Buckets<'_>>;

    /// The point's exemplars.
    fn exemplars(&self) -> Self::ExemplarIter<'_>;

    /// The data point flags.
    fn flags(&self) -> u32;

    /// Minimum observed value, when recorded.
    fn min(&self) -> Option<f64>;

    /// Maximum observed value, when recorded.
    fn max(&self) -> Option<f64>;
}

/// View for a run of exponential-histogram buckets.
pub trait BucketsView {
    /// Iterator over bucket counts.
    type BucketCountIter<'bc>: Iterator<Item = u64>
    where
        Self: 'bc;

    /// Bucket index of the first entry.
    fn offset(&self) -> i32;

    /// The bucket counts.
    fn bucket_counts(&self) -> Self::BucketCountIter<'_>;
}
