// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! View implementations for the crate's owned OTLP model, plus a materializer
//! that copies any view-backed tree into [`MetricsData`].

use crate::otlp::common::{AnyValue, InstrumentationScope, KeyValue, Resource};
use crate::otlp::metrics::{
    AggregationTemporality, Buckets, Exemplar, ExponentialHistogram, ExponentialHistogramDataPoint,
    Gauge, Histogram, HistogramDataPoint, Metric, MetricData, MetricsData, NumberDataPoint,
    NumberValue, ResourceMetrics, ScopeMetrics, Sum, Summary, SummaryDataPoint, ValueAtQuantile,
};
use crate::views::common::{AnyValueView, AttributeView, InstrumentationScopeView, Str, ValueType};
use crate::views::metrics::{
    BucketsView, DataView, ExemplarView, ExponentialHistogramDataPointView,
    ExponentialHistogramView, GaugeView, HistogramDataPointView, HistogramView, MetricView,
    MetricsView, NumberDataPointView, ResourceMetricsView, ScopeMetricsView, SumView,
    SummaryDataPointView, SummaryView, ValueAtQuantileView,
};
use crate::views::resource::ResourceView;

/* ---------- common ---------- */

impl<'val> AnyValueView<'val> for &'val AnyValue {
    type KeyValue = &'val KeyValue;
    type ArrayIter<'arr>
        = std::slice::Iter<'val, AnyValue>
    where
        Self: 'arr;
    type KeyValueIter<'kv>
        = std::slice::Iter<'val, KeyValue>
    where
        Self: 'kv;

    fn value_type(&self) -> ValueType {
        match self {
            AnyValue::Empty => ValueType::Empty,
            AnyValue::Str(_) => ValueType::String,
            AnyValue::Bool(_) => ValueType::Bool,
            AnyValue::Int(_) => ValueType::Int64,
            AnyValue::Double(_) => ValueType::Double,
            AnyValue::Array(_) => ValueType::Array,
            AnyValue::KvList(_) => ValueType::KeyValueList,
            AnyValue::Bytes(_) => ValueType::Bytes,
        }
    }

    fn as_string(&self) -> Option<Str<'_>> {
        match self {
            AnyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            AnyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn as_int64(&self) -> Option<i64> {
        match self {
            AnyValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    fn as_double(&self) -> Option<f64> {
        match self {
            AnyValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            AnyValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    fn as_array(&self) -> Option<Self::ArrayIter<'_>> {
        match *self {
            AnyValue::Array(values) => Some(values.iter()),
            _ => None,
        }
    }

    fn as_kvlist(&self) -> Option<Self::KeyValueIter<'_>> {
        match *self {
            AnyValue::KvList(entries) => Some(entries.iter()),
            _ => None,
        }
    }
}

impl<'kv> AttributeView for &'kv KeyValue {
    type Val<'val>
        = &'val AnyValue
    where
        Self: 'val;

    fn key(&self) -> Str<'_> {
        &self.key
    }

    fn value(&self) -> Option<Self::Val<'_>> {
        match &self.value {
            AnyValue::Empty => None,
            value => Some(value),
        }
    }
}

impl<'scp> InstrumentationScopeView for &'scp InstrumentationScope {
    type Attribute<'att>
        = &'att KeyValue
    where
        Self: 'att;
    type AttributeIter<'att>
        = std::slice::Iter<'att, KeyValue>
    where
        Self: 'att;

    fn name(&self) -> Option<Str<'_>> {
        (!self.name.is_empty()).then_some(self.name.as_str())
    }

    fn version(&self) -> Option<Str<'_>> {
        (!self.version.is_empty()).then_some(self.version.as_str())
    }

    fn attributes(&self) -> Self::AttributeIter<'_> {
        self.attributes.iter()
    }

    fn dropped_attributes_count(&self) -> u32 {
        self.dropped_attributes_count
    }
}

impl<'res> ResourceView for &'res Resource {
    type Attribute<'att>
        = &'att KeyValue
    where
        Self: 'att;
    type AttributesIter<'att>
        = std::slice::Iter<'att, KeyValue>
    where
        Self: 'att;

    fn attributes(&self) -> Self::AttributesIter<'_> {
        self.attributes.iter()
    }

    fn dropped_attributes_count(&self) -> u32 {
        self.dropped_attributes_count
    }
}

/* ---------- metrics tree ---------- */

impl MetricsView for MetricsData {
    type ResourceMetrics<'res>
        = &'res ResourceMetrics
    where
        Self: 'res;
    type ResourceMetricsIter<'res>
        = std::slice::Iter<'res, ResourceMetrics>
    where
        Self: 'res;

    fn resources(&self) -> Self::ResourceMetricsIter<'_> {
        self.resource_metrics.iter()
    }
}

impl<'rm> ResourceMetricsView for &'rm ResourceMetrics {
    type Resource<'res>
        = &'res Resource
    where
        Self: 'res;
    type ScopeMetrics<'scp>
        = &'scp ScopeMetrics
    where
        Self: 'scp;
    type ScopesIter<'scp>
        = std::slice::Iter<'scp, ScopeMetrics>
    where
        Self: 'scp;

    fn resource(&self) -> Option<Self::Resource<'_>> {
        self.resource.as_ref()
    }

    fn scopes(&self) -> Self::ScopesIter<'_> {
        self.scope_metrics.iter()
    }

    fn schema_url(&self) -> Str<'_> {
        &self.schema_url
    }
}

impl<'sm> ScopeMetricsView for &'sm ScopeMetrics {
    type Scope<'scp>
        = &'scp InstrumentationScope
    where
        Self: 'scp;
    type Metric<'met>
        = &'met Metric
    where
        Self: 'met;
    type MetricIter<'met>
        = std::slice::Iter<'met, Metric>
    where
        Self: 'met;

    fn scope(&self) -> Option<Self::Scope<'_>> {
        self.scope.as_ref()
    }

    fn metrics(&self) -> Self::MetricIter<'_> {
        self.metrics.iter()
    }

    fn schema_url(&self) -> Str<'_> {
        &self.schema_url
    }
}

impl<'met> MetricView for &'met Metric {
    type Data<'dat>
        = &'dat MetricData
    where
        Self: 'dat;

    fn name(&self) -> Str<'_> {
        &self.name
    }

    fn description(&self) -> Str<'_> {
        &self.description
    }

    fn unit(&self) -> Str<'_> {
        &self.unit
    }

    fn data(&self) -> Option<Self::Data<'_>> {
        self.data.as_ref()
    }
}

impl<'val> DataView<'val> for &'val MetricData {
    type Gauge<'gauge>
        = &'gauge Gauge
    where
        Self: 'gauge;
    type Sum<'sum>
        = &'sum Sum
    where
        Self: 'sum;
    type Summary<'summary>
        = &'summary Summary
    where
        Self: 'summary;
    type Histogram<'histogram>
        = &'histogram Histogram
    where
        Self: 'histogram;
    type ExponentialHistogram<'exp>
        = &'exp ExponentialHistogram
    where
        Self: 'exp;

    fn as_gauge(&self) -> Option<Self::Gauge<'_>> {
        match self {
            MetricData::Gauge(gauge) => Some(gauge),
            _ => None,
        }
    }

    fn as_sum(&self) -> Option<Self::Sum<'_>> {
        match self {
            MetricData::Sum(sum) => Some(sum),
            _ => None,
        }
    }

    fn as_summary(&self) -> Option<Self::Summary<'_>> {
        match self {
            MetricData::Summary(summary) => Some(summary),
            _ => None,
        }
    }

    fn as_histogram(&self) -> Option<Self::Histogram<'_>> {
        match self {
            MetricData::Histogram(histogram) => Some(histogram),
            _ => None,
        }
    }

    fn as_exponential_histogram(&self) -> Option<Self::ExponentialHistogram<'_>> {
        match self {
            MetricData::ExponentialHistogram(histogram) => Some(histogram),
            _ => None,
        }
    }
}

impl<'g> GaugeView for &'g Gauge {
    type NumberDataPoint<'dp>
        = &'dp NumberDataPoint
    where
        Self: 'dp;
    type NumberDataPointIter<'dp>
        = std::slice::Iter<'dp, NumberDataPoint>
    where
        Self: 'dp;

    fn data_points(&self) -> Self::NumberDataPointIter<'_> {
        self.data_points.iter()
    }
}

impl<'s> SumView for &'s Sum {
    type NumberDataPoint<'dp>
        = &'dp NumberDataPoint
    where
        Self: 'dp;
    type NumberDataPointIter<'dp>
        = std::slice::Iter<'dp, NumberDataPoint>
    where
        Self: 'dp;

    fn data_points(&self) -> Self::NumberDataPointIter<'_> {
        self.data_points.iter()
    }

    fn aggregation_temporality(&self) -> AggregationTemporality {
        self.aggregation_temporality
    }

    fn is_monotonic(&self) -> bool {
        self.is_monotonic
    }
}

impl<'s> SummaryView for &'s Summary {
    type SummaryDataPoint<'dp>
        = &'dp SummaryDataPoint
    where
        Self: 'dp;
    type SummaryDataPointIter<'dp>
        = std::slice::Iter<'dp, SummaryDataPoint>
    where
        Self: 'dp;

    fn data_points(&self) -> Self::SummaryDataPointIter<'_> {
        self.data_points.iter()
    }
}

impl<'h> HistogramView for &'h Histogram {
    type HistogramDataPoint<'dp>
        = &'dp HistogramDataPoint
    where
        Self: 'dp;
    type HistogramDataPointIter<'dp>
        = std::slice::Iter<'dp, HistogramDataPoint>
    where
        Self: 'dp;

    fn data_points(&self) -> Self::HistogramDataPointIter<'_> {
        self.data_points.iter()
    }

    fn aggregation_temporality(&self) -> AggregationTemporality {
        self.aggregation_temporality
    }
}

impl<'h> ExponentialHistogramView for &'h ExponentialHistogram {
    type ExponentialHistogramDataPoint<'edp>
        = &'edp ExponentialHistogramDataPoint
    where
        Self: 'edp;
    type ExponentialHistogramDataPointIter<'edp>
        = std::slice::Iter<'edp, ExponentialHistogramDataPoint>
    where
        Self: 'edp;

    fn data_points(&self) -> Self::ExponentialHistogramDataPointIter<'_> {
        self.data_points.iter()
    }

    fn aggregation_temporality(&self) -> AggregationTemporality {
        self.aggregation_temporality
    }
}

impl<'dp> NumberDataPointView for &'dp NumberDataPoint {
    type Attribute<'att>
        = &'att KeyValue
    where
        Self: 'att;
    type AttributeIter<'att>
        = std::slice::Iter<'att, KeyValue>
    where
        Self: 'att;
    type Exemplar<'ex>
        = &'ex Exemplar
    where
        Self: 'ex;
    type ExemplarIter<'ex>
        = std::slice::Iter<'ex, Exemplar>
    where
        Self: 'ex;

    fn attributes(&self) -> Self::AttributeIter<'_> {
        self.attributes.iter()
    }

    fn start_time_unix_nano(&self) -> u64 {
        self.start_time_unix_nano
    }

    fn time_unix_nano(&self) -> u64 {
        self.time_unix_nano
    }

    fn value(&self) -> Option<NumberValue> {
        self.value
    }

    fn exemplars(&self) -> Self::ExemplarIter<'_> {
        self.exemplars.iter()
    }

    fn flags(&self) -> u32 {
        self.flags
    }
}

impl<'ex> ExemplarView for &'ex Exemplar {
    type Attribute<'att>
        = &'att KeyValue
    where
        Self: 'att;
    type AttributeIter<'att>
        = std::slice::Iter<'att, KeyValue>
    where
        Self: 'att;

    fn filtered_attributes(&self) -> Self::AttributeIter<'_> {
        self.filtered_attributes.iter()
    }

    fn time_unix_nano(&self) -> u64 {
        self.time_unix_nano
    }

    fn value(&self) -> Option<NumberValue> {
        self.value
    }

    fn span_id(&self) -> Option<&[u8]> {
        (!self.span_id.is_empty()).then_some(self.span_id.as_slice())
    }

    fn trace_id(&self) -> Option<&[u8]> {
        (!self.trace_id.is_empty()).then_some(self.trace_id.as_slice())
    }
}

impl<'dp> SummaryDataPointView for &'dp SummaryDataPoint {
    type Attribute<'att>
        = &'att KeyValue
    where
        Self: 'att;
    type AttributeIter<'att>
        = std::slice::Iter<'att, KeyValue>
    where
        Self: 'att;
    type ValueAtQuantile<'vaq>
        = &'vaq ValueAtQuantile
    where
        Self: 'vaq;
    type ValueAtQuantileIter<'vaq>
        = std::slice::Iter<'vaq, ValueAtQuantile>
    where
        Self: 'vaq;

    fn attributes(&self) -> Self::AttributeIter<'_> {
        self.attributes.iter()
    }

    fn start_time_unix_nano(&self) -> u64 {
        self.start_time_unix_nano
    }

    fn time_unix_nano(&self) -> u64 {
        self.time_unix_nano
    }

    fn count(&self) -> u64 {
        self.count
    }

    fn sum(&self) -> f64 {
        self.sum
    }

    fn quantile_values(&self) -> Self::ValueAtQuantileIter<'_> {
        self.quantile_values.iter()
    }

    fn flags(&self) -> u32 {
        self.flags
    }
}

impl<'vaq> ValueAtQuantileView for &'vaq ValueAtQuantile {
    fn quantile(&self) -> f64 {
        self.quantile
    }

    fn value(&self) -> f64 {
        self.value
    }
}

impl<'dp> HistogramDataPointView for &'dp HistogramDataPoint {
    type Attribute<'att>
        = &'att KeyValue
    where
        Self: 'att;
    type AttributeIter<'att>
        = std::slice::Iter<'att, KeyValue>
    where
        Self: 'att;
    type BucketCountIter<'bc>
        = std::iter::Copied<std::slice::Iter<'bc, u64>>
    where
        Self: 'bc;
    type ExplicitBoundsIter<'eb>
        = std::iter::Copied<std::slice::Iter<'eb, f64>>
    where
        Self: 'eb;
    type Exemplar<'ex>
        = &'ex Exemplar
    where
        Self: 'ex;
    type ExemplarIter<'ex>
        = std::slice::Iter<'ex, Exemplar>
    where
        Self: 'ex;

    fn attributes(&self) -> Self::AttributeIter<'_> {
        self.attributes.iter()
    }

    fn start_time_unix_nano(&self) -> u64 {
        self.start_time_unix_nano
    }

    fn time_unix_nano(&self) -> u64 {
        self.time_unix_nano
    }

    fn count(&self) -> u64 {
        self.count
    }

    fn sum(&self) -> Option<f64> {
        self.sum
    }

    fn bucket_counts(&self) -> Self::BucketCountIter<'_> {
        self.bucket_counts.iter().copied()
    }

    fn explicit_bounds(&self) -> Self::ExplicitBoundsIter<'_> {
        self.explicit_bounds.iter().copied()
    }

    fn exemplars(&self) -> Self::ExemplarIter<'_> {
        self.exemplars.iter()
    }

    fn flags(&self) -> u32 {
        self.flags
    }

    fn min(&self) -> Option<f64> {
        self.min
    }

    fn max(&self) -> Option<f64> {
        self.max
    }
}

impl<'dp> ExponentialHistogramDataPointView for &'dp ExponentialHistogramDataPoint {
    type Attribute<'att>
        = &'att KeyValue
    where
        Self: 'att;
    type AttributeIter<'att>
        = std::slice::Iter<'att, KeyValue>
    where
        Self: 'att;
    type Buckets<'b>
        = &'b Buckets
    where
        Self: 'b;
    type Exemplar<'ex>
        = &'ex Exemplar
    where
        Self: 'ex;
    type ExemplarIter<'ex>
        = std::slice::Iter<'ex, Exemplar>
    where
        Self: 'ex;

    fn attributes(&self) -> Self::AttributeIter<'_> {
        self.attributes.iter()
    }

    fn start_time_unix_nano(&self) -> u64 {
        self.start_time_unix_nano
    }

    fn time_unix_nano(&self) -> u64 {
        self.time_unix_nano
    }

    fn count(&self) -> u64 {
        self.count
    }

    fn sum(&self) -> Option<f64> {
        self.sum
    }

    fn scale(&self) -> i32 {
        self.scale
    }

    fn zero_count(&self) -> u64 {
        self.zero_count
    }

    fn positive(&self) -> Option<Self::Buckets<'_>> {
        self.positive.as_ref()
    }

    fn negative(&self) -> Option<Self::Buckets<'_>> {
        self.negative.as_ref()
    }

    fn exemplars(&self) -> Self::ExemplarIter<'_> {
        self.exemplars.iter()
    }

    fn flags(&self) -> u32 {
        self.flags
    }

    fn min(&self) -> Option<f64> {
        self.min
    }

    fn max(&self) -> Option<f64> {
        self.max
    }
}

impl<'b> BucketsView for &'b Buckets {
    type BucketCountIter<'bc>
        = std::iter::Copied<std::slice::Iter<'bc, u64>>
    where
        Self: 'bc;

    fn offset(&self) -> i32 {
        self.offset
    }

    fn bucket_counts(&self) -> Self::BucketCountIter<'_> {
        self.bucket_counts.iter().copied()
    }
}

/* ---------- materialization ---------- */

impl MetricsData {
    /// Copy any view-backed metrics tree into the owned model.
    ///
    /// This is the adapter between protobuf-backed views and the encoder,
    /// which buffers and re-orders data and therefore works on owned values.
    pub fn from_view<T: MetricsView>(view: &T) -> MetricsData {
        let mut resource_metrics = Vec::new();
        for rm in view.resources() {
            let resource = rm.resource().map(|res| Resource {
                attributes: collect_attributes(res.attributes()),
                dropped_attributes_count: res.dropped_attributes_count(),
            });

            let mut scope_metrics = Vec::new();
            for sm in rm.scopes() {
                let scope = sm.scope().map(|scope| InstrumentationScope {
                    name: scope.name().unwrap_or_default().to_owned(),
                    version: scope.version().unwrap_or_default().to_owned(),
                    attributes: collect_attributes(scope.attributes()),
                    dropped_attributes_count: scope.dropped_attributes_count(),
                });

                let metrics = sm
                    .metrics()
                    .map(|metric| Metric {
                        name: metric.name().to_owned(),
                        description: metric.description().to_owned(),
                        unit: metric.unit().to_owned(),
                        data: metric.data().and_then(|data| materialize_data(&data)),
                    })
                    .collect();

                scope_metrics.push(ScopeMetrics {
                    scope,
                    metrics,
                    schema_url: sm.schema_url().to_owned(),
                });
            }

            resource_metrics.push(ResourceMetrics {
                resource,
                scope_metrics,
                schema_url: rm.schema_url().to_owned(),
            });
        }
        MetricsData { resource_metrics }
    }
}

fn collect_attributes<A, I>(attrs: I) -> Vec<KeyValue>
where
    A: AttributeView,
    I: Iterator<Item = A>,
{
    attrs
        .map(|kv| KeyValue {
            key: kv.key().to_owned(),
            value: kv
                .value()
                .map(|value| materialize_value(&value))
                .unwrap_or_default(),
        })
        .collect()
}

fn materialize_value<'val, V: AnyValueView<'val>>(value: &V) -> AnyValue {
    match value.value_type() {
        ValueType::Empty => AnyValue::Empty,
        ValueType::String => AnyValue::Str(value.as_string().unwrap_or_default().to_owned()),
        ValueType::Bool => AnyValue::Bool(value.as_bool().unwrap_or_default()),
        ValueType::Int64 => AnyValue::Int(value.as_int64().unwrap_or_default()),
        ValueType::Double => AnyValue::Double(value.as_double().unwrap_or_default()),
        ValueType::Bytes => AnyValue::Bytes(value.as_bytes().unwrap_or_default().to_vec()),
        ValueType::Array => AnyValue::Array(
            value
                .as_array()
                .map(|items| items.map(|item| materialize_value(&item)).collect())
                .unwrap_or_default(),
        ),
        ValueType::KeyValueList => AnyValue::KvList(
            value
                .as_kvlist()
                .map(collect_attributes)
                .unwrap_or_default(),
        ),
    }
}

fn materialize_data<'val, D: DataView<'val>>(data: &D) -> Option<MetricData> {
    if let Some(gauge) = data.as_gauge() {
        return Some(MetricData::Gauge(Gauge {
            data_points: gauge.data_points().map(|p| number_point(&p)).collect(),
        }));
    }
    if let Some(sum) = data.as_sum() {
        return Some(MetricData::Sum(Sum {
            aggregation_temporality: sum.aggregation_temporality(),
            is_monotonic: sum.is_monotonic(),
            data_points: sum.data_points().map(|p| number_point(&p)).collect(),
        }));
    }
    if let Some(summary) = data.as_summary() {
        return Some(MetricData::Summary(Summary {
            data_points: summary.data_points().map(|p| summary_point(&p)).collect(),
        }));
    }
    if let Some(histogram) = data.as_histogram() {
        return Some(MetricData::Histogram(Histogram {
            aggregation_temporality: histogram.aggregation_temporality(),
            data_points: histogram
                .data_points()
                .map(|p| histogram_point(&p))
                .collect(),
        }));
    }
    if let Some(histogram) = data.as_exponential_histogram() {
        return Some(MetricData::ExponentialHistogram(ExponentialHistogram {
            aggregation_temporality: histogram.aggregation_temporality(),
            data_points: histogram
                .data_points()
                .map(|p| exp_histogram_point(&p))
                .collect(),
        }));
    }
    None
}

fn number_point<P: NumberDataPointView>(point: &P) -> NumberDataPoint {
    NumberDataPoint {
        attributes: collect_attributes(point.attributes()),
        start_time_unix_nano: point.start_time_unix_nano(),
        time_unix_nano: point.time_unix_nano(),
        value: point.value(),
        exemplars: collect_exemplars(point.exemplars()),
        flags: point.flags(),
    }
}

fn summary_point<P: SummaryDataPointView>(point: &P) -> SummaryDataPoint {
    SummaryDataPoint {
        attributes: collect_attributes(point.attributes()),
        start_time_unix_nano: point.start_time_unix_nano(),
        time_unix_nano: point.time_unix_nano(),
        count: point.count(),
        sum: point.sum(),
        quantile_values: point
            .quantile_values()
            .map(|qv| ValueAtQuantile {
                quantile: qv.quantile(),
                value: qv.value(),
            })
            .collect(),
        flags: point.flags(),
    }
}

fn histogram_point<P: HistogramDataPointView>(point: &P) -> HistogramDataPoint {
    HistogramDataPoint {
        attributes: collect_attributes(point.attributes()),
        start_time_unix_nano: point.start_time_unix_nano(),
        time_unix_nano: point.time_unix_nano(),
        count: point.count(),
        sum: point.sum(),
        bucket_counts: point.bucket_counts().collect(),
        explicit_bounds: point.explicit_bounds().collect(),
        exemplars: collect_exemplars(point.exemplars()),
        flags: point.flags(),
        min: point.min(),
        max: point.max(),
    }
}

fn exp_histogram_point<P: ExponentialHistogramDataPointView>(
    point: &P,
) -> ExponentialHistogramDataPoint {
    ExponentialHistogramDataPoint {
        attributes: collect_attributes(point.attributes()),
        start_time_unix_nano: point.start_time_unix_nano(),
        time_unix_nano: point.time_unix_nano(),
        count: point.count(),
        sum: point.sum(),
        scale: point.scale(),
        zero_count: point.zero_count(),
        positive: point.positive().map(|b| materialize_buckets(&b)),
        negative: point.negative().map(|b| materialize_buckets(&b)),
        exemplars: collect_exemplars(point.exemplars()),
        flags: point.flags(),
        min: point.min(),
        max: point.max(),
    }
}

fn materialize_buckets<B: BucketsView>(buckets: &B) -> Buckets {
    Buckets {
        offset: buckets.offset(),
        bucket_counts: buckets.bucket_counts().collect(),
    }
}

fn collect_exemplars<E, I>(exemplars: I) -> Vec<Exemplar>
where
    E: ExemplarView,
    I: Iterator<Item = E>,
{
    exemplars
        .map(|ex| Exemplar {
            filtered_attributes: collect_attributes(ex.filtered_attributes()),
            time_unix_nano: ex.time_unix_nano(),
            value: ex.value(),
            span_id: ex.span_id().map(<[u8]>::to_vec).unwrap_or_default(),
            trace_id: ex.trace_id().map(<[u8]>::to_vec).unwrap_or_default(),
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_materialize_is_identity_on_model() {
        let data = MetricsData::new(vec![ResourceMetrics {
            resource: Some(Resource::new(vec![KeyValue::new(
                "host",
                AnyValue::new_string("a"),
            )])),
            scope_metrics: vec![ScopeMetrics {
                scope: Some(InstrumentationScope::new("lib")),
                metrics: vec![Metric::new_sum(
                    "requests",
                    Sum::new(
                        AggregationTemporality::Cumulative,
                        true,
                        vec![NumberDataPoint::new_int(5, 12)],
                    ),
                )],
                schema_url: "https://example.com/1.0".to_owned(),
            }],
            schema_url: String::new(),
        }]);

        assert_eq!(MetricsData::from_view(&data), data);
    }

    #[test]
    fn test_materialize_nested_values() {
        let nested = AnyValue::Array(vec![
            AnyValue::new_int(1),
            AnyValue::KvList(vec![KeyValue::new("k", AnyValue::new_bool(true))]),
        ]);
        let data = MetricsData::new(vec![ResourceMetrics {
            resource: Some(Resource::new(vec![KeyValue::new("deep", nested)])),
            scope_metrics: vec![],
            schema_url: String::new(),
        }]);

        assert_eq!(MetricsData::from_view(&data), data);
    }
}
