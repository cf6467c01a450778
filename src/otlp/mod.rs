// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Owned, protobuf-free equivalent of the OTLP metrics data model.
//!
//! The encoder consumes this tree (directly, or materialized from any
//! [`crate::views::metrics::MetricsView`] implementation) and the decoder
//! produces it. Field semantics follow the OTLP protocol definitions; only
//! representation differs (owned Rust values instead of generated protobuf
//! structs).

pub mod common;
pub mod metrics;

pub use common::{AnyValue, InstrumentationScope, KeyValue, Resource};
pub use metrics::{
    AggregationTemporality, Buckets, Exemplar, ExponentialHistogram, ExponentialHistogramDataPoint,
    Gauge, Histogram, HistogramDataPoint, Metric, MetricData, MetricsData, NumberDataPoint,
    NumberValue, ResourceMetrics, ScopeMetrics, Sum, Summary, SummaryDataPoint, ValueAtQuantile,
};
