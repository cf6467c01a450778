// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Batch-shape statistics.
//!
//! When the `stats` option is on, the producer records the shape of every
//! optimized batch: group fan-out and data-point density distributions.
//! Useful when tuning batching upstream of the encoder.

use exponential_histogram::ExponentialHistogram;

use crate::encode::optimizer::MetricsOptimized;
use crate::otlp::metrics::{Metric, MetricData};

/// Distributions over the batches one producer has encoded.
#[derive(Default)]
pub struct BatchStats {
    batches: u64,
    resource_groups: ExponentialHistogram,
    scopes_per_resource: ExponentialHistogram,
    metrics_per_scope: ExponentialHistogram,
    points_per_metric: ExponentialHistogram,
    attributes_per_point: ExponentialHistogram,
}

impl BatchStats {
    /// Empty statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one optimized batch.
    pub fn observe(&mut self, optimized: &MetricsOptimized<'_>) {
        self.batches += 1;
        self.resource_groups
            .accumulate(optimized.resource_groups.len() as f64);
        for group in &optimized.resource_groups {
            self.scopes_per_resource
                .accumulate(group.scopes.len() as f64);
            for scope in &group.scopes {
                self.metrics_per_scope
                    .accumulate(scope.metrics.len() as f64);
                for metric in &scope.metrics {
                    self.points_per_metric
                        .accumulate(metric.data_point_count() as f64);
                    self.observe_point_attributes(metric);
                }
            }
        }
    }

    fn observe_point_attributes(&mut self, metric: &Metric) {
        match &metric.data {
            Some(MetricData::Gauge(g)) => {
                for point in &g.data_points {
                    self.attributes_per_point
                        .accumulate(point.attributes.len() as f64);
                }
            }
            Some(MetricData::Sum(s)) => {
                for point in &s.data_points {
                    self.attributes_per_point
                        .accumulate(point.attributes.len() as f64);
                }
            }
            Some(MetricData::Summary(s)) => {
                for point in &s.data_points {
                    self.attributes_per_point
                        .accumulate(point.attributes.len() as f64);
                }
            }
            Some(MetricData::Histogram(h)) => {
                for point in &h.data_points {
                    self.attributes_per_point
                        .accumulate(point.attributes.len() as f64);
                }
            }
            Some(MetricData::ExponentialHistogram(h)) => {
                for point in &h.data_points {
                    self.attributes_per_point
                        .accumulate(point.attributes.len() as f64);
                }
            }
            None => {}
        }
    }

    /// Number of batches observed.
    #[must_use]
    pub fn batches(&self) -> u64 {
        self.batches
    }

    /// Distribution of resource groups per batch.
    #[must_use]
    pub fn resource_groups(&self) -> &ExponentialHistogram {
        &self.resource_groups
    }

    /// Distribution of scope groups per resource group.
    #[must_use]
    pub fn scopes_per_resource(&self) -> &ExponentialHistogram {
        &self.scopes_per_resource
    }

    /// Distribution of metrics per scope group.
    #[must_use]
    pub fn metrics_per_scope(&self) -> &ExponentialHistogram {
        &self.metrics_per_scope
    }

    /// Distribution of data points per metric.
    #[must_use]
    pub fn points_per_metric(&self) -> &ExponentialHistogram {
        &self.points_per_metric
    }

    /// Distribution of attributes per data point.
    #[must_use]
    pub fn attributes_per_point(&self) -> &ExponentialHistogram {
        &self.attributes_per_point
    }
}

impl std::fmt::Debug for BatchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchStats")
            .field("batches", &self.batches)
            .field("resource_groups_max", &self.resource_groups.max())
            .field("scopes_per_resource_max", &self.scopes_per_resource.max())
            .field("metrics_per_scope_max", &self.metrics_per_scope.max())
            .field("points_per_metric_max", &self.points_per_metric.max())
            .field("attributes_per_point_max", &self.attributes_per_point.max())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::encode::optimizer::optimize;
    use crate::otlp::common::{AnyValue, KeyValue};
    use crate::otlp::metrics::{
        Gauge, MetricsData, NumberDataPoint, ResourceMetrics, ScopeMetrics,
    };

    #[test]
    fn test_observe_counts_batches() {
        let data = MetricsData::new(vec![ResourceMetrics {
            resource: None,
            scope_metrics: vec![ScopeMetrics {
                scope: None,
                metrics: vec![Metric::new_gauge(
                    "m",
                    Gauge::new(vec![NumberDataPoint {
                        attributes: vec![
                            KeyValue::new("k1", AnyValue::new_string("v")),
                            KeyValue::new("k2", AnyValue::new_int(1)),
                        ],
                        ..NumberDataPoint::new_int(1, 1)
                    }]),
                )],
                schema_url: String::new(),
            }],
            schema_url: String::new(),
        }]);

        let mut stats = BatchStats::new();
        stats.observe(&optimize(&data, false));
        stats.observe(&optimize(&data, false));
        assert_eq!(stats.batches(), 2);
        assert_eq!(stats.points_per_metric().count(), 2);
        // one point per observe, two attributes each
        assert_eq!(stats.attributes_per_point().count(), 2);
        assert_eq!(stats.attributes_per_point().max(), 2.0);
    }
}
