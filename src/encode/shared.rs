// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Shared-value analysis.
//!
//! For a group of sibling data points, attributes and timestamps that are
//! equal across every point are hoisted out of the per-point columns: once
//! per metric, or once per scope when every metric in the scope agrees. A
//! hoisted attribute is never emitted on individual points; the decoder
//! re-inflates it onto each point.

use std::collections::BTreeMap;

use crate::otlp::common::{AnyValue, KeyValue};
use crate::otlp::metrics::{Metric, MetricData};

/// Values hoisted out of a group of data points.
#[derive(Debug, Default, Clone)]
pub struct SharedValues<'a> {
    /// Attributes present with an equal value on every point of the group.
    pub attributes: BTreeMap<&'a str, &'a AnyValue>,
    /// Start time shared by every point, when they all agree.
    pub start_time: Option<u64>,
    /// Time shared by every point, when they all agree.
    pub time: Option<u64>,
}

impl<'a> SharedValues<'a> {
    /// Whether nothing was hoisted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.start_time.is_none() && self.time.is_none()
    }

    /// Whether the attribute at `key` was hoisted.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// The union of a scope-level and a metric-level hoist, as seen by one
    /// data point. The two key sets are disjoint because scope-level keys
    /// are removed from metric-level maps when the scope hoist is computed.
    #[must_use]
    pub fn merged(scope: &SharedValues<'a>, metric: &SharedValues<'a>) -> SharedValues<'a> {
        let mut attributes = scope.attributes.clone();
        attributes.extend(metric.attributes.iter().map(|(k, v)| (*k, *v)));
        SharedValues {
            attributes,
            start_time: metric.start_time.or(scope.start_time),
            time: metric.time.or(scope.time),
        }
    }
}

/// Per-point fields the analyzer looks at, for any point variant.
fn point_fields(metric: &Metric) -> Vec<(&[KeyValue], u64, u64)> {
    match &metric.data {
        Some(MetricData::Gauge(g)) => g
            .data_points
            .iter()
            .map(|p| {
                (
                    p.attributes.as_slice(),
                    p.start_time_unix_nano,
                    p.time_unix_nano,
                )
            })
            .collect(),
        Some(MetricData::Sum(s)) => s
            .data_points
            .iter()
            .map(|p| {
                (
                    p.attributes.as_slice(),
                    p.start_time_unix_nano,
                    p.time_unix_nano,
                )
            })
            .collect(),
        Some(MetricData::Summary(s)) => s
            .data_points
            .iter()
            .map(|p| {
                (
                    p.attributes.as_slice(),
                    p.start_time_unix_nano,
                    p.time_unix_nano,
                )
            })
            .collect(),
        Some(MetricData::Histogram(h)) => h
            .data_points
            .iter()
            .map(|p| {
                (
                    p.attributes.as_slice(),
                    p.start_time_unix_nano,
                    p.time_unix_nano,
                )
            })
            .collect(),
        Some(MetricData::ExponentialHistogram(h)) => h
            .data_points
            .iter()
            .map(|p| {
                (
                    p.attributes.as_slice(),
                    p.start_time_unix_nano,
                    p.time_unix_nano,
                )
            })
            .collect(),
        None => Vec::new(),
    }
}

/// Compute the metric-level hoist over all data points of one metric.
///
/// Hoisting one point would just move data around without saving anything,
/// so groups of fewer than two points share nothing.
#[must_use]
pub fn metric_shared(metric: &Metric) -> SharedValues<'_> {
    let points = point_fields(metric);
    if points.len() < 2 {
        return SharedValues::default();
    }

    let (first_attrs, first_start, first_time) = points[0];
    let mut attributes: BTreeMap<&str, &AnyValue> = first_attrs
        .iter()
        .map(|kv| (kv.key.as_str(), &kv.value))
        .collect();
    let mut start_time = Some(first_start);
    let mut time = Some(first_time);

    for (attrs, start, t) in &points[1..] {
        attributes
            .retain(|key, value| attrs.iter().any(|kv| kv.key == *key && kv.value == **value));
        if start_time != Some(*start) {
            start_time = None;
        }
        if time != Some(*t) {
            time = None;
        }
    }

    SharedValues {
        attributes,
        start_time,
        time,
    }
}

/// Compute the scope-level hoist from the metric-level hoists of every
/// metric in a scope, removing hoisted entries from the metric-level maps.
///
/// The same minimum-group rule applies: a scope with fewer than two metrics
/// hoists nothing of its own.
pub fn scope_shared<'a>(metric_shareds: &mut [SharedValues<'a>]) -> SharedValues<'a> {
    if metric_shareds.len() < 2 {
        return SharedValues::default();
    }

    let mut attributes = metric_shareds[0].attributes.clone();
    let mut start_time = metric_shareds[0].start_time;
    let mut time = metric_shareds[0].time;

    for shared in &metric_shareds[1..] {
        attributes.retain(|key, value| shared.attributes.get(key) == Some(&*value));
        if start_time != shared.start_time {
            start_time = None;
        }
        if time != shared.time {
            time = None;
        }
    }

    for shared in metric_shareds.iter_mut() {
        shared
            .attributes
            .retain(|key, _| !attributes.contains_key(key));
        if start_time.is_some() {
            shared.start_time = None;
        }
        if time.is_some() {
            shared.time = None;
        }
    }

    SharedValues {
        attributes,
        start_time,
        time,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::otlp::metrics::{NumberDataPoint, Sum};
    use crate::otlp::{AggregationTemporality, KeyValue};

    fn point(attrs: Vec<KeyValue>, start: u64, time: u64) -> NumberDataPoint {
        NumberDataPoint {
            attributes: attrs,
            start_time_unix_nano: start,
            time_unix_nano: time,
            ..NumberDataPoint::new_int(time, 1)
        }
    }

    fn sum_metric(points: Vec<NumberDataPoint>) -> Metric {
        Metric::new_sum(
            "m",
            Sum::new(AggregationTemporality::Cumulative, true, points),
        )
    }

    #[test]
    fn test_single_point_shares_nothing() {
        let metric = sum_metric(vec![point(
            vec![KeyValue::new("k", AnyValue::new_string("v"))],
            1,
            2,
        )]);
        assert!(metric_shared(&metric).is_empty());
    }

    #[test]
    fn test_common_attributes_and_times_hoist() {
        let metric = sum_metric(vec![
            point(
                vec![
                    KeyValue::new("host", AnyValue::new_string("a")),
                    KeyValue::new("cpu", AnyValue::new_int(0)),
                ],
                1,
                5,
            ),
            point(
                vec![
                    KeyValue::new("host", AnyValue::new_string("a")),
                    KeyValue::new("cpu", AnyValue::new_int(1)),
                ],
                1,
                5,
            ),
        ]);
        let shared = metric_shared(&metric);
        assert!(shared.contains_key("host"));
        assert!(!shared.contains_key("cpu"));
        assert_eq!(shared.start_time, Some(1));
        assert_eq!(shared.time, Some(5));
    }

    #[test]
    fn test_unequal_value_is_not_shared() {
        let metric = sum_metric(vec![
            point(vec![KeyValue::new("k", AnyValue::new_string("v1"))], 1, 5),
            point(vec![KeyValue::new("k", AnyValue::new_string("v2"))], 1, 6),
        ]);
        let shared = metric_shared(&metric);
        assert!(shared.attributes.is_empty());
        assert_eq!(shared.start_time, Some(1));
        assert_eq!(shared.time, None);
    }

    #[test]
    fn test_scope_level_hoist_strips_metric_maps() {
        let common = KeyValue::new("region", AnyValue::new_string("eu"));
        let m1 = sum_metric(vec![
            point(vec![common.clone()], 1, 5),
            point(vec![common.clone()], 1, 5),
        ]);
        let m2 = sum_metric(vec![
            point(
                vec![common.clone(), KeyValue::new("q", AnyValue::new_int(1))],
                1,
                5,
            ),
            point(
                vec![common.clone(), KeyValue::new("q", AnyValue::new_int(1))],
                1,
                5,
            ),
        ]);

        let mut per_metric = vec![metric_shared(&m1), metric_shared(&m2)];
        let scope = scope_shared(&mut per_metric);

        assert!(scope.contains_key("region"));
        assert_eq!(scope.start_time, Some(1));
        assert!(!per_metric[0].contains_key("region"));
        assert!(per_metric[1].contains_key("q"));
        assert_eq!(per_metric[0].start_time, None);
    }
}
