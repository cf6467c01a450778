// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Batch optimizer.
//!
//! Re-groups an incoming metrics batch into resource groups and scope groups,
//! deduplicating identical resources and scopes by a canonical content key,
//! and optionally sorting metrics by name. Purely a rearrangement: no data
//! point is added or removed.

use ahash::RandomState;
use std::collections::HashMap;

use crate::otlp::common::{AnyValue, InstrumentationScope, KeyValue, Resource};
use crate::otlp::metrics::{Metric, MetricsData};

/// One deduplicated resource and everything it produced.
pub struct ResourceGroup<'a> {
    /// The resource, when described.
    pub resource: Option<&'a Resource>,
    /// The resource schema URL.
    pub schema_url: &'a str,
    /// Scope groups under this resource.
    pub scopes: Vec<ScopeGroup<'a>>,
    scope_index: HashMap<Vec<u8>, usize, RandomState>,
}

/// One deduplicated scope and its metrics.
pub struct ScopeGroup<'a> {
    /// The instrumentation scope, when known.
    pub scope: Option<&'a InstrumentationScope>,
    /// The metrics schema URL.
    pub schema_url: &'a str,
    /// The metrics of this scope, in input order (or name order when the
    /// optimizer sorts).
    pub metrics: Vec<&'a Metric>,
}

/// The optimizer output: the same batch, re-grouped.
pub struct MetricsOptimized<'a> {
    /// Deduplicated resource groups in first-occurrence order.
    pub resource_groups: Vec<ResourceGroup<'a>>,
}

impl MetricsOptimized<'_> {
    /// Total number of metrics across all groups.
    #[must_use]
    pub fn metric_count(&self) -> usize {
        self.resource_groups
            .iter()
            .flat_map(|r| r.scopes.iter())
            .map(|s| s.metrics.len())
            .sum()
    }
}

/// Group a batch by resource and scope content, optionally sorting metrics
/// by name (ascending, byte-wise).
#[must_use]
pub fn optimize(data: &MetricsData, sort_metrics: bool) -> MetricsOptimized<'_> {
    let mut resource_groups: Vec<ResourceGroup<'_>> = Vec::new();
    let mut resource_index: HashMap<Vec<u8>, usize, RandomState> = HashMap::default();

    for rm in &data.resource_metrics {
        let resource_key = resource_content_key(rm.resource.as_ref(), &rm.schema_url);
        let resource_pos = *resource_index.entry(resource_key).or_insert_with(|| {
            resource_groups.push(ResourceGroup {
                resource: rm.resource.as_ref(),
                schema_url: &rm.schema_url,
                scopes: Vec::new(),
                scope_index: HashMap::default(),
            });
            resource_groups.len() - 1
        });
        let group = &mut resource_groups[resource_pos];

        for sm in &rm.scope_metrics {
            let scope_key = scope_content_key(sm.scope.as_ref(), &sm.schema_url);
            let scope_pos = *group.scope_index.entry(scope_key).or_insert_with(|| {
                group.scopes.push(ScopeGroup {
                    scope: sm.scope.as_ref(),
                    schema_url: &sm.schema_url,
                    metrics: Vec::new(),
                });
                group.scopes.len() - 1
            });
            group.scopes[scope_pos].metrics.extend(sm.metrics.iter());
        }
    }

    if sort_metrics {
        for group in &mut resource_groups {
            for scope in &mut group.scopes {
                scope.metrics.sort_by(|a, b| a.name.cmp(&b.name));
            }
        }
    }

    MetricsOptimized { resource_groups }
}

/// Canonical content key of a resource: its attributes in key-sorted order,
/// the dropped-attributes count, and the schema URL. Stable across
/// processes.
#[must_use]
pub fn resource_content_key(resource: Option<&Resource>, schema_url: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(resource) = resource {
        buf.push(1);
        write_attributes_sorted(&mut buf, &resource.attributes);
        buf.extend_from_slice(&resource.dropped_attributes_count.to_be_bytes());
    } else {
        buf.push(0);
    }
    write_bytes(&mut buf, schema_url.as_bytes());
    buf
}

/// Canonical content key of a scope: name, version, attributes in key-sorted
/// order, the dropped-attributes count, and the schema URL.
#[must_use]
pub fn scope_content_key(scope: Option<&InstrumentationScope>, schema_url: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(scope) = scope {
        buf.push(1);
        write_bytes(&mut buf, scope.name.as_bytes());
        write_bytes(&mut buf, scope.version.as_bytes());
        write_attributes_sorted(&mut buf, &scope.attributes);
        buf.extend_from_slice(&scope.dropped_attributes_count.to_be_bytes());
    } else {
        buf.push(0);
    }
    write_bytes(&mut buf, schema_url.as_bytes());
    buf
}

fn write_attributes_sorted(buf: &mut Vec<u8>, attributes: &[KeyValue]) {
    let mut sorted: Vec<&KeyValue> = attributes.iter().collect();
    sorted.sort_by(|a, b| {
        a.key
            .cmp(&b.key)
            .then_with(|| a.value.canonical_cmp(&b.value))
    });
    buf.extend_from_slice(&(sorted.len() as u32).to_be_bytes());
    for kv in sorted {
        write_bytes(buf, kv.key.as_bytes());
        write_value(buf, &kv.value);
    }
}

fn write_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    buf.extend_from_slice(bytes);
}

fn write_value(buf: &mut Vec<u8>, value: &AnyValue) {
    match value {
        AnyValue::Empty => buf.push(0),
        AnyValue::Str(s) => {
            buf.push(1);
            write_bytes(buf, s.as_bytes());
        }
        AnyValue::Bool(b) => {
            buf.push(2);
            buf.push(u8::from(*b));
        }
        AnyValue::Int(i) => {
            buf.push(3);
            buf.extend_from_slice(&i.to_be_bytes());
        }
        AnyValue::Double(d) => {
            buf.push(4);
            buf.extend_from_slice(&d.to_bits().to_be_bytes());
        }
        AnyValue::Bytes(b) => {
            buf.push(5);
            write_bytes(buf, b);
        }
        AnyValue::Array(values) => {
            buf.push(6);
            buf.extend_from_slice(&(values.len() as u32).to_be_bytes());
            for v in values {
                write_value(buf, v);
            }
        }
        AnyValue::KvList(entries) => {
            buf.push(7);
            buf.extend_from_slice(&(entries.len() as u32).to_be_bytes());
            for kv in entries {
                write_bytes(buf, kv.key.as_bytes());
                write_value(buf, &kv.value);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::otlp::metrics::{Gauge, NumberDataPoint, ResourceMetrics, ScopeMetrics};

    fn gauge(name: &str) -> Metric {
        Metric::new_gauge(name, Gauge::new(vec![NumberDataPoint::new_int(1, 1)]))
    }

    fn rm(resource: Option<Resource>, scopes: Vec<ScopeMetrics>) -> ResourceMetrics {
        ResourceMetrics {
            resource,
            scope_metrics: scopes,
            schema_url: String::new(),
        }
    }

    fn sm(scope_name: &str, metrics: Vec<Metric>) -> ScopeMetrics {
        ScopeMetrics {
            scope: Some(InstrumentationScope::new(scope_name)),
            metrics,
            schema_url: String::new(),
        }
    }

    #[test]
    fn test_identical_resources_merge() {
        let resource = Resource::new(vec![KeyValue::new("host", AnyValue::new_string("a"))]);
        let data = MetricsData::new(vec![
            rm(Some(resource.clone()), vec![sm("s", vec![gauge("m1")])]),
            rm(Some(resource.clone()), vec![sm("s", vec![gauge("m2")])]),
        ]);

        let optimized = optimize(&data, false);
        assert_eq!(optimized.resource_groups.len(), 1);
        assert_eq!(optimized.resource_groups[0].scopes.len(), 1);
        assert_eq!(optimized.resource_groups[0].scopes[0].metrics.len(), 2);
    }

    #[test]
    fn test_attribute_order_does_not_affect_identity() {
        let a = KeyValue::new("a", AnyValue::new_int(1));
        let b = KeyValue::new("b", AnyValue::new_int(2));
        let r1 = Resource::new(vec![a.clone(), b.clone()]);
        let r2 = Resource::new(vec![b, a]);
        assert_eq!(
            resource_content_key(Some(&r1), ""),
            resource_content_key(Some(&r2), "")
        );
    }

    #[test]
    fn test_schema_url_splits_groups() {
        let resource = Resource::new(vec![]);
        let key1 = resource_content_key(Some(&resource), "url-1");
        let key2 = resource_content_key(Some(&resource), "url-2");
        assert_ne!(key1, key2);
    }

    #[test]
    fn test_sort_orders_metrics_by_name() {
        let data = MetricsData::new(vec![rm(
            None,
            vec![sm("s", vec![gauge("zz"), gauge("aa"), gauge("mm")])],
        )]);
        let optimized = optimize(&data, true);
        let names: Vec<&str> = optimized.resource_groups[0].scopes[0]
            .metrics
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["aa", "mm", "zz"]);
    }

    #[test]
    fn test_dropped_count_splits_identity() {
        let r1 = Resource::new(vec![]);
        let mut r2 = Resource::new(vec![]);
        r2.dropped_attributes_count = 3;
        assert_ne!(
            resource_content_key(Some(&r1), ""),
            resource_content_key(Some(&r2), "")
        );
    }
}
