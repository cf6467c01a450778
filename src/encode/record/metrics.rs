// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The main metrics record.
//!
//! One row per metric: the deduplicated resource and scope identities, the
//! scope-metrics schema URL, and the univariate-metric sparse union whose
//! tag is the metric type and whose children carry the values hoisted by the
//! shared-value analyzer. Data-point records reference rows of this record
//! through their `parent_id` column.

use arrow::array::{ArrayRef, NullBufferBuilder, RecordBatch, StructArray, UnionArray};
use arrow::buffer::ScalarBuffer;
use arrow::datatypes::{
    DataType, Field, Fields, Schema, TimeUnit, TimestampNanosecondType, UInt16Type, UInt32Type,
    UnionFields, UnionMode,
};
use lazy_static::lazy_static;
use std::sync::Arc;

use super::anyvalue::{MapColumnBuilder, attributes_map_data_type};
use super::state::SchemaState;
use crate::encode::array::{AdaptiveStringBuilder, PrimitiveColumnBuilder};
use crate::encode::shared::SharedValues;
use crate::error::{Error, Result};
use crate::otlp::common::{InstrumentationScope, Resource};
use crate::payload::PayloadType;
use crate::schema::update::{DictIndex, SchemaUpdate};
use crate::schema::{MetricType, consts, optional, schema_id};

const RESOURCE_SCHEMA_URL_PATH: &str = "resource.schema_url";
const SCOPE_NAME_PATH: &str = "scope.name";
const SCOPE_VERSION_PATH: &str = "scope.version";

lazy_static! {
    static ref SHARED_FIELDS: Fields = Fields::from(vec![
        Field::new(consts::SHARED_ATTRIBUTES, attributes_map_data_type(), true),
        Field::new(
            consts::SHARED_START_TIME_UNIX_NANO,
            DataType::Timestamp(TimeUnit::Nanosecond, None),
            true,
        ),
        Field::new(
            consts::SHARED_TIME_UNIX_NANO,
            DataType::Timestamp(TimeUnit::Nanosecond, None),
            true,
        ),
    ]);

    /// Children of the univariate-metric sparse union. The type codes are
    /// part of the wire contract.
    static ref UNIVARIATE_FIELDS: UnionFields = UnionFields::new(
        vec![
            MetricType::Gauge as i8,
            MetricType::Sum as i8,
            MetricType::Summary as i8,
            MetricType::Histogram as i8,
            MetricType::ExpHistogram as i8,
        ],
        vec![
            Field::new("gauge", DataType::Struct(SHARED_FIELDS.clone()), true),
            Field::new("sum", DataType::Struct(SHARED_FIELDS.clone()), true),
            Field::new("summary", DataType::Struct(SHARED_FIELDS.clone()), true),
            Field::new("histogram", DataType::Struct(SHARED_FIELDS.clone()), true),
            Field::new(
                "exp_histogram",
                DataType::Struct(SHARED_FIELDS.clone()),
                true
            ),
        ],
    );
}

/// One buffered main-record row.
pub struct MetricEntry<'a> {
    /// Row ID; data-point records reference it as their parent.
    pub id: u16,
    /// ID of the deduplicated resource group.
    pub resource_id: u16,
    /// The resource, when described.
    pub resource: Option<&'a Resource>,
    /// The resource schema URL.
    pub resource_schema_url: &'a str,
    /// ID of the deduplicated scope group.
    pub scope_id: u16,
    /// The scope, when known.
    pub scope: Option<&'a InstrumentationScope>,
    /// The scope-metrics schema URL.
    pub schema_url: &'a str,
    /// Union tag of this metric.
    pub metric_type: MetricType,
    /// Metric-level hoisted values (scope-level entries already removed).
    pub shared: SharedValues<'a>,
}

/// One child of the univariate union: a struct of hoisted shared values.
struct SharedChildBuilder {
    validity: NullBufferBuilder,
    attributes: MapColumnBuilder,
    start_time: PrimitiveColumnBuilder<TimestampNanosecondType>,
    time: PrimitiveColumnBuilder<TimestampNanosecondType>,
}

impl SharedChildBuilder {
    fn new() -> Self {
        Self {
            validity: NullBufferBuilder::new(0),
            attributes: MapColumnBuilder::new(),
            start_time: PrimitiveColumnBuilder::new(),
            time: PrimitiveColumnBuilder::new(),
        }
    }

    fn append_shared(&mut self, shared: &SharedValues<'_>) -> Result<()> {
        self.validity.append_non_null();
        self.attributes
            .append_pairs(shared.attributes.iter().map(|(k, v)| (*k, *v)))?;
        match shared.start_time {
            Some(v) if v != 0 => self.start_time.append_value(v as i64),
            _ => self.start_time.append_null(),
        }
        match shared.time {
            Some(v) if v != 0 => self.time.append_value(v as i64),
            _ => self.time.append_null(),
        }
        Ok(())
    }

    fn append_null_row(&mut self) {
        self.validity.append_null();
        self.attributes.append_null();
        self.start_time.append_null();
        self.time.append_null();
    }

    fn finish(&mut self, path: &str) -> Result<ArrayRef> {
        let arrays = vec![
            self.attributes.finish(path)?,
            self.start_time.finish(),
            self.time.finish(),
        ];
        let nulls = self.validity.finish();
        let array =
            StructArray::try_new(SHARED_FIELDS.clone(), arrays, nulls).map_err(|source| {
                Error::BuildArray {
                    name: path.to_owned(),
                    source,
                }
            })?;
        Ok(Arc::new(array))
    }
}

/// Record builder for the main metrics payload.
pub struct MetricsRecordBuilder {
    state: SchemaState,
    id: PrimitiveColumnBuilder<UInt16Type>,

    resource_id: PrimitiveColumnBuilder<UInt16Type>,
    resource_schema_url: AdaptiveStringBuilder,
    resource_dropped: PrimitiveColumnBuilder<UInt32Type>,

    scope_id: PrimitiveColumnBuilder<UInt16Type>,
    scope_name: AdaptiveStringBuilder,
    scope_version: AdaptiveStringBuilder,
    scope_dropped: PrimitiveColumnBuilder<UInt32Type>,
    scope_shared_attrs: MapColumnBuilder,
    scope_shared_start: PrimitiveColumnBuilder<TimestampNanosecondType>,
    scope_shared_time: PrimitiveColumnBuilder<TimestampNanosecondType>,

    schema_url: AdaptiveStringBuilder,

    data_type_ids: Vec<i8>,
    gauge: SharedChildBuilder,
    sum: SharedChildBuilder,
    summary: SharedChildBuilder,
    histogram: SharedChildBuilder,
    exp_histogram: SharedChildBuilder,
}

impl MetricsRecordBuilder {
    /// A builder for the main metrics record.
    #[must_use]
    pub fn new(max_card: u32) -> Self {
        let state = SchemaState::new(max_card);
        let mut builder = Self {
            id: PrimitiveColumnBuilder::new(),
            resource_id: PrimitiveColumnBuilder::new(),
            resource_schema_url: AdaptiveStringBuilder::new(
                RESOURCE_SCHEMA_URL_PATH,
                DictIndex::U8,
                max_card,
            ),
            resource_dropped: PrimitiveColumnBuilder::new(),
            scope_id: PrimitiveColumnBuilder::new(),
            scope_name: AdaptiveStringBuilder::new(SCOPE_NAME_PATH, DictIndex::U8, max_card),
            scope_version: AdaptiveStringBuilder::new(SCOPE_VERSION_PATH, DictIndex::U8, max_card),
            scope_dropped: PrimitiveColumnBuilder::new(),
            scope_shared_attrs: MapColumnBuilder::new(),
            scope_shared_start: PrimitiveColumnBuilder::new(),
            scope_shared_time: PrimitiveColumnBuilder::new(),
            schema_url: AdaptiveStringBuilder::new(consts::SCHEMA_URL, DictIndex::U8, max_card),
            data_type_ids: Vec::new(),
            gauge: SharedChildBuilder::new(),
            sum: SharedChildBuilder::new(),
            summary: SharedChildBuilder::new(),
            histogram: SharedChildBuilder::new(),
            exp_histogram: SharedChildBuilder::new(),
            state,
        };
        builder.reset();
        builder
    }

    /// Number of rows appended so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data_type_ids.len()
    }

    /// Append one metric row. `scope_shared` holds the scope-level hoisted
    /// values of the scope this metric belongs to.
    pub fn append(
        &mut self,
        entry: &MetricEntry<'_>,
        scope_shared: &SharedValues<'_>,
    ) -> Result<()> {
        self.id.append_value(entry.id);

        self.resource_id.append_value(entry.resource_id);
        self.resource_schema_url
            .append_non_empty(entry.resource_schema_url);
        self.resource_dropped.append_non_zero(
            entry
                .resource
                .map(|r| r.dropped_attributes_count)
                .unwrap_or(0),
        );

        self.scope_id.append_value(entry.scope_id);
        match entry.scope {
            Some(scope) => {
                self.scope_name.append_non_empty(&scope.name);
                self.scope_version.append_non_empty(&scope.version);
                self.scope_dropped
                    .append_non_zero(scope.dropped_attributes_count);
            }
            None => {
                self.scope_name.append_null();
                self.scope_version.append_null();
                self.scope_dropped.append_null();
            }
        }
        self.scope_shared_attrs
            .append_pairs(scope_shared.attributes.iter().map(|(k, v)| (*k, *v)))?;
        match scope_shared.start_time {
            Some(v) if v != 0 => self.scope_shared_start.append_value(v as i64),
            _ => self.scope_shared_start.append_null(),
        }
        match scope_shared.time {
            Some(v) if v != 0 => self.scope_shared_time.append_value(v as i64),
            _ => self.scope_shared_time.append_null(),
        }

        self.schema_url.append_non_empty(entry.schema_url);

        self.data_type_ids.push(entry.metric_type as i8);
        for metric_type in [
            MetricType::Gauge,
            MetricType::Sum,
            MetricType::Summary,
            MetricType::Histogram,
            MetricType::ExpHistogram,
        ] {
            let child = self.child_mut(metric_type);
            if metric_type == entry.metric_type {
                child.append_shared(&entry.shared)?;
            } else {
                child.append_null_row();
            }
        }
        Ok(())
    }

    fn child_mut(&mut self, metric_type: MetricType) -> &mut SharedChildBuilder {
        match metric_type {
            MetricType::Gauge => &mut self.gauge,
            MetricType::Sum => &mut self.sum,
            MetricType::Summary => &mut self.summary,
            MetricType::Histogram => &mut self.histogram,
            MetricType::ExpHistogram => &mut self.exp_histogram,
        }
    }

    /// Materialize the record, or fail with a schema-not-up-to-date signal.
    pub fn finish(&mut self) -> Result<(RecordBatch, String)> {
        let updates: Vec<SchemaUpdate> = [
            self.resource_schema_url.update(),
            self.scope_name.update(),
            self.scope_version.update(),
            self.schema_url.update(),
        ]
        .into_iter()
        .flatten()
        .collect();
        if !updates.is_empty() {
            let fields = self.state.apply(&updates);
            return Err(Error::SchemaNotUpToDate {
                payload_type: PayloadType::Metrics,
                fields,
            });
        }

        let mut fields = vec![Field::new(consts::ID, DataType::UInt16, false)];
        let mut columns: Vec<ArrayRef> = vec![self.id.finish()];

        // resource struct
        let resource_fields = Fields::from(vec![
            Field::new(consts::ID, DataType::UInt16, true),
            Field::new(
                consts::SCHEMA_URL,
                self.resource_schema_url.data_type(),
                true,
            ),
            Field::new(consts::DROPPED_ATTRIBUTES_COUNT, DataType::UInt32, true),
        ]);
        let resource = StructArray::try_new(
            resource_fields.clone(),
            vec![
                self.resource_id.finish(),
                self.resource_schema_url.finish(),
                self.resource_dropped.finish(),
            ],
            None,
        )
        .map_err(|source| Error::BuildArray {
            name: consts::RESOURCE.to_owned(),
            source,
        })?;
        fields.push(Field::new(
            consts::RESOURCE,
            DataType::Struct(resource_fields),
            true,
        ));
        columns.push(Arc::new(resource));

        // scope struct
        let scope_fields = Fields::from(vec![
            Field::new(consts::ID, DataType::UInt16, true),
            Field::new(consts::NAME, self.scope_name.data_type(), true),
            Field::new(consts::VERSION, self.scope_version.data_type(), true),
            Field::new(consts::DROPPED_ATTRIBUTES_COUNT, DataType::UInt32, true),
            Field::new(consts::SHARED_ATTRIBUTES, attributes_map_data_type(), true),
            Field::new(
                consts::SHARED_START_TIME_UNIX_NANO,
                DataType::Timestamp(TimeUnit::Nanosecond, None),
                true,
            ),
            Field::new(
                consts::SHARED_TIME_UNIX_NANO,
                DataType::Timestamp(TimeUnit::Nanosecond, None),
                true,
            ),
        ]);
        let scope = StructArray::try_new(
            scope_fields.clone(),
            vec![
                self.scope_id.finish(),
                self.scope_name.finish(),
                self.scope_version.finish(),
                self.scope_dropped.finish(),
                self.scope_shared_attrs.finish("scope.shared_attributes")?,
                self.scope_shared_start.finish(),
                self.scope_shared_time.finish(),
            ],
            None,
        )
        .map_err(|source| Error::BuildArray {
            name: consts::SCOPE.to_owned(),
            source,
        })?;
        fields.push(Field::new(
            consts::SCOPE,
            DataType::Struct(scope_fields),
            true,
        ));
        columns.push(Arc::new(scope));

        if self.schema_url.has_values() {
            fields.push(optional(Field::new(
                consts::SCHEMA_URL,
                self.schema_url.data_type(),
                true,
            )));
            columns.push(self.schema_url.finish());
        }

        // univariate metric union
        let type_ids = ScalarBuffer::from(std::mem::take(&mut self.data_type_ids));
        let children: Vec<ArrayRef> = vec![
            self.gauge.finish("data.gauge")?,
            self.sum.finish("data.sum")?,
            self.summary.finish("data.summary")?,
            self.histogram.finish("data.histogram")?,
            self.exp_histogram.finish("data.exp_histogram")?,
        ];
        let data = UnionArray::try_new(UNIVARIATE_FIELDS.clone(), type_ids, None, children)
            .map_err(|source| Error::BuildArray {
                name: consts::DATA.to_owned(),
                source,
            })?;
        fields.push(Field::new(
            consts::DATA,
            DataType::Union(UNIVARIATE_FIELDS.clone(), UnionMode::Sparse),
            false,
        ));
        columns.push(Arc::new(data));

        let schema = Arc::new(Schema::new(fields));
        let id = schema_id(&schema);
        let batch =
            RecordBatch::try_new(schema, columns).map_err(|source| Error::BuildRecordBatch {
                payload_type: PayloadType::Metrics,
                source,
            })?;
        self.reset();
        Ok((batch, id))
    }

    /// Drop buffered rows and rebuild the column builders against the
    /// current schema state.
    pub fn reset(&mut self) {
        let max_card = self.state.max_card();
        self.id = PrimitiveColumnBuilder::new();
        self.resource_id = PrimitiveColumnBuilder::new();
        self.resource_schema_url = AdaptiveStringBuilder::new(
            RESOURCE_SCHEMA_URL_PATH,
            self.state
                .dict_index(RESOURCE_SCHEMA_URL_PATH, DictIndex::U8),
            max_card,
        );
        self.resource_dropped = PrimitiveColumnBuilder::new();
        self.scope_id = PrimitiveColumnBuilder::new();
        self.scope_name = AdaptiveStringBuilder::new(
            SCOPE_NAME_PATH,
            self.state.dict_index(SCOPE_NAME_PATH, DictIndex::U8),
            max_card,
        );
        self.scope_version = AdaptiveStringBuilder::new(
            SCOPE_VERSION_PATH,
            self.state.dict_index(SCOPE_VERSION_PATH, DictIndex::U8),
            max_card,
        );
        self.scope_dropped = PrimitiveColumnBuilder::new();
        self.scope_shared_attrs = MapColumnBuilder::new();
        self.scope_shared_start = PrimitiveColumnBuilder::new();
        self.scope_shared_time = PrimitiveColumnBuilder::new();
        self.schema_url = AdaptiveStringBuilder::new(
            consts::SCHEMA_URL,
            self.state.dict_index(consts::SCHEMA_URL, DictIndex::U8),
            max_card,
        );
        self.data_type_ids = Vec::new();
        self.gauge = SharedChildBuilder::new();
        self.sum = SharedChildBuilder::new();
        self.summary = SharedChildBuilder::new();
        self.histogram = SharedChildBuilder::new();
        self.exp_histogram = SharedChildBuilder::new();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use arrow::array::Array;

    #[test]
    fn test_empty_batch_materializes_zero_rows() {
        let mut builder = MetricsRecordBuilder::new(u16::MAX as u32);
        let (batch, _) = builder.finish().unwrap();
        assert_eq!(batch.num_rows(), 0);
        let schema = batch.schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["id", "resource", "scope", "data"]);
    }

    #[test]
    fn test_union_discriminates_metric_type() {
        let mut builder = MetricsRecordBuilder::new(u16::MAX as u32);
        let entry = MetricEntry {
            id: 0,
            resource_id: 0,
            resource: None,
            resource_schema_url: "",
            scope_id: 0,
            scope: None,
            schema_url: "",
            metric_type: MetricType::Gauge,
            shared: SharedValues::default(),
        };
        builder.append(&entry, &SharedValues::default()).unwrap();
        let (batch, _) = builder.finish().unwrap();

        let data = batch
            .column(batch.num_columns() - 1)
            .as_any()
            .downcast_ref::<UnionArray>()
            .unwrap();
        assert_eq!(data.type_id(0), MetricType::Gauge as i8);
        // non-selected children are null by construction
        assert!(data.child(MetricType::Sum as i8).is_null(0));
    }

    #[test]
    fn test_schema_id_stable_across_batches() {
        let mut builder = MetricsRecordBuilder::new(u16::MAX as u32);
        let (_, id1) = builder.finish().unwrap();
        let (_, id2) = builder.finish().unwrap();
        assert_eq!(id1, id2);
    }
}
