// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Schema-level wire contract: column names, field metadata flags, payload
//! type codes and the stable schema identifier.

use arrow::datatypes::{DataType, Field, Schema};
use num_enum::TryFromPrimitive;

use crate::error::{Error, Result};

pub mod update;

/// Column and field names shared by the encoder and decoder.
pub mod consts {
    /// Row identifier column.
    pub const ID: &str = "id";
    /// Parent row identifier column.
    pub const PARENT_ID: &str = "parent_id";

    /// Resource struct column on the main record.
    pub const RESOURCE: &str = "resource";
    /// Scope struct column on the main record.
    pub const SCOPE: &str = "scope";
    /// Schema URL column (resource-level inside the resource struct,
    /// scope-metrics-level at the top of the main record).
    pub const SCHEMA_URL: &str = "schema_url";
    /// Scope / resource dropped attributes count.
    pub const DROPPED_ATTRIBUTES_COUNT: &str = "dropped_attributes_count";
    /// Scope name.
    pub const NAME: &str = "name";
    /// Scope version.
    pub const VERSION: &str = "version";
    /// Univariate metric union column on the main record.
    pub const DATA: &str = "data";

    /// Hoisted attribute map shared by all descendant points.
    pub const SHARED_ATTRIBUTES: &str = "shared_attributes";
    /// Hoisted start time shared by all descendant points.
    pub const SHARED_START_TIME_UNIX_NANO: &str = "shared_start_time_unix_nano";
    /// Hoisted time shared by all descendant points.
    pub const SHARED_TIME_UNIX_NANO: &str = "shared_time_unix_nano";

    /// Metric description column on data-point records.
    pub const DESCRIPTION: &str = "description";
    /// Metric unit column on data-point records.
    pub const UNIT: &str = "unit";
    /// Aggregation temporality column.
    pub const AGGREGATION_TEMPORALITY: &str = "aggregation_temporality";
    /// Sum monotonicity column.
    pub const IS_MONOTONIC: &str = "is_monotonic";

    /// Data point start time column.
    pub const START_TIME_UNIX_NANO: &str = "start_time_unix_nano";
    /// Data point (or exemplar) time column.
    pub const TIME_UNIX_NANO: &str = "time_unix_nano";
    /// Number value union column.
    pub const VALUE: &str = "value";
    /// Exemplars list column.
    pub const EXEMPLARS: &str = "exemplars";
    /// Data point flags column.
    pub const FLAGS: &str = "flags";

    /// Summary / histogram observation count.
    pub const COUNT: &str = "count";
    /// Summary / histogram observation sum.
    pub const SUM: &str = "sum";
    /// Summary quantile list column.
    pub const QUANTILE_VALUES: &str = "quantile_values";
    /// Quantile of one summary entry.
    pub const QUANTILE: &str = "quantile";
    /// Histogram bucket counts list.
    pub const BUCKET_COUNTS: &str = "bucket_counts";
    /// Histogram explicit bounds list.
    pub const EXPLICIT_BOUNDS: &str = "explicit_bounds";
    /// Histogram minimum observed value.
    pub const MIN: &str = "min";
    /// Histogram maximum observed value.
    pub const MAX: &str = "max";
    /// Exponential histogram scale.
    pub const SCALE: &str = "scale";
    /// Exponential histogram zero-region count.
    pub const ZERO_COUNT: &str = "zero_count";
    /// Exponential histogram positive buckets struct.
    pub const POSITIVE: &str = "positive";
    /// Exponential histogram negative buckets struct.
    pub const NEGATIVE: &str = "negative";
    /// Bucket offset inside a buckets struct.
    pub const OFFSET: &str = "offset";

    /// Exemplar attributes map column.
    pub const ATTRIBUTES: &str = "attributes";
    /// Exemplar span id column.
    pub const SPAN_ID: &str = "span_id";
    /// Exemplar trace id column.
    pub const TRACE_ID: &str = "trace_id";

    /// Attribute record key column.
    pub const ATTRS_KEY: &str = "key";
    /// Attribute record value type column.
    pub const ATTRS_TYPE: &str = "type";
    /// Attribute record string value column.
    pub const ATTRS_STR: &str = "str";
    /// Attribute record integer value column.
    pub const ATTRS_INT: &str = "int";
    /// Attribute record double value column.
    pub const ATTRS_DOUBLE: &str = "double";
    /// Attribute record boolean value column.
    pub const ATTRS_BOOL: &str = "bool";
    /// Attribute record bytes value column.
    pub const ATTRS_BYTES: &str = "bytes";
    /// Attribute record serialized (CBOR) value column.
    pub const ATTRS_SER: &str = "ser";

    /// Field metadata keys and values.
    pub mod metadata {
        /// Marks a column that is dropped from the record when it carries no
        /// non-null value in a batch.
        pub const OPTIONAL: &str = "optional";
        /// Names the integer transform applied to a column.
        pub const ENCODING: &str = "encoding";
        /// `ENCODING` value for delta-encoded columns.
        pub const ENCODING_DELTA: &str = "delta";
        /// `"true"` for boolean metadata flags.
        pub const TRUE: &str = "true";
    }
}

/// Type codes of the univariate metric sparse union. Part of the wire
/// contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(i8)]
pub enum MetricType {
    /// Current-value scalar points.
    Gauge = 0,
    /// Aggregated scalar points.
    Sum = 1,
    /// Quantile summaries.
    Summary = 2,
    /// Bucketed distributions with explicit bounds.
    Histogram = 3,
    /// Bucketed distributions with exponential bounds.
    ExpHistogram = 4,
}

impl MetricType {
    /// Decode a union type id, failing on values outside the contract.
    pub fn try_from_wire(value: i8) -> Result<MetricType> {
        MetricType::try_from(value)
            .map_err(|_| Error::UnrecognizedMetricType { metric_type: value })
    }
}

/// Type codes of the metric-value sparse union. Part of the wire contract.
pub mod value_type_codes {
    /// 64-bit signed integer child.
    pub const I64: i8 = 0;
    /// Double precision child.
    pub const F64: i8 = 1;
}

/// Type codes of the inline any-value sparse union used by exemplar
/// attributes and hoisted shared attribute maps.
pub mod any_value_codes {
    /// String child.
    pub const STR: i8 = 0;
    /// Integer child.
    pub const INT: i8 = 1;
    /// Double child.
    pub const DOUBLE: i8 = 2;
    /// Boolean child.
    pub const BOOL: i8 = 3;
    /// Bytes child.
    pub const BYTES: i8 = 4;
    /// CBOR-serialized nested value child.
    pub const SER: i8 = 5;
}

/// Value type tags of the attribute-record `type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum AttributeValueType {
    /// Empty value.
    Empty = 0,
    /// String value, stored in the `str` column.
    Str = 1,
    /// Integer value, stored in the `int` column.
    Int = 2,
    /// Double value, stored in the `double` column.
    Double = 3,
    /// Boolean value, stored in the `bool` column.
    Bool = 4,
    /// Nested map, CBOR-serialized into the `ser` column.
    Map = 5,
    /// Nested list, CBOR-serialized into the `ser` column.
    Slice = 6,
    /// Bytes value, stored in the `bytes` column.
    Bytes = 7,
}

impl AttributeValueType {
    /// Decode the wire representation, failing on values outside the
    /// contract.
    pub fn try_from_wire(value: u8) -> Result<AttributeValueType> {
        AttributeValueType::try_from(value)
            .map_err(|_| Error::UnrecognizedAttributeValueType { value_type: value })
    }
}

/// Mark a field as optional: it is elided from the materialized record when
/// it carries no non-null value in the batch.
#[must_use]
pub fn optional(field: Field) -> Field {
    let mut metadata = field.metadata().clone();
    let _ = metadata.insert(
        consts::metadata::OPTIONAL.to_owned(),
        consts::metadata::TRUE.to_owned(),
    );
    field.with_metadata(metadata)
}

/// Mark a field as delta-encoded: the column stores first-order differences
/// and readers must reconstruct values by cumulative sum.
#[must_use]
pub fn delta_encoded(field: Field) -> Field {
    let mut metadata = field.metadata().clone();
    let _ = metadata.insert(
        consts::metadata::ENCODING.to_owned(),
        consts::metadata::ENCODING_DELTA.to_owned(),
    );
    field.with_metadata(metadata)
}

/// Whether a field is marked delta-encoded.
#[must_use]
pub fn is_delta_encoded(field: &Field) -> bool {
    field
        .metadata()
        .get(consts::metadata::ENCODING)
        .is_some_and(|v| v == consts::metadata::ENCODING_DELTA)
}

/// Dictionary-encoded UTF-8 with the given index type.
#[must_use]
pub fn dictionary_utf8(index: DataType) -> DataType {
    DataType::Dictionary(Box::new(index), Box::new(DataType::Utf8))
}

/// Dictionary-encoded binary with the given index type.
#[must_use]
pub fn dictionary_binary(index: DataType) -> DataType {
    DataType::Dictionary(Box::new(index), Box::new(DataType::Binary))
}

/// Stable identifier of a materialized schema: the canonical rendering of
/// every field (name, type, nullability, encoding flags), recursively.
/// Equal schemas produce equal identifiers across processes.
#[must_use]
pub fn schema_id(schema: &Schema) -> String {
    let mut out = String::new();
    for (i, field) in schema.fields().iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        render_field(&mut out, field);
    }
    out
}

fn render_field(out: &mut String, field: &Field) {
    out.push_str(field.name());
    out.push(':');
    render_data_type(out, field.data_type());
    if field.is_nullable() {
        out.push('?');
    }
    if is_delta_encoded(field) {
        out.push_str("+delta");
    }
}

fn render_data_type(out: &mut String, data_type: &DataType) {
    match data_type {
        DataType::Dictionary(key, value) => {
            out.push_str("dict<");
            render_data_type(out, key);
            out.push(',');
            render_data_type(out, value);
            out.push('>');
        }
        DataType::Struct(fields) => {
            out.push('{');
            for (i, field) in fields.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                render_field(out, field);
            }
            out.push('}');
        }
        DataType::List(field) => {
            out.push('[');
            render_field(out, field);
            out.push(']');
        }
        DataType::Map(field, _) => {
            out.push_str("map<");
            render_field(out, field);
            out.push('>');
        }
        DataType::Union(fields, _) => {
            out.push_str("union{");
            for (i, (type_id, field)) in fields.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&format!("{type_id}="));
                render_field(out, field);
            }
            out.push('}');
        }
        other => out.push_str(&format!("{other}")),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use arrow::datatypes::TimeUnit;

    #[test]
    fn test_schema_id_is_deterministic_and_discriminating() {
        let a = Schema::new(vec![
            Field::new(consts::ID, DataType::UInt32, false),
            optional(Field::new(
                consts::NAME,
                dictionary_utf8(DataType::UInt8),
                true,
            )),
        ]);
        let b = Schema::new(vec![
            Field::new(consts::ID, DataType::UInt32, false),
            optional(Field::new(
                consts::NAME,
                dictionary_utf8(DataType::UInt16),
                true,
            )),
        ]);
        assert_eq!(schema_id(&a), schema_id(&a));
        assert_ne!(schema_id(&a), schema_id(&b));
    }

    #[test]
    fn test_schema_id_includes_delta_flag() {
        let plain = Schema::new(vec![Field::new(consts::ID, DataType::UInt32, false)]);
        let delta = Schema::new(vec![delta_encoded(Field::new(
            consts::ID,
            DataType::UInt32,
            false,
        ))]);
        assert_ne!(schema_id(&plain), schema_id(&delta));
    }

    #[test]
    fn test_nested_rendering() {
        let schema = Schema::new(vec![Field::new(
            "point",
            DataType::Struct(
                vec![Field::new(
                    consts::TIME_UNIX_NANO,
                    DataType::Timestamp(TimeUnit::Nanosecond, None),
                    true,
                )]
                .into(),
            ),
            true,
        )]);
        let id = schema_id(&schema);
        assert!(id.contains("point:{time_unix_nano:"));
    }

    #[test]
    fn test_metric_type_codes() {
        assert_eq!(MetricType::Gauge as i8, 0);
        assert_eq!(MetricType::ExpHistogram as i8, 4);
        assert!(MetricType::try_from_wire(5).is_err());
    }
}
