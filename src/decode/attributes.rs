// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Attribute stores and inline value readers.

use ahash::RandomState;
use arrow::array::{Array, MapArray, RecordBatch, UnionArray};
use arrow::datatypes::DataType;
use std::collections::HashMap;

use crate::arrays;
use crate::error::{Error, Result};
use crate::otlp::common::{AnyValue, KeyValue};
use crate::otlp::metrics::NumberValue;
use crate::schema::{AttributeValueType, any_value_codes, consts, value_type_codes};

/// Attributes of one record, indexed by parent ID. Both parent widths (u16
/// for resource/scope records, u32 for data-point records) land in the same
/// u32 key space.
#[derive(Default)]
pub struct AttributeStore {
    by_parent: HashMap<u32, Vec<KeyValue>, RandomState>,
}

impl AttributeStore {
    /// An empty store, for batches without the corresponding record.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the index from an attribute record.
    pub fn read(batch: &RecordBatch) -> Result<Self> {
        let parent_col = arrays::column(batch, consts::PARENT_ID)?;
        let parents: Vec<u32> = match parent_col.data_type() {
            DataType::UInt16 => arrays::as_u16(consts::PARENT_ID, parent_col.as_ref())?
                .values()
                .iter()
                .map(|v| *v as u32)
                .collect(),
            DataType::UInt32 => arrays::as_u32(consts::PARENT_ID, parent_col.as_ref())?
                .values()
                .to_vec(),
            other => {
                return Err(Error::ColumnDataTypeMismatch {
                    name: consts::PARENT_ID.to_owned(),
                    expect: DataType::UInt32,
                    actual: other.clone(),
                });
            }
        };

        let keys = arrays::str_col(
            consts::ATTRS_KEY,
            arrays::column(batch, consts::ATTRS_KEY)?.as_ref(),
        )?;
        let value_types = arrays::as_u8(
            consts::ATTRS_TYPE,
            arrays::column(batch, consts::ATTRS_TYPE)?.as_ref(),
        )?;

        let str_values = match arrays::maybe_column(batch, consts::ATTRS_STR) {
            Some(col) => Some(arrays::str_col(consts::ATTRS_STR, col.as_ref())?),
            None => None,
        };
        let int_values = match arrays::maybe_column(batch, consts::ATTRS_INT) {
            Some(col) => Some(arrays::as_i64(consts::ATTRS_INT, col.as_ref())?),
            None => None,
        };
        let double_values = match arrays::maybe_column(batch, consts::ATTRS_DOUBLE) {
            Some(col) => Some(arrays::as_f64(consts::ATTRS_DOUBLE, col.as_ref())?),
            None => None,
        };
        let bool_values = match arrays::maybe_column(batch, consts::ATTRS_BOOL) {
            Some(col) => Some(arrays::as_bool(consts::ATTRS_BOOL, col.as_ref())?),
            None => None,
        };
        let bytes_values = match arrays::maybe_column(batch, consts::ATTRS_BYTES) {
            Some(col) => Some(arrays::bin_col(consts::ATTRS_BYTES, col.as_ref())?),
            None => None,
        };
        let ser_values = match arrays::maybe_column(batch, consts::ATTRS_SER) {
            Some(col) => Some(arrays::bin_col(consts::ATTRS_SER, col.as_ref())?),
            None => None,
        };

        let mut by_parent: HashMap<u32, Vec<KeyValue>, RandomState> = HashMap::default();
        for row in 0..batch.num_rows() {
            let key = keys.value(row).unwrap_or_default().to_owned();
            let value = match AttributeValueType::try_from_wire(value_types.value(row))? {
                AttributeValueType::Empty => AnyValue::Empty,
                AttributeValueType::Str => AnyValue::Str(
                    str_values
                        .as_ref()
                        .and_then(|col| col.value(row))
                        .unwrap_or_default()
                        .to_owned(),
                ),
                AttributeValueType::Int => AnyValue::Int(
                    int_values
                        .as_ref()
                        .map(|col| col.value(row))
                        .unwrap_or_default(),
                ),
                AttributeValueType::Double => AnyValue::Double(
                    double_values
                        .as_ref()
                        .map(|col| col.value(row))
                        .unwrap_or_default(),
                ),
                AttributeValueType::Bool => AnyValue::Bool(
                    bool_values
                        .as_ref()
                        .map(|col| col.value(row))
                        .unwrap_or_default(),
                ),
                AttributeValueType::Bytes => AnyValue::Bytes(
                    bytes_values
                        .as_ref()
                        .and_then(|col| col.value(row))
                        .unwrap_or_default()
                        .to_vec(),
                ),
                AttributeValueType::Map | AttributeValueType::Slice => {
                    let bytes = ser_values
                        .as_ref()
                        .and_then(|col| col.value(row))
                        .ok_or_else(|| Error::UnexpectedRecordBatchState {
                            reason: format!("serialized attribute missing at row {row}"),
                        })?;
                    super::cbor::deserialize_value(bytes)?
                }
            };
            by_parent
                .entry(parents[row])
                .or_default()
                .push(KeyValue { key, value });
        }
        Ok(Self { by_parent })
    }

    /// The attributes recorded under one parent ID.
    #[must_use]
    pub fn get(&self, parent_id: u32) -> &[KeyValue] {
        self.by_parent
            .get(&parent_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether any attribute references the given parent.
    #[must_use]
    pub fn contains(&self, parent_id: u32) -> bool {
        self.by_parent.contains_key(&parent_id)
    }
}

/// Read one row of an inline `map<string, any-value>` column.
pub(crate) fn read_attrs_map(map: &MapArray, row: usize) -> Result<Vec<KeyValue>> {
    if map.is_null(row) {
        return Ok(Vec::new());
    }
    let entries = map.value(row);
    let keys = arrays::as_string("key", entries.column(0).as_ref())?;
    let values = arrays::as_union("value", entries.column(1).as_ref())?;

    let mut out = Vec::with_capacity(entries.len());
    for i in 0..entries.len() {
        out.push(KeyValue {
            key: keys.value(i).to_owned(),
            value: read_any_value(values, i)?,
        });
    }
    Ok(out)
}

/// Read one row of the inline any-value sparse union.
pub(crate) fn read_any_value(union: &UnionArray, row: usize) -> Result<AnyValue> {
    let tag = union.type_id(row);
    let child = union.child(tag);
    if child.is_null(row) {
        return Ok(AnyValue::Empty);
    }
    match tag {
        t if t == any_value_codes::STR => Ok(AnyValue::Str(
            arrays::as_string("str", child.as_ref())?
                .value(row)
                .to_owned(),
        )),
        t if t == any_value_codes::INT => Ok(AnyValue::Int(
            arrays::as_i64("int", child.as_ref())?.value(row),
        )),
        t if t == any_value_codes::DOUBLE => Ok(AnyValue::Double(
            arrays::as_f64("double", child.as_ref())?.value(row),
        )),
        t if t == any_value_codes::BOOL => Ok(AnyValue::Bool(
            arrays::as_bool("bool", child.as_ref())?.value(row),
        )),
        t if t == any_value_codes::BYTES => Ok(AnyValue::Bytes(
            arrays::as_binary("bytes", child.as_ref())?
                .value(row)
                .to_vec(),
        )),
        t if t == any_value_codes::SER => {
            super::cbor::deserialize_value(arrays::as_binary("ser", child.as_ref())?.value(row))
        }
        other => Err(Error::UnrecognizedAttributeValueType {
            value_type: other as u8,
        }),
    }
}

/// Read one row of the metric-value sparse union.
pub(crate) fn read_number_value(union: &UnionArray, row: usize) -> Result<Option<NumberValue>> {
    let tag = union.type_id(row);
    let child = union.child(tag);
    if child.is_null(row) {
        return Ok(None);
    }
    match tag {
        t if t == value_type_codes::I64 => Ok(Some(NumberValue::Int(
            arrays::as_i64("i64", child.as_ref())?.value(row),
        ))),
        t if t == value_type_codes::F64 => Ok(Some(NumberValue::Double(
            arrays::as_f64("f64", child.as_ref())?.value(row),
        ))),
        other => Err(Error::UnrecognizedMetricType { metric_type: other }),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::encode::record::attributes::AttributesRecordBuilder;
    use crate::payload::PayloadType;

    #[test]
    fn test_store_round_trips_scalar_values() {
        let mut builder =
            AttributesRecordBuilder::<u32>::new(PayloadType::IntGaugeAttrs, u16::MAX as u32);
        builder.append(7, "s", &AnyValue::new_string("v")).unwrap();
        builder.append(7, "i", &AnyValue::new_int(-3)).unwrap();
        builder.append(9, "d", &AnyValue::new_double(0.5)).unwrap();
        builder.append(9, "b", &AnyValue::new_bool(true)).unwrap();
        builder
            .append(9, "by", &AnyValue::new_bytes(vec![1, 2]))
            .unwrap();
        let (batch, _) = builder.finish().unwrap();

        let store = AttributeStore::read(&batch).unwrap();
        let seven = store.get(7);
        assert_eq!(seven.len(), 2);
        assert!(seven.contains(&KeyValue::new("s", AnyValue::new_string("v"))));
        assert!(seven.contains(&KeyValue::new("i", AnyValue::new_int(-3))));
        assert_eq!(store.get(9).len(), 3);
        assert!(store.get(1).is_empty());
    }

    #[test]
    fn test_store_round_trips_nested_values() {
        let nested = AnyValue::KvList(vec![KeyValue::new("inner", AnyValue::new_int(1))]);
        let mut builder =
            AttributesRecordBuilder::<u16>::new(PayloadType::ResourceAttrs, u16::MAX as u32);
        builder.append(0, "nested", &nested).unwrap();
        let (batch, _) = builder.finish().unwrap();

        let store = AttributeStore::read(&batch).unwrap();
        assert_eq!(store.get(0), &[KeyValue::new("nested", nested)]);
    }
}
