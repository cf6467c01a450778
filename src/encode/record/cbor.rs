// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! CBOR serialization of nested attribute values.
//!
//! Attribute records and inline maps store scalar values in typed columns;
//! nested lists and maps do not fit that layout and are serialized into the
//! `ser` binary column instead.

use ciborium::Value;

use crate::error::Result;
use crate::otlp::common::{AnyValue, KeyValue};

/// Serialize a nested value into CBOR bytes.
pub fn serialize_value(value: &AnyValue) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(&to_cbor(value), &mut buf)?;
    Ok(buf)
}

/// Serialize a list of values into CBOR bytes.
pub fn serialize_array(values: &[AnyValue]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(
        &Value::Array(values.iter().map(to_cbor).collect()),
        &mut buf,
    )?;
    Ok(buf)
}

/// Serialize a key-value list into CBOR bytes, as a CBOR map with text keys.
pub fn serialize_kv_list(entries: &[KeyValue]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(&kv_list_to_cbor(entries), &mut buf)?;
    Ok(buf)
}

fn kv_list_to_cbor(entries: &[KeyValue]) -> Value {
    Value::Map(
        entries
            .iter()
            .map(|kv| (Value::Text(kv.key.clone()), to_cbor(&kv.value)))
            .collect(),
    )
}

fn to_cbor(value: &AnyValue) -> Value {
    match value {
        AnyValue::Empty => Value::Null,
        AnyValue::Str(s) => Value::Text(s.clone()),
        AnyValue::Bool(b) => Value::Bool(*b),
        AnyValue::Int(i) => Value::Integer((*i).into()),
        AnyValue::Double(d) => Value::Float(*d),
        AnyValue::Bytes(b) => Value::Bytes(b.clone()),
        AnyValue::Array(values) => Value::Array(values.iter().map(to_cbor).collect()),
        AnyValue::KvList(entries) => kv_list_to_cbor(entries),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_serialize_kv_list_round_trips_through_decode() {
        let entries = vec![
            KeyValue::new("a", AnyValue::new_int(1)),
            KeyValue::new("b", AnyValue::new_string("x")),
        ];
        let bytes = serialize_kv_list(&entries).unwrap();
        let value = crate::decode::cbor::deserialize_value(&bytes).unwrap();
        assert_eq!(value, AnyValue::KvList(entries));
    }

    #[test]
    fn test_serialize_nested_array() {
        let values = vec![
            AnyValue::new_double(1.5),
            AnyValue::Array(vec![AnyValue::new_bool(true)]),
        ];
        let bytes = serialize_array(&values).unwrap();
        let value = crate::decode::cbor::deserialize_value(&bytes).unwrap();
        assert_eq!(value, AnyValue::Array(values));
    }
}
