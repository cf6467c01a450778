// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! CBOR deserialization of nested attribute values.

use ciborium::Value;

use crate::error::{Error, Result};
use crate::otlp::common::{AnyValue, KeyValue};

/// Deserialize CBOR bytes from a `ser` column back into a value.
pub fn deserialize_value(bytes: &[u8]) -> Result<AnyValue> {
    let value: Value = ciborium::de::from_reader(bytes)?;
    from_cbor(value)
}

fn from_cbor(value: Value) -> Result<AnyValue> {
    match value {
        Value::Null => Ok(AnyValue::Empty),
        Value::Text(s) => Ok(AnyValue::Str(s)),
        Value::Bool(b) => Ok(AnyValue::Bool(b)),
        Value::Integer(i) => {
            let i: i64 = i.try_into().map_err(|_| Error::CborDeserialize {
                error: "integer attribute value out of i64 range".to_owned(),
            })?;
            Ok(AnyValue::Int(i))
        }
        Value::Float(d) => Ok(AnyValue::Double(d)),
        Value::Bytes(b) => Ok(AnyValue::Bytes(b)),
        Value::Array(values) => Ok(AnyValue::Array(
            values
                .into_iter()
                .map(from_cbor)
                .collect::<Result<Vec<_>>>()?,
        )),
        Value::Map(entries) => {
            let mut out = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                let Value::Text(key) = key else {
                    return Err(Error::CborDeserialize {
                        error: format!("map key is not text: {key:?}"),
                    });
                };
                out.push(KeyValue {
                    key,
                    value: from_cbor(value)?,
                });
            }
            Ok(AnyValue::KvList(out))
        }
        other => Err(Error::CborDeserialize {
            error: format!("unsupported serialized value: {other:?}"),
        }),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_rejects_non_text_map_keys() {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(
            &Value::Map(vec![(Value::Integer(1.into()), Value::Bool(true))]),
            &mut buf,
        )
        .unwrap();
        assert!(deserialize_value(&buf).is_err());
    }
}
