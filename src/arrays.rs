// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Column access helpers for the decode path.
//!
//! Records arrive with batch-dependent schemas: optional columns may be
//! absent, string columns may be dictionary-encoded at either index width or
//! plain, and ID columns may be delta-encoded. These helpers normalize that
//! variance into typed accessors with proper errors instead of panics.

use arrow::array::{
    Array, ArrayRef, BinaryArray, BooleanArray, DictionaryArray, FixedSizeBinaryArray,
    Float64Array, Int32Array, Int64Array, ListArray, MapArray, RecordBatch, StringArray,
    StructArray, TimestampNanosecondArray, UInt8Array, UInt16Array, UInt32Array, UInt64Array,
    UnionArray,
};
use arrow::datatypes::{DataType, Field, UInt8Type, UInt16Type};

use crate::error::{Error, Result};
use crate::schema::is_delta_encoded;

/// Look up a required column by name.
pub(crate) fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::ColumnNotFound {
            name: name.to_owned(),
        })
}

/// Look up an optional column by name.
pub(crate) fn maybe_column<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a ArrayRef> {
    batch.column_by_name(name)
}

macro_rules! downcast_fn {
    ($fn_name:ident, $ty:ty, $expect:expr) => {
        pub(crate) fn $fn_name<'a>(name: &str, array: &'a dyn Array) -> Result<&'a $ty> {
            array
                .as_any()
                .downcast_ref::<$ty>()
                .ok_or_else(|| Error::ColumnDataTypeMismatch {
                    name: name.to_owned(),
                    expect: $expect,
                    actual: array.data_type().clone(),
                })
        }
    };
}

downcast_fn!(as_u8, UInt8Array, DataType::UInt8);
downcast_fn!(as_u16, UInt16Array, DataType::UInt16);
downcast_fn!(as_u32, UInt32Array, DataType::UInt32);
downcast_fn!(as_u64, UInt64Array, DataType::UInt64);
downcast_fn!(as_i32, Int32Array, DataType::Int32);
downcast_fn!(as_i64, Int64Array, DataType::Int64);
downcast_fn!(as_f64, Float64Array, DataType::Float64);
downcast_fn!(as_bool, BooleanArray, DataType::Boolean);
downcast_fn!(as_string, StringArray, DataType::Utf8);
downcast_fn!(as_binary, BinaryArray, DataType::Binary);
downcast_fn!(
    as_timestamp,
    TimestampNanosecondArray,
    DataType::Timestamp(arrow::datatypes::TimeUnit::Nanosecond, None)
);
downcast_fn!(
    as_struct,
    StructArray,
    DataType::Struct(arrow::datatypes::Fields::empty())
);
downcast_fn!(
    as_list,
    ListArray,
    DataType::List(std::sync::Arc::new(Field::new(
        "item",
        DataType::Null,
        true
    )))
);
downcast_fn!(
    as_map,
    MapArray,
    DataType::Map(
        std::sync::Arc::new(Field::new("entries", DataType::Null, false)),
        false
    )
);
downcast_fn!(
    as_union,
    UnionArray,
    DataType::Union(
        arrow::datatypes::UnionFields::empty(),
        arrow::datatypes::UnionMode::Sparse
    )
);

/// A string column at any of its possible encodings.
pub(crate) enum StrCol<'a> {
    Dict8(&'a DictionaryArray<UInt8Type>, &'a StringArray),
    Dict16(&'a DictionaryArray<UInt16Type>, &'a StringArray),
    Plain(&'a StringArray),
}

impl StrCol<'_> {
    /// The string at `row`, or `None` when null.
    pub(crate) fn value(&self, row: usize) -> Option<&str> {
        match self {
            StrCol::Dict8(dict, values) => {
                if dict.is_null(row) {
                    None
                } else {
                    Some(values.value(dict.keys().value(row) as usize))
                }
            }
            StrCol::Dict16(dict, values) => {
                if dict.is_null(row) {
                    None
                } else {
                    Some(values.value(dict.keys().value(row) as usize))
                }
            }
            StrCol::Plain(values) => {
                if values.is_null(row) {
                    None
                } else {
                    Some(values.value(row))
                }
            }
        }
    }
}

/// Resolve a string column, dictionary-encoded or plain.
pub(crate) fn str_col<'a>(name: &str, array: &'a dyn Array) -> Result<StrCol<'a>> {
    match array.data_type() {
        DataType::Utf8 => Ok(StrCol::Plain(as_string(name, array)?)),
        DataType::Dictionary(key, _) => match key.as_ref() {
            DataType::UInt8 => {
                let dict = downcast_dict8(name, array)?;
                Ok(StrCol::Dict8(
                    dict,
                    as_string(name, dict.values().as_ref())?,
                ))
            }
            DataType::UInt16 => {
                let dict = downcast_dict16(name, array)?;
                Ok(StrCol::Dict16(
                    dict,
                    as_string(name, dict.values().as_ref())?,
                ))
            }
            other => Err(mismatch(name, other.clone(), array)),
        },
        other => Err(mismatch(name, other.clone(), array)),
    }
}

/// A binary column at any of its possible encodings.
pub(crate) enum BinCol<'a> {
    Dict8(&'a DictionaryArray<UInt8Type>, &'a BinaryArray),
    Dict16(&'a DictionaryArray<UInt16Type>, &'a BinaryArray),
    Plain(&'a BinaryArray),
}

impl BinCol<'_> {
    /// The bytes at `row`, or `None` when null.
    pub(crate) fn value(&self, row: usize) -> Option<&[u8]> {
        match self {
            BinCol::Dict8(dict, values) => {
                if dict.is_null(row) {
                    None
                } else {
                    Some(values.value(dict.keys().value(row) as usize))
                }
            }
            BinCol::Dict16(dict, values) => {
                if dict.is_null(row) {
                    None
                } else {
                    Some(values.value(dict.keys().value(row) as usize))
                }
            }
            BinCol::Plain(values) => {
                if values.is_null(row) {
                    None
                } else {
                    Some(values.value(row))
                }
            }
        }
    }
}

/// Resolve a binary column, dictionary-encoded or plain.
pub(crate) fn bin_col<'a>(name: &str, array: &'a dyn Array) -> Result<BinCol<'a>> {
    match array.data_type() {
        DataType::Binary => Ok(BinCol::Plain(as_binary(name, array)?)),
        DataType::Dictionary(key, _) => match key.as_ref() {
            DataType::UInt8 => {
                let dict = downcast_dict8(name, array)?;
                Ok(BinCol::Dict8(
                    dict,
                    as_binary(name, dict.values().as_ref())?,
                ))
            }
            DataType::UInt16 => {
                let dict = downcast_dict16(name, array)?;
                Ok(BinCol::Dict16(
                    dict,
                    as_binary(name, dict.values().as_ref())?,
                ))
            }
            other => Err(mismatch(name, other.clone(), array)),
        },
        other => Err(mismatch(name, other.clone(), array)),
    }
}

/// A fixed-size binary column, dictionary-encoded or plain.
pub(crate) enum FsbCol<'a> {
    Dict8(&'a DictionaryArray<UInt8Type>, &'a FixedSizeBinaryArray),
    Dict16(&'a DictionaryArray<UInt16Type>, &'a FixedSizeBinaryArray),
    Plain(&'a FixedSizeBinaryArray),
}

impl FsbCol<'_> {
    /// The bytes at `row`, or `None` when null.
    pub(crate) fn value(&self, row: usize) -> Option<&[u8]> {
        match self {
            FsbCol::Dict8(dict, values) => {
                if dict.is_null(row) {
                    None
                } else {
                    Some(values.value(dict.keys().value(row) as usize))
                }
            }
            FsbCol::Dict16(dict, values) => {
                if dict.is_null(row) {
                    None
                } else {
                    Some(values.value(dict.keys().value(row) as usize))
                }
            }
            FsbCol::Plain(values) => {
                if values.is_null(row) {
                    None
                } else {
                    Some(values.value(row))
                }
            }
        }
    }
}

/// Resolve a fixed-size binary column, dictionary-encoded or plain.
pub(crate) fn fsb_col<'a>(name: &str, array: &'a dyn Array) -> Result<FsbCol<'a>> {
    fn fsb<'a>(name: &str, array: &'a dyn Array) -> Result<&'a FixedSizeBinaryArray> {
        array
            .as_any()
            .downcast_ref::<FixedSizeBinaryArray>()
            .ok_or_else(|| Error::ColumnDataTypeMismatch {
                name: name.to_owned(),
                expect: DataType::FixedSizeBinary(0),
                actual: array.data_type().clone(),
            })
    }
    match array.data_type() {
        DataType::FixedSizeBinary(_) => Ok(FsbCol::Plain(fsb(name, array)?)),
        DataType::Dictionary(key, _) => match key.as_ref() {
            DataType::UInt8 => {
                let dict = downcast_dict8(name, array)?;
                Ok(FsbCol::Dict8(dict, fsb(name, dict.values().as_ref())?))
            }
            DataType::UInt16 => {
                let dict = downcast_dict16(name, array)?;
                Ok(FsbCol::Dict16(dict, fsb(name, dict.values().as_ref())?))
            }
            other => Err(mismatch(name, other.clone(), array)),
        },
        other => Err(mismatch(name, other.clone(), array)),
    }
}

/// Materialize a u32 ID column, reconstructing by cumulative sum when the
/// field carries the delta-encoding flag.
pub(crate) fn read_u32_ids(field: &Field, array: &dyn Array) -> Result<Vec<u32>> {
    let values = as_u32(field.name(), array)?;
    let mut out = Vec::with_capacity(values.len());
    if is_delta_encoded(field) {
        let mut acc: u32 = 0;
        for (i, delta) in values.values().iter().enumerate() {
            acc = if i == 0 {
                *delta
            } else {
                acc.wrapping_add(*delta)
            };
            out.push(acc);
        }
    } else {
        out.extend_from_slice(values.values());
    }
    Ok(out)
}

/// Nullable i32-over-u8 dictionary column (aggregation temporality).
pub(crate) fn dict_i32_value(name: &str, array: &dyn Array, row: usize) -> Result<Option<i32>> {
    if array.is_null(row) {
        return Ok(None);
    }
    match array.data_type() {
        DataType::Dictionary(_, _) => {
            let dict = downcast_dict8(name, array)?;
            let values = as_i32(name, dict.values().as_ref())?;
            Ok(Some(values.value(dict.keys().value(row) as usize)))
        }
        DataType::Int32 => Ok(Some(as_i32(name, array)?.value(row))),
        other => Err(mismatch(name, other.clone(), array)),
    }
}

fn downcast_dict8<'a>(name: &str, array: &'a dyn Array) -> Result<&'a DictionaryArray<UInt8Type>> {
    array
        .as_any()
        .downcast_ref::<DictionaryArray<UInt8Type>>()
        .ok_or_else(|| mismatch(name, DataType::UInt8, array))
}

fn downcast_dict16<'a>(
    name: &str,
    array: &'a dyn Array,
) -> Result<&'a DictionaryArray<UInt16Type>> {
    array
        .as_any()
        .downcast_ref::<DictionaryArray<UInt16Type>>()
        .ok_or_else(|| mismatch(name, DataType::UInt16, array))
}

fn mismatch(name: &str, expect: DataType, array: &dyn Array) -> Error {
    Error::ColumnDataTypeMismatch {
        name: name.to_owned(),
        expect,
        actual: array.data_type().clone(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::delta_encoded;
    use arrow::array::UInt32Array;

    #[test]
    fn test_delta_ids_are_reconstructed() {
        let field = delta_encoded(Field::new("id", DataType::UInt32, false));
        let deltas = UInt32Array::from(vec![0u32, 1, 1, 1]);
        let ids = read_u32_ids(&field, &deltas).unwrap();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_plain_ids_pass_through() {
        let field = Field::new("id", DataType::UInt32, false);
        let values = UInt32Array::from(vec![5u32, 3, 9]);
        let ids = read_u32_ids(&field, &values).unwrap();
        assert_eq!(ids, vec![5, 3, 9]);
    }

    #[test]
    fn test_str_col_handles_plain() {
        let plain = StringArray::from(vec![Some("a"), None]);
        let col = str_col("name", &plain).unwrap();
        assert_eq!(col.value(0), Some("a"));
        assert_eq!(col.value(1), None);
    }
}
