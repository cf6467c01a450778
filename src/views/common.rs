// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Reader traits for common OTLP message types: `AnyValue`, `KeyValue` and
//! `InstrumentationScope`.

/// All current implementations return borrowed strings from the underlying
/// data; a `Cow` can be reintroduced here if a lossy UTF-8 backend appears.
pub type Str<'src> = &'src str;

/// Type tag of an [`AnyValueView`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
    /// The value is empty / unset.
    Empty,
    /// A UTF-8 string.
    String,
    /// A boolean.
    Bool,
    /// A 64-bit signed integer.
    Int64,
    /// A double precision floating point number.
    Double,
    /// An ordered list of values.
    Array,
    /// An ordered list of key-value pairs.
    KeyValueList,
    /// An array of bytes.
    Bytes,
}

/// View for AnyValue.
///
/// `value_type` must identify the underlying type precisely: when it returns
/// `ValueType::String`, `as_string` must return `Some`, and so on for the
/// other accessors.
pub trait AnyValueView<'val> {
    /// The key-value type yielded when this value is a kvlist.
    type KeyValue: AttributeView;

    /// Iterator over element values when this value is an array.
    type ArrayIter<'arr>: Iterator<Item = Self>
    where
        Self: 'arr;

    /// Iterator over entries when this value is a kvlist.
    type KeyValueIter<'kv>: Iterator<Item = Self::KeyValue>
    where
        Self: 'kv;

    /// The type tag of this value.
    fn value_type(&self) -> ValueType;

    /// The string payload, when `value_type` is `String`.
    fn as_string(&self) -> Option<Str<'_>>;

    /// The boolean payload, when `value_type` is `Bool`.
    fn as_bool(&self) -> Option<bool>;

    /// The integer payload, when `value_type` is `Int64`.
    fn as_int64(&self) -> Option<i64>;

    /// The double payload, when `value_type` is `Double`.
    fn as_double(&self) -> Option<f64>;

    /// The bytes payload, when `value_type` is `Bytes`.
    fn as_bytes(&self) -> Option<&[u8]>;

    /// The element values, when `value_type` is `Array`.
    fn as_array(&self) -> Option<Self::ArrayIter<'_>>;

    /// The entries, when `value_type` is `KeyValueList`.
    fn as_kvlist(&self) -> Option<Self::KeyValueIter<'_>>;
}

/// View for one key-value attribute.
pub trait AttributeView {
    /// The value view type of this attribute.
    type Val<'val>: AnyValueView<'val>
    where
        Self: 'val;

    /// The attribute key.
    fn key(&self) -> Str<'_>;

    /// The attribute value. `None` when the value is empty.
    fn value(&self) -> Option<Self::Val<'_>>;
}

/// View for the instrumentation scope.
pub trait InstrumentationScopeView {
    /// The attribute view type of this scope.
    type Attribute<'att>: AttributeView
    where
        Self: 'att;

    /// Iterator over the scope attributes.
    type AttributeIter<'att>: Iterator<Item = Self::Attribute<'att>>
    where
        Self: 'att;

    /// The scope name. `None` when unknown.
    fn name(&self) -> Option<Str<'_>>;

    /// The scope version. `None` when unknown.
    fn version(&self) -> Option<Str<'_>>;

    /// The scope attributes.
    fn attributes(&self) -> Self::AttributeIter<'_>;

    /// Number of dropped attributes; 0 when none were dropped.
    fn dropped_attributes_count(&self) -> u32;
}
