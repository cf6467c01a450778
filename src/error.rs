// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Error and result types.

use arrow::datatypes::DataType;
use arrow::error::ArrowError;

use crate::payload::PayloadType;

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while encoding or decoding metric record batches.
#[derive(thiserror::Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    #[error("Invalid span id, expected 8 bytes, given len: {}", given)]
    InvalidSpanId { given: usize },

    #[error("Invalid trace id, expected 16 bytes, given len: {}", given)]
    InvalidTraceId { given: usize },

    #[error("Cannot recognize metric type: {}", metric_type)]
    UnrecognizedMetricType { metric_type: i8 },

    #[error("Cannot recognize attribute value type: {}", value_type)]
    UnrecognizedAttributeValueType { value_type: u8 },

    #[error("Unsupported payload type, got: {}", actual)]
    UnsupportedPayloadType { actual: i32 },

    #[error("Duplicate record for payload type {:?} in one batch", payload_type)]
    DuplicatePayloadType { payload_type: PayloadType },

    #[error("Main metrics record not found in batch")]
    MetricRecordNotFound,

    #[error("Builder already released")]
    BuilderAlreadyReleased,

    #[error(
        "Schema for `{:?}` is not up to date, updated fields: {:?}",
        payload_type,
        fields
    )]
    SchemaNotUpToDate {
        payload_type: PayloadType,
        fields: Vec<String>,
    },

    #[error(
        "Schema still evolving after {} attempts, likely a bug in the schema update logic",
        attempts
    )]
    TooManySchemaUpdates { attempts: usize },

    #[error("More than 2^16 - 1 metrics in one batch")]
    MetricCountOverflow,

    #[error("More than 2^16 - 1 resource or scope groups in one batch")]
    GroupCountOverflow,

    #[error(
        "More than 2^32 - 1 data points in one batch for payload {:?}",
        payload_type
    )]
    DataPointCountOverflow { payload_type: PayloadType },

    #[error(
        "Delta exceeded on column `{}`: prev {}, next {}, max delta {}",
        name,
        prev,
        next,
        max_delta
    )]
    DeltaExceeded {
        name: String,
        prev: u32,
        next: u32,
        max_delta: u32,
    },

    #[error("Cannot find column: {}", name)]
    ColumnNotFound { name: String },

    #[error(
        "Column `{}` data type mismatch, expect: {}, actual: {}",
        name,
        expect,
        actual
    )]
    ColumnDataTypeMismatch {
        name: String,
        expect: DataType,
        actual: DataType,
    },

    #[error(
        "Parent id {} in payload {:?} does not exist in the parent record",
        parent_id,
        payload_type
    )]
    ParentIdNotFound {
        parent_id: u32,
        payload_type: PayloadType,
    },

    #[error("Record batch is in unexpected state. reason: {}", reason)]
    UnexpectedRecordBatchState { reason: String },

    #[error("Failed to build arrow array for column `{}`", name)]
    BuildArray { name: String, source: ArrowError },

    #[error("Failed to build record batch for payload {:?}", payload_type)]
    BuildRecordBatch {
        payload_type: PayloadType,
        source: ArrowError,
    },

    #[error("Failed to serialize nested attribute value as CBOR: {}", error)]
    CborSerialize { error: String },

    #[error("Invalid bytes for serialized attribute value: {}", error)]
    CborDeserialize { error: String },

    #[error("Failed to build stream writer")]
    BuildStreamWriter { source: ArrowError },

    #[error("Failed to build stream reader")]
    BuildStreamReader { source: ArrowError },

    #[error("Failed to write record batch")]
    WriteRecordBatch { source: ArrowError },

    #[error("Failed to read record batch")]
    ReadRecordBatch { source: ArrowError },
}

impl From<ciborium::ser::Error<std::io::Error>> for Error {
    fn from(e: ciborium::ser::Error<std::io::Error>) -> Self {
        Self::CborSerialize {
            error: format!("{e}"),
        }
    }
}

impl From<ciborium::de::Error<std::io::Error>> for Error {
    fn from(e: ciborium::de::Error<std::io::Error>) -> Self {
        Self::CborDeserialize {
            error: format!("{e}"),
        }
    }
}
