// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Payload types and the record message envelope.
//!
//! Every Arrow record emitted for a batch is tagged with a [`PayloadType`]
//! identifying its semantic role. The set is a closed wire contract shared by
//! all signals; this crate only produces the metrics-related tags but decodes
//! validate against the full set.

use arrow::array::RecordBatch;
use num_enum::TryFromPrimitive;

use crate::error::{Error, Result};

/// Semantic role of one Arrow record within a batch.
///
/// The integer values are part of the wire contract and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(i32)]
#[allow(missing_docs)]
pub enum PayloadType {
    ResourceAttrs = 0,
    ScopeAttrs = 1,
    Spans = 2,
    SpanAttrs = 3,
    SpanEvents = 4,
    SpanEventAttrs = 5,
    SpanLinks = 6,
    SpanLinkAttrs = 7,
    Metrics = 8,
    ResourceMetricsAttrs = 9,
    IntSum = 10,
    IntSumAttrs = 11,
    DoubleSum = 12,
    DoubleSumAttrs = 13,
    IntGauge = 14,
    IntGaugeAttrs = 15,
    DoubleGauge = 16,
    DoubleGaugeAttrs = 17,
    Summary = 18,
    SummaryAttrs = 19,
    Histogram = 20,
    HistogramAttrs = 21,
    ExpHistogram = 22,
    ExpHistogramAttrs = 23,
    Logs = 24,
    LogAttrs = 25,
}

impl PayloadType {
    /// The attribute payload bound to this data-point payload, if any.
    #[must_use]
    pub fn attrs_payload(&self) -> Option<PayloadType> {
        match self {
            PayloadType::IntSum => Some(PayloadType::IntSumAttrs),
            PayloadType::DoubleSum => Some(PayloadType::DoubleSumAttrs),
            PayloadType::IntGauge => Some(PayloadType::IntGaugeAttrs),
            PayloadType::DoubleGauge => Some(PayloadType::DoubleGaugeAttrs),
            PayloadType::Summary => Some(PayloadType::SummaryAttrs),
            PayloadType::Histogram => Some(PayloadType::HistogramAttrs),
            PayloadType::ExpHistogram => Some(PayloadType::ExpHistogramAttrs),
            _ => None,
        }
    }

    /// Decode a raw payload tag, failing on values outside the closed set.
    pub fn try_from_wire(value: i32) -> Result<PayloadType> {
        PayloadType::try_from(value).map_err(|_| Error::UnsupportedPayloadType { actual: value })
    }
}

/// One finished Arrow record together with its batch context.
#[derive(Debug, Clone)]
pub struct RecordMessage {
    /// Identifier of the batch this record belongs to. All records produced by
    /// one encode call share the same batch id.
    pub batch_id: String,

    /// Stable identifier of the materialized schema of `record`. Two records
    /// with equal schema ids have byte-identical schemas; consumers use this
    /// to decide whether a schema must be (re)sent on the wire.
    pub schema_id: String,

    /// Semantic role of `record` within the batch.
    pub payload_type: PayloadType,

    /// The record itself.
    pub record: RecordBatch,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_payload_type_wire_values() {
        assert_eq!(PayloadType::Metrics as i32, 8);
        assert_eq!(PayloadType::IntSum as i32, 10);
        assert_eq!(PayloadType::ExpHistogramAttrs as i32, 23);
        assert_eq!(PayloadType::try_from_wire(8).unwrap(), PayloadType::Metrics);
        assert!(PayloadType::try_from_wire(99).is_err());
    }

    #[test]
    fn test_attrs_payload_binding() {
        assert_eq!(
            PayloadType::IntGauge.attrs_payload(),
            Some(PayloadType::IntGaugeAttrs)
        );
        assert_eq!(PayloadType::Metrics.attrs_payload(), None);
    }
}
