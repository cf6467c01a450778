// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Record builders and the related-records manager.

pub mod anyvalue;
pub mod attributes;
pub mod cbor;
pub mod data_points;
pub mod exemplars;
pub mod metrics;
pub mod state;

use crate::error::{Error, Result};
use crate::payload::{PayloadType, RecordMessage};
use attributes::AttributesRecordBuilder;
use data_points::exp_histogram::ExpHistogramDataPointsBuilder;
use data_points::histogram::HistogramDataPointsBuilder;
use data_points::number::NumberDataPointsBuilder;
use data_points::summary::SummaryDataPointsBuilder;
use metrics::MetricsRecordBuilder;

/// The declared builder graph: every payload type this encoder may emit,
/// with the payload its parent-ID column references.
pub const DECLARATIONS: &[(PayloadType, Option<PayloadType>)] = &[
    (PayloadType::Metrics, None),
    (PayloadType::ResourceAttrs, Some(PayloadType::Metrics)),
    (PayloadType::ScopeAttrs, Some(PayloadType::Metrics)),
    (PayloadType::IntGauge, Some(PayloadType::Metrics)),
    (PayloadType::IntGaugeAttrs, Some(PayloadType::IntGauge)),
    (PayloadType::DoubleGauge, Some(PayloadType::Metrics)),
    (
        PayloadType::DoubleGaugeAttrs,
        Some(PayloadType::DoubleGauge),
    ),
    (PayloadType::IntSum, Some(PayloadType::Metrics)),
    (PayloadType::IntSumAttrs, Some(PayloadType::IntSum)),
    (PayloadType::DoubleSum, Some(PayloadType::Metrics)),
    (PayloadType::DoubleSumAttrs, Some(PayloadType::DoubleSum)),
    (PayloadType::Summary, Some(PayloadType::Metrics)),
    (PayloadType::SummaryAttrs, Some(PayloadType::Summary)),
    (PayloadType::Histogram, Some(PayloadType::Metrics)),
    (PayloadType::HistogramAttrs, Some(PayloadType::Histogram)),
    (PayloadType::ExpHistogram, Some(PayloadType::Metrics)),
    (
        PayloadType::ExpHistogramAttrs,
        Some(PayloadType::ExpHistogram),
    ),
];

/// Owns every record builder of one encoder instance, drives per-batch
/// reset, and collects the finished records.
///
/// Exactly one record per payload type can come out of one batch: the main
/// record always, every other payload only when it has rows.
pub struct RelatedRecords {
    released: bool,

    /// The main metrics record builder.
    pub metrics: MetricsRecordBuilder,
    /// Resource attribute record builder.
    pub resource_attrs: AttributesRecordBuilder<u16>,
    /// Scope attribute record builder.
    pub scope_attrs: AttributesRecordBuilder<u16>,
    /// Integer gauge data points.
    pub int_gauge: NumberDataPointsBuilder,
    /// Double gauge data points.
    pub double_gauge: NumberDataPointsBuilder,
    /// Integer sum data points.
    pub int_sum: NumberDataPointsBuilder,
    /// Double sum data points.
    pub double_sum: NumberDataPointsBuilder,
    /// Summary data points.
    pub summary: SummaryDataPointsBuilder,
    /// Histogram data points.
    pub histogram: HistogramDataPointsBuilder,
    /// Exponential-histogram data points.
    pub exp_histogram: ExpHistogramDataPointsBuilder,
    /// Integer gauge point attributes.
    pub int_gauge_attrs: AttributesRecordBuilder<u32>,
    /// Double gauge point attributes.
    pub double_gauge_attrs: AttributesRecordBuilder<u32>,
    /// Integer sum point attributes.
    pub int_sum_attrs: AttributesRecordBuilder<u32>,
    /// Double sum point attributes.
    pub double_sum_attrs: AttributesRecordBuilder<u32>,
    /// Summary point attributes.
    pub summary_attrs: AttributesRecordBuilder<u32>,
    /// Histogram point attributes.
    pub histogram_attrs: AttributesRecordBuilder<u32>,
    /// Exponential-histogram point attributes.
    pub exp_histogram_attrs: AttributesRecordBuilder<u32>,
}

impl RelatedRecords {
    /// Builders for every declared payload, sharing the dictionary
    /// cardinality bound.
    #[must_use]
    pub fn new(max_card: u32) -> Self {
        Self {
            released: false,
            metrics: MetricsRecordBuilder::new(max_card),
            resource_attrs: AttributesRecordBuilder::new(PayloadType::ResourceAttrs, max_card),
            scope_attrs: AttributesRecordBuilder::new(PayloadType::ScopeAttrs, max_card),
            int_gauge: NumberDataPointsBuilder::new(PayloadType::IntGauge, max_card),
            double_gauge: NumberDataPointsBuilder::new(PayloadType::DoubleGauge, max_card),
            int_sum: NumberDataPointsBuilder::new(PayloadType::IntSum, max_card),
            double_sum: NumberDataPointsBuilder::new(PayloadType::DoubleSum, max_card),
            summary: SummaryDataPointsBuilder::new(max_card),
            histogram: HistogramDataPointsBuilder::new(max_card),
            exp_histogram: ExpHistogramDataPointsBuilder::new(max_card),
            int_gauge_attrs: AttributesRecordBuilder::new(PayloadType::IntGaugeAttrs, max_card),
            double_gauge_attrs: AttributesRecordBuilder::new(
                PayloadType::DoubleGaugeAttrs,
                max_card,
            ),
            int_sum_attrs: AttributesRecordBuilder::new(PayloadType::IntSumAttrs, max_card),
            double_sum_attrs: AttributesRecordBuilder::new(PayloadType::DoubleSumAttrs, max_card),
            summary_attrs: AttributesRecordBuilder::new(PayloadType::SummaryAttrs, max_card),
            histogram_attrs: AttributesRecordBuilder::new(PayloadType::HistogramAttrs, max_card),
            exp_histogram_attrs: AttributesRecordBuilder::new(
                PayloadType::ExpHistogramAttrs,
                max_card,
            ),
        }
    }

    /// Whether [`RelatedRecords::release`] was called.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Release the builders. Idempotent; any later finish fails with
    /// builder-already-released.
    pub fn release(&mut self) {
        if !self.released {
            self.reset();
            self.released = true;
        }
    }

    /// Drop all buffered rows, keeping the adaptive schema state.
    pub fn reset(&mut self) {
        self.metrics.reset();
        self.resource_attrs.reset();
        self.scope_attrs.reset();
        self.int_gauge.reset();
        self.double_gauge.reset();
        self.int_sum.reset();
        self.double_sum.reset();
        self.summary.reset();
        self.histogram.reset();
        self.exp_histogram.reset();
        self.int_gauge_attrs.reset();
        self.double_gauge_attrs.reset();
        self.int_sum_attrs.reset();
        self.double_sum_attrs.reset();
        self.summary_attrs.reset();
        self.histogram_attrs.reset();
        self.exp_histogram_attrs.reset();
    }

    /// Materialize every populated record (and always the main record),
    /// parent before child in the output.
    ///
    /// Fails with schema-not-up-to-date when any builder saw a dictionary
    /// overflow or delta violation; the batch must then be replayed.
    pub fn finish(&mut self, batch_id: &str) -> Result<Vec<RecordMessage>> {
        if self.released {
            return Err(Error::BuilderAlreadyReleased);
        }

        let mut messages = Vec::new();

        let (record, schema_id) = self.metrics.finish()?;
        messages.push(RecordMessage {
            batch_id: batch_id.to_owned(),
            schema_id,
            payload_type: PayloadType::Metrics,
            record,
        });

        // data-point records, then their attribute records
        macro_rules! finish_dp {
            ($builder:expr, $payload:expr) => {
                if $builder.len() > 0 {
                    let (record, schema_id) = $builder.finish()?;
                    messages.push(RecordMessage {
                        batch_id: batch_id.to_owned(),
                        schema_id,
                        payload_type: $payload,
                        record,
                    });
                } else {
                    $builder.reset();
                }
            };
        }
        macro_rules! finish_attrs {
            ($builder:expr) => {
                if $builder.len() > 0 {
                    let payload_type = $builder.payload_type();
                    let (record, schema_id) = $builder.finish()?;
                    messages.push(RecordMessage {
                        batch_id: batch_id.to_owned(),
                        schema_id,
                        payload_type,
                        record,
                    });
                } else {
                    $builder.reset();
                }
            };
        }

        finish_attrs!(self.resource_attrs);
        finish_attrs!(self.scope_attrs);
        finish_dp!(self.int_gauge, PayloadType::IntGauge);
        finish_attrs!(self.int_gauge_attrs);
        finish_dp!(self.double_gauge, PayloadType::DoubleGauge);
        finish_attrs!(self.double_gauge_attrs);
        finish_dp!(self.int_sum, PayloadType::IntSum);
        finish_attrs!(self.int_sum_attrs);
        finish_dp!(self.double_sum, PayloadType::DoubleSum);
        finish_attrs!(self.double_sum_attrs);
        finish_dp!(self.summary, PayloadType::Summary);
        finish_attrs!(self.summary_attrs);
        finish_dp!(self.histogram, PayloadType::Histogram);
        finish_attrs!(self.histogram_attrs);
        finish_dp!(self.exp_histogram, PayloadType::ExpHistogram);
        finish_attrs!(self.exp_histogram_attrs);

        debug_assert!(
            {
                let mut seen = std::collections::HashSet::new();
                messages.iter().all(|m| seen.insert(m.payload_type))
            },
            "one record per payload type per batch"
        );

        Ok(messages)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_empty_batch_emits_only_the_main_record() {
        let mut records = RelatedRecords::new(u16::MAX as u32);
        let messages = records.finish("0").unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].payload_type, PayloadType::Metrics);
        assert_eq!(messages[0].record.num_rows(), 0);
    }

    #[test]
    fn test_finish_after_release_fails() {
        let mut records = RelatedRecords::new(u16::MAX as u32);
        records.release();
        records.release(); // idempotent
        let err = records.finish("0").err().expect("release error expected");
        assert!(matches!(err, Error::BuilderAlreadyReleased));
    }

    #[test]
    fn test_declarations_cover_every_metrics_payload() {
        // every attribute payload names its data-point parent; every
        // data-point payload names the main record
        for (payload, parent) in DECLARATIONS {
            match payload {
                PayloadType::Metrics => assert!(parent.is_none()),
                p => {
                    let parent = parent.expect("child payload must declare a parent");
                    if let Some(attrs) = parent.attrs_payload() {
                        assert_eq!(attrs, *p);
                    } else {
                        assert_eq!(parent, PayloadType::Metrics);
                    }
                }
            }
        }
    }
}
