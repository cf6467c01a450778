// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Decoding of a record message set back into the OTLP metrics tree.

pub mod attributes;
pub mod cbor;
pub mod metrics;

pub(crate) mod data_points;

pub use attributes::AttributeStore;
pub use metrics::decode_metrics;
