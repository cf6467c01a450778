// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Columnar (Apache Arrow) encoding of OpenTelemetry metrics.
//!
//! This crate converts an OTLP-equivalent metrics tree into a set of related
//! Arrow records and back. A single logical batch is emitted as one main
//! `Metrics` record plus one record per populated data-point payload type and
//! one attribute record per populated attribute payload type, all bound
//! together by batch-local integer IDs.
//!
//! The interesting machinery lives in three places:
//!
//! * [`encode::array`] — column builders that add optionality ("append the
//!   value only when it carries information"), adaptive dictionary encoding
//!   with overflow detection, and delta encoding for sorted ID columns.
//! * [`encode::record`] — one record builder per payload type, each owning
//!   its adaptive schema, plus the manager that drives per-batch reset and
//!   collects finished records.
//! * [`encode::producer`] / [`decode`] — the top-level encode pipeline
//!   (optimize, hoist shared values, accumulate, sort, emit, retry on schema
//!   evolution) and the row-by-row decoder that rebuilds the OTLP tree.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod decode;
pub mod encode;
pub mod error;
pub mod ipc;
pub mod otlp;
pub mod payload;
pub mod schema;
pub mod stats;
pub mod views;

pub(crate) mod arrays;

pub use config::Config;
pub use decode::metrics::decode_metrics;
pub use encode::producer::MetricsProducer;
pub use payload::{PayloadType, RecordMessage};
