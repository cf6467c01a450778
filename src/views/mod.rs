// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Backend-agnostic reader traits for the OTLP metrics tree.
//!
//! The encoder does not assume any particular protobuf library; it only needs
//! read access to the input tree. These traits describe that access. An
//! implementation backed by the crate's own owned model lives in
//! [`otlp`], together with a materializer that turns any view into
//! [`crate::otlp::MetricsData`].

pub mod common;
pub mod metrics;
pub mod otlp;
pub mod resource;
