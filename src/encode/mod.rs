// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Encoding of the OTLP metrics tree into related Arrow records.

pub mod array;
pub mod optimizer;
pub mod producer;
pub mod record;
pub mod shared;
