// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Column builders.
//!
//! Thin wrappers over the Arrow typed builders. On top of raw appends they
//! add:
//!
//! * optionality — `append_non_zero`, `append_non_empty`, `append_non_false`
//!   store a null instead of a value that carries no information, and every
//!   builder counts its non-null appends so record builders can elide
//!   optional columns that stayed empty for a whole batch;
//! * adaptive dictionaries — string, binary and fixed-size-binary columns
//!   start dictionary-encoded with 8-bit keys and report an overflow update
//!   when their cardinality crosses the current index capacity;
//! * delta encoding — sorted ID columns store first-order differences and
//!   report a schema update when the configured maximum delta is exceeded.

mod binary;
mod boolean;
mod delta;
mod fixed_size_binary;
mod primitive;
mod string;

pub use binary::AdaptiveBinaryBuilder;
pub use boolean::BooleanColumnBuilder;
pub use delta::U32DeltaBuilder;
pub use fixed_size_binary::FixedSizeBinaryDictBuilder;
pub use primitive::PrimitiveColumnBuilder;
pub use string::AdaptiveStringBuilder;
