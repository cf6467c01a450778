// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Reader trait for the OTLP resource.

use crate::views::common::AttributeView;

/// View for Resource.
pub trait ResourceView {
    /// The attribute view type of this resource.
    type Attribute<'att>: AttributeView
    where
        Self: 'att;

    /// Iterator over the resource attributes.
    type AttributesIter<'att>: Iterator<Item = Self::Attribute<'att>>
    where
        Self: 'att;

    /// The resource attributes.
    fn attributes(&self) -> Self::AttributesIter<'_>;

    /// Number of dropped attributes; 0 when none were dropped.
    fn dropped_attributes_count(&self) -> u32;
}
