// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Dynamic tag resolution against the current request.
//!
//! A [`TagSpec`] is configured once at construction and maps tag names to
//! value sources: a constant, a named attribute read off the request, or a
//! derivation closure over the request. Resolution failures are isolated per
//! tag — they surface as a [`TagError`] and never abort the flush.

use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

/// Read-only attribute access on the bound request, by name.
///
/// This is the accessor boundary of the tag resolver: whatever the embedding
/// framework uses as its request type only needs to expose named reads.
pub trait RequestAttributes: Send + Sync {
    /// Returns the attribute value, or `None` if the request does not carry
    /// an attribute of that name.
    fn attribute(&self, name: &str) -> Option<Value>;
}

/// Derivation closure over the bound request. `None` marks a failed
/// derivation and resolves the tag to the error sentinel.
pub type DeriveFn = Arc<dyn Fn(&dyn RequestAttributes) -> Option<Value> + Send + Sync>;

/// Value source for one configured tag.
#[derive(Clone)]
pub enum TagSource {
    /// Fixed value, resolved as-is without touching the request.
    Constant(Value),
    /// Named attribute read off the current request.
    Accessor(String),
    /// Derivation closure invoked with the current request.
    Derive(DeriveFn),
}

impl Debug for TagSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TagSource::Constant(value) => write!(f, "Constant({value})"),
            TagSource::Accessor(name) => write!(f, "Accessor({name})"),
            TagSource::Derive(_) => write!(f, "Derive(..)"),
        }
    }
}

/// Per-tag resolution failure. One failing tag never affects the others.
#[derive(Debug, thiserror::Error)]
pub enum TagError {
    #[error("no request bound for the current unit of work")]
    MissingContext,

    #[error("request has no attribute `{0}`")]
    Accessor(String),

    #[error("derivation for tag `{0}` returned nothing")]
    Derive(String),
}

impl TagSource {
    /// Resolves this source against the bound request, if any.
    ///
    /// Constants ignore the request entirely; accessor and derivation sources
    /// fail with [`TagError::MissingContext`] when no request is bound.
    pub fn resolve(
        &self,
        name: &str,
        request: Option<&dyn RequestAttributes>,
    ) -> Result<Value, TagError> {
        match self {
            TagSource::Constant(value) => Ok(value.clone()),
            TagSource::Accessor(attribute) => {
                let request = request.ok_or(TagError::MissingContext)?;
                request
                    .attribute(attribute)
                    .ok_or_else(|| TagError::Accessor(attribute.clone()))
            }
            TagSource::Derive(derive) => {
                let request = request.ok_or(TagError::MissingContext)?;
                derive(request).ok_or_else(|| TagError::Derive(name.to_string()))
            }
        }
    }
}

/// Ordered tag-name to value-source mapping, immutable after construction.
#[derive(Clone, Debug, Default)]
pub struct TagSpec {
    entries: Vec<(String, TagSource)>,
}

impl TagSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn constant(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.entries
            .push((name.to_string(), TagSource::Constant(value.into())));
        self
    }

    #[must_use]
    pub fn accessor(mut self, name: &str, attribute: &str) -> Self {
        self.entries
            .push((name.to_string(), TagSource::Accessor(attribute.to_string())));
        self
    }

    #[must_use]
    pub fn derive<F>(mut self, name: &str, derive: F) -> Self
    where
        F: Fn(&dyn RequestAttributes) -> Option<Value> + Send + Sync + 'static,
    {
        self.entries
            .push((name.to_string(), TagSource::Derive(Arc::new(derive))));
        self
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &TagSource)> {
        self.entries
            .iter()
            .map(|(name, source)| (name.as_str(), source))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
