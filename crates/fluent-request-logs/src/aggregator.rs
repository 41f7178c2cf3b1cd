// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-flight buffer for one unit of work.
//!
//! The [`Aggregator`] owns the mutable per-request state: the ordered message
//! buffer, the running maximum severity, the scratch fields merged into the
//! outgoing record, and the bound request. It is a synchronous state machine;
//! the [`crate::flusher::Flusher`] consumes it wholesale at flush time via
//! [`Aggregator::take_pending`].
//!
//! One aggregator serves one logical unit of work at a time. Concurrent units
//! of work each get their own instance; there is no internal locking beyond
//! the [`LogHandle`] wrapper.

use crate::severity::Severity;
use crate::tags::RequestAttributes;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Buffered per-request state, reset after every delivered flush.
pub struct Aggregator {
    min_severity: Severity,
    severity: Severity,
    messages: Vec<String>,
    fields: Map<String, Value>,
    request: Option<Arc<dyn RequestAttributes>>,
}

/// Everything the flusher needs to assemble one outgoing record. Taking it
/// resets the aggregator for the next unit of work.
pub struct PendingRecord {
    pub messages: Vec<String>,
    pub severity: Severity,
    pub fields: Map<String, Value>,
    pub request: Option<Arc<dyn RequestAttributes>>,
}

impl Aggregator {
    #[must_use]
    pub fn new(min_severity: Severity) -> Self {
        Self {
            min_severity,
            severity: Severity::Debug,
            messages: Vec::new(),
            fields: Map::new(),
            request: None,
        }
    }

    /// Buffers a message at the given severity.
    ///
    /// Below-threshold severities and blank messages are "handled, nothing to
    /// do": the call succeeds without buffering anything. This operation
    /// never fails — it runs at arbitrary logging call sites.
    pub fn add(&mut self, severity: Severity, message: Option<&str>) -> bool {
        if severity < self.min_severity {
            return true;
        }
        if let Some(text) = message {
            if !text.trim().is_empty() {
                self.append(severity, text.to_string());
            }
        }
        true
    }

    /// Like [`Aggregator::add`], with a fallback producer invoked only when
    /// the message is absent or blank. The producer is not invoked for
    /// below-threshold severities.
    pub fn add_with<F>(&mut self, severity: Severity, message: Option<&str>, fallback: F) -> bool
    where
        F: FnOnce() -> String,
    {
        if severity < self.min_severity {
            return true;
        }
        let text = match message {
            Some(text) if !text.trim().is_empty() => text.to_string(),
            _ => fallback(),
        };
        if text.trim().is_empty() {
            return true;
        }
        self.append(severity, text);
        true
    }

    /// Buffers raw bytes, force-reinterpreting invalid UTF-8 rather than
    /// rejecting it. Every stored message is valid UTF-8 afterwards.
    pub fn add_raw(&mut self, severity: Severity, message: &[u8]) -> bool {
        if severity < self.min_severity {
            return true;
        }
        let text = String::from_utf8_lossy(message);
        if text.trim().is_empty() {
            return true;
        }
        self.append(severity, text.into_owned());
        true
    }

    fn append(&mut self, severity: Severity, text: String) {
        if self.severity < severity {
            self.severity = severity;
        }
        self.messages.push(text);
    }

    /// Sets a custom field merged into the outgoing record at flush time.
    pub fn set_field(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), value.into());
    }

    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Binds the request for the current unit of work. The binding is
    /// borrowed state: it is released by [`Aggregator::take_pending`] and
    /// never outlives the flush.
    pub fn bind_request(&mut self, request: Arc<dyn RequestAttributes>) {
        self.request = Some(request);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn max_severity(&self) -> Severity {
        self.severity
    }

    /// Consumes the buffered state for flushing.
    ///
    /// Returns `None` when the buffer is empty, leaving every piece of state
    /// untouched. Otherwise the buffer, scratch fields and request binding
    /// are taken and the running severity drops back to the lowest rank.
    pub fn take_pending(&mut self) -> Option<PendingRecord> {
        if self.messages.is_empty() {
            return None;
        }
        Some(PendingRecord {
            messages: std::mem::take(&mut self.messages),
            severity: std::mem::replace(&mut self.severity, Severity::Debug),
            fields: std::mem::take(&mut self.fields),
            request: self.request.take(),
        })
    }
}

/// Clone-cheap handle over a shared [`Aggregator`], passed into the scoped
/// work so nested code can log. All operations are non-blocking apart from a
/// short lock, and none of them can fail: a poisoned lock is absorbed rather
/// than propagated, because logging call sites must never raise.
#[derive(Clone)]
pub struct LogHandle {
    inner: Arc<Mutex<Aggregator>>,
}

impl LogHandle {
    #[must_use]
    pub fn new(aggregator: Arc<Mutex<Aggregator>>) -> Self {
        Self { inner: aggregator }
    }

    fn lock(&self) -> MutexGuard<'_, Aggregator> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(&self, severity: Severity, message: Option<&str>) -> bool {
        self.lock().add(severity, message)
    }

    pub fn add_with<F>(&self, severity: Severity, message: Option<&str>, fallback: F) -> bool
    where
        F: FnOnce() -> String,
    {
        self.lock().add_with(severity, message, fallback)
    }

    pub fn add_raw(&self, severity: Severity, message: &[u8]) -> bool {
        self.lock().add_raw(severity, message)
    }

    pub fn set_field(&self, key: &str, value: impl Into<Value>) {
        self.lock().set_field(key, value);
    }

    pub fn debug(&self, message: &str) -> bool {
        self.add(Severity::Debug, Some(message))
    }

    pub fn info(&self, message: &str) -> bool {
        self.add(Severity::Info, Some(message))
    }

    pub fn warn(&self, message: &str) -> bool {
        self.add(Severity::Warn, Some(message))
    }

    pub fn error(&self, message: &str) -> bool {
        self.add(Severity::Error, Some(message))
    }

    pub fn fatal(&self, message: &str) -> bool {
        self.add(Severity::Fatal, Some(message))
    }
}
