// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! At-most-once flush protocol per unit of work.
//!
//! The [`Flusher`] owns the shared [`Aggregator`] and everything needed to
//! turn its pending state into one outgoing record: routing key, output
//! mode, tag specification, host identity provider and the injected sink
//! client. `flush` consumes the buffered state under a short lock (never
//! held across an await), assembles the record, and posts it. An empty
//! buffer flushes to nothing — no record, no side effects.

use crate::aggregator::{Aggregator, LogHandle, PendingRecord};
use crate::constants::{
    HOSTNAME_KEY, INSTANCE_ID_KEY, LEVEL_KEY, MESSAGES_KEY, TAG_ERROR_SENTINEL,
};
use crate::fluent::{SinkClient, SinkError};
use crate::host::HostIdentityProvider;
use crate::severity::Severity;
use crate::tags::{RequestAttributes, TagSpec};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error};

/// Shape of the `messages` value in the outgoing record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// One text block, messages joined with newlines.
    Joined,
    /// Ordered array of message strings.
    #[default]
    Sequence,
}

impl OutputMode {
    /// Maps the configured keyword to a mode. Exactly `"string"` selects
    /// joined text; every other keyword selects the sequence shape.
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Self {
        if keyword == "string" {
            OutputMode::Joined
        } else {
            OutputMode::Sequence
        }
    }
}

impl<'de> Deserialize<'de> for OutputMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let keyword = String::deserialize(deserializer)?;
        Ok(OutputMode::from_keyword(&keyword))
    }
}

/// One-time flusher setup.
pub struct FlusherConfig {
    pub sink: Arc<dyn SinkClient>,
    pub routing_key: String,
    /// Inclusive rank threshold; lines below it are discarded at `add`.
    pub min_severity: Severity,
    pub output_mode: OutputMode,
    pub tag_spec: TagSpec,
    pub host_identity: Arc<dyn HostIdentityProvider>,
}

/// Aggregation front end for one unit of work at a time.
pub struct Flusher {
    aggregator: Arc<Mutex<Aggregator>>,
    sink: Option<Arc<dyn SinkClient>>,
    routing_key: String,
    output_mode: OutputMode,
    tag_spec: TagSpec,
    host_identity: Arc<dyn HostIdentityProvider>,
}

impl Flusher {
    #[must_use]
    pub fn new(config: FlusherConfig) -> Self {
        Self {
            aggregator: Arc::new(Mutex::new(Aggregator::new(config.min_severity))),
            sink: Some(config.sink),
            routing_key: config.routing_key,
            output_mode: config.output_mode,
            tag_spec: config.tag_spec,
            host_identity: config.host_identity,
        }
    }

    /// Handle for logging call sites. Cheap to clone into the scoped work.
    #[must_use]
    pub fn handle(&self) -> LogHandle {
        LogHandle::new(Arc::clone(&self.aggregator))
    }

    fn lock(&self) -> MutexGuard<'_, Aggregator> {
        self.aggregator.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Binds the request for the current unit of work. Must run before any
    /// flush that depends on request-derived tags; the binding is released
    /// when that flush consumes the buffer.
    pub fn set_current_request(&self, request: Arc<dyn RequestAttributes>) {
        self.lock().bind_request(request);
    }

    /// Flushes the pending unit of work, if any.
    ///
    /// Consuming the buffer and resetting state happens before the delivery
    /// attempt, so there is exactly one delivery per unit of work and no
    /// replay of undelivered records. A delivery failure propagates to the
    /// caller; a flush with nothing buffered is a complete no-op.
    pub async fn flush(&self) -> Result<(), SinkError> {
        let pending = self.lock().take_pending();
        let Some(pending) = pending else {
            return Ok(());
        };

        let record = self.assemble(pending).await;
        match &self.sink {
            Some(sink) => {
                debug!(
                    "Flushing record with {} keys under `{}`",
                    record.len(),
                    self.routing_key
                );
                sink.post(&self.routing_key, &record).await
            }
            None => {
                error!(
                    "Sink client closed, dropping record for `{}`",
                    self.routing_key
                );
                Ok(())
            }
        }
    }

    async fn assemble(&self, pending: PendingRecord) -> Map<String, Value> {
        let PendingRecord {
            messages,
            severity,
            mut fields,
            request,
        } = pending;

        let messages_value = match self.output_mode {
            OutputMode::Joined => Value::String(messages.join("\n")),
            OutputMode::Sequence => Value::Array(messages.into_iter().map(Value::String).collect()),
        };
        fields.insert(MESSAGES_KEY.to_string(), messages_value);
        fields.insert(
            LEVEL_KEY.to_string(),
            Value::String(severity.label().to_string()),
        );

        let request = request.as_deref();
        for (name, source) in self.tag_spec.entries() {
            let value = match source.resolve(name, request) {
                Ok(value) => value,
                Err(e) => {
                    debug!("Tag `{}` failed to resolve: {}", name, e);
                    Value::String(TAG_ERROR_SENTINEL.to_string())
                }
            };
            fields.insert(name.to_string(), value);
        }

        fields.insert(
            HOSTNAME_KEY.to_string(),
            Value::String(self.host_identity.hostname().await),
        );
        fields.insert(
            INSTANCE_ID_KEY.to_string(),
            Value::String(self.host_identity.instance_id().await),
        );
        fields
    }

    /// Releases the sink client handle. Idempotent; a later flush with
    /// pending messages logs the drop instead of delivering.
    pub fn close(&mut self) {
        if self.sink.take().is_some() {
            debug!("Sink client released");
        }
    }
}
