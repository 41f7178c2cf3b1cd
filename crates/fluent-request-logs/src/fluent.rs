// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sink client: the transport handle records are delivered through.
//!
//! The aggregation core only depends on the [`SinkClient`] trait; the
//! concrete [`FluentClient`] posts records as JSON to a Fluentd HTTP ingest
//! endpoint (`in_http`), one request per record, under
//! `http://host:port/<routing_key>`. Transport timeout policy lives here,
//! not in the core. There is no retry: a failed delivery surfaces once and
//! the record is gone.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

/// Delivery failure. `Payload` means the record could not be encoded and
/// retrying would not help; `Destination` carries whatever the collector or
/// the transport reported.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to create sink client: {0}")]
    Creation(String),

    #[error("failed to encode record: {0}")]
    Payload(String),

    #[error("failed to deliver record ({0:?}): {1}")]
    Destination(Option<StatusCode>, String),
}

/// Transport boundary for assembled records. Implementations own connection
/// reuse and timeout policy; the handle may be shared across many flushes.
#[async_trait]
pub trait SinkClient: Send + Sync {
    async fn post(&self, routing_key: &str, record: &Map<String, Value>) -> Result<(), SinkError>;
}

/// HTTP client for a Fluentd `in_http` ingest endpoint.
pub struct FluentClient {
    client: reqwest::Client,
    base_url: String,
}

impl FluentClient {
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self, SinkError> {
        Self::with_base_url(format!("http://{host}:{port}"), timeout)
    }

    /// Builds a client against an explicit base URL. Integration tests point
    /// this at a mock server.
    pub fn with_base_url(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::Creation(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl SinkClient for FluentClient {
    async fn post(&self, routing_key: &str, record: &Map<String, Value>) -> Result<(), SinkError> {
        let body = serde_json::to_vec(record).map_err(|e| SinkError::Payload(e.to_string()))?;
        let url = format!("{}/{}", self.base_url, routing_key);

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| SinkError::Destination(e.status(), e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!("Delivered record to {}", url);
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(SinkError::Destination(Some(status), body))
        }
    }
}
