// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Request-scoped driver: one unit of work, one guaranteed flush.
//!
//! [`Flusher::run_scoped`] is the only place that triggers a flush; callers
//! must not rely on any other trigger. The flush happens on every exit path,
//! before a failing unit of work propagates its error.

use crate::aggregator::LogHandle;
use crate::fluent::SinkError;
use crate::flusher::Flusher;
use crate::tags::RequestAttributes;
use std::future::Future;
use std::sync::Arc;
use tracing::error;

impl Flusher {
    /// Runs one unit of work with the request bound for tag resolution.
    ///
    /// The work receives a [`LogHandle`] so nested code can log; when it
    /// finishes — normally or with an error — the aggregator is flushed
    /// exactly once. A flush failure after successful work surfaces through
    /// `E: From<SinkError>`; after failed work it is only logged, and the
    /// work's own error propagates.
    pub async fn run_scoped<T, E, F, Fut>(
        &self,
        request: Arc<dyn RequestAttributes>,
        work: F,
    ) -> Result<T, E>
    where
        E: From<SinkError>,
        F: FnOnce(LogHandle) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.set_current_request(request);
        let result = work(self.handle()).await;
        let flushed = self.flush().await;

        match result {
            Ok(value) => flushed.map(|()| value).map_err(E::from),
            Err(err) => {
                if let Err(flush_err) = flushed {
                    error!("Flush failed at end of unit of work: {}", flush_err);
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flusher::tests::{FailingSink, RecordingSink, StaticHost};
    use crate::flusher::{FlusherConfig, OutputMode};
    use crate::severity::Severity;
    use crate::tags::TagSpec;
    use serde_json::{json, Value};

    struct TestRequest;

    impl RequestAttributes for TestRequest {
        fn attribute(&self, name: &str) -> Option<Value> {
            (name == "uuid").then(|| json!("req-42"))
        }
    }

    fn flusher(sink: Arc<dyn crate::fluent::SinkClient>) -> Flusher {
        Flusher::new(FlusherConfig {
            sink,
            routing_key: "app.logs".to_string(),
            min_severity: Severity::Debug,
            output_mode: OutputMode::Sequence,
            tag_spec: TagSpec::new().accessor("request_id", "uuid"),
            host_identity: Arc::new(StaticHost),
        })
    }

    #[tokio::test]
    async fn test_scope_flushes_on_normal_return() {
        let sink = Arc::new(RecordingSink::default());
        let flusher = flusher(sink.clone());

        let value: Result<u32, SinkError> = flusher
            .run_scoped(Arc::new(TestRequest), |log| async move {
                log.info("handled");
                Ok(7)
            })
            .await;
        assert_eq!(value.unwrap(), 7);

        let posts = sink.posts.lock().unwrap();
        let record = &posts[0].1;
        assert_eq!(record["messages"], json!(["handled"]));
        assert_eq!(record["request_id"], "req-42");
    }

    #[tokio::test]
    async fn test_scope_flushes_on_error_path() {
        let sink = Arc::new(RecordingSink::default());
        let flusher = flusher(sink.clone());

        let result: Result<(), SinkError> = flusher
            .run_scoped(Arc::new(TestRequest), |log| async move {
                log.error("exploded");
                Err(SinkError::Payload("work failed".to_string()))
            })
            .await;
        assert!(matches!(result, Err(SinkError::Payload(_))));

        // The record still shipped before the error propagated.
        let posts = sink.posts.lock().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].1["level"], "ERROR");
    }

    #[tokio::test]
    async fn test_flush_failure_surfaces_after_successful_work() {
        let flusher = flusher(Arc::new(FailingSink));

        let result: Result<(), SinkError> = flusher
            .run_scoped(Arc::new(TestRequest), |log| async move {
                log.info("fine");
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(SinkError::Destination(_, _))));
    }

    #[tokio::test]
    async fn test_work_error_wins_over_flush_failure() {
        let flusher = flusher(Arc::new(FailingSink));

        let result: Result<(), SinkError> = flusher
            .run_scoped(Arc::new(TestRequest), |log| async move {
                log.info("fine");
                Err(SinkError::Payload("work failed".to_string()))
            })
            .await;
        assert!(matches!(result, Err(SinkError::Payload(_))));
    }

    #[tokio::test]
    async fn test_scope_with_no_logging_sends_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let flusher = flusher(sink.clone());

        let result: Result<(), SinkError> = flusher
            .run_scoped(Arc::new(TestRequest), |_| async move { Ok(()) })
            .await;
        result.unwrap();
        assert!(sink.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_request_binding_does_not_leak_across_scopes() {
        let sink = Arc::new(RecordingSink::default());
        let flusher = flusher(sink.clone());

        let first: Result<(), SinkError> = flusher
            .run_scoped(Arc::new(TestRequest), |log| async move {
                log.info("first");
                Ok(())
            })
            .await;
        first.unwrap();

        // Log outside any scope, then flush directly: the previous request
        // binding must be gone and the accessor tag resolves to the sentinel.
        flusher.handle().info("second");
        flusher.flush().await.unwrap();

        let posts = sink.posts.lock().unwrap();
        assert_eq!(posts[0].1["request_id"], "req-42");
        assert_eq!(posts[1].1["request_id"], "error");
    }
}
