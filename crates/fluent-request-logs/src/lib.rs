// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-request log aggregation for Fluentd-style collectors.
//!
//! Log lines emitted while one unit of work (typically one inbound request)
//! is being handled are buffered in an [`aggregator::Aggregator`] together
//! with a running maximum severity. When the unit of work completes, the
//! [`flusher::Flusher`] assembles a single structured record — the buffered
//! messages, the severity label, resolved request tags and host identity
//! stamps — and posts it to the collector under a configured routing key.
//!
//! [`flusher::Flusher::run_scoped`] is the intended entry point: it binds the
//! request, hands the caller a [`aggregator::LogHandle`], and guarantees
//! exactly one flush on every exit path.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod aggregator;
pub mod config;
pub mod constants;
pub mod fluent;
pub mod flusher;
pub mod host;
pub mod scope;
pub mod severity;
pub mod tags;
