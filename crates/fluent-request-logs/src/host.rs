// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Host identity stamps for outgoing records.
//!
//! Records carry a `hostname` and an `instance_id`. Where those come from
//! depends on the environment class: production-like environments query an
//! instance metadata endpoint over HTTP, everything else reads local host
//! identity. Both providers are infallible by contract — lookup failures
//! degrade to `"unknown"` rather than blocking a flush.

use crate::constants::EC2_METADATA_BASE_URL;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const UNKNOWN_HOST: &str = "unknown";
const METADATA_TIMEOUT: Duration = Duration::from_secs(1);

/// Coarse environment classification controlling the host identity strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvironmentClass {
    /// Production-like: production, staging and alpha deployments.
    Production,
    Development,
}

impl EnvironmentClass {
    /// Classifies an environment name, case-insensitively. Anything that is
    /// not production, staging or alpha counts as development.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "production" | "staging" | "alpha" => EnvironmentClass::Production,
            _ => EnvironmentClass::Development,
        }
    }

    #[must_use]
    pub fn is_production_like(self) -> bool {
        self == EnvironmentClass::Production
    }
}

impl<'de> Deserialize<'de> for EnvironmentClass {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(EnvironmentClass::from_name(&name))
    }
}

/// Host identity accessors stamped onto every record.
#[async_trait]
pub trait HostIdentityProvider: Send + Sync {
    async fn hostname(&self) -> String;
    async fn instance_id(&self) -> String;
}

/// Local host identity, for development-like environments.
///
/// Tries the `HOSTNAME` environment variable first (commonly set in
/// containers), then the `gethostname` syscall. The instance id mirrors the
/// hostname — a local host has no separate instance identity.
#[derive(Debug, Default)]
pub struct LocalHost;

impl LocalHost {
    fn lookup() -> String {
        if let Ok(hostname) = env::var("HOSTNAME") {
            if !hostname.is_empty() {
                return hostname;
            }
        }

        match nix::unistd::gethostname() {
            Ok(hostname) => {
                if let Some(hostname) = hostname.to_str() {
                    if !hostname.is_empty() {
                        return hostname.to_string();
                    }
                }
            }
            Err(e) => {
                warn!("Failed to get system hostname: {}", e);
            }
        }

        warn!("Could not determine hostname, using '{}'", UNKNOWN_HOST);
        UNKNOWN_HOST.to_string()
    }
}

#[async_trait]
impl HostIdentityProvider for LocalHost {
    async fn hostname(&self) -> String {
        Self::lookup()
    }

    async fn instance_id(&self) -> String {
        Self::lookup()
    }
}

/// Instance metadata endpoint lookup, for production-like environments.
///
/// Queries `{base}/public-hostname` and `{base}/instance-id` with a short
/// transport timeout. The default base is the EC2 instance metadata service.
pub struct InstanceMetadata {
    client: reqwest::Client,
    base_url: String,
}

impl InstanceMetadata {
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build metadata http client, using defaults: {e}");
                reqwest::Client::new()
            });
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn fetch(&self, leaf: &str) -> Option<String> {
        let url = format!("{}/{}", self.base_url, leaf);
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => response
                .text()
                .await
                .ok()
                .map(|body| body.trim().to_string())
                .filter(|body| !body.is_empty()),
            Ok(response) => {
                warn!(
                    "Metadata endpoint returned {} for {}",
                    response.status(),
                    url
                );
                None
            }
            Err(e) => {
                warn!("Failed to query metadata endpoint {}: {}", url, e);
                None
            }
        }
    }
}

impl Default for InstanceMetadata {
    fn default() -> Self {
        Self::new(EC2_METADATA_BASE_URL, METADATA_TIMEOUT)
    }
}

#[async_trait]
impl HostIdentityProvider for InstanceMetadata {
    async fn hostname(&self) -> String {
        self.fetch("public-hostname")
            .await
            .unwrap_or_else(|| UNKNOWN_HOST.to_string())
    }

    async fn instance_id(&self) -> String {
        self.fetch("instance-id")
            .await
            .unwrap_or_else(|| UNKNOWN_HOST.to_string())
    }
}

/// Selects the provider for an environment class.
#[must_use]
pub fn provider_for(environment: EnvironmentClass) -> Arc<dyn HostIdentityProvider> {
    match environment {
        EnvironmentClass::Production => Arc::new(InstanceMetadata::default()),
        EnvironmentClass::Development => Arc::new(LocalHost),
    }
}
