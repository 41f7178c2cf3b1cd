// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Configuration surface consumed by the aggregation core.
//!
//! Loading is an external concern; the core consumes a [`Config`] of plain
//! values. [`Config::from_env`] covers the environment-variable path: when
//! `FLUENTD_URL` holds a URL-shaped sink descriptor it overrides everything
//! else, otherwise the individual `FLUENT_*` variables apply.

use crate::constants::{DEFAULT_FLUENT_PORT, FLUENTD_URL_VAR};
use crate::flusher::OutputMode;
use crate::host::EnvironmentClass;
use crate::severity::Severity;
use reqwest::Url;
use serde::Deserialize;
use std::env;

/// Configuration errors surfaced at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("`{0}` is not a valid sink URL: {1}")]
    InvalidUrl(String, String),
}

/// Plain-value settings for the aggregator and its sink.
///
/// Deserializable so an external loader (a config file keyed by deployment
/// environment, say) can hand it over directly; only the routing key has no
/// default.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Fluent collector host.
    #[serde(default = "default_host")]
    pub fluent_host: String,
    /// Fluent collector port.
    #[serde(default = "default_port")]
    pub fluent_port: u16,
    /// Opaque label the collector routes records by.
    pub routing_key: String,
    /// Shape of the `messages` value in outgoing records.
    #[serde(default)]
    pub output_mode: OutputMode,
    /// Inclusive severity threshold below which lines are discarded.
    #[serde(default)]
    pub min_severity: Severity,
    /// Selects the host identity strategy.
    #[serde(default = "default_environment")]
    pub environment: EnvironmentClass,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_FLUENT_PORT
}

fn default_environment() -> EnvironmentClass {
    EnvironmentClass::Development
}

/// Sink settings parsed out of a URL-shaped descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkUrl {
    pub host: String,
    pub port: u16,
    pub routing_key: String,
    pub output_mode: OutputMode,
}

/// Parses a sink descriptor URL: host and port address the collector, the
/// path (leading separator stripped) is the routing key, and the first
/// `messages_type` query value selects the output mode.
pub fn parse_fluentd_url(raw: &str) -> Result<SinkUrl, ConfigError> {
    let url =
        Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(raw.to_string(), e.to_string()))?;

    let host = url
        .host_str()
        .ok_or_else(|| ConfigError::InvalidUrl(raw.to_string(), "missing host".to_string()))?
        .to_string();
    let port = url.port().unwrap_or(DEFAULT_FLUENT_PORT);

    let routing_key = url.path().trim_start_matches('/').to_string();
    if routing_key.is_empty() {
        return Err(ConfigError::InvalidUrl(
            raw.to_string(),
            "missing routing key path".to_string(),
        ));
    }

    let output_mode = url
        .query_pairs()
        .find_map(|(key, value)| (key == "messages_type").then(|| value.into_owned()))
        .map(|keyword| OutputMode::from_keyword(&keyword))
        .unwrap_or_default();

    Ok(SinkUrl {
        host,
        port,
        routing_key,
        output_mode,
    })
}

impl Config {
    /// Creates configuration from environment variables.
    ///
    /// `FLUENTD_URL`, when present, overrides the sink address, routing key
    /// and output mode entirely. Otherwise `FLUENT_HOST` (default
    /// `127.0.0.1`), `FLUENT_PORT` (default 24224), `FLUENT_TAG` (required)
    /// and `FLUENT_MESSAGES_TYPE` apply. `LOG_LEVEL` holds a severity label,
    /// case-insensitive; `APP_ENV` names the deployment environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = EnvironmentClass::from_name(&env::var("APP_ENV").unwrap_or_default());

        let min_severity = match env::var("LOG_LEVEL") {
            Ok(label) => Severity::from_label(&label).ok_or_else(|| {
                ConfigError::InvalidConfig(format!(
                    "Invalid log level '{label}'. Must be one of: debug, info, warn, error, fatal, any"
                ))
            })?,
            Err(_) => Severity::Debug,
        };

        let config = if let Ok(raw) = env::var(FLUENTD_URL_VAR) {
            let sink = parse_fluentd_url(&raw)?;
            Self {
                fluent_host: sink.host,
                fluent_port: sink.port,
                routing_key: sink.routing_key,
                output_mode: sink.output_mode,
                min_severity,
                environment,
            }
        } else {
            let routing_key = env::var("FLUENT_TAG").map_err(|_| {
                ConfigError::InvalidConfig("FLUENT_TAG environment variable is not set".to_string())
            })?;
            Self {
                fluent_host: env::var("FLUENT_HOST").unwrap_or_else(|_| default_host()),
                fluent_port: env::var("FLUENT_PORT")
                    .ok()
                    .and_then(|port| port.parse::<u16>().ok())
                    .unwrap_or(DEFAULT_FLUENT_PORT),
                routing_key,
                output_mode: env::var("FLUENT_MESSAGES_TYPE")
                    .map(|keyword| OutputMode::from_keyword(&keyword))
                    .unwrap_or_default(),
                min_severity,
                environment,
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fluent_port == 0 {
            return Err(ConfigError::InvalidConfig(
                "Fluent port must be greater than 0".to_string(),
            ));
        }

        if self.fluent_host.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "Fluent host cannot be empty".to_string(),
            ));
        }

        if self.routing_key.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "Routing key cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_fluentd_url() {
        let sink =
            parse_fluentd_url("proto://collector.example:24224/app.logs?messages_type=string")
                .unwrap();
        assert_eq!(sink.host, "collector.example");
        assert_eq!(sink.port, 24224);
        assert_eq!(sink.routing_key, "app.logs");
        assert_eq!(sink.output_mode, OutputMode::Joined);
    }

    #[test]
    fn test_parse_fluentd_url_defaults() {
        let sink = parse_fluentd_url("tcp://collector.example/app.logs").unwrap();
        assert_eq!(sink.port, DEFAULT_FLUENT_PORT);
        assert_eq!(sink.output_mode, OutputMode::Sequence);
    }

    #[test]
    fn test_parse_fluentd_url_first_messages_type_wins() {
        let sink = parse_fluentd_url(
            "tcp://collector.example/app.logs?messages_type=string&messages_type=array",
        )
        .unwrap();
        assert_eq!(sink.output_mode, OutputMode::Joined);
    }

    #[test]
    fn test_parse_fluentd_url_unrecognized_mode_defaults_to_sequence() {
        let sink =
            parse_fluentd_url("tcp://collector.example/app.logs?messages_type=blob").unwrap();
        assert_eq!(sink.output_mode, OutputMode::Sequence);
    }

    #[test]
    fn test_parse_fluentd_url_rejects_missing_parts() {
        assert!(parse_fluentd_url("not a url").is_err());
        assert!(parse_fluentd_url("tcp://collector.example").is_err());
        assert!(parse_fluentd_url("tcp://collector.example/").is_err());
    }

    fn clear_env() {
        for var in [
            FLUENTD_URL_VAR,
            "FLUENT_HOST",
            "FLUENT_PORT",
            "FLUENT_TAG",
            "FLUENT_MESSAGES_TYPE",
            "LOG_LEVEL",
            "APP_ENV",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_url_override() {
        clear_env();
        env::set_var(
            FLUENTD_URL_VAR,
            "tcp://collector.example:9999/web.logs?messages_type=string",
        );
        // Ignored in favor of the URL.
        env::set_var("FLUENT_HOST", "other.example");
        env::set_var("FLUENT_TAG", "other.logs");

        let config = Config::from_env().unwrap();
        assert_eq!(config.fluent_host, "collector.example");
        assert_eq!(config.fluent_port, 9999);
        assert_eq!(config.routing_key, "web.logs");
        assert_eq!(config.output_mode, OutputMode::Joined);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_individual_vars() {
        clear_env();
        env::set_var("FLUENT_TAG", "app.logs");
        env::set_var("LOG_LEVEL", "warn");
        env::set_var("APP_ENV", "staging");

        let config = Config::from_env().unwrap();
        assert_eq!(config.fluent_host, "127.0.0.1");
        assert_eq!(config.fluent_port, DEFAULT_FLUENT_PORT);
        assert_eq!(config.routing_key, "app.logs");
        assert_eq!(config.output_mode, OutputMode::Sequence);
        assert_eq!(config.min_severity, Severity::Warn);
        assert!(config.environment.is_production_like());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_requires_routing_key() {
        clear_env();
        let err = Config::from_env().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: FLUENT_TAG environment variable is not set"
        );
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_unknown_log_level() {
        clear_env();
        env::set_var("FLUENT_TAG", "app.logs");
        env::set_var("LOG_LEVEL", "verbose");
        assert!(Config::from_env().is_err());
        clear_env();
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"routing_key": "app.logs", "min_severity": "info", "output_mode": "string"}"#,
        )
        .unwrap();
        assert_eq!(config.fluent_host, "127.0.0.1");
        assert_eq!(config.fluent_port, DEFAULT_FLUENT_PORT);
        assert_eq!(config.routing_key, "app.logs");
        assert_eq!(config.output_mode, OutputMode::Joined);
        assert_eq!(config.min_severity, Severity::Info);
        assert_eq!(config.environment, EnvironmentClass::Development);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_requires_routing_key() {
        assert!(serde_json::from_str::<Config>("{}").is_err());
    }

    #[test]
    fn test_validate_rejects_blank_fields() {
        let config = Config {
            fluent_host: "127.0.0.1".to_string(),
            fluent_port: 24224,
            routing_key: "app.logs".to_string(),
            output_mode: OutputMode::Sequence,
            min_severity: Severity::Debug,
            environment: EnvironmentClass::Development,
        };
        assert!(config.validate().is_ok());

        let bad_port = Config {
            fluent_port: 0,
            ..config.clone()
        };
        assert!(bad_port.validate().is_err());

        let bad_host = Config {
            fluent_host: "  ".to_string(),
            ..config.clone()
        };
        assert!(bad_host.validate().is_err());

        let bad_key = Config {
            routing_key: String::new(),
            ..config
        };
        assert!(bad_key.validate().is_err());
    }
}
