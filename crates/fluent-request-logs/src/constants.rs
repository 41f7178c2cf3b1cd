// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Default Fluentd forward/HTTP ingest port.
pub const DEFAULT_FLUENT_PORT: u16 = 24224;

/// Environment variable holding a URL-shaped sink descriptor. When set it
/// overrides every other configuration source.
pub const FLUENTD_URL_VAR: &str = "FLUENTD_URL";

/// Value substituted for a tag whose resolution failed.
pub const TAG_ERROR_SENTINEL: &str = "error";

/// Record key carrying the collected messages.
pub const MESSAGES_KEY: &str = "messages";

/// Record key carrying the severity label of the unit of work.
pub const LEVEL_KEY: &str = "level";

/// Record keys carrying the host identity stamps.
pub const HOSTNAME_KEY: &str = "hostname";
pub const INSTANCE_ID_KEY: &str = "instance_id";

/// EC2 instance metadata base URL queried in production-like environments.
pub const EC2_METADATA_BASE_URL: &str = "http://169.254.169.254/latest/meta-data";
