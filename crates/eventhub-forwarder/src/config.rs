// Copyright 2025-Present Eventhub Forwarder Contributors
// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration.
//!
//! Configuration is loaded once at startup from a YAML file, with
//! `FORWARDER_`-prefixed environment variables layered on top (nested keys
//! separated by `__`, e.g. `FORWARDER_LOG_INGESTION__API_TOKEN`). A failed
//! load or validation aborts startup with a [`ConfigError`].

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory of rule files for the metadata engine. A missing directory
    /// disables rule-based enrichment (logged, not fatal).
    #[serde(default = "default_rules_dir")]
    pub rules_dir: PathBuf,
    #[serde(default)]
    pub log_processing: LogProcessingConfig,
    pub log_ingestion: LogIngestionConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    pub event_hubs: Vec<EventHubConfig>,
}

/// Field length limits applied by the transformation pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct LogProcessingConfig {
    #[serde(default = "default_attribute_limit")]
    pub attribute_value_length_limit: usize,
    #[serde(default = "default_content_limit")]
    pub content_length_limit: usize,
    #[serde(default = "default_truncated_mark")]
    pub content_truncated_mark: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogIngestionConfig {
    /// Base URL of the ingestion environment, e.g. `https://env.example.com`.
    pub base_url: String,
    #[serde(default = "default_ingest_path")]
    pub log_ingest_endpoint: String,
    pub api_token: String,
    /// Per-batch serialized size cap in bytes.
    #[serde(default = "default_max_request_size")]
    pub max_request_size: usize,
    #[serde(default = "default_max_events")]
    pub max_events_per_request: usize,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PerformanceConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub compression: CompressionConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Concurrency permits for in-flight batch requests. This bound is the
    /// sole backpressure mechanism in the delivery path.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay for linear backoff; attempt `n` waits `n * retry_delay_ms`.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompressionConfig {
    #[serde(default = "default_gzip_level")]
    pub gzip_level: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_verify_certificate")]
    pub verify_certificate: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventHubConfig {
    pub name: String,
    pub connection_str: String,
    pub consumer_group: String,
    pub partitions: u32,
    pub local_checkpoint_dir: PathBuf,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_rules_dir() -> PathBuf {
    PathBuf::from("config/config_rule")
}
fn default_attribute_limit() -> usize {
    250
}
fn default_content_limit() -> usize {
    8192
}
fn default_truncated_mark() -> String {
    "[TRUNCATED]".to_string()
}
fn default_ingest_path() -> String {
    "/api/v2/logs/ingest".to_string()
}
fn default_max_request_size() -> usize {
    1_048_576
}
fn default_max_events() -> usize {
    5_000
}
fn default_concurrency() -> usize {
    4
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    1_500
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_gzip_level() -> u32 {
    6
}
fn default_verify_certificate() -> bool {
    true
}

impl Default for LogProcessingConfig {
    fn default() -> Self {
        LogProcessingConfig {
            attribute_value_length_limit: default_attribute_limit(),
            content_length_limit: default_content_limit(),
            content_truncated_mark: default_truncated_mark(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            concurrency: default_concurrency(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        CompressionConfig {
            gzip_level: default_gzip_level(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        SecurityConfig {
            verify_certificate: default_verify_certificate(),
        }
    }
}

impl Config {
    /// Loads and validates configuration from `path` plus environment
    /// overrides.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let config: Config = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("FORWARDER_").split("__"))
            .extract()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.event_hubs.is_empty() {
            return Err(ConfigError::MissingSection("event_hubs"));
        }
        for hub in &self.event_hubs {
            if hub.name.is_empty() {
                return Err(ConfigError::MissingField {
                    hub: "<unnamed>".to_string(),
                    field: "name",
                });
            }
            if hub.connection_str.is_empty() {
                return Err(ConfigError::MissingField {
                    hub: hub.name.clone(),
                    field: "connection_str",
                });
            }
            if hub.consumer_group.is_empty() {
                return Err(ConfigError::MissingField {
                    hub: hub.name.clone(),
                    field: "consumer_group",
                });
            }
            if hub.partitions == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "partitions",
                    reason: format!("must be positive for hub {}", hub.name),
                });
            }
            if hub.local_checkpoint_dir.as_os_str().is_empty() {
                return Err(ConfigError::MissingField {
                    hub: hub.name.clone(),
                    field: "local_checkpoint_dir",
                });
            }
        }
        if self.log_ingestion.base_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "log_ingestion.base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.log_ingestion.api_token.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "log_ingestion.api_token",
                reason: "must not be empty".to_string(),
            });
        }
        if self.performance.http.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "performance.http.concurrency",
                reason: "must be positive".to_string(),
            });
        }
        if self.performance.http.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "performance.http.max_retries",
                reason: "must be positive".to_string(),
            });
        }
        let mark_len = self.log_processing.content_truncated_mark.chars().count();
        if mark_len >= self.log_processing.attribute_value_length_limit
            || mark_len >= self.log_processing.content_length_limit
        {
            return Err(ConfigError::InvalidValue {
                field: "log_processing.content_truncated_mark",
                reason: "must be shorter than the configured length limits".to_string(),
            });
        }
        Ok(())
    }

    /// Full ingestion URL: base URL joined with the configured ingest path.
    pub fn ingest_url(&self) -> String {
        let base = self.log_ingestion.base_url.trim_end_matches('/');
        let path = &self.log_ingestion.log_ingest_endpoint;
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}
