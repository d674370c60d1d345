// Copyright 2025-Present Eventhub Forwarder Contributors
// SPDX-License-Identifier: Apache-2.0

/// Errors that can occur while running the forwarder.
///
/// The taxonomy follows the recovery policy: `Connectivity` errors are
/// transient and retried up to a bounded count, `Processing` errors are
/// recovered locally by skipping the smallest possible unit, and `Config`
/// errors are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ForwarderError {
    #[error("Connectivity failure: {0}")]
    Connectivity(String),

    #[error("Processing failure: {0}")]
    Processing(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Checkpoint I/O failure: {0}")]
    Checkpoint(#[from] std::io::Error),

    #[error("Worker for partition {partition_id} crashed: {reason}")]
    WorkerCrashed { partition_id: String, reason: String },

    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Configuration errors abort startup with a distinct exit status.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found at {0}")]
    NotFound(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Missing required section: {0}")]
    MissingSection(&'static str),

    #[error("Event hub {hub} missing field: {field}")]
    MissingField { hub: String, field: &'static str },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ForwarderError::Connectivity("connection reset".to_string());
        assert_eq!(error.to_string(), "Connectivity failure: connection reset");
    }

    #[test]
    fn test_config_error_wraps_into_forwarder_error() {
        let error: ForwarderError = ConfigError::MissingSection("event_hubs").into();
        assert!(error.to_string().contains("event_hubs"));
    }

    #[test]
    fn test_worker_crashed_includes_partition() {
        let error = ForwarderError::WorkerCrashed {
            partition_id: "3".to_string(),
            reason: "delivery aborted".to_string(),
        };
        assert!(error.to_string().contains("partition 3"));
    }
}
