// Copyright 2025-Present Eventhub Forwarder Contributors
// SPDX-License-Identifier: Apache-2.0

//! Batch delivery to the log-ingestion endpoint.
//!
//! Each batch is gzip-compressed, authenticated with an `Api-Token` header,
//! and POSTed with bounded concurrency and linear-backoff retry. Delivery
//! is fail-open: a batch that exhausts its attempts is logged and dropped,
//! never queued for later. `send` returns `true` only when every batch
//! succeeded; callers must not assume all-or-nothing delivery.

pub mod batcher;

use flate2::write::GzEncoder;
use flate2::Compression;
use futures::future::join_all;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::ForwarderError;
use crate::pipeline::NormalizedLogEntry;
use batcher::{make_batches, LogBatch};

const RESPONSE_SAMPLE_LIMIT: usize = 500;

pub struct LogSender {
    client: reqwest::Client,
    url: String,
    auth_header: String,
    max_request_size: usize,
    max_events_per_request: usize,
    concurrency: Arc<Semaphore>,
    max_retries: u32,
    retry_delay: Duration,
    gzip_level: u32,
}

impl LogSender {
    pub fn new(config: &Config) -> Result<LogSender, ForwarderError> {
        let mut builder =
            reqwest::Client::builder().timeout(Duration::from_secs(config.performance.http.timeout_secs));

        if !config.security.verify_certificate {
            warn!("TLS certificate verification is DISABLED");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| ForwarderError::Runtime(format!("failed to build HTTP client: {e}")))?;

        Ok(LogSender {
            client,
            url: config.ingest_url(),
            auth_header: format!("Api-Token {}", config.log_ingestion.api_token),
            max_request_size: config.log_ingestion.max_request_size,
            max_events_per_request: config.log_ingestion.max_events_per_request,
            concurrency: Arc::new(Semaphore::new(config.performance.http.concurrency)),
            max_retries: config.performance.http.max_retries,
            retry_delay: Duration::from_millis(config.performance.http.retry_delay_ms),
            gzip_level: config.performance.compression.gzip_level,
        })
    }

    /// Delivers all entries; `true` iff every resulting batch succeeded.
    pub async fn send(&self, entries: &[NormalizedLogEntry]) -> bool {
        let batches = make_batches(
            entries,
            self.max_events_per_request,
            self.max_request_size,
        );
        if batches.is_empty() {
            warn!("No valid batches to send");
            return true;
        }

        let results = join_all(batches.iter().map(|batch| self.process_batch(batch))).await;
        results.into_iter().all(|ok| ok)
    }

    /// Sends one batch under a concurrency permit, retrying with linear
    /// backoff: attempt `n` waits `n × retry_delay` before the next try.
    async fn process_batch(&self, batch: &LogBatch) -> bool {
        let _permit = match self.concurrency.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                error!("Delivery concurrency gate closed");
                return false;
            }
        };

        for attempt in 1..=self.max_retries {
            match self.send_batch(batch).await {
                Ok(()) => {
                    info!(
                        batch_size = batch.entry_count,
                        attempt, "Batch successfully sent"
                    );
                    return true;
                }
                Err(failure) => {
                    if attempt == self.max_retries {
                        error!(
                            status = failure.status,
                            response_sample = %failure.body_sample,
                            batch_size = batch.entry_count,
                            attempts = attempt,
                            "Final retry failed for batch"
                        );
                        return false;
                    }
                    debug!(
                        status = failure.status,
                        attempt, "Batch send attempt failed, backing off"
                    );
                    tokio::time::sleep(self.retry_delay * attempt).await;
                }
            }
        }
        false
    }

    async fn send_batch(&self, batch: &LogBatch) -> Result<(), SendFailure> {
        let compressed = self.compress(&batch.serialized).map_err(|e| SendFailure {
            status: 0,
            body_sample: format!("gzip failure: {e}"),
        })?;

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", &self.auth_header)
            .header("Content-Type", "application/json")
            .header("Content-Encoding", "gzip")
            .body(compressed)
            .send()
            .await
            .map_err(|e| SendFailure {
                status: 0,
                body_sample: e.to_string(),
            })?;

        let status = response.status();
        if status.as_u16() < 300 {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(SendFailure {
            status: status.as_u16(),
            body_sample: sample(&body, RESPONSE_SAMPLE_LIMIT),
        })
    }

    fn compress(&self, payload: &str) -> std::io::Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::new(self.gzip_level));
        encoder.write_all(payload.as_bytes())?;
        let compressed = encoder.finish()?;

        let original_size = payload.len();
        if original_size > 0 {
            debug!(
                original_size,
                compressed_size = compressed.len(),
                "Payload compression stats"
            );
        }
        Ok(compressed)
    }
}

/// One failed delivery attempt. `status` 0 means a network-level or local
/// failure with no HTTP response.
struct SendFailure {
    status: u16,
    body_sample: String,
}

fn sample(value: &str, limit: usize) -> String {
    let end = value
        .char_indices()
        .nth(limit)
        .map_or(value.len(), |(i, _)| i);
    value[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::{
        providers::{Format, Yaml},
        Figment,
    };
    use std::io::Read;

    fn test_config(base_url: &str) -> Config {
        Figment::new()
            .merge(Yaml::string(&format!(
                r#"
log_ingestion:
  base_url: {base_url}
  api_token: test-token
performance:
  http:
    concurrency: 2
    max_retries: 2
    retry_delay_ms: 1
    timeout_secs: 5
event_hubs:
  - name: hub
    connection_str: conn
    consumer_group: "$Default"
    partitions: 1
    local_checkpoint_dir: /tmp/cp
"#
            )))
            .extract()
            .unwrap()
    }

    #[test]
    fn test_compress_roundtrip() {
        let sender = LogSender::new(&test_config("https://example.com")).unwrap();
        let payload = r#"[{"severity":"Error"}]"#;

        let compressed = sender.compress(payload).unwrap();
        assert_ne!(compressed.as_slice(), payload.as_bytes());

        let mut decoder = flate2::read::GzDecoder::new(compressed.as_slice());
        let mut decompressed = String::new();
        decoder.read_to_string(&mut decompressed).unwrap();
        assert_eq!(decompressed, payload);
    }

    #[tokio::test]
    async fn test_send_empty_entries_is_success() {
        let sender = LogSender::new(&test_config("https://example.com")).unwrap();
        assert!(sender.send(&[]).await);
    }

    #[test]
    fn test_auth_header_shape() {
        let sender = LogSender::new(&test_config("https://example.com")).unwrap();
        assert_eq!(sender.auth_header, "Api-Token test-token");
        assert_eq!(sender.url, "https://example.com/api/v2/logs/ingest");
    }
}
