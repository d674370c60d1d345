// Copyright 2025-Present Eventhub Forwarder Contributors
// SPDX-License-Identifier: Apache-2.0

//! Delivery engine tests against a mock ingestion endpoint.

use figment::{
    providers::{Format, Yaml},
    Figment,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{Map, Value};
use std::io::Write;

use eventhub_forwarder::config::Config;
use eventhub_forwarder::delivery::LogSender;
use eventhub_forwarder::pipeline::NormalizedLogEntry;

fn config(base_url: &str, max_events_per_request: usize) -> Config {
    Figment::new()
        .merge(Yaml::string(&format!(
            r#"
log_ingestion:
  base_url: {base_url}
  api_token: secret-token
  max_events_per_request: {max_events_per_request}
performance:
  http:
    concurrency: 4
    max_retries: 3
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

fn entry(message: &str) -> NormalizedLogEntry {
    let mut entry = Map::new();
    entry.insert("content".to_string(), Value::String(message.to_string()));
    entry
}

/// Mirrors the sender's wire encoding: JSON array of entries, gzip level 6.
fn expected_payload(entries: &[NormalizedLogEntry]) -> Vec<u8> {
    let values: Vec<Value> = entries.iter().map(|e| Value::Object(e.clone())).collect();
    let serialized = serde_json::to_string(&values).unwrap();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(6));
    encoder.write_all(serialized.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

#[tokio::test]
async fn test_successful_delivery_sends_gzip_json() {
    let mut server = mockito::Server::new_async().await;
    let entries = vec![entry("first"), entry("second")];
    let compressed = expected_payload(&entries);

    let mock = server
        .mock("POST", "/api/v2/logs/ingest")
        .match_header("authorization", "Api-Token secret-token")
        .match_header("content-type", "application/json")
        .match_header("content-encoding", "gzip")
        .match_body(compressed)
        .with_status(204)
        .create_async()
        .await;

    let sender = LogSender::new(&config(&server.url(), 100)).unwrap();
    assert!(sender.send(&entries).await);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_persistent_500_exhausts_retries() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/v2/logs/ingest")
        .with_status(500)
        .with_body("ingest unavailable")
        .expect(3)
        .create_async()
        .await;

    let sender = LogSender::new(&config(&server.url(), 100)).unwrap();
    assert!(!sender.send(&[entry("doomed")]).await);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_sibling_success_does_not_mask_failure() {
    let mut server = mockito::Server::new_async().await;

    // One entry per batch; the two batches are told apart by the size of
    // their compressed bodies.
    let failing = entry("short");
    let succeeding = entry(
        "a considerably longer message body that compresses to a clearly \
         different content length than its sibling batch",
    );
    let failing_len = expected_payload(std::slice::from_ref(&failing)).len();
    let succeeding_len = expected_payload(std::slice::from_ref(&succeeding)).len();
    assert_ne!(failing_len, succeeding_len);

    let fail_mock = server
        .mock("POST", "/api/v2/logs/ingest")
        .match_header("content-length", failing_len.to_string().as_str())
        .with_status(500)
        .expect(3)
        .create_async()
        .await;
    let ok_mock = server
        .mock("POST", "/api/v2/logs/ingest")
        .match_header("content-length", succeeding_len.to_string().as_str())
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let sender = LogSender::new(&config(&server.url(), 1)).unwrap();

    // One sibling batch lands, yet the overall result is failure.
    assert!(!sender.send(&[failing, succeeding]).await);
    fail_mock.assert_async().await;
    ok_mock.assert_async().await;
}

#[tokio::test]
async fn test_network_error_counts_as_failed_attempts() {
    // A closed port: every attempt is a connection error, not an HTTP status.
    let url = {
        let server = mockito::Server::new_async().await;
        server.url()
        // server dropped here; the port is no longer listening
    };

    let sender = LogSender::new(&config(&url, 100)).unwrap();
    assert!(!sender.send(&[entry("unreachable")]).await);
}
