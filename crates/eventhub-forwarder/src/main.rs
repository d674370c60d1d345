// Copyright 2025-Present Eventhub Forwarder Contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! Forwarder binary.
//!
//! Thin glue around the library: loads configuration, wires one
//! supervisor per configured hub, feeds partition workers from a
//! JSON-lines event stream on stdin (the integration seam where a real
//! stream client plugs in), reports partition liveness periodically,
//! and shuts down on ctrl-c.
//!
//! Exit codes: 1 = invalid configuration, 2 = runtime startup failure.

use std::collections::HashMap;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::{env, time::Duration};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{error, info, warn};

use eventhub_forwarder::config::Config;
use eventhub_forwarder::delivery::LogSender;
use eventhub_forwarder::logger;
use eventhub_forwarder::pipeline::EventProcessor;
use eventhub_forwarder::rules::MetadataEngine;
use eventhub_forwarder::source::{ChannelSource, RawEvent};
use eventhub_forwarder::supervisor::HubSupervisor;

const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";
const STATUS_REPORT_INTERVAL_SECS: u64 = 30;
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// One event on the stdin seam. `hub` defaults to the first configured
/// hub; `enqueued_time` defaults to now.
#[derive(Debug, Deserialize)]
struct InboundEvent {
    hub: Option<String>,
    partition_id: String,
    offset: i64,
    sequence_number: i64,
    enqueued_time: Option<DateTime<Utc>>,
    body: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config = match Config::load(Path::new(&config_path)) {
        Ok(config) => config,
        Err(e) => {
            // Logging is not configured yet; write straight to stderr.
            eprintln!("LOG_FORWARDER | ERROR | invalid configuration: {e}");
            return ExitCode::from(1);
        }
    };

    logger::init(&config.log_level);
    info!(config = %config_path, hubs = config.event_hubs.len(), "Forwarder starting");

    let engine = Arc::new(MetadataEngine::load(&config.rules_dir));
    let processor = Arc::new(EventProcessor::new(&config, engine));
    let sender = match LogSender::new(&config) {
        Ok(sender) => Arc::new(sender),
        Err(e) => {
            error!(error = %e, "Failed to initialize delivery engine");
            return ExitCode::from(2);
        }
    };

    let mut feeds: HashMap<String, Vec<mpsc::Sender<RawEvent>>> = HashMap::new();
    let mut supervisors = Vec::new();
    for hub in &config.event_hubs {
        let mut hub_feeds = Vec::new();
        let supervisor = HubSupervisor::start(hub, processor.clone(), sender.clone(), |_| {
            let (feed, source) = ChannelSource::new(EVENT_CHANNEL_CAPACITY);
            hub_feeds.push(feed);
            Box::new(source)
        });
        feeds.insert(hub.name.clone(), hub_feeds);
        supervisors.push(supervisor);
    }

    let default_hub = config.event_hubs[0].name.clone();
    tokio::spawn(route_inbound_events(feeds, default_hub));

    let mut status_interval = interval(Duration::from_secs(STATUS_REPORT_INTERVAL_SECS));
    status_interval.tick().await; // discard first tick, which is instantaneous

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = status_interval.tick() => {
                for supervisor in &supervisors {
                    let status = supervisor.status();
                    info!(
                        hub = %status.hub_name,
                        active = status.active_partitions,
                        total = status.total_partitions,
                        inactive = ?status.inactive_partition_ids,
                        "Partition status"
                    );
                }
            }
        }
    }

    info!("Shutdown requested");
    for supervisor in supervisors {
        supervisor.shutdown().await;
    }
    ExitCode::SUCCESS
}

/// Reads JSON-lines events from stdin and routes each to its partition's
/// worker. Closing stdin ends every partition stream; workers then stop
/// on their own.
async fn route_inbound_events(
    feeds: HashMap<String, Vec<mpsc::Sender<RawEvent>>>,
    default_hub: String,
) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("Event input stream closed");
                return;
            }
            Err(e) => {
                error!(error = %e, "Event input stream failed");
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let inbound: InboundEvent = match serde_json::from_str(&line) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!(error = %e, "Discarding malformed inbound event");
                continue;
            }
        };

        let hub = inbound.hub.as_deref().unwrap_or(&default_hub);
        let Some(partitions) = feeds.get(hub) else {
            warn!(hub, "Discarding event for unknown hub");
            continue;
        };
        let Some(feed) = inbound
            .partition_id
            .parse::<usize>()
            .ok()
            .and_then(|index| partitions.get(index))
        else {
            warn!(
                hub,
                partition_id = %inbound.partition_id,
                "Discarding event for unknown partition"
            );
            continue;
        };

        let event = RawEvent {
            partition_id: inbound.partition_id,
            offset: inbound.offset,
            sequence_number: inbound.sequence_number,
            enqueued_time: inbound.enqueued_time.unwrap_or_else(Utc::now),
            body: inbound.body.into_bytes(),
        };
        if feed.send(event).await.is_err() {
            warn!(hub, "Partition worker is gone, event dropped");
        }
    }
}
