// Copyright 2025-Present Eventhub Forwarder Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-hub worker pool.
//!
//! A supervisor starts one worker per partition and answers liveness
//! queries. It never restarts a crashed worker; a crash is surfaced as
//! an inactive partition in `status()` until shutdown.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::checkpoint::FileCheckpointStore;
use crate::config::EventHubConfig;
use crate::delivery::LogSender;
use crate::pipeline::EventProcessor;
use crate::source::EventSource;
use crate::worker::PartitionWorker;

/// Liveness snapshot for one hub's worker pool.
#[derive(Debug, Clone)]
pub struct HubStatus {
    pub hub_name: String,
    pub total_partitions: usize,
    pub active_partitions: usize,
    pub inactive_partition_ids: Vec<String>,
}

pub struct HubSupervisor {
    hub_name: String,
    workers: Vec<PartitionWorker>,
    shutdown: watch::Sender<bool>,
}

impl HubSupervisor {
    /// Starts one worker per configured partition. `make_source` builds
    /// the partition's event feed; the supervisor owns everything else
    /// (checkpoint store scoping, shutdown fan-out).
    pub fn start<F>(
        hub: &EventHubConfig,
        processor: Arc<EventProcessor>,
        sender: Arc<LogSender>,
        mut make_source: F,
    ) -> HubSupervisor
    where
        F: FnMut(&str) -> Box<dyn EventSource>,
    {
        let checkpoints = Arc::new(FileCheckpointStore::new(
            &hub.local_checkpoint_dir,
            &hub.name,
            &hub.consumer_group,
        ));
        let (shutdown, _) = watch::channel(false);

        let workers = (0..hub.partitions)
            .map(|partition| {
                let partition_id = partition.to_string();
                PartitionWorker::spawn(
                    partition_id.clone(),
                    make_source(&partition_id),
                    processor.clone(),
                    sender.clone(),
                    checkpoints.clone(),
                    shutdown.subscribe(),
                )
            })
            .collect();

        info!(hub = %hub.name, partitions = hub.partitions, "Hub supervisor started");
        HubSupervisor {
            hub_name: hub.name.clone(),
            workers,
            shutdown,
        }
    }

    pub fn status(&self) -> HubStatus {
        let inactive: Vec<String> = self
            .workers
            .iter()
            .filter(|worker| !worker.is_active())
            .map(|worker| worker.partition_id().to_string())
            .collect();
        HubStatus {
            hub_name: self.hub_name.clone(),
            total_partitions: self.workers.len(),
            active_partitions: self.workers.len() - inactive.len(),
            inactive_partition_ids: inactive,
        }
    }

    /// Signals all workers to stop and waits for them to finish.
    /// In-flight deliveries may be abandoned.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for worker in self.workers {
            worker.join().await;
        }
        info!(hub = %self.hub_name, "Hub supervisor shut down");
    }
}
