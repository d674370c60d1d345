// Copyright 2025-Present Eventhub Forwarder Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-partition worker.
//!
//! A worker owns one partition's event stream and runs each event
//! through the full pipeline (parse, transform, batch, deliver) before
//! checkpointing that event's position. Events are handled strictly one
//! at a time, so checkpoint positions never advance past an event whose
//! delivery has not concluded.

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::checkpoint::FileCheckpointStore;
use crate::delivery::LogSender;
use crate::error::ForwarderError;
use crate::pipeline::EventProcessor;
use crate::source::EventSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Created,
    Running,
    Crashed,
    Stopped,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Created => "created",
            WorkerState::Running => "running",
            WorkerState::Crashed => "crashed",
            WorkerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

pub struct PartitionWorker {
    partition_id: String,
    state: watch::Receiver<WorkerState>,
    handle: JoinHandle<()>,
}

impl PartitionWorker {
    /// Starts a worker task for one partition. The task runs until the
    /// source is exhausted, the shutdown signal flips, or the pipeline
    /// chain fails (which crashes the worker; it is never restarted).
    pub fn spawn(
        partition_id: String,
        source: Box<dyn EventSource>,
        processor: Arc<EventProcessor>,
        sender: Arc<LogSender>,
        checkpoints: Arc<FileCheckpointStore>,
        shutdown: watch::Receiver<bool>,
    ) -> PartitionWorker {
        let (state_tx, state_rx) = watch::channel(WorkerState::Created);
        let id = partition_id.clone();

        let handle = tokio::spawn(async move {
            let _ = state_tx.send(WorkerState::Running);
            match run(source, processor, sender, checkpoints, shutdown).await {
                Ok(()) => {
                    info!(partition_id = %id, "Partition worker stopped");
                    let _ = state_tx.send(WorkerState::Stopped);
                }
                Err(e) => {
                    error!(partition_id = %id, error = %e, "Partition worker crashed");
                    let _ = state_tx.send(WorkerState::Crashed);
                }
            }
        });

        PartitionWorker {
            partition_id,
            state: state_rx,
            handle,
        }
    }

    pub fn partition_id(&self) -> &str {
        &self.partition_id
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state(), WorkerState::Created | WorkerState::Running)
    }

    pub async fn join(self) {
        let _ = self.handle.await;
    }
}

async fn run(
    mut source: Box<dyn EventSource>,
    processor: Arc<EventProcessor>,
    sender: Arc<LogSender>,
    checkpoints: Arc<FileCheckpointStore>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ForwarderError> {
    loop {
        let received = tokio::select! {
            _ = shutdown.wait_for(|stop| *stop) => return Ok(()),
            received = source.recv() => received?,
        };

        let Some(event) = received else {
            return Ok(());
        };

        let entries = processor.extract_logs(&event);
        info!(
            partition_id = %event.partition_id,
            parsed = entries.len(),
            "Parsed log entries from event"
        );

        if sender.send(&entries).await {
            checkpoints
                .update(&event.partition_id, event.offset, event.sequence_number)
                .await?;
        } else {
            warn!(
                partition_id = %event.partition_id,
                offset = event.offset,
                "Delivery failed, checkpoint not advanced"
            );
        }
    }
}
