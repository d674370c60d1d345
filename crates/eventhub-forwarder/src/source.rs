// Copyright 2025-Present Eventhub Forwarder Contributors
// SPDX-License-Identifier: Apache-2.0

//! Event-source abstraction over a partition's ordered event stream.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::error::ForwarderError;

/// One event as read from a partition, before any transformation.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub partition_id: String,
    pub offset: i64,
    pub sequence_number: i64,
    pub enqueued_time: DateTime<Utc>,
    pub body: Vec<u8>,
}

/// A partition's event feed. `recv` yields events in partition order and
/// returns `Ok(None)` once the stream is exhausted.
#[async_trait]
pub trait EventSource: Send {
    async fn recv(&mut self) -> Result<Option<RawEvent>, ForwarderError>;
}

/// An [`EventSource`] fed through an in-process channel. The producing
/// side decides when the stream ends by dropping its [`mpsc::Sender`].
pub struct ChannelSource {
    receiver: mpsc::Receiver<RawEvent>,
}

impl ChannelSource {
    pub fn new(capacity: usize) -> (mpsc::Sender<RawEvent>, ChannelSource) {
        let (sender, receiver) = mpsc::channel(capacity);
        (sender, ChannelSource { receiver })
    }
}

#[async_trait]
impl EventSource for ChannelSource {
    async fn recv(&mut self) -> Result<Option<RawEvent>, ForwarderError> {
        Ok(self.receiver.recv().await)
    }
}
