// Copyright 2025-Present Eventhub Forwarder Contributors
// SPDX-License-Identifier: Apache-2.0

//! Event-hub log forwarder core.
//!
//! Consumes partitioned event-stream records, normalizes them into log
//! entries (severity, resource attributes, rule-derived metadata,
//! truncation), and forwards gzip-compressed batches to a log-ingestion
//! endpoint, checkpointing each partition's position after successful
//! delivery.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod checkpoint;
pub mod config;
pub mod delivery;
pub mod error;
pub mod logger;
pub mod pipeline;
pub mod rules;
pub mod source;
pub mod supervisor;
pub mod worker;

pub use config::Config;
pub use error::{ConfigError, ForwarderError};
