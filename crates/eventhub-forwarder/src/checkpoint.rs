// Copyright 2025-Present Eventhub Forwarder Contributors
// SPDX-License-Identifier: Apache-2.0

//! Local filesystem checkpoint store.
//!
//! One checkpoint file per partition, always overwritten in full: the
//! store remembers only the most recent position. Ownership bookkeeping
//! is intentionally absent; this store is for single-process consumers
//! that own every partition they read, so the ownership operations
//! report nothing rather than erroring.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::ForwarderError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Checkpoint {
    pub offset: i64,
    pub sequence_number: i64,
}

pub struct FileCheckpointStore {
    base_dir: PathBuf,
}

impl FileCheckpointStore {
    /// Scopes the store to one hub/consumer-group pair under `storage_dir`.
    pub fn new(
        storage_dir: impl AsRef<Path>,
        hub_name: &str,
        consumer_group: &str,
    ) -> FileCheckpointStore {
        let base_dir = storage_dir.as_ref().join(hub_name).join(consumer_group);
        FileCheckpointStore { base_dir }
    }

    fn checkpoint_path(&self, partition_id: &str) -> PathBuf {
        self.base_dir
            .join(format!("partition_{partition_id}"))
            .join("checkpoint.json")
    }

    /// Records the latest processed position for a partition, replacing
    /// any previous checkpoint.
    pub async fn update(
        &self,
        partition_id: &str,
        offset: i64,
        sequence_number: i64,
    ) -> Result<(), ForwarderError> {
        let path = self.checkpoint_path(partition_id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let checkpoint = Checkpoint {
            offset,
            sequence_number,
        };
        let payload = serde_json::to_vec(&checkpoint)
            .map_err(|e| ForwarderError::Runtime(format!("checkpoint serialization: {e}")))?;
        tokio::fs::write(&path, payload).await?;

        debug!(
            partition_id,
            offset, sequence_number, "Checkpoint updated"
        );
        Ok(())
    }

    /// Reads the stored position for a partition, if one exists.
    pub async fn read(&self, partition_id: &str) -> Result<Option<Checkpoint>, ForwarderError> {
        let path = self.checkpoint_path(partition_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let checkpoint = serde_json::from_slice(&bytes)
                    .map_err(|e| ForwarderError::Runtime(format!("checkpoint parse: {e}")))?;
                Ok(Some(checkpoint))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Ownership is not tracked locally; there is never anything to list.
    pub async fn list_ownership(&self) -> Vec<String> {
        Vec::new()
    }

    /// Claims are a no-op for a local store; nothing is ever granted.
    pub async fn claim_ownership(&self, _partition_ids: &[String]) -> Vec<String> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_update_writes_checkpoint_file() {
        let dir = tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().to_str().unwrap(), "hub", "$Default");

        store.update("0", 1024, 17).await.unwrap();

        let path = dir
            .path()
            .join("hub/$Default/partition_0/checkpoint.json")
            .to_path_buf();
        let raw = std::fs::read_to_string(path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["offset"], 1024);
        assert_eq!(parsed["sequence_number"], 17);
    }

    #[tokio::test]
    async fn test_update_overwrites_previous_checkpoint() {
        let dir = tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().to_str().unwrap(), "hub", "$Default");

        store.update("3", 100, 1).await.unwrap();
        store.update("3", 250, 2).await.unwrap();

        let checkpoint = store.read("3").await.unwrap().unwrap();
        assert_eq!(
            checkpoint,
            Checkpoint {
                offset: 250,
                sequence_number: 2
            }
        );
    }

    #[tokio::test]
    async fn test_read_missing_partition_is_none() {
        let dir = tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().to_str().unwrap(), "hub", "$Default");
        assert!(store.read("9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_partitions_are_isolated() {
        let dir = tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().to_str().unwrap(), "hub", "$Default");

        store.update("0", 10, 1).await.unwrap();
        store.update("1", 20, 2).await.unwrap();

        assert_eq!(store.read("0").await.unwrap().unwrap().offset, 10);
        assert_eq!(store.read("1").await.unwrap().unwrap().offset, 20);
    }

    #[tokio::test]
    async fn test_ownership_operations_are_empty() {
        let dir = tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().to_str().unwrap(), "hub", "$Default");

        assert!(store.list_ownership().await.is_empty());
        assert!(store
            .claim_ownership(&["0".to_string(), "1".to_string()])
            .await
            .is_empty());
    }
}
