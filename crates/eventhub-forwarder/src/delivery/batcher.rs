// Copyright 2025-Present Eventhub Forwarder Contributors
// SPDX-License-Identifier: Apache-2.0

//! Greedy size/count-bounded batching of normalized entries.
//!
//! Byte accounting sums per-entry serialized sizes, not the size of the
//! final serialized array; an approximation, not an exact wire-size
//! guarantee.

use serde_json::Value;
use tracing::warn;

use crate::pipeline::NormalizedLogEntry;

/// One unit of delivery: a serialized JSON array of entries.
#[derive(Debug, Clone)]
pub struct LogBatch {
    pub serialized: String,
    pub entry_count: usize,
    pub byte_size: usize,
}

impl LogBatch {
    fn from_entries(entries: &[&NormalizedLogEntry], byte_size: usize) -> LogBatch {
        let values: Vec<Value> = entries
            .iter()
            .map(|entry| Value::Object((*entry).clone()))
            .collect();
        LogBatch {
            // Maps of strings always serialize
            serialized: serde_json::to_string(&values).unwrap_or_else(|_| "[]".to_string()),
            entry_count: entries.len(),
            byte_size,
        }
    }
}

/// Packs entries greedily into batches bounded by `max_count` entries and
/// `max_bytes` of summed serialized entry size. An entry whose serialized
/// size alone exceeds `max_bytes` can never fit any batch and is dropped
/// with a warning.
pub fn make_batches(
    entries: &[NormalizedLogEntry],
    max_count: usize,
    max_bytes: usize,
) -> Vec<LogBatch> {
    let mut batches = Vec::new();
    let mut current: Vec<&NormalizedLogEntry> = Vec::new();
    let mut current_size = 0usize;

    for entry in entries {
        let serialized_len = Value::Object(entry.clone()).to_string().len();

        if serialized_len > max_bytes {
            warn!(
                size = serialized_len,
                limit = max_bytes,
                "Oversized log entry skipped"
            );
            continue;
        }

        if current.len() >= max_count || current_size + serialized_len > max_bytes {
            if !current.is_empty() {
                batches.push(LogBatch::from_entries(&current, current_size));
                current.clear();
                current_size = 0;
            }
        }

        current.push(entry);
        current_size += serialized_len;
    }

    if !current.is_empty() {
        batches.push(LogBatch::from_entries(&current, current_size));
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn entry_of_size(payload_len: usize) -> NormalizedLogEntry {
        // {"m":"<payload>"} serializes to payload_len + 8 bytes
        let mut entry = Map::new();
        entry.insert("m".to_string(), Value::String("z".repeat(payload_len)));
        entry
    }

    fn serialized_size(entry: &NormalizedLogEntry) -> usize {
        Value::Object(entry.clone()).to_string().len()
    }

    #[test]
    fn test_empty_input_yields_no_batches() {
        assert!(make_batches(&[], 10, 1000).is_empty());
    }

    #[test]
    fn test_single_batch_under_limits() {
        let entries = vec![entry_of_size(10), entry_of_size(10)];
        let batches = make_batches(&entries, 100, 10_000);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].entry_count, 2);
        let parsed: Vec<Value> = serde_json::from_str(&batches[0].serialized).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_size_bound_packs_pairs() {
        // maxBytes = 2.5 × entry size: each batch holds exactly 2 entries.
        let entry = entry_of_size(32);
        let size = serialized_size(&entry);
        let entries = vec![entry.clone(), entry.clone(), entry.clone(), entry.clone()];

        let batches = make_batches(&entries, 100, size * 5 / 2);
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.entry_count == 2));
    }

    #[test]
    fn test_count_bound() {
        let entries: Vec<_> = (0..7).map(|_| entry_of_size(4)).collect();
        let batches = make_batches(&entries, 3, 1_000_000);
        assert_eq!(
            batches.iter().map(|b| b.entry_count).collect::<Vec<_>>(),
            vec![3, 3, 1]
        );
    }

    #[test]
    fn test_oversized_entry_dropped() {
        let huge = entry_of_size(500);
        let small = entry_of_size(4);
        let limit = serialized_size(&small) * 3;

        let batches = make_batches(&[small.clone(), huge, small], 100, limit);
        let total: usize = batches.iter().map(|b| b.entry_count).sum();
        assert_eq!(total, 2);
        for batch in &batches {
            assert!(!batch.serialized.contains(&"z".repeat(500)));
        }
    }

    #[test]
    fn test_trailing_partial_batch_emitted() {
        let entry = entry_of_size(16);
        let size = serialized_size(&entry);
        let entries = vec![entry.clone(), entry.clone(), entry.clone()];

        let batches = make_batches(&entries, 100, size * 2);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].entry_count, 1);
    }

    #[test]
    fn test_byte_size_is_summed_entry_sizes() {
        let entry = entry_of_size(16);
        let size = serialized_size(&entry);
        let batches = make_batches(&[entry.clone(), entry.clone()], 10, 10_000);
        assert_eq!(batches[0].byte_size, size * 2);
    }
}
