// Copyright 2025-Present Eventhub Forwarder Contributors
// SPDX-License-Identifier: Apache-2.0

//! Transformation pipeline: raw event payloads in, normalized log entries
//! out.
//!
//! `extract_logs` never fails — internal failures degrade to skipping the
//! offending record or event, and are logged with a bounded sample of the
//! body. Every produced entry is string-valued and length-bounded after the
//! field-length policy runs.

pub mod entity;
pub mod mapping;
pub mod timestamp;

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, warn};

use crate::config::Config;
use crate::rules::MetadataEngine;
use crate::source::RawEvent;

/// A normalized log entry: string keys to string values once finalized.
pub type NormalizedLogEntry = Map<String, Value>;

const BODY_SAMPLE_LIMIT: usize = 500;
const TIMESTAMP_ATTRIBUTE: &str = "timestamp";
const CONTENT_ATTRIBUTE: &str = "content";

pub struct EventProcessor {
    engine: Arc<MetadataEngine>,
    attribute_limit: usize,
    content_limit: usize,
    truncated_mark: String,
}

impl EventProcessor {
    pub fn new(config: &Config, engine: Arc<MetadataEngine>) -> Self {
        EventProcessor {
            engine,
            attribute_limit: config.log_processing.attribute_value_length_limit,
            content_limit: config.log_processing.content_length_limit,
            truncated_mark: config.log_processing.content_truncated_mark.clone(),
        }
    }

    /// Extracts normalized log entries from a raw event. Possibly empty,
    /// never fails.
    pub fn extract_logs(&self, event: &RawEvent) -> Vec<NormalizedLogEntry> {
        let body = match std::str::from_utf8(&event.body) {
            Ok(body) => body,
            Err(e) => {
                error!(
                    offset = event.offset,
                    error = %e,
                    "Event body is not valid UTF-8"
                );
                return Vec::new();
            }
        };
        if body.is_empty() {
            return Vec::new();
        }

        self.parse_event_body(body)
            .into_iter()
            .filter_map(|record| self.process_record(record))
            .collect()
    }

    /// Parses the body into its `records` list, with a lenient fallback for
    /// near-JSON payloads (embedded newlines, single-quoted strings).
    fn parse_event_body(&self, body: &str) -> Vec<Map<String, Value>> {
        match Self::parse_records(body) {
            Some(records) => records,
            None => {
                let modified = body.replace('\n', "").replace('\'', "\"");
                match Self::parse_records(&modified) {
                    Some(records) => records,
                    None => {
                        error!(
                            body_sample = %sample(body, BODY_SAMPLE_LIMIT),
                            "Failed to parse event body"
                        );
                        Vec::new()
                    }
                }
            }
        }
    }

    fn parse_records(body: &str) -> Option<Vec<Map<String, Value>>> {
        let parsed: Value = serde_json::from_str(body).ok()?;
        let records = parsed.get("records")?.as_array()?;
        Some(
            records
                .iter()
                .filter_map(|record| record.as_object().cloned())
                .collect(),
        )
    }

    /// Builds one normalized entry from one record. A failure here drops
    /// only this record.
    fn process_record(&self, mut record: Map<String, Value>) -> Option<NormalizedLogEntry> {
        deserialize_properties(&mut record);

        let mut entry = Map::new();
        entry.insert(
            mapping::PROVIDER_ATTRIBUTE.to_string(),
            Value::String(mapping::PROVIDER_VALUE.to_string()),
        );

        mapping::extract_severity(&record, &mut entry);

        if let Some(resource_id) = record.get("resourceId").and_then(Value::as_str) {
            mapping::extract_resource_id_attributes(&mut entry, resource_id);
        } else if record.contains_key("resourceId") {
            warn!(record_sample = %record_sample(&record), "resourceId is not a string");
        }

        self.engine.apply(&record, &mut entry);

        self.normalize_timestamp(&record, &mut entry);

        let category = record
            .get("category")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_lowercase();
        entity::infer_monitored_entity(&category, &mut entry);

        Some(self.apply_field_limits(entry))
    }

    /// Carries the record's timestamp into the entry (when the rules did not
    /// already provide one) and normalizes whatever string is there. A
    /// missing timestamp is never synthesized.
    fn normalize_timestamp(&self, record: &Map<String, Value>, entry: &mut Map<String, Value>) {
        if !entry.contains_key(TIMESTAMP_ATTRIBUTE) {
            if let Some(raw) = record.get(TIMESTAMP_ATTRIBUTE) {
                entry.insert(TIMESTAMP_ATTRIBUTE.to_string(), raw.clone());
            }
        }
        if let Some(Value::String(raw)) = entry.get(TIMESTAMP_ATTRIBUTE) {
            let normalized = timestamp::normalize(raw);
            entry.insert(TIMESTAMP_ATTRIBUTE.to_string(), Value::String(normalized));
        }
    }

    /// Field-length policy: every value becomes a string; `content` is
    /// bounded by the content limit, `severity`/`timestamp` are exempt from
    /// truncation, and everything else is bounded by the attribute limit.
    fn apply_field_limits(&self, entry: Map<String, Value>) -> NormalizedLogEntry {
        entry
            .into_iter()
            .map(|(key, value)| {
                let limited = match key.as_str() {
                    CONTENT_ATTRIBUTE => {
                        self.truncate(&stringify(&value), self.content_limit)
                    }
                    mapping::SEVERITY_ATTRIBUTE | TIMESTAMP_ATTRIBUTE => stringify(&value),
                    _ => self.truncate(&stringify(&value), self.attribute_limit),
                };
                (key, Value::String(limited))
            })
            .collect()
    }

    /// Truncation always leaves room for the marker: the result is exactly
    /// `limit` characters when the input exceeds it.
    fn truncate(&self, value: &str, limit: usize) -> String {
        let char_count = value.chars().count();
        if char_count <= limit {
            return value.to_string();
        }
        let keep = limit - self.truncated_mark.chars().count();
        let mut truncated: String = value.chars().take(keep).collect();
        truncated.push_str(&self.truncated_mark);
        truncated
    }
}

/// Replaces a string-valued properties alias field with its embedded JSON,
/// keeping the original string on parse failure.
fn deserialize_properties(record: &mut Map<String, Value>) {
    let Some(key) = mapping::PROPERTIES_NAMES
        .iter()
        .find(|key| record.contains_key(**key))
    else {
        return;
    };
    if let Some(Value::String(raw)) = record.get(*key) {
        if let Ok(embedded) = serde_json::from_str::<Value>(raw) {
            record.insert((*key).to_string(), embedded);
        }
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn sample(value: &str, limit: usize) -> String {
    let end = value
        .char_indices()
        .nth(limit)
        .map_or(value.len(), |(i, _)| i);
    value[..end].to_string()
}

fn record_sample(record: &Map<String, Value>) -> String {
    sample(&Value::Object(record.clone()).to_string(), 200)
}
