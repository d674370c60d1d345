// Copyright 2025-Present Eventhub Forwarder Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fixed well-known field derivations: severity mapping and resource-id
//! attribute extraction.
//!
//! Attribute key names are an external contract shared with the rule files
//! and the ingestion backend; keep them verbatim.

use serde_json::{Map, Value};
use tracing::{debug, warn};

pub const PROVIDER_ATTRIBUTE: &str = "cloud.provider";
pub const PROVIDER_VALUE: &str = "Azure";
pub const RESOURCE_ID_ATTRIBUTE: &str = "azure.resource.id";
pub const SUBSCRIPTION_ATTRIBUTE: &str = "azure.subscription";
pub const RESOURCE_GROUP_ATTRIBUTE: &str = "azure.resource.group";
pub const RESOURCE_TYPE_ATTRIBUTE: &str = "azure.resource.type";
pub const RESOURCE_NAME_ATTRIBUTE: &str = "azure.resource.name";
pub const SEVERITY_ATTRIBUTE: &str = "severity";

pub const DEFAULT_SEVERITY: &str = "Informational";

/// Record keys probed for the numeric log level, in order.
pub const LEVEL_PROPERTIES: [&str; 2] = ["Level", "level"];

/// Record keys that may carry an embedded-JSON properties payload.
pub const PROPERTIES_NAMES: [&str; 2] = ["properties", "EventProperties"];

const CANONICAL_SEVERITIES: [&str; 4] = ["Critical", "Error", "Warning", "Informational"];

fn level_to_severity(level: i64) -> &'static str {
    match level {
        1 => "Critical",
        2 => "Error",
        3 => "Warning",
        4 => "Informational",
        _ => DEFAULT_SEVERITY,
    }
}

/// Derives the `severity` attribute from the record's level field.
///
/// Numeric levels map through the fixed table, unknown numeric codes and a
/// missing field default to `Informational`, and non-numeric values pass
/// through verbatim (with a warning when not a canonical severity name).
pub fn extract_severity(record: &Map<String, Value>, entry: &mut Map<String, Value>) {
    let level_value = LEVEL_PROPERTIES.iter().find_map(|key| record.get(*key));

    let severity = match level_value {
        Some(Value::Number(n)) => match n.as_i64() {
            Some(level) => level_to_severity(level).to_string(),
            // Non-integral numeric level, stringified verbatim
            None => n.to_string(),
        },
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => DEFAULT_SEVERITY.to_string(),
    };

    if !CANONICAL_SEVERITIES.contains(&severity.as_str()) {
        warn!(severity = %severity, "Unrecognized severity value");
    }

    entry.insert(SEVERITY_ATTRIBUTE.to_string(), Value::String(severity));
}

/// Extracts subscription, resource group, resource type, and resource name
/// attributes from a slash-delimited resource identifier.
///
/// The identifier must have at least 7 segments after the leading slash,
/// with `subscriptions` / `resourceGroups` / `providers` at positions 0/2/4
/// (case-insensitive). Any violation logs a warning and leaves the resource
/// attributes unset; the raw identifier is always recorded.
pub fn extract_resource_id_attributes(entry: &mut Map<String, Value>, resource_id: &str) {
    entry.insert(
        RESOURCE_ID_ATTRIBUTE.to_string(),
        Value::String(resource_id.to_string()),
    );

    let parts: Vec<&str> = resource_id.trim_start_matches('/').split('/').collect();

    if parts.len() < 7 {
        warn!(
            part_count = parts.len(),
            resource_id_sample = sample(resource_id),
            "Invalid resource ID structure"
        );
        return;
    }
    if !parts[0].eq_ignore_ascii_case("subscriptions") {
        warn!(
            actual = parts[0],
            resource_id_sample = sample(resource_id),
            "Invalid resource ID prefix"
        );
        return;
    }
    if !parts[2].eq_ignore_ascii_case("resourcegroups") {
        warn!(
            resource_id_sample = sample(resource_id),
            "Missing resource groups section"
        );
        return;
    }
    if !parts[4].eq_ignore_ascii_case("providers") {
        warn!(
            resource_id_sample = sample(resource_id),
            "Missing providers section"
        );
        return;
    }

    entry.insert(
        SUBSCRIPTION_ATTRIBUTE.to_string(),
        Value::String(parts[1].to_string()),
    );
    entry.insert(
        RESOURCE_GROUP_ATTRIBUTE.to_string(),
        Value::String(parts[3].to_string()),
    );
    entry.insert(
        RESOURCE_NAME_ATTRIBUTE.to_string(),
        Value::String(parts[parts.len() - 1].to_string()),
    );

    // The middle segments alternate type/instance in nested hierarchies;
    // keep the provider namespace plus every odd-indexed segment.
    let middle = &parts[5..parts.len() - 1];
    let resource_type: Vec<&str> = middle
        .iter()
        .enumerate()
        .filter(|(index, _)| *index == 0 || index % 2 != 0)
        .map(|(_, part)| *part)
        .collect();
    entry.insert(
        RESOURCE_TYPE_ATTRIBUTE.to_string(),
        Value::String(resource_type.join("/")),
    );

    debug!(
        subscription = parts[1],
        resource_group = parts[3],
        "Parsed resource ID"
    );
}

fn sample(value: &str) -> &str {
    let end = value
        .char_indices()
        .nth(200)
        .map_or(value.len(), |(i, _)| i);
    &value[..end]
}
