// Copyright 2025-Present Eventhub Forwarder Contributors
// SPDX-License-Identifier: Apache-2.0

//! Category-driven monitored-entity inference.
//!
//! A mapping table compiled into the crate associates lower-cased
//! `resourceType[,category]` keys with a monitored-entity type. The
//! category-qualified key is consulted first, then the bare resource type,
//! then the bare category (activity-log records carry no resource type).
//! Pure derivation, no I/O at apply time.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{debug, error};

use crate::pipeline::mapping::RESOURCE_TYPE_ATTRIBUTE;

pub const ENTITY_TYPE_ATTRIBUTE: &str = "entity.type";

const ME_TYPE_MAPPER_JSON: &str = include_str!("me_type_mapper.json");

#[derive(Debug, Deserialize)]
struct MeTypeMapping {
    #[serde(rename = "resourceType", default)]
    resource_type: String,
    #[serde(default)]
    category: String,
    #[serde(rename = "meType")]
    me_type: String,
}

fn me_type_mapper() -> &'static HashMap<String, String> {
    static MAPPER: OnceLock<HashMap<String, String>> = OnceLock::new();
    MAPPER.get_or_init(|| {
        let mappings: Vec<MeTypeMapping> = match serde_json::from_str(ME_TYPE_MAPPER_JSON) {
            Ok(mappings) => mappings,
            Err(e) => {
                error!(error = %e, "Failed to load ME type mapping table");
                return HashMap::new();
            }
        };
        let mut mapper = HashMap::new();
        for mapping in mappings {
            let key = [
                mapping.resource_type.to_lowercase(),
                mapping.category.to_lowercase(),
            ]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(",");
            mapper.insert(key, mapping.me_type);
        }
        debug!(mapping_count = mapper.len(), "ME type mapping loaded");
        mapper
    })
}

/// Looks up the monitored-entity type for a record's lower-cased category
/// and the already-derived resource type, setting `entity.type` on a hit.
pub fn infer_monitored_entity(category: &str, entry: &mut Map<String, Value>) {
    let resource_type = entry
        .get(RESOURCE_TYPE_ATTRIBUTE)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_lowercase();

    let mapper = me_type_mapper();
    let qualified = format!("{resource_type},{category}");

    let me_type = if !resource_type.is_empty() && !category.is_empty() {
        mapper.get(&qualified)
    } else {
        None
    }
    .or_else(|| {
        if resource_type.is_empty() {
            None
        } else {
            mapper.get(&resource_type)
        }
    })
    .or_else(|| {
        if category.is_empty() {
            None
        } else {
            mapper.get(category)
        }
    });

    if let Some(me_type) = me_type {
        entry.insert(
            ENTITY_TYPE_ATTRIBUTE.to_string(),
            Value::String(me_type.clone()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_type_lookup() {
        let mut entry = Map::new();
        entry.insert(
            RESOURCE_TYPE_ATTRIBUTE.to_string(),
            json!("Microsoft.Storage/storageAccounts"),
        );
        infer_monitored_entity("storageread", &mut entry);
        assert_eq!(entry["entity.type"], json!("AZURE_STORAGE_ACCOUNT"));
    }

    #[test]
    fn test_category_qualified_lookup_wins() {
        let mut entry = Map::new();
        entry.insert(RESOURCE_TYPE_ATTRIBUTE.to_string(), json!("Microsoft.Web/sites"));
        infer_monitored_entity("functionapplogs", &mut entry);
        assert_eq!(entry["entity.type"], json!("AZURE_FUNCTION_APP"));
    }

    #[test]
    fn test_bare_resource_type_fallback() {
        let mut entry = Map::new();
        entry.insert(RESOURCE_TYPE_ATTRIBUTE.to_string(), json!("Microsoft.Web/sites"));
        infer_monitored_entity("apphttplogs", &mut entry);
        assert_eq!(entry["entity.type"], json!("AZURE_WEB_APP"));
    }

    #[test]
    fn test_activity_log_category_without_resource_type() {
        let mut entry = Map::new();
        infer_monitored_entity("administrative", &mut entry);
        assert_eq!(entry["entity.type"], json!("AZURE_ACTIVITY_LOG"));
    }

    #[test]
    fn test_unknown_category_adds_nothing() {
        let mut entry = Map::new();
        infer_monitored_entity("unknowncategory", &mut entry);
        assert!(!entry.contains_key("entity.type"));
    }
}
