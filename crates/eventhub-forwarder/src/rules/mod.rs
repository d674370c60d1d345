// Copyright 2025-Present Eventhub Forwarder Contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration-driven metadata rule engine.
//!
//! Rule files are loaded once at startup from a configured directory, in
//! lexical filename order. Each file declares a named rule-set or the
//! distinguished `default` rule-set. Evaluation is first-match-wins with
//! AND-combined matchers; the default rule (no matchers) applies only when
//! no ordinary rule matched. `apply` never fails: every per-rule and
//! per-attribute error degrades to a logged skip.

pub mod query;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, error, warn};

use crate::pipeline::mapping::RESOURCE_TYPE_ATTRIBUTE;
use query::Query;

const DEFAULT_RULE_NAME: &str = "default";

/// Where a matcher reads its comparison value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    /// The already-derived `azure.resource.type` attribute of the entry.
    ResourceType,
    /// The raw record's `category` field.
    Category,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    In,
    Prefix,
    Contains,
}

/// One `source`/`condition` pair from a rule file.
///
/// The condition is parsed at construction; an unparseable condition or an
/// unsupported source leaves the matcher inert — it never matches, and the
/// failure is logged at load time.
#[derive(Debug, Clone)]
pub struct SourceMatcher {
    source: String,
    kind: Option<SourceKind>,
    operator: Option<Operator>,
    operand: Option<String>,
    valid: bool,
}

fn operand_literals() -> &'static Regex {
    static LITERALS: OnceLock<Regex> = OnceLock::new();
    LITERALS.get_or_init(|| Regex::new(r"(?s)'(.*?)'").expect("literal operand pattern is valid"))
}

impl SourceMatcher {
    pub fn new(source: &str, condition: &str) -> SourceMatcher {
        let kind = match source.to_lowercase().as_str() {
            "resourcetype" => Some(SourceKind::ResourceType),
            "category" => Some(SourceKind::Category),
            _ => None,
        };

        let condition_lower = condition.to_lowercase();
        let operator = [
            ("$eq", Operator::Eq),
            ("$in", Operator::In),
            ("$prefix", Operator::Prefix),
            ("$contains", Operator::Contains),
        ]
        .into_iter()
        .find_map(|(prefix, op)| condition_lower.starts_with(prefix).then_some(op));

        let literals: Vec<&str> = operand_literals()
            .captures_iter(condition)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
        let operand = (!literals.is_empty()).then(|| literals.join(","));

        let mut valid = true;
        if kind.is_none() {
            warn!(source, "Unsupported source type in rule matcher");
            valid = false;
        }
        if operator.is_none() || operand.is_none() {
            warn!(expression = condition, "Condition macro parsing failed");
            valid = false;
        }

        SourceMatcher {
            source: source.to_string(),
            kind,
            operator,
            operand,
            valid,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Evaluation-time failures are treated as non-match.
    fn matches(&self, record: &Map<String, Value>, entry: &Map<String, Value>) -> bool {
        if !self.valid {
            return false;
        }
        let (Some(kind), Some(operator), Some(operand)) =
            (self.kind, self.operator, self.operand.as_deref())
        else {
            return false;
        };

        let value = match kind {
            SourceKind::ResourceType => entry
                .get(RESOURCE_TYPE_ATTRIBUTE)
                .and_then(Value::as_str)
                .unwrap_or(""),
            SourceKind::Category => record.get("category").and_then(Value::as_str).unwrap_or(""),
        };

        let value = value.to_lowercase();
        let operand = operand.to_lowercase();
        match operator {
            Operator::Eq => value == operand,
            Operator::In => operand.split(',').any(|candidate| candidate == value),
            Operator::Prefix => value.starts_with(&operand),
            Operator::Contains => value.contains(&operand),
        }
    }
}

/// A key/query-pattern pair; the pattern is compiled once at load.
#[derive(Debug, Clone)]
pub struct Attribute {
    key: String,
    query: Query,
}

/// A named rule: AND-combined matchers plus derived attributes.
#[derive(Debug, Clone)]
pub struct ConfigRule {
    entity: String,
    sources: Vec<SourceMatcher>,
    attributes: Vec<Attribute>,
}

impl ConfigRule {
    fn applies(&self, record: &Map<String, Value>, entry: &Map<String, Value>) -> bool {
        self.sources
            .iter()
            .all(|matcher| matcher.matches(record, entry))
    }

    fn apply(&self, record: &Map<String, Value>, entry: &mut Map<String, Value>) {
        let document = Value::Object(record.clone());
        for attribute in &self.attributes {
            // A null result leaves any existing key untouched.
            if let Some(value) = attribute.query.evaluate(&document) {
                entry.insert(attribute.key.clone(), value);
            }
        }
    }
}

// Rule-file document shapes, an external contract shared with deployments.
#[derive(Debug, Deserialize)]
struct RuleSetFile {
    name: String,
    #[serde(default)]
    rules: Vec<RuleDef>,
}

#[derive(Debug, Deserialize)]
struct RuleDef {
    #[serde(default)]
    sources: Vec<SourceDef>,
    #[serde(default)]
    attributes: Vec<AttributeDef>,
}

#[derive(Debug, Deserialize)]
struct SourceDef {
    source: String,
    condition: String,
}

#[derive(Debug, Deserialize)]
struct AttributeDef {
    key: String,
    pattern: String,
}

/// The rule engine. Immutable after load.
#[derive(Debug, Clone, Default)]
pub struct MetadataEngine {
    rules: Vec<ConfigRule>,
    default_rule: Option<ConfigRule>,
}

impl MetadataEngine {
    /// Loads every `.json` rule file under `dir`, in lexical filename order.
    ///
    /// Load failures disable the affected file or rule (logged); a missing
    /// directory disables enrichment entirely. Never fails.
    pub fn load(dir: &Path) -> MetadataEngine {
        let mut engine = MetadataEngine::default();

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                error!(path = %dir.display(), error = %e, "Rule config directory missing");
                return engine;
            }
        };

        let mut paths: Vec<_> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().is_some_and(|ext| ext == "json")
            })
            .collect();
        // Directory iteration order is platform-dependent; pin rule priority
        // to lexical filename order.
        paths.sort();

        for path in paths {
            engine.load_file(&path);
        }

        debug!(
            rule_count = engine.rules.len(),
            has_default = engine.default_rule.is_some(),
            "Metadata rules loaded"
        );
        engine
    }

    fn load_file(&mut self, path: &Path) {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                error!(file = %path.display(), error = %e, "Failed to read rule file");
                return;
            }
        };
        let file: RuleSetFile = match serde_json::from_str(&contents) {
            Ok(file) => file,
            Err(e) => {
                error!(file = %path.display(), error = %e, "Failed to parse rule file");
                return;
            }
        };

        if file.name == DEFAULT_RULE_NAME {
            // The default rule-set carries attributes only; matchers are
            // ignored and it always applies as the fallback.
            match file.rules.into_iter().next() {
                Some(def) => {
                    self.default_rule = Some(ConfigRule {
                        entity: DEFAULT_RULE_NAME.to_string(),
                        sources: Vec::new(),
                        attributes: Self::build_attributes(def.attributes),
                    });
                }
                None => {
                    warn!(file = %path.display(), "Default rule-set declares no rules");
                }
            }
            return;
        }

        for def in file.rules {
            if let Some(rule) = Self::build_rule(&file.name, def) {
                self.rules.push(rule);
            }
        }
        debug!(file = %path.display(), "Rule config loaded");
    }

    fn build_rule(entity: &str, def: RuleDef) -> Option<ConfigRule> {
        let sources: Vec<SourceMatcher> = def
            .sources
            .iter()
            .map(|source| SourceMatcher::new(&source.source, &source.condition))
            .filter(SourceMatcher::is_valid)
            .collect();

        if sources.is_empty() {
            warn!(entity, "Rule rejected: no valid source matchers");
            return None;
        }

        Some(ConfigRule {
            entity: entity.to_string(),
            sources,
            attributes: Self::build_attributes(def.attributes),
        })
    }

    fn build_attributes(defs: Vec<AttributeDef>) -> Vec<Attribute> {
        defs.into_iter()
            .filter_map(|def| match Query::parse(&def.pattern) {
                Ok(query) => Some(Attribute {
                    key: def.key,
                    query,
                }),
                Err(e) => {
                    error!(key = %def.key, pattern = %def.pattern, error = %e, "Attribute pattern rejected");
                    None
                }
            })
            .collect()
    }

    /// Applies the first matching rule's attributes to `entry`, falling back
    /// to the default rule when no ordinary rule matches. Never fails.
    pub fn apply(&self, record: &Map<String, Value>, entry: &mut Map<String, Value>) {
        for rule in &self.rules {
            if rule.applies(record, entry) {
                debug!(entity = %rule.entity, "Applying metadata rule");
                rule.apply(record, entry);
                return;
            }
        }
        if let Some(default_rule) = &self.default_rule {
            default_rule.apply(record, entry);
        }
    }

    #[cfg(test)]
    fn with_rules(rules: Vec<ConfigRule>, default_rule: Option<ConfigRule>) -> MetadataEngine {
        MetadataEngine {
            rules,
            default_rule,
        }
    }
}
