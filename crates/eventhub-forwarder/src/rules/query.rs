// Copyright 2025-Present Eventhub Forwarder Contributors
// SPDX-License-Identifier: Apache-2.0

//! Embedded path-query evaluator for rule attribute patterns.
//!
//! The pattern syntax is an external contract carried by the rule files:
//! dotted key paths with optional bracketed array indices, e.g.
//! `properties.requestUri` or `identity.claims[0].value`. Quoted segments
//! (`"a.key.with.dots"`) address keys containing dots. Evaluation returns
//! `None` when any step of the path is absent; malformed patterns are a
//! construction-time error surfaced to the caller.

use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Empty pattern")]
    Empty,

    #[error("Malformed pattern at byte {position}: {reason}")]
    Malformed { position: usize, reason: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
enum Step {
    Key(String),
    Index(usize),
}

/// A parsed attribute pattern, reusable across records.
#[derive(Debug, Clone)]
pub struct Query {
    steps: Vec<Step>,
}

impl Query {
    pub fn parse(pattern: &str) -> Result<Query, QueryError> {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return Err(QueryError::Empty);
        }

        let bytes = pattern.as_bytes();
        let mut steps = Vec::new();
        let mut pos = 0;

        while pos < bytes.len() {
            match bytes[pos] {
                b'.' => {
                    pos += 1;
                    if pos >= bytes.len() {
                        return Err(QueryError::Malformed {
                            position: pos,
                            reason: "trailing dot",
                        });
                    }
                }
                b'[' => {
                    let close = pattern[pos..].find(']').ok_or(QueryError::Malformed {
                        position: pos,
                        reason: "unterminated index",
                    })? + pos;
                    let index: usize =
                        pattern[pos + 1..close]
                            .parse()
                            .map_err(|_| QueryError::Malformed {
                                position: pos + 1,
                                reason: "index is not a number",
                            })?;
                    steps.push(Step::Index(index));
                    pos = close + 1;
                }
                b'"' => {
                    let close = pattern[pos + 1..].find('"').ok_or(QueryError::Malformed {
                        position: pos,
                        reason: "unterminated quote",
                    })? + pos
                        + 1;
                    steps.push(Step::Key(pattern[pos + 1..close].to_string()));
                    pos = close + 1;
                }
                _ => {
                    let end = pattern[pos..]
                        .find(['.', '['])
                        .map_or(pattern.len(), |offset| pos + offset);
                    let key = pattern[pos..end].trim();
                    if key.is_empty() {
                        return Err(QueryError::Malformed {
                            position: pos,
                            reason: "empty key segment",
                        });
                    }
                    steps.push(Step::Key(key.to_string()));
                    pos = end;
                }
            }
        }

        if steps.is_empty() {
            return Err(QueryError::Empty);
        }
        Ok(Query { steps })
    }

    /// Walks the document along the parsed path.
    pub fn evaluate(&self, document: &Value) -> Option<Value> {
        let mut current = document;
        for step in &self.steps {
            current = match step {
                Step::Key(key) => current.as_object()?.get(key)?,
                Step::Index(index) => current.as_array()?.get(*index)?,
            };
        }
        Some(current.clone())
    }
}

/// One-shot convenience for callers without a cached [`Query`].
pub fn evaluate(pattern: &str, document: &Value) -> Result<Option<Value>, QueryError> {
    Ok(Query::parse(pattern)?.evaluate(document))
}
