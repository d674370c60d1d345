// Copyright 2025-Present Eventhub Forwarder Contributors
// SPDX-License-Identifier: Apache-2.0

//! Timestamp normalization.
//!
//! A fixed ordered list of recognized layouts is probed; the first pattern
//! match decides the parse format. Output is ISO-8601 with millisecond
//! precision. Values matching no pattern (or failing to parse) fall back to
//! the current UTC time; a missing timestamp field is never synthesized.

use chrono::{NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use std::sync::OnceLock;

struct TimePattern {
    probe: Regex,
    format: &'static str,
}

fn patterns() -> &'static [TimePattern; 2] {
    static PATTERNS: OnceLock<[TimePattern; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            TimePattern {
                // date-time with dashes
                probe: Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}")
                    .expect("dashed layout probe is valid"),
                format: "%Y-%m-%d %H:%M:%S",
            },
            TimePattern {
                // date-time with slashes (month/day/year)
                probe: Regex::new(r"^\d{2}/\d{2}/\d{4} \d{2}:\d{2}:\d{2}")
                    .expect("slashed layout probe is valid"),
                format: "%m/%d/%Y %H:%M:%S",
            },
        ]
    })
}

/// Normalizes a raw timestamp string to ISO-8601 with milliseconds.
pub fn normalize(raw: &str) -> String {
    for pattern in patterns() {
        if pattern.probe.is_match(raw) {
            if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, pattern.format) {
                return parsed.format("%Y-%m-%dT%H:%M:%S%.3f").to_string();
            }
        }
    }
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashed_layout() {
        assert_eq!(normalize("2024-01-01 10:00:00"), "2024-01-01T10:00:00.000");
    }

    #[test]
    fn test_slashed_layout() {
        assert_eq!(normalize("03/15/2024 08:30:45"), "2024-03-15T08:30:45.000");
    }

    #[test]
    fn test_unrecognized_falls_back_to_now() {
        let normalized = normalize("not a timestamp");
        // rfc3339 with millis ends in Z
        assert!(normalized.ends_with('Z'));
        assert!(normalized.contains('T'));
    }

    #[test]
    fn test_pattern_match_with_invalid_date_falls_back() {
        // Matches the slashed probe but is not a real date
        let normalized = normalize("13/45/2024 99:99:99");
        assert!(normalized.ends_with('Z'));
    }
}
