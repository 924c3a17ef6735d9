// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT wildcard topic matching (C1, §4.1).
//!
//! Deterministic, side-effect free. Understands `+`, `#`, and the
//! `$share/<group>/…` / `$queue/…` subscription prefixes used elsewhere
//! in this crate ([`crate::config::TopicConfig::resolve`],
//! [`crate::dispatcher`]).

/// Returns whether `topic` (a concrete publish topic, never containing
/// wildcards) matches `pattern` (a subscription filter that may contain
/// `+`/`#`, and may be `$share/<group>/…` or `$queue/…`).
#[must_use]
pub fn matches(pattern: &str, topic: &str) -> bool {
    if topic.is_empty() {
        return false;
    }

    let pattern = strip_shared_prefix(pattern);

    let topic_is_reserved = topic.starts_with('$');
    let pattern_levels: Vec<&str> = pattern.split('/').collect();
    let topic_levels: Vec<&str> = topic.split('/').collect();

    // A leading '+' or '#' never matches a reserved ($-rooted) topic.
    if topic_is_reserved {
        if let Some(&first) = pattern_levels.first() {
            if first == "+" || first == "#" {
                return false;
            }
        }
    }

    match_levels(&pattern_levels, &topic_levels)
}

/// Strips a `$share/<group>/` or `$queue/` prefix from a subscription
/// pattern, returning the bare topic filter to match against.
fn strip_shared_prefix(pattern: &str) -> &str {
    if let Some(rest) = pattern.strip_prefix("$share/") {
        if let Some(idx) = rest.find('/') {
            return &rest[idx + 1..];
        }
        return rest;
    }
    if let Some(rest) = pattern.strip_prefix("$queue/") {
        return rest;
    }
    pattern
}

fn match_levels(pattern: &[&str], topic: &[&str]) -> bool {
    match (pattern.first(), topic.first()) {
        (None, None) => true,
        (None, Some(_)) => false,
        (Some(&"#"), _) => true,
        (Some(&"+"), Some(_)) => match_levels(&pattern[1..], &topic[1..]),
        (Some(&"+"), None) => false,
        (Some(&p), Some(&t)) if p == t => match_levels(&pattern[1..], &topic[1..]),
        (Some(_), _) => false,
    }
}
