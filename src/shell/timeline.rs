// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The flow timeline (C10, §4.9).
//!
//! A ring of recent messages rendered as a scrolling view: `──▶ IN` for
//! inbound traffic, `◀── OUT` for outbound, millisecond timestamps, and
//! a truncated payload preview. A message a rule matched gets a
//! follow-up `└─ [RULE: <name>] ⚡` line.

use std::collections::VecDeque;
use std::fmt::Write as _;

use crate::message::{Direction, Message};

/// One entry in the flow timeline ring.
#[derive(Debug, Clone)]
struct FlowEntry {
    message: Message,
    matched_rule: Option<String>,
}

/// A bounded, scrolling view of recent traffic.
#[derive(Debug)]
pub struct FlowTimeline {
    entries: VecDeque<FlowEntry>,
    limit: usize,
    payload_truncation: usize,
}

impl FlowTimeline {
    /// Builds an empty timeline holding at most `limit` entries.
    #[must_use]
    pub fn new(limit: usize, payload_truncation: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit,
            payload_truncation,
        }
    }

    /// Appends `message`, evicting the oldest entry if at capacity.
    /// `matched_rule` names the rule engine rule that matched it, if any.
    pub fn record(&mut self, message: Message, matched_rule: Option<String>) {
        self.entries.push_back(FlowEntry { message, matched_rule });
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
    }

    /// The number of entries currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the timeline is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the most recent `limit` entries (`None` for all of them),
    /// optionally restricted to topics matching `topic_filter` (an
    /// MQTT-wildcard pattern, via [`crate::topic::matches`]).
    #[must_use]
    pub fn render(&self, limit: Option<usize>, topic_filter: Option<&str>) -> String {
        let mut out = String::new();
        let selected: Vec<&FlowEntry> = self
            .entries
            .iter()
            .filter(|entry| {
                topic_filter.is_none_or(|pattern| {
                    entry
                        .message
                        .topic()
                        .is_some_and(|topic| crate::topic::matches(pattern, topic))
                })
            })
            .collect();
        let start = limit.map_or(0, |n| selected.len().saturating_sub(n));
        for entry in &selected[start..] {
            render_entry(&mut out, entry, self.payload_truncation);
        }
        out
    }
}

fn render_entry(out: &mut String, entry: &FlowEntry, payload_truncation: usize) {
    let arrow = match entry.message.direction() {
        Direction::Incoming => "──▶ IN ",
        Direction::Outgoing => "◀── OUT",
        Direction::Internal => "    SYS",
    };
    let millis = entry.message.timestamp().timestamp_millis();
    let topic = entry.message.topic().unwrap_or("-");
    let preview = entry.message.payload_preview(payload_truncation);
    let _ = writeln!(out, "{arrow} [{millis}] {topic} {preview}");
    if let Some(rule) = &entry.matched_rule {
        let _ = writeln!(out, "  └─ [RULE: {rule}] ⚡");
    }
}
