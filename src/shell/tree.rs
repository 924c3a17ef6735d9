// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The live topic tree (C10, §4.9).
//!
//! A trie keyed by `/`-split topic levels. Every node on a message's
//! path gets its count bumped so an interior node shows the aggregate
//! traffic of everything beneath it; only the terminal node for the
//! exact topic keeps a payload preview and last-update timestamp.
//! [`TopicTree::render`] marks a node "hot" if it last saw traffic
//! within [`activity_timeout_seconds`](TopicTree::new) of now.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::message::Message;

#[derive(Debug, Default)]
struct TreeNode {
    children: BTreeMap<String, TreeNode>,
    count: u64,
    last_value_preview: Option<String>,
    last_update: Option<DateTime<Utc>>,
}

/// A live trie of topic traffic.
#[derive(Debug)]
pub struct TopicTree {
    root: TreeNode,
    activity_timeout_seconds: u64,
}

impl TopicTree {
    /// Builds an empty tree; a node is "hot" for `activity_timeout_seconds`
    /// after its last update.
    #[must_use]
    pub fn new(activity_timeout_seconds: u64) -> Self {
        Self {
            root: TreeNode::default(),
            activity_timeout_seconds,
        }
    }

    /// Records `message` against its topic, if it has one.
    pub fn record(&mut self, message: &Message) {
        let Some(topic) = message.topic() else {
            return;
        };
        let levels: Vec<&str> = topic.split('/').collect();
        let mut node = &mut self.root;
        for level in &levels {
            node = node.children.entry((*level).to_string()).or_default();
            node.count += 1;
        }
        node.last_value_preview = Some(message.payload_preview(80));
        node.last_update = Some(message.timestamp());
    }

    /// The total number of distinct leaf topics seen so far.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        count_leaves(&self.root)
    }

    /// Renders the tree as indented text, descending at most `depth`
    /// levels (`None` for unlimited), marking nodes hot/cold by recency.
    #[must_use]
    pub fn render(&self, depth: Option<usize>) -> String {
        let mut out = String::new();
        for (name, child) in &self.root.children {
            render_node(&mut out, name, child, 0, depth, self.activity_timeout_seconds);
        }
        out
    }
}

fn count_leaves(node: &TreeNode) -> usize {
    if node.children.is_empty() {
        return 1;
    }
    node.children.values().map(count_leaves).sum()
}

fn render_node(
    out: &mut String,
    name: &str,
    node: &TreeNode,
    level: usize,
    max_depth: Option<usize>,
    activity_timeout_seconds: u64,
) {
    let indent = "  ".repeat(level);
    let recency = node.last_update.map_or("", |ts| {
        if Utc::now().signed_duration_since(ts).num_seconds() <= activity_timeout_seconds as i64 {
            "[hot]"
        } else {
            "[cold]"
        }
    });
    let preview = node
        .last_value_preview
        .as_deref()
        .map(|p| format!(" = {p}"))
        .unwrap_or_default();
    let _ = writeln!(out, "{indent}{name} ({count}){recency}{preview}", count = node.count);

    if max_depth.is_some_and(|d| level + 1 >= d) {
        return;
    }
    for (child_name, child) in &node.children {
        render_node(out, child_name, child, level + 1, max_depth, activity_timeout_seconds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Direction, MessageType, Qos};

    fn message(topic: &str, payload: &str) -> Message {
        Message::builder(MessageType::Publish, Direction::Incoming)
            .topic(topic)
            .qos(Qos::AtMostOnce)
            .payload(payload.as_bytes().to_vec())
            .build()
    }

    #[test]
    fn record_builds_nested_levels() {
        let mut tree = TopicTree::new(30);
        tree.record(&message("sensors/r1/temp", "32"));
        tree.record(&message("sensors/r1/humidity", "55"));
        tree.record(&message("sensors/r2/temp", "20"));

        let rendered = tree.render(None);
        assert!(rendered.contains("sensors (3)"));
        assert!(rendered.contains("r1 (2)"));
        assert!(rendered.contains("r2 (1)"));
        assert!(rendered.contains("temp (1)"));
    }

    #[test]
    fn leaf_preview_is_set_only_on_terminal_node() {
        let mut tree = TopicTree::new(30);
        tree.record(&message("a/b", "hello"));
        let rendered = tree.render(None);
        assert!(rendered.contains("= hello"));
    }

    #[test]
    fn fresh_node_renders_hot() {
        let mut tree = TopicTree::new(300);
        tree.record(&message("a/b", "x"));
        assert!(tree.render(None).contains("[hot]"));
    }

    #[test]
    fn depth_limit_truncates_rendering() {
        let mut tree = TopicTree::new(30);
        tree.record(&message("a/b/c", "x"));
        let rendered = tree.render(Some(1));
        assert!(rendered.contains('a'));
        assert!(!rendered.contains('b'));
    }

    #[test]
    fn leaf_count_counts_distinct_topics() {
        let mut tree = TopicTree::new(30);
        tree.record(&message("a/b", "1"));
        tree.record(&message("a/c", "2"));
        assert_eq!(tree.leaf_count(), 2);
    }
}
