// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Message history (C11, §4.10).
//!
//! A bounded ring of recently seen messages addressable by an absolute,
//! never-reused append index, with topic-pattern search via the same
//! wildcard matcher the connection pool's subscriptions use.

use std::collections::VecDeque;

use crate::message::Message;

/// One entry in [`MessageHistory`]: an absolute, never-reused append index
/// paired with the message.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// Absolute append index, starting at 0 for the first message ever
    /// recorded in this session. Never reused, even after the ring evicts
    /// the entry holding it.
    pub id: u64,
    /// The recorded message.
    pub message: Message,
}

/// A bounded ring of recently seen messages, addressable by their
/// absolute append id and searchable by topic pattern.
#[derive(Debug, Default)]
pub struct MessageHistory {
    entries: VecDeque<HistoryEntry>,
    limit: usize,
    next_id: u64,
}

impl MessageHistory {
    /// Builds an empty history holding at most `limit` entries.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit,
            next_id: 0,
        }
    }

    /// Appends `message`, returning its newly assigned id.
    pub fn add(&mut self, message: Message) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push_back(HistoryEntry { id, message });
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
        id
    }

    /// Looks up an entry by its absolute id. Returns `None` if it was
    /// evicted or never existed.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<&HistoryEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// The most recently added entry, if any.
    #[must_use]
    pub fn get_latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// The id of the most recently added entry, if any.
    #[must_use]
    pub fn get_latest_id(&self) -> Option<u64> {
        self.entries.back().map(|entry| entry.id)
    }

    /// The last `n` entries, oldest first.
    #[must_use]
    pub fn get_last(&self, n: usize) -> Vec<&HistoryEntry> {
        let start = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(start).collect()
    }

    /// Every entry whose topic matches `topic_pattern` (an MQTT-wildcard
    /// pattern, via [`crate::topic::matches`]), oldest first.
    #[must_use]
    pub fn search(&self, topic_pattern: &str) -> Vec<&HistoryEntry> {
        self.entries
            .iter()
            .filter(|entry| {
                entry
                    .message
                    .topic()
                    .is_some_and(|topic| crate::topic::matches(topic_pattern, topic))
            })
            .collect()
    }

    /// The number of entries currently retained.
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Removes every retained entry. Does not reset the id counter, so
    /// ids already handed out are never reissued.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Direction, MessageType, Qos};

    fn message(topic: &str) -> Message {
        Message::builder(MessageType::Publish, Direction::Incoming)
            .topic(topic)
            .qos(Qos::AtMostOnce)
            .build()
    }

    #[test]
    fn ids_are_absolute_and_never_reused() {
        let mut history = MessageHistory::new(2);
        let id0 = history.add(message("a/1"));
        let id1 = history.add(message("a/2"));
        let id2 = history.add(message("a/3"));
        assert_eq!((id0, id1, id2), (0, 1, 2));
        assert!(history.get(id0).is_none());
        assert!(history.get(id1).is_some());
        assert_eq!(history.get_latest_id(), Some(2));
    }

    #[test]
    fn search_filters_by_topic_pattern() {
        let mut history = MessageHistory::new(10);
        history.add(message("sensors/r1"));
        history.add(message("alerts/x"));
        let found = history.search("sensors/#");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].message.topic(), Some("sensors/r1"));
    }

    #[test]
    fn get_last_returns_most_recent_n_oldest_first() {
        let mut history = MessageHistory::new(10);
        history.add(message("a/1"));
        history.add(message("a/2"));
        history.add(message("a/3"));
        let last_two = history.get_last(2);
        assert_eq!(last_two.len(), 2);
        assert_eq!(last_two[0].message.topic(), Some("a/2"));
        assert_eq!(last_two[1].message.topic(), Some("a/3"));
    }

    #[test]
    fn clear_empties_ring_without_resetting_ids() {
        let mut history = MessageHistory::new(10);
        history.add(message("a/1"));
        history.clear();
        assert_eq!(history.count(), 0);
        let id = history.add(message("a/2"));
        assert_eq!(id, 1);
    }
}
