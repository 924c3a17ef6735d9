// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use tokio::sync::broadcast;

use crate::message::Message;

/// Default channel capacity for the event bus.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// A runtime lifecycle or data event (§4.5).
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A connection finished its CONNECT handshake.
    OnConnect {
        /// The pool the connection belongs to.
        pool: String,
        /// The pool-local connection id.
        connection_id: usize,
    },
    /// A connection was closed, gracefully or otherwise.
    OnDisconnect {
        /// The pool the connection belonged to.
        pool: String,
        /// The pool-local connection id.
        connection_id: usize,
        /// Human-readable reason, when known.
        reason: Option<String>,
    },
    /// A publish was dispatched outbound.
    OnPublish(Message),
    /// An inbound publish was received and routed.
    OnReceive(Message),
    /// A subscription was established (directly or via auto-wire).
    OnSubscribe {
        /// The pool the subscription lives on.
        pool: String,
        /// The resolved (possibly `$share`/`$queue`-prefixed) topic filter.
        topic: String,
    },
    /// A subscription was torn down.
    OnUnsubscribe {
        /// The pool the subscription lived on.
        pool: String,
        /// The resolved topic filter that was unsubscribed.
        topic: String,
    },
    /// Auto-wire finished subscribing a [`crate::config::TopicConfig`] at boot.
    SubscribeEvent {
        /// The pool the subscription was wired onto.
        pool: String,
        /// The resolved topic filter.
        topic: String,
        /// Number of worker subscriptions created (>1 for `multi_sub`).
        worker_count: usize,
    },
    /// A rule engine `DO` action failed.
    RuleActionError {
        /// Name or index of the rule that failed.
        rule: String,
        /// The error message surfaced by the action.
        message: String,
    },
}

/// Broadcasts [`RuntimeEvent`]s to any number of subscribers.
///
/// Mirrors the teacher's `EventBus`: a thin wrapper over
/// `tokio::sync::broadcast::Sender`, clonable, with a default capacity
/// of 256 buffered events.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RuntimeEvent>,
}

impl EventBus {
    /// Creates a new event bus with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates a new event bus with the given channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to runtime events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publishes an event; silently discarded if there are no subscribers.
    pub fn publish(&self, event: RuntimeEvent) {
        let _ = self.sender.send(event);
    }

    /// Publishes an event, returning how many subscribers received it.
    #[must_use]
    pub fn publish_counted(&self, event: RuntimeEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_bus_has_no_subscribers() {
        assert_eq!(EventBus::new().subscriber_count(), 0);
    }

    #[test]
    fn subscribe_increments_count() {
        let bus = EventBus::new();
        let _rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn publish_delivers_to_subscribers() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(RuntimeEvent::OnConnect {
            pool: "primary".to_string(),
            connection_id: 0,
        });
        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event,
            RuntimeEvent::OnConnect { connection_id: 0, .. }
        ));
    }

    #[test]
    fn publish_counted_returns_zero_without_subscribers() {
        let bus = EventBus::new();
        let count = bus.publish_counted(RuntimeEvent::OnSubscribe {
            pool: "p".to_string(),
            topic: "a/b".to_string(),
        });
        assert_eq!(count, 0);
    }

    #[test]
    fn clone_shares_same_channel() {
        let bus1 = EventBus::new();
        let bus2 = bus1.clone();
        let _rx = bus1.subscribe();
        assert_eq!(bus2.subscriber_count(), 1);
    }
}
