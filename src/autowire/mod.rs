// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Auto-wire: boot-time declarative subscriptions (C4, §4.4).
//!
//! Given a list of [`TopicConfig`]s, [`autowire`] resolves and subscribes
//! each one through a [`Dispatcher`], exactly as if the caller had issued
//! [`Operation::Subscribe`] by hand. Re-running `autowire` with the same
//! configs against a pool that's already wired is a no-op per entry
//! (§4.4 idempotency): a `(pool, base_topic)` pair already subscribed is
//! skipped rather than double-subscribed.

use std::collections::HashSet;

use parking_lot::Mutex as SyncMutex;

use crate::config::TopicConfig;
use crate::dispatcher::{Dispatcher, Operation};
use crate::error::Error;
use crate::event::RuntimeEvent;
use crate::wire::WireConnection;

/// Tracks which `(pool, base_topic)` pairs have already been auto-wired,
/// so repeated calls with overlapping configs don't resubscribe.
#[derive(Default)]
pub struct AutowireRegistry {
    wired: SyncMutex<HashSet<(String, String)>>,
}

impl AutowireRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn try_claim(&self, pool: &str, base_topic: &str) -> bool {
        self.wired
            .lock()
            .insert((pool.to_string(), base_topic.to_string()))
    }
}

/// Subscribes every entry in `topics` through `dispatcher`, validating
/// each [`TopicConfig`] first and skipping any `(pool, base_topic)` pair
/// already claimed in `registry` (§4.4).
///
/// # Errors
///
/// Returns the first [`Error`] encountered - either a validation failure
/// or a dispatcher failure - with earlier successful subscriptions left
/// in place (auto-wire does not roll back on a partial failure; §4.4
/// treats each entry independently).
pub async fn autowire<W: WireConnection + 'static>(
    dispatcher: &Dispatcher<W>,
    registry: &AutowireRegistry,
    topics: &[TopicConfig],
) -> Result<usize, Error> {
    let mut wired = 0;
    for topic_config in topics {
        topic_config.validate().map_err(Error::Config)?;

        if !registry.try_claim(dispatcher.pool_name(), &topic_config.topic) {
            tracing::debug!(topic = %topic_config.topic, "auto-wire: already subscribed, skipping");
            continue;
        }

        dispatcher
            .dispatch(None, Operation::Subscribe(topic_config.clone()))
            .await?;

        let worker_count = if topic_config.enable_multi_sub {
            topic_config.multi_sub
        } else {
            1
        };
        dispatcher.events().publish(RuntimeEvent::SubscribeEvent {
            pool: dispatcher.pool_name().to_string(),
            topic: topic_config.resolve().effective,
            worker_count,
        });

        wired += 1;
    }
    Ok(wired)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::error::ConnectionError;
    use crate::event::EventBus;
    use crate::message::Qos;
    use crate::pool::Pool;
    use crate::wire::WireEvent;
    use std::sync::Arc;

    struct FakeConnection;

    impl WireConnection for FakeConnection {
        async fn connect(&self, _clean: bool, _will: Option<crate::wire::Will>) -> Result<(), ConnectionError> {
            Ok(())
        }
        async fn subscribe(&self, _topic: &str, _qos: Qos) -> Result<(), ConnectionError> {
            Ok(())
        }
        async fn unsubscribe(&self, _topic: &str) -> Result<(), ConnectionError> {
            Ok(())
        }
        async fn publish(
            &self,
            _topic: &str,
            _payload: Vec<u8>,
            _qos: Qos,
            _retain: bool,
        ) -> Result<(), ConnectionError> {
            Ok(())
        }
        async fn receive(&self) -> Result<WireEvent, ConnectionError> {
            std::future::pending().await
        }
        async fn close(&self) -> Result<(), ConnectionError> {
            Ok(())
        }
    }

    fn make_dispatcher() -> Dispatcher<FakeConnection> {
        let pool = Arc::new(Pool::new(PoolConfig::new("p"), || FakeConnection));
        Dispatcher::new(pool, EventBus::new())
    }

    #[tokio::test]
    async fn wires_every_topic_once() {
        let dispatcher = make_dispatcher();
        let registry = AutowireRegistry::new();
        let topics = vec![TopicConfig::new("a/b"), TopicConfig::new("c/d")];
        let wired = autowire(&dispatcher, &registry, &topics).await.unwrap();
        assert_eq!(wired, 2);
    }

    #[tokio::test]
    async fn repeated_autowire_skips_already_wired_topics() {
        let dispatcher = make_dispatcher();
        let registry = AutowireRegistry::new();
        let topics = vec![TopicConfig::new("a/b")];
        assert_eq!(autowire(&dispatcher, &registry, &topics).await.unwrap(), 1);
        assert_eq!(autowire(&dispatcher, &registry, &topics).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn invalid_topic_config_short_circuits() {
        let dispatcher = make_dispatcher();
        let registry = AutowireRegistry::new();
        let topics = vec![TopicConfig::new("   ")];
        assert!(autowire(&dispatcher, &registry, &topics).await.is_err());
    }

    #[tokio::test]
    async fn emits_subscribe_event_per_topic() {
        let dispatcher = make_dispatcher();
        let mut rx = dispatcher.events().subscribe();
        let registry = AutowireRegistry::new();
        let topics = vec![
            TopicConfig::new("a/b"),
            TopicConfig::new("c/d").multi_sub(3),
        ];
        autowire(&dispatcher, &registry, &topics).await.unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let RuntimeEvent::SubscribeEvent {
                topic, worker_count, ..
            } = event
            {
                seen.push((topic, worker_count));
            }
        }
        assert_eq!(seen, vec![("a/b".to_string(), 1), ("c/d".to_string(), 3)]);
    }
}
