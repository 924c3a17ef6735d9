// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The dispatcher (C3, §4.3).
//!
//! Every publish, subscribe, and unsubscribe the runtime performs goes
//! through a [`Dispatcher`]: it acquires a connection from the [`Pool`]
//! (honoring context affinity), performs the call, and makes sure
//! exactly one task drains that connection's inbound stream (§5) -
//! mirroring how the teacher's `PooledMqttClient` gets a
//! `SharedConnection` from the `BrokerPool` and lets
//! `handle_pooled_mqtt_events` own the event-loop poll.
//!
//! A `multi_sub` subscription fans out across one connection per worker
//! (§9 Open Question resolution), each with its own receive loop.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex as SyncMutex;

use crate::config::TopicConfig;
use crate::error::{ConnectionError, Error};
use crate::event::{EventBus, RuntimeEvent};
use crate::message::{Direction, Message, MessageType, Qos};
use crate::pool::Pool;
use crate::wire::{WireConnection, WireEvent};

/// A single operation a caller asks the dispatcher to perform (§4.3).
#[derive(Debug, Clone)]
pub enum Operation {
    /// Establishes (or reuses) a connection without performing any MQTT action.
    Connect,
    /// Publishes `payload` to `topic`.
    Publish {
        /// Target topic.
        topic: String,
        /// Raw payload bytes.
        payload: Vec<u8>,
        /// QoS to publish at.
        qos: Qos,
        /// RETAIN flag.
        retain: bool,
    },
    /// Subscribes per a declarative [`TopicConfig`].
    Subscribe(TopicConfig),
    /// Unsubscribes from a previously subscribed topic.
    Unsubscribe {
        /// The resolved topic filter to unsubscribe.
        topic: String,
    },
}

/// Dispatches operations against a [`Pool`], publishing lifecycle and
/// data events to an [`EventBus`] as it goes.
pub struct Dispatcher<W: WireConnection> {
    pool: Arc<Pool<W>>,
    bus: EventBus,
    receiving: SyncMutex<HashMap<usize, tokio::task::JoinHandle<()>>>,
    announced: SyncMutex<HashSet<usize>>,
    subscribed_topics: SyncMutex<HashMap<usize, HashSet<String>>>,
}

impl<W: WireConnection + 'static> Dispatcher<W> {
    /// Builds a dispatcher over the given pool, publishing to `bus`.
    #[must_use]
    pub fn new(pool: Arc<Pool<W>>, bus: EventBus) -> Self {
        Self {
            pool,
            bus,
            receiving: SyncMutex::new(HashMap::new()),
            announced: SyncMutex::new(HashSet::new()),
            subscribed_topics: SyncMutex::new(HashMap::new()),
        }
    }

    /// The event bus this dispatcher publishes to.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// The name of the pool this dispatcher acquires connections from.
    #[must_use]
    pub fn pool_name(&self) -> &str {
        self.pool.name()
    }

    /// Runs a single [`Operation`], scoped to `context` (affinity key).
    ///
    /// # Errors
    ///
    /// Propagates [`crate::error::PoolError`] and
    /// [`crate::error::ConnectionError`] failures via [`Error`].
    pub async fn dispatch(&self, context: Option<&str>, op: Operation) -> Result<(), Error> {
        match op {
            Operation::Connect => {
                let conn = self.connect(context).await?;
                self.pool.release(&conn).await;
                Ok(())
            }
            Operation::Publish {
                topic,
                payload,
                qos,
                retain,
            } => self.publish(context, &topic, payload, qos, retain).await,
            Operation::Subscribe(topic_config) => self.subscribe(context, &topic_config).await,
            Operation::Unsubscribe { topic } => self.unsubscribe(context, &topic).await,
        }
    }

    /// Acquires a connection for `context`, starting its receive loop and
    /// announcing [`RuntimeEvent::OnConnect`] the first time it's seen.
    pub async fn connect(
        &self,
        context: Option<&str>,
    ) -> Result<Arc<crate::pool::PooledConnection<W>>, Error> {
        let conn = self.pool.acquire(context).await.map_err(Error::Pool)?;
        self.ensure_announced(&conn);
        self.ensure_receiving(&conn);
        Ok(conn)
    }

    fn ensure_announced(&self, conn: &Arc<crate::pool::PooledConnection<W>>) {
        let mut announced = self.announced.lock();
        if announced.insert(conn.id()) {
            self.bus.publish(RuntimeEvent::OnConnect {
                pool: self.pool.name().to_string(),
                connection_id: conn.id(),
            });
        }
    }

    fn ensure_receiving(&self, conn: &Arc<crate::pool::PooledConnection<W>>) {
        let mut receiving = self.receiving.lock();
        if receiving.contains_key(&conn.id()) {
            return;
        }
        let conn_for_task = Arc::clone(conn);
        let bus = self.bus.clone();
        let pool_name = self.pool.name().to_string();
        let handle = tokio::spawn(async move {
            let conn = conn_for_task;
            loop {
                match conn.conn().receive().await {
                    Ok(WireEvent::Publish {
                        topic,
                        payload,
                        qos,
                        retain,
                        dup,
                        properties,
                    }) => {
                        let message = Message::builder(MessageType::Publish, Direction::Incoming)
                            .topic(topic)
                            .payload(payload)
                            .qos(qos)
                            .retain(retain)
                            .dup(dup)
                            .properties(properties)
                            .pool(pool_name.clone())
                            .build();
                        bus.publish(RuntimeEvent::OnReceive(message));
                    }
                    Ok(WireEvent::Disconnect { reason }) => {
                        conn.mark_inactive();
                        bus.publish(RuntimeEvent::OnDisconnect {
                            pool: pool_name.clone(),
                            connection_id: conn.id(),
                            reason: Some(reason),
                        });
                        break;
                    }
                    Ok(_) => {}
                    Err(error) => {
                        tracing::warn!(
                            pool = %pool_name,
                            connection_id = conn.id(),
                            %error,
                            "connection receive loop exiting on error"
                        );
                        conn.mark_inactive();
                        bus.publish(RuntimeEvent::OnDisconnect {
                            pool: pool_name.clone(),
                            connection_id: conn.id(),
                            reason: Some(error.to_string()),
                        });
                        break;
                    }
                }
            }
        });
        receiving.insert(conn.id(), handle);
    }

    async fn publish(
        &self,
        context: Option<&str>,
        topic: &str,
        payload: Vec<u8>,
        qos: Qos,
        retain: bool,
    ) -> Result<(), Error> {
        let conn = self.connect(context).await?;
        conn.conn()
            .publish(topic, payload.clone(), qos, retain)
            .await
            .map_err(Error::Connection)?;

        let message = Message::builder(MessageType::Publish, Direction::Outgoing)
            .topic(topic)
            .payload(payload)
            .qos(qos)
            .retain(retain)
            .pool(self.pool.name())
            .build();
        self.bus.publish(RuntimeEvent::OnPublish(message));

        // §4.3 step 4: a non-context-bound connection is released once
        // the call completes; `Pool::release` is itself a no-op if the
        // connection is still context-bound.
        self.pool.release(&conn).await;
        Ok(())
    }

    async fn subscribe(&self, context: Option<&str>, topic_config: &TopicConfig) -> Result<(), Error> {
        let resolved = topic_config.resolve();

        if topic_config.enable_multi_sub {
            for worker in 0..topic_config.multi_sub {
                let conn = self.connect(None).await?;
                conn.conn()
                    .subscribe(&resolved.effective, resolved.qos)
                    .await
                    .map_err(Error::Connection)?;
                self.track_subscribe(conn.id(), &resolved.effective);
                tracing::debug!(
                    pool = %self.pool.name(),
                    topic = %resolved.effective,
                    worker,
                    "multi_sub worker subscribed"
                );
            }
        } else {
            let conn = self.connect(context).await?;
            conn.conn()
                .subscribe(&resolved.effective, resolved.qos)
                .await
                .map_err(Error::Connection)?;
            self.track_subscribe(conn.id(), &resolved.effective);
        }

        self.bus.publish(RuntimeEvent::OnSubscribe {
            pool: self.pool.name().to_string(),
            topic: resolved.effective,
        });
        Ok(())
    }

    async fn unsubscribe(&self, context: Option<&str>, topic: &str) -> Result<(), Error> {
        let conn = self.connect(context).await?;
        conn.conn()
            .unsubscribe(topic)
            .await
            .map_err(Error::Connection)?;
        self.bus.publish(RuntimeEvent::OnUnsubscribe {
            pool: self.pool.name().to_string(),
            topic: topic.to_string(),
        });

        // Unsubscribing from the last topic on this session tears down
        // its receive loop rather than leaving it blocked on a
        // connection nothing is routed to anymore (§4.3).
        if self.track_unsubscribe(conn.id(), topic) {
            self.stop_receiving(conn.id());
        }
        self.pool.release(&conn).await;
        Ok(())
    }

    fn track_subscribe(&self, conn_id: usize, topic: &str) {
        self.subscribed_topics
            .lock()
            .entry(conn_id)
            .or_default()
            .insert(topic.to_string());
    }

    /// Removes `topic` from the connection's subscription set, returning
    /// `true` if that was its last remaining topic.
    fn track_unsubscribe(&self, conn_id: usize, topic: &str) -> bool {
        let mut subscribed = self.subscribed_topics.lock();
        let Some(topics) = subscribed.get_mut(&conn_id) else {
            return false;
        };
        topics.remove(topic);
        let now_empty = topics.is_empty();
        if now_empty {
            subscribed.remove(&conn_id);
        }
        now_empty
    }

    fn stop_receiving(&self, conn_id: usize) {
        if let Some(handle) = self.receiving.lock().remove(&conn_id) {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;

    struct FakeConnection {
        incoming: tokio::sync::Mutex<tokio::sync::mpsc::Receiver<WireEvent>>,
    }

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
            self.incoming
                .lock()
                .await
                .recv()
                .await
                .ok_or(ConnectionError::Closed)
        }
        async fn close(&self) -> Result<(), ConnectionError> {
            Ok(())
        }
    }

    fn make_dispatcher() -> Dispatcher<FakeConnection> {
        let pool = Arc::new(Pool::new(PoolConfig::new("p"), || FakeConnection {
            incoming: tokio::sync::Mutex::new(tokio::sync::mpsc::channel(1).1),
        }));
        Dispatcher::new(pool, EventBus::new())
    }

    #[tokio::test]
    async fn connect_announces_once_per_connection() {
        let dispatcher = make_dispatcher();
        let mut rx = dispatcher.events().subscribe();
        dispatcher.connect(None).await.unwrap();
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, RuntimeEvent::OnConnect { .. }));
    }

    #[tokio::test]
    async fn publish_emits_on_publish_event() {
        let dispatcher = make_dispatcher();
        let mut rx = dispatcher.events().subscribe();
        dispatcher
            .dispatch(
                None,
                Operation::Publish {
                    topic: "a/b".to_string(),
                    payload: b"hi".to_vec(),
                    qos: Qos::AtMostOnce,
                    retain: false,
                },
            )
            .await
            .unwrap();

        let mut saw_publish = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, RuntimeEvent::OnPublish(_)) {
                saw_publish = true;
            }
        }
        assert!(saw_publish);
    }

    #[tokio::test]
    async fn subscribe_emits_on_subscribe_with_resolved_topic() {
        let dispatcher = make_dispatcher();
        let mut rx = dispatcher.events().subscribe();
        dispatcher
            .dispatch(None, Operation::Subscribe(TopicConfig::new("a/b").shared("g")))
            .await
            .unwrap();

        let mut found = None;
        while let Ok(event) = rx.try_recv() {
            if let RuntimeEvent::OnSubscribe { topic, .. } = event {
                found = Some(topic);
            }
        }
        assert_eq!(found.as_deref(), Some("$share/g/a/b"));
    }

    #[tokio::test]
    async fn unsubscribing_last_topic_stops_the_receive_loop() {
        let dispatcher = make_dispatcher();
        dispatcher
            .dispatch(None, Operation::Subscribe(TopicConfig::new("a/b")))
            .await
            .unwrap();
        let conn_id = *dispatcher.receiving.lock().keys().next().unwrap();
        assert!(!dispatcher.receiving.lock()[&conn_id].is_finished());

        dispatcher
            .dispatch(None, Operation::Unsubscribe { topic: "a/b".to_string() })
            .await
            .unwrap();

        assert!(!dispatcher.receiving.lock().contains_key(&conn_id));
    }

    #[tokio::test]
    async fn multi_sub_subscribes_once_per_worker() {
        let pool = Arc::new(Pool::new(
            PoolConfig::new("p").max_connections(8),
            || FakeConnection {
                incoming: tokio::sync::Mutex::new(tokio::sync::mpsc::channel(1).1),
            },
        ));
        let dispatcher = Dispatcher::new(Arc::clone(&pool), EventBus::new());
        dispatcher
            .dispatch(None, Operation::Subscribe(TopicConfig::new("a/b").multi_sub(3)))
            .await
            .unwrap();
        assert_eq!(pool.connection_count().await, 3);
    }
}
