// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The connection pool (C2, §4.2).
//!
//! A [`Pool`] holds up to `max_connections` live [`WireConnection`]s in a
//! free list, handed out exclusively by [`Pool::acquire`] and returned by
//! [`Pool::release`] - the same checkout/return shape as the teacher's
//! `BrokerPool`, generalized with *context affinity* (§3, §9 Open
//! Question): a caller that passes the same `context` string on every
//! call is always routed back to the same underlying connection, and
//! `release` becomes a no-op for a context-bound connection rather than
//! returning it to the free list.
//!
//! When the pool is saturated (`max_connections` live, none free),
//! `acquire` blocks cooperatively until a connection is released or
//! `connect_timeout` elapses, whichever comes first, then fails with
//! [`PoolError::Exhausted`] (§4.2).
//!
//! Connections are created lazily, on first use, and idle ones beyond
//! `max_idle_time` are reaped by a background maintainer task down to
//! `min_connections`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex as SyncMutex;
use tokio::sync::{Mutex, Notify};
use tokio::time::MissedTickBehavior;

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::wire::WireConnection;

/// A single pooled connection plus the bookkeeping the pool needs to
/// decide when it's safe to evict.
pub struct PooledConnection<W> {
    id: usize,
    conn: W,
    last_used: SyncMutex<Instant>,
    active: AtomicBool,
}

impl<W: WireConnection> PooledConnection<W> {
    /// Stable identifier for this connection within its pool, used to
    /// correlate [`crate::dispatcher::Dispatcher`] affinity decisions
    /// with log output.
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Borrow the underlying wire connection.
    #[must_use]
    pub fn conn(&self) -> &W {
        &self.conn
    }

    /// Marks this connection inactive after a protocol error (§4.2): it
    /// is never handed out by a future `acquire` and is pruned from the
    /// pool's free list and affinity table on the next acquire or
    /// release call.
    pub fn mark_inactive(&self) {
        self.active.store(false, Ordering::Relaxed);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    fn touch(&self) {
        *self.last_used.lock() = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_used.lock().elapsed()
    }
}

struct PoolState<W> {
    /// Every connection the pool currently owns, keyed by id - whether
    /// free, checked out, or context-bound.
    connections: HashMap<usize, Arc<PooledConnection<W>>>,
    /// Ids of connections sitting in the free list, available for the
    /// next non-affine `acquire`.
    free: Vec<usize>,
    /// `context -> connection id` for context-bound checkouts (§3, §5).
    affinity: HashMap<String, usize>,
    closing: bool,
}

impl<W> PoolState<W> {
    fn is_bound(&self, id: usize) -> bool {
        self.affinity.values().any(|&bound| bound == id)
    }
}

/// A named pool of MQTT connections, checked out exclusively (§3 `Pool`, §4.2).
pub struct Pool<W: WireConnection> {
    name: String,
    config: PoolConfig,
    factory: Arc<dyn Fn() -> W + Send + Sync>,
    state: Mutex<PoolState<W>>,
    next_id: AtomicUsize,
    /// Signaled on every `release`/prune/close so a blocked `acquire`
    /// can re-check for a freed slot instead of polling.
    released: Notify,
}

impl<W: WireConnection + 'static> Pool<W> {
    /// Creates a new, empty pool. `factory` builds a fresh, not-yet-connected
    /// [`WireConnection`] each time the pool needs to grow.
    #[must_use]
    pub fn new(config: PoolConfig, factory: impl Fn() -> W + Send + Sync + 'static) -> Self {
        Self {
            name: config.name.clone(),
            config,
            factory: Arc::new(factory),
            state: Mutex::new(PoolState {
                connections: HashMap::new(),
                free: Vec::new(),
                affinity: HashMap::new(),
                closing: false,
            }),
            next_id: AtomicUsize::new(0),
            released: Notify::new(),
        }
    }

    /// The pool's logical name (the `pool` tag on every [`crate::Message`]).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Acquires a connection for `context`. Callers that pass the same
    /// `context` on every call are always routed to the same connection
    /// (§9 Open Question: affinity keyed by `(context, pool)`); `None`
    /// checks out any free connection, or grows the pool while under
    /// `max_connections`.
    ///
    /// When the pool is saturated with no free connection, blocks
    /// cooperatively until one is released, up to `connect_timeout`
    /// (§4.2, Testable Property 1).
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Closing`] if the pool has been shut down,
    /// [`PoolError::Exhausted`] if no connection became free (or could be
    /// established) within `connect_timeout`, or [`PoolError::ConnectFailed`]
    /// if the underlying transport reported a protocol failure.
    pub async fn acquire(
        &self,
        context: Option<&str>,
    ) -> Result<Arc<PooledConnection<W>>, PoolError> {
        let deadline = Instant::now() + self.config.connect_timeout;
        loop {
            let mut state = self.state.lock().await;
            if state.closing {
                return Err(PoolError::Closing(self.name.clone()));
            }
            self.prune_inactive(&mut state);

            if let Some(ctx) = context {
                if let Some(&id) = state.affinity.get(ctx) {
                    if let Some(conn) = state.connections.get(&id) {
                        conn.touch();
                        return Ok(Arc::clone(conn));
                    }
                    // The bound connection was evicted; fall through and re-bind.
                    state.affinity.remove(ctx);
                }
            }

            if let Some(id) = state.free.pop() {
                let conn = Arc::clone(&state.connections[&id]);
                conn.touch();
                if let Some(ctx) = context {
                    state.affinity.insert(ctx.to_string(), id);
                }
                return Ok(conn);
            }

            if state.connections.len() < self.config.max_connections {
                let conn = self.connect_one().await?;
                state.connections.insert(conn.id(), Arc::clone(&conn));
                if let Some(ctx) = context {
                    state.affinity.insert(ctx.to_string(), conn.id());
                }
                return Ok(conn);
            }

            // Saturated with nothing free: wait for a release or close,
            // bounded by the time remaining until `connect_timeout`. The
            // `notified()` future is registered while still holding the
            // state lock so a concurrent `release` (which also needs the
            // lock) cannot slip a notification in before we start waiting.
            let notified = self.released.notified();
            drop(state);

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(PoolError::Exhausted(self.name.clone()));
            }
            if tokio::time::timeout(remaining, notified).await.is_err() {
                return Err(PoolError::Exhausted(self.name.clone()));
            }
        }
    }

    /// Returns `conn` to the pool (§3, §4.2).
    ///
    /// Idempotent. A no-op if `conn` is context-bound (it stays checked
    /// out until the owning context releases the binding) or if it's
    /// already back in the free list. An inactive connection is instead
    /// discarded outright - removed from the pool so the next `acquire`
    /// grows a fresh replacement rather than handing out a dead
    /// connection (§4.2 "a connection that errors on a protocol call…
    /// must not be returned to the free list").
    pub async fn release(&self, conn: &Arc<PooledConnection<W>>) {
        let mut state = self.state.lock().await;
        let id = conn.id();
        if !state.connections.contains_key(&id) {
            return; // already discarded (e.g. pruned, or pool closed)
        }
        if state.is_bound(id) {
            return; // context-bound: release never closes it mid-call
        }
        if !conn.is_active() {
            state.connections.remove(&id);
            state.free.retain(|&free_id| free_id != id);
        } else if !state.free.contains(&id) {
            state.free.push(id);
        } else {
            return; // already free: idempotent no-op, nothing changed
        }
        drop(state);
        self.released.notify_waiters();
    }

    /// Drops connections a receive loop has marked inactive (§4.2) from
    /// the free list and affinity table, so a subsequent acquire grows a
    /// fresh replacement rather than handing out a dead connection.
    fn prune_inactive(&self, state: &mut PoolState<W>) {
        let dead: Vec<usize> = state
            .connections
            .iter()
            .filter(|(_, conn)| !conn.is_active())
            .map(|(&id, _)| id)
            .collect();
        if dead.is_empty() {
            return;
        }
        for id in &dead {
            state.connections.remove(id);
        }
        state.free.retain(|id| !dead.contains(id));
        state.affinity.retain(|_, id| !dead.contains(id));
        tracing::debug!(pool = %self.name, removed = dead.len(), "pruned inactive connections");
    }

    async fn connect_one(&self) -> Result<Arc<PooledConnection<W>>, PoolError> {
        let wire = (self.factory)();
        let result = tokio::time::timeout(self.config.connect_timeout, wire.connect(true, None)).await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(source)) => {
                return Err(PoolError::ConnectFailed {
                    pool: self.name.clone(),
                    source,
                });
            }
            Err(_) => return Err(PoolError::Exhausted(self.name.clone())),
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(pool = %self.name, connection_id = id, "connection established");
        Ok(Arc::new(PooledConnection {
            id,
            conn: wire,
            last_used: SyncMutex::new(Instant::now()),
            active: AtomicBool::new(true),
        }))
    }

    /// Returns the number of live connections currently held by the pool
    /// (in-use, free, and context-bound combined).
    pub async fn connection_count(&self) -> usize {
        self.state.lock().await.connections.len()
    }

    /// Releases the context→connection binding for `context`, if any,
    /// without closing the underlying connection. The connection itself
    /// is *not* placed back in the free list by this call; a subsequent
    /// [`Pool::release`] is still required to make it available to other
    /// callers.
    pub async fn release_affinity(&self, context: &str) {
        self.state.lock().await.affinity.remove(context);
    }

    /// Closes every connection and marks the pool as no longer accepting
    /// new `acquire` calls. Any `acquire` blocked on saturation wakes and
    /// observes [`PoolError::Closing`].
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.closing = true;
        for (_, conn) in state.connections.drain() {
            if let Err(error) = conn.conn.close().await {
                tracing::warn!(pool = %self.name, connection_id = conn.id, %error, "error closing connection");
            }
        }
        state.free.clear();
        state.affinity.clear();
        drop(state);
        self.released.notify_waiters();
    }

    /// Spawns the background maintainer that evicts free connections idle
    /// for longer than `max_idle_time`, down to `min_connections` (§4.2).
    /// Returns a handle the caller should keep to cancel it via `abort`.
    pub fn spawn_maintainer(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(pool.config.heartbeat_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                pool.reap_idle().await;
            }
        })
    }

    async fn reap_idle(&self) {
        let mut state = self.state.lock().await;
        if state.closing {
            return;
        }
        let min = self.config.min_connections;
        let max_idle = self.config.max_idle_time;

        let candidates = std::mem::take(&mut state.free);
        let mut survivors = Vec::with_capacity(candidates.len());
        let mut evicted = 0usize;
        for id in candidates {
            let Some(conn) = state.connections.get(&id).cloned() else {
                continue;
            };
            let evictable = conn.idle_for() > max_idle;
            if evictable && state.connections.len() - evicted > min {
                evicted += 1;
                state.connections.remove(&id);
                tracing::debug!(pool = %self.name, connection_id = id, "reaping idle connection");
                if let Err(error) = conn.conn.close().await {
                    tracing::warn!(pool = %self.name, connection_id = id, %error, "error closing idle connection");
                }
            } else {
                survivors.push(id);
            }
        }
        state.free = survivors;
        if evicted > 0 {
            drop(state);
            self.released.notify_waiters();
        }
    }
}
