// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `mqtt_loom` - a coroutine-aware MQTT 5 client runtime.
//!
//! Pooled, context-affine connections; declarative auto-wired
//! subscriptions; an event bus every subsystem publishes to; a
//! Unix-domain-socket debug tap that mirrors live traffic as JSON; and
//! a shell layer on top - a SQL-like filter engine, a rule engine, live
//! statistics and visualizations, saved presets, and message history.
//!
//! # Layout
//!
//! - [`topic`] - MQTT wildcard matching (`+`, `#`, `$share`/`$queue`).
//! - [`config`] - validated configuration for pools, topics, clients, and the shell.
//! - [`wire`] - the [`wire::WireConnection`] trait wrapping the underlying MQTT transport.
//! - [`pool`] - context-affine, shared connection pooling.
//! - [`event`] - the broadcast [`event::EventBus`] every subsystem publishes to.
//! - [`dispatcher`] - acquires connections and runs publish/subscribe/unsubscribe operations.
//! - [`autowire`] - declarative, idempotent subscription wiring at startup.
//! - [`tap`] - the Unix-domain-socket debug tap.
//! - [`shell`] - filter/rule engines, stats, topic tree, flow timeline, presets, history.
//! - [`message`] - the transport-neutral [`message::Message`] record and its [`message::Context`] view.
//! - [`error`] - the crate's layered error types.
//!
//! # Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use mqtt_loom::config::{ClientConfig, PoolConfig};
//! use mqtt_loom::dispatcher::{Dispatcher, Operation};
//! use mqtt_loom::event::EventBus;
//! use mqtt_loom::pool::Pool;
//! use mqtt_loom::wire::RumqttcConnection;
//!
//! # async fn example() -> mqtt_loom::Result<()> {
//! let client_config = ClientConfig::new("localhost", 1883);
//! let pool = Arc::new(Pool::new(PoolConfig::new("default"), move || {
//!     RumqttcConnection::new(&client_config)
//! }));
//! let dispatcher = Dispatcher::new(pool, EventBus::new());
//! dispatcher
//!     .dispatch(
//!         None,
//!         Operation::Publish {
//!             topic: "sensors/r1/temp".to_string(),
//!             payload: b"{\"temperature\":32}".to_vec(),
//!             qos: mqtt_loom::message::Qos::AtLeastOnce,
//!             retain: false,
//!         },
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod autowire;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod message;
pub mod pool;
pub mod shell;
pub mod tap;
pub mod topic;
pub mod wire;

pub use error::{Error, Result};
