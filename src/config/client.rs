// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-connection client configuration (§3 `ClientConfig`).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Generates a client identifier for a new connection.
///
/// Invoked once per connection the pool creates, so that pooled
/// connections sharing a [`crate::config::PoolConfig`] don't collide on
/// the broker.
pub trait ClientIdProvider: Send + Sync {
    /// Returns a fresh client id.
    fn next_id(&self) -> String;
}

/// Default provider: `<prefix>-<random token>`.
pub struct PrefixedRandomId {
    prefix: String,
}

impl PrefixedRandomId {
    /// Creates a provider that prepends `prefix` to a random token.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl ClientIdProvider for PrefixedRandomId {
    fn next_id(&self) -> String {
        format!("{}-{}", self.prefix, uuid::Uuid::new_v4().simple())
    }
}

impl fmt::Debug for PrefixedRandomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefixedRandomId")
            .field("prefix", &self.prefix)
            .finish()
    }
}

/// Configuration for an individual MQTT connection (§3 `ClientConfig`).
#[derive(Clone)]
pub struct ClientConfig {
    /// Broker hostname or address.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Generates a client id for each new connection.
    pub client_id_provider: Arc<dyn ClientIdProvider>,
    /// MQTT keepalive interval.
    pub keepalive: Duration,
    /// Optional username/password credentials.
    pub auth: Option<(String, String)>,
    /// MQTT protocol level to negotiate.
    pub protocol: ProtocolLevel,
}

/// MQTT protocol version to negotiate on CONNECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolLevel {
    /// MQTT 3.1.1.
    V311,
    /// MQTT 5.0.
    V5,
}

impl ClientConfig {
    /// Creates a client config with a default `PrefixedRandomId` provider.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        Self {
            client_id_provider: Arc::new(PrefixedRandomId::new("mqtt-loom")),
            host,
            port,
            keepalive: Duration::from_secs(30),
            auth: None,
            protocol: ProtocolLevel::V5,
        }
    }

    /// Overrides the client id provider.
    #[must_use]
    pub fn client_id_provider(mut self, provider: Arc<dyn ClientIdProvider>) -> Self {
        self.client_id_provider = provider;
        self
    }

    /// Sets the keepalive interval.
    #[must_use]
    pub fn keepalive(mut self, keepalive: Duration) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// Sets username/password credentials.
    #[must_use]
    pub fn auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some((username.into(), password.into()));
        self
    }

    /// Sets the protocol level.
    #[must_use]
    pub fn protocol(mut self, protocol: ProtocolLevel) -> Self {
        self.protocol = protocol;
        self
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("keepalive", &self.keepalive)
            .field("protocol", &self.protocol)
            .field("has_auth", &self.auth.is_some())
            .finish()
    }
}
