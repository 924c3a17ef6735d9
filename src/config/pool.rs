// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pool configuration (§3 `PoolConfig`, §4.11).

use std::time::Duration;

use crate::error::ConfigError;

/// Configuration for a single [`crate::pool::Pool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Logical name of the pool, used as the `pool` tag on every [`crate::Message`].
    pub name: String,
    /// Minimum number of connections to keep warm.
    pub min_connections: usize,
    /// Maximum number of live connections this pool will ever hold.
    pub max_connections: usize,
    /// How long an idle connection may sit in the free list before eviction.
    pub max_idle_time: Duration,
    /// How long `acquire` will wait for a free/new connection before `PoolExhausted`.
    pub connect_timeout: Duration,
    /// Interval at which the pool pings idle connections to keep them alive.
    pub heartbeat_interval: Duration,
}

impl PoolConfig {
    /// Creates a pool config with the given name and otherwise sane defaults.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min_connections: 0,
            max_connections: 4,
            max_idle_time: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(30),
        }
    }

    /// Sets `min_connections`.
    #[must_use]
    pub fn min_connections(mut self, n: usize) -> Self {
        self.min_connections = n;
        self
    }

    /// Sets `max_connections`.
    #[must_use]
    pub fn max_connections(mut self, n: usize) -> Self {
        self.max_connections = n;
        self
    }

    /// Sets `max_idle_time`.
    #[must_use]
    pub fn max_idle_time(mut self, d: Duration) -> Self {
        self.max_idle_time = d;
        self
    }

    /// Sets `connect_timeout`.
    #[must_use]
    pub fn connect_timeout(mut self, d: Duration) -> Self {
        self.connect_timeout = d;
        self
    }

    /// Sets `heartbeat_interval`.
    #[must_use]
    pub fn heartbeat_interval(mut self, d: Duration) -> Self {
        self.heartbeat_interval = d;
        self
    }

    /// Validates the invariants from §3/§4.11:
    /// `min_connections <= max_connections`, and all timeouts are positive.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPool`] on violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_connections > self.max_connections {
            return Err(ConfigError::InvalidPool(format!(
                "pool '{}': min_connections ({}) exceeds max_connections ({})",
                self.name, self.min_connections, self.max_connections
            )));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::InvalidPool(format!(
                "pool '{}': connect_timeout must be > 0",
                self.name
            )));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::InvalidPool(format!(
                "pool '{}': heartbeat_interval must be > 0",
                self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = PoolConfig::new("primary");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn min_exceeding_max_is_rejected() {
        let cfg = PoolConfig::new("primary")
            .min_connections(10)
            .max_connections(2);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidPool(_))
        ));
    }

    #[test]
    fn zero_connect_timeout_is_rejected() {
        let cfg = PoolConfig::new("primary").connect_timeout(Duration::ZERO);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_heartbeat_is_rejected() {
        let cfg = PoolConfig::new("primary").heartbeat_interval(Duration::ZERO);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn builder_chain() {
        let cfg = PoolConfig::new("p")
            .min_connections(1)
            .max_connections(5)
            .connect_timeout(Duration::from_secs(2));
        assert_eq!(cfg.min_connections, 1);
        assert_eq!(cfg.max_connections, 5);
        assert_eq!(cfg.connect_timeout, Duration::from_secs(2));
    }
}
