// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the MQTT runtime.
//!
//! Errors are layered the same way across every subsystem: a small
//! `thiserror` enum per component, wrapped by the umbrella [`Error`] so
//! callers that don't care which subsystem failed can use `?` against
//! a single type.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration value failed validation.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The connection pool could not satisfy a request.
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),

    /// A connection-level protocol failure.
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// A filter expression failed to compile.
    #[error("filter error: {0}")]
    Filter(#[from] FilterError),

    /// The shell transport to the debug tap failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// An operation name was not one of the dispatcher's known operations.
    #[error("invalid method: {0}")]
    InvalidMethod(String),
}

/// Errors raised while validating [`crate::config`] values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// `min_connections` exceeded `max_connections`, or similar ordering violations.
    #[error("invalid pool config: {0}")]
    InvalidPool(String),

    /// A `TopicConfig` resolved to an empty topic, or combined `multi_sub`
    /// with a zero count.
    #[error("invalid topic config: {0}")]
    InvalidTopic(String),

    /// A shell tunable was out of range (e.g. a negative buffer size).
    #[error("invalid shell config: {0}")]
    InvalidShell(String),
}

/// Errors raised by the connection pool (§4.2).
#[derive(Debug, Error)]
pub enum PoolError {
    /// No connection became available before `connect_timeout` elapsed.
    #[error("pool '{0}' exhausted: no connection available within timeout")]
    Exhausted(String),

    /// The pool is shutting down and will not serve new acquisitions.
    #[error("pool '{0}' is closing")]
    Closing(String),

    /// The underlying transport failed to establish a new connection.
    #[error("failed to connect pool '{pool}': {source}")]
    ConnectFailed {
        /// Name of the pool that failed to grow.
        pool: String,
        /// The underlying error.
        #[source]
        source: ConnectionError,
    },
}

/// Errors raised by an individual connection (§4.2, §7).
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The underlying MQTT session reported a failure on an outbound call
    /// (publish/subscribe/unsubscribe/disconnect).
    #[error("MQTT protocol error: {0}")]
    Protocol(#[from] rumqttc::ClientError),

    /// The event loop failed while polling for the next inbound packet.
    #[error("MQTT connection error: {0}")]
    EventLoop(#[from] rumqttc::ConnectionError),

    /// The connection was already closed when the operation was attempted.
    #[error("connection closed")]
    Closed,

    /// A publish with QoS 1/2 was not acknowledged within the configured timeout.
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The broker address could not be parsed.
    #[error("invalid broker address: {0}")]
    InvalidAddress(String),
}

/// Errors raised while compiling a filter or rule expression (§4.7, §7).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("parse error at position {pos}: {message}")]
pub struct FilterError {
    /// Byte offset into the source text where the error was detected.
    pub pos: usize,
    /// Human-readable description of the problem.
    pub message: String,
}

impl FilterError {
    /// Builds a parse error at the given position.
    #[must_use]
    pub fn new(pos: usize, message: impl Into<String>) -> Self {
        Self {
            pos,
            message: message.into(),
        }
    }
}

/// Errors raised by the shell's transport to the debug tap (§4.6, §7).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport has not completed a handshake with the tap yet.
    #[error("not connected to tap")]
    NotConnected,

    /// A line from the tap could not be decoded as a JSON frame.
    #[error("frame error: {0}")]
    Frame(String),

    /// The underlying socket failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvalidPool("min > max".to_string());
        assert_eq!(err.to_string(), "invalid pool config: min > max");
    }

    #[test]
    fn filter_error_display() {
        let err = FilterError::new(5, "unexpected token");
        assert_eq!(
            err.to_string(),
            "parse error at position 5: unexpected token"
        );
    }

    #[test]
    fn pool_error_display() {
        let err = PoolError::Exhausted("broker-a".to_string());
        assert_eq!(
            err.to_string(),
            "pool 'broker-a' exhausted: no connection available within timeout"
        );
    }

    #[test]
    fn error_from_config_error() {
        let config_err = ConfigError::InvalidShell("negative buffer".to_string());
        let err: Error = config_err.into();
        assert!(matches!(err, Error::Config(ConfigError::InvalidShell(_))));
    }
}
