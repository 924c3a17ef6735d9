// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Declarative subscription configuration (§3 `TopicConfig`, §4.4, §4.11).

use crate::error::ConfigError;
use crate::message::Qos;

/// A declarative subscription spec consumed by auto-wire (C4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicConfig {
    /// The base topic filter (e.g. `sensors/+/temp`).
    pub topic: String,
    /// QoS to subscribe at.
    pub qos: Qos,
    /// Whether to wrap `topic` in a `$share/<group>/` shared subscription.
    pub enable_shared: bool,
    /// Group name for a shared subscription; required when `enable_shared`.
    pub group_name: String,
    /// Whether to wrap `topic` in a `$queue/` subscription (overrides `enable_shared`).
    pub enable_queue: bool,
    /// Whether to fan this subscription out across `multi_sub` workers.
    pub enable_multi_sub: bool,
    /// Worker count when `enable_multi_sub` is set; must be >= 1.
    pub multi_sub: usize,
}

impl TopicConfig {
    /// Creates a plain (non-shared, non-queue) topic config.
    #[must_use]
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            qos: Qos::AtMostOnce,
            enable_shared: false,
            group_name: String::new(),
            enable_queue: false,
            enable_multi_sub: false,
            multi_sub: 1,
        }
    }

    /// Sets the QoS level.
    #[must_use]
    pub fn qos(mut self, qos: Qos) -> Self {
        self.qos = qos;
        self
    }

    /// Enables a shared subscription under the given group.
    #[must_use]
    pub fn shared(mut self, group_name: impl Into<String>) -> Self {
        self.enable_shared = true;
        self.group_name = group_name.into();
        self
    }

    /// Enables a `$queue/` subscription.
    #[must_use]
    pub fn queue(mut self) -> Self {
        self.enable_queue = true;
        self
    }

    /// Enables multi-subscriber fan-out with the given worker count.
    #[must_use]
    pub fn multi_sub(mut self, count: usize) -> Self {
        self.enable_multi_sub = true;
        self.multi_sub = count;
        self
    }

    /// Resolves the effective subscription topic per §3's invariant:
    /// queue overrides shared; plain otherwise.
    #[must_use]
    pub fn resolve(&self) -> ResolvedTopic {
        let effective = if self.enable_queue {
            format!("$queue/{}", self.topic)
        } else if self.enable_shared {
            format!("$share/{}/{}", self.group_name, self.topic)
        } else {
            self.topic.clone()
        };
        ResolvedTopic {
            effective,
            qos: self.qos,
            base_topic: self.topic.clone(),
        }
    }

    /// Validates invariants from §3/§4.11:
    /// - `resolve()` is non-empty
    /// - `multi_sub >= 1` when `enable_multi_sub`
    /// - a shared subscription requires a non-empty `group_name`
    ///
    /// Queue and shared are mutually exclusive; queue wins, with a
    /// [`tracing::warn!`] emitted rather than an error (§4.11).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTopic`] on violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.topic.trim().is_empty() {
            return Err(ConfigError::InvalidTopic(
                "topic must not be empty".to_string(),
            ));
        }
        if self.enable_shared && self.group_name.trim().is_empty() {
            return Err(ConfigError::InvalidTopic(format!(
                "topic '{}': enable_shared requires a non-empty group_name",
                self.topic
            )));
        }
        if self.enable_multi_sub && self.multi_sub < 1 {
            return Err(ConfigError::InvalidTopic(format!(
                "topic '{}': multi_sub must be >= 1 when enable_multi_sub is set",
                self.topic
            )));
        }
        if self.enable_queue && self.enable_shared {
            tracing::warn!(
                topic = %self.topic,
                "topic config sets both enable_queue and enable_shared; queue wins"
            );
        }
        Ok(())
    }
}

/// The resolved subscription topic and QoS a [`TopicConfig`] produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTopic {
    /// The literal MQTT subscription filter (`<t>`, `$share/<g>/<t>`, or `$queue/<t>`).
    pub effective: String,
    /// QoS to subscribe at.
    pub qos: Qos,
    /// The original, un-prefixed topic filter.
    pub base_topic: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_topic_resolves_unchanged() {
        let resolved = TopicConfig::new("a/b").resolve();
        assert_eq!(resolved.effective, "a/b");
    }

    #[test]
    fn shared_topic_resolves_with_group_prefix() {
        let resolved = TopicConfig::new("t").shared("g").resolve();
        assert_eq!(resolved.effective, "$share/g/t");
    }

    #[test]
    fn queue_topic_resolves_with_queue_prefix() {
        let resolved = TopicConfig::new("t").queue().resolve();
        assert_eq!(resolved.effective, "$queue/t");
    }

    #[test]
    fn queue_overrides_shared() {
        let cfg = TopicConfig::new("t").shared("g").queue();
        assert_eq!(cfg.resolve().effective, "$queue/t");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn shared_without_group_is_rejected() {
        let mut cfg = TopicConfig::new("t");
        cfg.enable_shared = true;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidTopic(_))
        ));
    }

    #[test]
    fn empty_topic_is_rejected() {
        let cfg = TopicConfig::new("   ");
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn multi_sub_zero_is_rejected() {
        let mut cfg = TopicConfig::new("t").multi_sub(3);
        cfg.multi_sub = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn multi_sub_builder_sets_count() {
        let cfg = TopicConfig::new("t").multi_sub(3);
        assert!(cfg.enable_multi_sub);
        assert_eq!(cfg.multi_sub, 3);
        assert!(cfg.validate().is_ok());
    }
}
