// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shell tunables (§4.9, §4.10, §4.11, §6).

use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::ConfigError;

/// Validated, typed configuration for the shell's stats/history/tap
/// consumer (§4.11 "shell").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    /// Bound on the tap's per-subscriber channel before it drops a slow reader.
    pub channel_buffer_size: usize,
    /// Bound on the shell's own inbound message queue before it drops oldest.
    pub message_buffer: usize,
    /// Size of the rolling latency sample ring.
    pub latency_window_size: usize,
    /// Width, in seconds, of the rolling rate window.
    pub rate_window_seconds: usize,
    /// Number of equal-width buckets in the latency histogram.
    pub histogram_buckets: usize,
    /// Seconds of inactivity after which a topic tree node is no longer "hot".
    pub activity_timeout_seconds: u64,
    /// Max entries retained in the flow timeline ring.
    pub flow_timeline_limit: usize,
    /// Max chars of a payload preview shown in the flow timeline.
    pub payload_truncation: usize,
    /// Max entries retained in message history.
    pub message_history_limit: usize,
    /// Optional readline history file path (`~` is expanded to the home dir).
    pub history_file: Option<PathBuf>,
    /// Max lines kept in the readline history file.
    pub history_max_entries: usize,
    /// Shorthand aliases available to the legacy filter CLI layer.
    pub aliases: HashMap<String, String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: 256,
            message_buffer: 1_000,
            latency_window_size: 100,
            rate_window_seconds: 60,
            histogram_buckets: 10,
            activity_timeout_seconds: 30,
            flow_timeline_limit: 500,
            payload_truncation: 100,
            message_history_limit: 1_000,
            history_file: None,
            history_max_entries: 1_000,
            aliases: HashMap::new(),
        }
    }
}

impl ShellConfig {
    /// Sets the optional readline history file, expanding a leading `~`
    /// (or literal `$HOME`) to the user's home directory per §9's Open
    /// Question resolution (targets Unix-like platforms, matching the
    /// tap's Unix-domain-socket-only transport).
    #[must_use]
    pub fn with_history_file(mut self, raw_path: impl AsRef<str>) -> Self {
        self.history_file = Some(expand_home(raw_path.as_ref()));
        self
    }

    /// Validates that every numeric tunable is within its legal range
    /// (§4.11: "numeric tunables >= 0", which for `usize`/`u64` fields
    /// means simply constructible; the check here additionally rejects
    /// the degenerate zero-sized windows that would make a ring buffer
    /// unable to hold anything).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidShell`] on violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.histogram_buckets == 0 {
            return Err(ConfigError::InvalidShell(
                "histogram_buckets must be >= 1".to_string(),
            ));
        }
        if self.rate_window_seconds == 0 {
            return Err(ConfigError::InvalidShell(
                "rate_window_seconds must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expands a leading `~/` or literal `$HOME` prefix to the user's home
/// directory. Paths without either prefix pass through unchanged.
#[must_use]
pub fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if raw == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = raw.strip_prefix("$HOME/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}
