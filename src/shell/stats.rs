// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Rolling statistics (C10, §4.9).
//!
//! Counts messages in/out/errors/subscribes/disconnects, keeps a
//! per-topic tally and a QoS histogram, and maintains two rolling
//! windows: a per-second rate window (over [`ShellConfig::rate_window_seconds`])
//! and a latency sample ring (over [`ShellConfig::latency_window_size`]).

use std::collections::{HashMap, VecDeque};

use chrono::Utc;

use crate::config::ShellConfig;
use crate::message::{Direction, Message};

/// A `[start, end)` bucket of the latency histogram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramBucket {
    /// Inclusive lower bound, in milliseconds.
    pub range_start: f64,
    /// Exclusive upper bound, in milliseconds.
    pub range_end: f64,
    /// Number of samples falling in this bucket.
    pub count: usize,
}

/// Summary of the latency sample ring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySummary {
    /// Minimum observed latency, in milliseconds.
    pub min: f64,
    /// Maximum observed latency, in milliseconds.
    pub max: f64,
    /// Arithmetic mean, in milliseconds.
    pub avg: f64,
}

/// Rolling runtime statistics.
#[derive(Debug, Clone)]
pub struct Stats {
    total: u64,
    incoming: u64,
    outgoing: u64,
    errors: u64,
    subscribes: u64,
    disconnects: u64,
    per_topic: HashMap<String, u64>,
    qos_histogram: [u64; 3],
    rate_window_seconds: i64,
    rate_buckets: VecDeque<(i64, u64)>,
    latency_window_size: usize,
    latencies: VecDeque<f64>,
    histogram_buckets: usize,
}

impl Stats {
    /// Builds an empty `Stats` sized per `config`.
    #[must_use]
    pub fn new(config: &ShellConfig) -> Self {
        Self {
            total: 0,
            incoming: 0,
            outgoing: 0,
            errors: 0,
            subscribes: 0,
            disconnects: 0,
            per_topic: HashMap::new(),
            qos_histogram: [0; 3],
            rate_window_seconds: config.rate_window_seconds as i64,
            rate_buckets: VecDeque::new(),
            latency_window_size: config.latency_window_size,
            latencies: VecDeque::new(),
            histogram_buckets: config.histogram_buckets,
        }
    }

    /// Records a publish message crossing the runtime, in either direction.
    pub fn record_message(&mut self, message: &Message) {
        self.total += 1;
        match message.direction() {
            Direction::Incoming => self.incoming += 1,
            Direction::Outgoing => self.outgoing += 1,
            Direction::Internal => {}
        }
        if let Some(topic) = message.topic() {
            *self.per_topic.entry(topic.to_string()).or_insert(0) += 1;
        }
        self.qos_histogram[message.qos().as_u8() as usize] += 1;
        self.push_rate_sample(message.timestamp().timestamp());
    }

    /// Records a connection-level error.
    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    /// Records a successful subscribe.
    pub fn record_subscribe(&mut self) {
        self.subscribes += 1;
    }

    /// Records a disconnect.
    pub fn record_disconnect(&mut self) {
        self.disconnects += 1;
    }

    /// Records a round-trip latency sample, in milliseconds.
    pub fn record_latency(&mut self, millis: f64) {
        self.latencies.push_back(millis);
        while self.latencies.len() > self.latency_window_size {
            self.latencies.pop_front();
        }
    }

    fn push_rate_sample(&mut self, epoch_second: i64) {
        match self.rate_buckets.back_mut() {
            Some((bucket_second, count)) if *bucket_second == epoch_second => *count += 1,
            _ => self.rate_buckets.push_back((epoch_second, 1)),
        }
        self.prune_rate_buckets(epoch_second);
    }

    fn prune_rate_buckets(&mut self, now_epoch: i64) {
        let cutoff = now_epoch - self.rate_window_seconds;
        while matches!(self.rate_buckets.front(), Some((second, _)) if *second <= cutoff) {
            self.rate_buckets.pop_front();
        }
    }

    /// The total message count.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Inbound message count.
    #[must_use]
    pub fn incoming(&self) -> u64 {
        self.incoming
    }

    /// Outbound message count.
    #[must_use]
    pub fn outgoing(&self) -> u64 {
        self.outgoing
    }

    /// Error count.
    #[must_use]
    pub fn errors(&self) -> u64 {
        self.errors
    }

    /// Subscribe count.
    #[must_use]
    pub fn subscribes(&self) -> u64 {
        self.subscribes
    }

    /// Disconnect count.
    #[must_use]
    pub fn disconnects(&self) -> u64 {
        self.disconnects
    }

    /// The QoS histogram, indexed by level (0/1/2).
    #[must_use]
    pub fn qos_histogram(&self) -> [u64; 3] {
        self.qos_histogram
    }

    /// The `n` busiest topics by message count, descending.
    #[must_use]
    pub fn top_topics(&self, n: usize) -> Vec<(String, u64)> {
        let mut topics: Vec<(String, u64)> =
            self.per_topic.iter().map(|(k, v)| (k.clone(), *v)).collect();
        topics.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        topics.truncate(n);
        topics
    }

    /// Messages per second over the rolling rate window, as of now.
    #[must_use]
    pub fn rate_per_second(&self) -> f64 {
        let now = Utc::now().timestamp();
        let cutoff = now - self.rate_window_seconds;
        let sum: u64 = self
            .rate_buckets
            .iter()
            .filter(|(second, _)| *second > cutoff)
            .map(|(_, count)| *count)
            .sum();
        sum as f64 / self.rate_window_seconds as f64
    }

    /// Summary statistics over the latency sample ring.
    #[must_use]
    pub fn latency_summary(&self) -> Option<LatencySummary> {
        if self.latencies.is_empty() {
            return None;
        }
        let min = self.latencies.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.latencies.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = self.latencies.iter().sum::<f64>() / self.latencies.len() as f64;
        Some(LatencySummary { min, max, avg })
    }

    /// An equal-width histogram over the latency sample ring.
    #[must_use]
    pub fn latency_histogram(&self) -> Vec<HistogramBucket> {
        let Some(summary) = self.latency_summary() else {
            return Vec::new();
        };
        let span = (summary.max - summary.min).max(f64::EPSILON);
        let width = span / self.histogram_buckets as f64;
        let mut buckets: Vec<HistogramBucket> = (0..self.histogram_buckets)
            .map(|i| HistogramBucket {
                range_start: summary.min + width * i as f64,
                range_end: summary.min + width * (i + 1) as f64,
                count: 0,
            })
            .collect();
        for &sample in &self.latencies {
            let idx = (((sample - summary.min) / width) as usize).min(self.histogram_buckets - 1);
            buckets[idx].count += 1;
        }
        buckets
    }

    /// Clears every counter and window.
    pub fn reset(&mut self) {
        self.total = 0;
        self.incoming = 0;
        self.outgoing = 0;
        self.errors = 0;
        self.subscribes = 0;
        self.disconnects = 0;
        self.per_topic.clear();
        self.qos_histogram = [0; 3];
        self.rate_buckets.clear();
        self.latencies.clear();
    }
}
