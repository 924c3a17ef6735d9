// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The streaming shell: a live view over the debug tap's mirrored
//! traffic, with a SQL-like filter engine (C8), a rule engine (C9),
//! rolling statistics and visualizations (C10), and saved presets plus
//! message history (C11).

pub mod command;
pub mod filter;
pub mod history;
pub mod presets;
pub mod rule;
pub mod stats;
pub mod timeline;
pub mod tree;
pub mod transport;

pub use command::{CommandError, OutputFormat, RuleActionSpec, RuleSpec, ShellCommand, parse_command};
pub use filter::{FilterExpression, FilterValue, Joiner, Op, Predicate};
pub use history::{HistoryEntry, MessageHistory};
pub use presets::Presets;
pub use rule::{NullRuleSink, Rule, RuleAction, RuleSink, SelectField};
pub use stats::{HistogramBucket, LatencySummary, Stats};
pub use timeline::FlowTimeline;
pub use tree::TopicTree;
pub use transport::ShellTransport;
