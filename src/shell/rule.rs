// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The rule engine (C9, §4.8).
//!
//! A [`Rule`] is a `SELECT … FROM … WHERE … DO …` statement: a topic
//! gate, an optional filter, a projection into a flat output row, and
//! an ordered list of actions. A rule that doesn't match produces
//! nothing; one that does runs every action even if an earlier one
//! fails - a failure is reported via [`RuntimeEvent::RuleActionError`]
//! rather than aborting the remaining actions (§4.8, §5).

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::event::{EventBus, RuntimeEvent};
use crate::message::Message;
use crate::shell::filter::FilterExpression;

/// One entry of a rule's `SELECT` list: a dotted/indexed context path
/// and the key it's projected under in the output row.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectField {
    /// The path resolved against the message's [`crate::message::Context`].
    pub path: String,
    /// The key this field is written under in the projected row.
    pub alias: String,
}

impl SelectField {
    /// Builds a select field projected under its own last path segment
    /// (`payload.temperature` projects as `temperature`).
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let alias = default_alias(&path);
        Self { path, alias }
    }

    /// Builds a select field projected under an explicit alias.
    #[must_use]
    pub fn aliased(path: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            alias: alias.into(),
        }
    }
}

fn default_alias(path: &str) -> String {
    let last = path.rsplit('.').next().unwrap_or(path);
    last.split('[').next().unwrap_or(last).to_string()
}

/// Parses a comma-separated `SELECT` list, each entry of the shape
/// `path` or `path as alias` (`as` case-insensitive).
#[must_use]
pub fn parse_select_list(source: &str) -> Vec<SelectField> {
    source
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_select_entry)
        .collect()
}

fn parse_select_entry(entry: &str) -> SelectField {
    let lower = entry.to_ascii_lowercase();
    if let Some(idx) = lower.find(" as ") {
        let path = entry[..idx].trim();
        let alias = entry[idx + 4..].trim();
        SelectField::aliased(path, alias)
    } else {
        SelectField::new(entry.trim())
    }
}

/// An action a matching rule invokes, in order (§4.8).
#[derive(Debug, Clone, PartialEq)]
pub enum RuleAction {
    /// Appends the projected row, wrapped as `{timestamp, topic, data}`,
    /// as a JSON line to a file (§8 S4).
    LogToFile(PathBuf),
    /// Forwards the projected row to another topic via a [`RuleSink`].
    ForwardToTopic(String),
}

/// Executes the side-effecting half of a rule's `DO` clause. The core
/// crate only knows how to append JSON lines to a file; forwarding to a
/// topic needs a host-supplied sink wired back to a running
/// [`crate::dispatcher::Dispatcher`] (§1 "framework glue… out of scope").
#[allow(async_fn_in_trait)]
pub trait RuleSink: Send + Sync {
    /// Forwards `row` to `topic`.
    async fn forward(&self, topic: &str, row: &Value) -> Result<(), String>;
}

/// A [`RuleSink`] that rejects every forward; used when no sink is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRuleSink;

impl RuleSink for NullRuleSink {
    async fn forward(&self, topic: &str, _row: &Value) -> Result<(), String> {
        Err(format!("no sink configured to forward to '{topic}'"))
    }
}

/// A single `SELECT … FROM … WHERE … DO …` rule (§3, §4.8).
#[derive(Debug, Clone)]
pub struct Rule {
    /// The rule's name, used in [`RuntimeEvent::RuleActionError`] and the
    /// `rule` CLI surface.
    pub name: String,
    /// Whether the rule participates in evaluation at all.
    pub enabled: bool,
    /// The `SELECT` projection.
    pub select_fields: Vec<SelectField>,
    /// The `FROM` topic gate (may itself contain `+`/`#`).
    pub from_topic: String,
    /// The optional `WHERE` filter.
    pub where_clause: Option<FilterExpression>,
    /// The `DO` action list, run in order.
    pub actions: Vec<RuleAction>,
}

impl Rule {
    /// Builds a new, enabled rule with an empty projection and no actions.
    #[must_use]
    pub fn new(name: impl Into<String>, from_topic: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            select_fields: Vec::new(),
            from_topic: from_topic.into(),
            where_clause: None,
            actions: Vec::new(),
        }
    }

    /// Sets the `SELECT` projection.
    #[must_use]
    pub fn select(mut self, fields: Vec<SelectField>) -> Self {
        self.select_fields = fields;
        self
    }

    /// Sets the `WHERE` filter.
    #[must_use]
    pub fn where_clause(mut self, filter: FilterExpression) -> Self {
        self.where_clause = Some(filter);
        self
    }

    /// Appends a `DO` action.
    #[must_use]
    pub fn action(mut self, action: RuleAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Disables the rule; it will be skipped by [`run_rule`].
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    fn project(&self, ctx: &crate::message::Context) -> Value {
        if self.select_fields.is_empty() {
            return Value::Object(ctx.fields().clone());
        }
        let mut row = serde_json::Map::new();
        for field in &self.select_fields {
            row.insert(field.alias.clone(), ctx.resolve(&field.path));
        }
        Value::Object(row)
    }
}

/// Evaluates `rule` against `message`, running its actions through
/// `sink` if it matches. Returns the projected row on a match, `None`
/// if the rule was disabled, didn't match the topic gate, or its
/// `WHERE` clause rejected the message.
///
/// Action failures never stop evaluation: each is reported as a
/// [`RuntimeEvent::RuleActionError`] on `bus` and the remaining actions
/// still run (§4.8).
pub async fn run_rule<S: RuleSink>(
    rule: &Rule,
    message: &Message,
    sink: &S,
    bus: &EventBus,
) -> Option<Value> {
    if !rule.enabled {
        return None;
    }
    let topic = message.topic()?;
    if !crate::topic::matches(&rule.from_topic, topic) {
        return None;
    }
    let ctx = message.context();
    if let Some(where_clause) = &rule.where_clause {
        if !where_clause.matches(&ctx) {
            return None;
        }
    }
    let row = rule.project(&ctx);
    for action in &rule.actions {
        if let Err(error) = execute_action(action, &row, message, sink).await {
            bus.publish(RuntimeEvent::RuleActionError {
                rule: rule.name.clone(),
                message: error,
            });
        }
    }
    Some(row)
}

async fn execute_action<S: RuleSink>(
    action: &RuleAction,
    row: &Value,
    message: &Message,
    sink: &S,
) -> Result<(), String> {
    match action {
        RuleAction::LogToFile(path) => log_to_file(path, message, row).await,
        RuleAction::ForwardToTopic(topic) => sink.forward(topic, row).await,
    }
}

/// Appends `{timestamp, topic, data}` as one JSON line to `path` (§8 S4):
/// `data` is the rule's projected `SELECT` row, `timestamp`/`topic` come
/// from the matched message so a log line is self-describing without the
/// reader needing to cross-reference which rule produced it.
async fn log_to_file(path: &Path, message: &Message, row: &Value) -> Result<(), String> {
    let envelope = serde_json::json!({
        "timestamp": message.timestamp().to_rfc3339(),
        "topic": message.topic(),
        "data": row,
    });
    let line = envelope.to_string();
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|error| error.to_string())?;
        writeln!(file, "{line}").map_err(|error| error.to_string())
    })
    .await
    .map_err(|error| error.to_string())?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Direction, MessageType, Qos};
    use std::sync::Mutex;

    fn sample_message(topic: &str, payload: &str) -> Message {
        Message::builder(MessageType::Publish, Direction::Incoming)
            .topic(topic)
            .qos(Qos::AtLeastOnce)
            .payload(payload.as_bytes().to_vec())
            .build()
    }

    #[derive(Default)]
    struct RecordingSink {
        forwarded: Mutex<Vec<(String, Value)>>,
        fail_topics: Vec<String>,
    }

    impl RuleSink for RecordingSink {
        async fn forward(&self, topic: &str, row: &Value) -> Result<(), String> {
            if self.fail_topics.iter().any(|t| t == topic) {
                return Err(format!("forward to {topic} failed"));
            }
            self.forwarded.lock().unwrap().push((topic.to_string(), row.clone()));
            Ok(())
        }
    }

    #[test]
    fn parse_select_list_defaults_and_aliases() {
        let fields = parse_select_list("topic, payload.temperature as temp, qos");
        assert_eq!(fields[0], SelectField::new("topic"));
        assert_eq!(fields[1], SelectField::aliased("payload.temperature", "temp"));
        assert_eq!(fields[2], SelectField::new("qos"));
    }

    #[tokio::test]
    async fn disabled_rule_never_matches() {
        let rule = Rule::new("r", "a/b").disabled();
        let message = sample_message("a/b", "{}");
        let bus = EventBus::new();
        let result = run_rule(&rule, &message, &NullRuleSink, &bus).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn topic_mismatch_skips_the_rule() {
        let rule = Rule::new("r", "sensors/#");
        let message = sample_message("alerts/x", "{}");
        let bus = EventBus::new();
        let result = run_rule(&rule, &message, &NullRuleSink, &bus).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn where_clause_gates_the_match() {
        let rule = Rule::new("r", "sensors/#")
            .where_clause(FilterExpression::parse("payload.temperature > 30").unwrap());
        let bus = EventBus::new();

        let hot = sample_message("sensors/r1", r#"{"temperature":40}"#);
        assert!(run_rule(&rule, &hot, &NullRuleSink, &bus).await.is_some());

        let cool = sample_message("sensors/r1", r#"{"temperature":10}"#);
        assert!(run_rule(&rule, &cool, &NullRuleSink, &bus).await.is_none());
    }

    #[tokio::test]
    async fn matching_rule_projects_aliased_row() {
        let rule = Rule::new("r", "sensors/#").select(vec![
            SelectField::new("topic"),
            SelectField::aliased("payload.temperature", "temp"),
        ]);
        let message = sample_message("sensors/r1", r#"{"temperature":40}"#);
        let bus = EventBus::new();
        let row = run_rule(&rule, &message, &NullRuleSink, &bus).await.unwrap();
        assert_eq!(row["topic"], "sensors/r1");
        assert_eq!(row["temp"], 40);
    }

    #[tokio::test]
    async fn log_to_file_writes_the_timestamp_topic_data_envelope() {
        // §8 S4 literal scenario: SELECT clientid, payload.temp AS t FROM
        // sensors/# WHERE payload.temp > 30 DO log(...); a hot reading
        // writes one `{timestamp, topic, data}` line, a cool one writes
        // nothing.
        let path = std::env::temp_dir().join(format!(
            "mqtt_loom-test-rule-log-{}.jsonl",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        let rule = Rule::new("hot-sensors", "sensors/#")
            .select(vec![
                SelectField::new("clientid"),
                SelectField::aliased("payload.temp", "t"),
            ])
            .where_clause(FilterExpression::parse("payload.temp > 30").unwrap())
            .action(RuleAction::LogToFile(path.clone()));
        let bus = EventBus::new();

        let hot = sample_message("sensors/a/b", r#"{"temp":35}"#);
        run_rule(&rule, &hot, &NullRuleSink, &bus).await;

        let cool = sample_message("sensors/a/b", r#"{"temp":20}"#);
        run_rule(&rule, &cool, &NullRuleSink, &bus).await;

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1, "cool reading must not be logged");

        let logged: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(logged["topic"], "sensors/a/b");
        assert_eq!(logged["data"]["t"], 35);
        assert!(logged["timestamp"].is_string());

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn action_failure_is_reported_but_does_not_abort_remaining_actions() {
        let sink = RecordingSink {
            fail_topics: vec!["alerts/primary".to_string()],
            ..Default::default()
        };
        let rule = Rule::new("r", "sensors/#")
            .action(RuleAction::ForwardToTopic("alerts/primary".to_string()))
            .action(RuleAction::ForwardToTopic("alerts/secondary".to_string()));
        let message = sample_message("sensors/r1", "{}");
        let bus = EventBus::new();
        let mut events = bus.subscribe();

        run_rule(&rule, &message, &sink, &bus).await;

        let event = events.recv().await.unwrap();
        assert!(matches!(event, RuntimeEvent::RuleActionError { .. }));
        assert_eq!(sink.forwarded.lock().unwrap().len(), 1);
        assert_eq!(sink.forwarded.lock().unwrap()[0].0, "alerts/secondary");
    }
}
