// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The transport-neutral message record emitted by the dispatcher and
//! consumed by the event bus, the debug tap, and the shell pipeline.
//!
//! See §3 of the specification for the authoritative field list.
//! [`Message`] is immutable after construction (built via [`MessageBuilder`])
//! and [`Context`] is the read-only view the filter and rule engines
//! evaluate against.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kind of event a [`Message`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// An MQTT PUBLISH packet, inbound or outbound.
    Publish,
    /// A subscription request or acknowledgement.
    Subscribe,
    /// An unsubscribe request or acknowledgement.
    Unsubscribe,
    /// A connection was torn down.
    Disconnect,
    /// An internal runtime notice (e.g. pool maintenance).
    System,
    /// A failure surfaced as a message (so it can flow through the tap).
    Error,
    /// A decoded application-level data point, consumed by the topic tree.
    Data,
}

/// Where a [`Message`] came from relative to this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Received from the broker.
    Incoming,
    /// Sent to the broker.
    Outgoing,
    /// Synthesized by the runtime itself (never touched the wire).
    Internal,
}

/// MQTT quality of service level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Qos {
    /// At most once.
    AtMostOnce = 0,
    /// At least once.
    AtLeastOnce = 1,
    /// Exactly once.
    ExactlyOnce = 2,
}

impl Qos {
    /// Returns the numeric QoS level (0, 1, or 2).
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Qos {
    type Error = InvalidQos;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Qos::AtMostOnce),
            1 => Ok(Qos::AtLeastOnce),
            2 => Ok(Qos::ExactlyOnce),
            other => Err(InvalidQos(other)),
        }
    }
}

impl fmt::Display for Qos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// A QoS value outside the legal `{0, 1, 2}` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid QoS level: {0}")]
pub struct InvalidQos(pub u8);

/// A single, immutable mirrored or dispatched MQTT event (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    msg_type: MessageType,
    direction: Direction,
    topic: Option<String>,
    qos: Qos,
    retain: bool,
    dup: bool,
    #[serde(with = "payload_bytes")]
    payload: Vec<u8>,
    payload_json: Option<Value>,
    properties: HashMap<String, Value>,
    pool: Option<String>,
    timestamp: DateTime<Utc>,
}

mod payload_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&String::from_utf8_lossy(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        Ok(String::deserialize(d)?.into_bytes())
    }
}

impl Message {
    /// Starts building a new message of the given type and direction.
    #[must_use]
    pub fn builder(msg_type: MessageType, direction: Direction) -> MessageBuilder {
        MessageBuilder::new(msg_type, direction)
    }

    /// The message kind.
    #[must_use]
    pub fn msg_type(&self) -> MessageType {
        self.msg_type
    }

    /// Whether this message crossed the wire inbound, outbound, or was synthesized.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The MQTT topic, when applicable (required for `publish`/`data`).
    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// The QoS level the message was sent/received at.
    #[must_use]
    pub fn qos(&self) -> Qos {
        self.qos
    }

    /// The MQTT RETAIN flag.
    #[must_use]
    pub fn retain(&self) -> bool {
        self.retain
    }

    /// The MQTT DUP flag.
    #[must_use]
    pub fn dup(&self) -> bool {
        self.dup
    }

    /// The raw payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The JSON-decoded view of the payload, if it parsed as JSON.
    #[must_use]
    pub fn payload_json(&self) -> Option<&Value> {
        self.payload_json.as_ref()
    }

    /// MQTT 5 user properties, opaque to the core runtime.
    #[must_use]
    pub fn properties(&self) -> &HashMap<String, Value> {
        &self.properties
    }

    /// The logical pool name this message crossed.
    #[must_use]
    pub fn pool(&self) -> Option<&str> {
        self.pool.as_deref()
    }

    /// High-resolution timestamp (microsecond precision) of when the
    /// message was constructed.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Builds the [`Context`] the filter and rule engines evaluate against.
    #[must_use]
    pub fn context(&self) -> Context {
        let mut fields = serde_json::Map::new();
        fields.insert(
            "topic".to_string(),
            self.topic.clone().map_or(Value::Null, Value::String),
        );
        fields.insert(
            "payload".to_string(),
            self.payload_json.clone().unwrap_or(Value::Null),
        );
        fields.insert(
            "message_raw".to_string(),
            Value::String(String::from_utf8_lossy(&self.payload).into_owned()),
        );
        fields.insert(
            "qos".to_string(),
            Value::Number(serde_json::Number::from(self.qos.as_u8())),
        );
        fields.insert("retain".to_string(), Value::Bool(self.retain));
        fields.insert("dup".to_string(), Value::Bool(self.dup));
        fields.insert(
            "direction".to_string(),
            Value::String(direction_str(self.direction).to_string()),
        );
        fields.insert(
            "pool".to_string(),
            self.pool.clone().map_or(Value::Null, Value::String),
        );
        fields.insert(
            "timestamp".to_string(),
            Value::String(self.timestamp.to_rfc3339()),
        );
        fields.insert(
            "type".to_string(),
            Value::String(msg_type_str(self.msg_type).to_string()),
        );
        Context { fields }
    }

    /// Truncates the payload (as UTF-8, lossily) to at most `max_len` characters,
    /// used by the topic tree and flow timeline previews.
    #[must_use]
    pub fn payload_preview(&self, max_len: usize) -> String {
        let text = String::from_utf8_lossy(&self.payload);
        truncate_chars(&text, max_len)
    }
}

/// Truncates a string to at most `max_len` chars, appending an ellipsis if cut.
#[must_use]
pub fn truncate_chars(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_len.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn direction_str(d: Direction) -> &'static str {
    match d {
        Direction::Incoming => "incoming",
        Direction::Outgoing => "outgoing",
        Direction::Internal => "internal",
    }
}

fn msg_type_str(t: MessageType) -> &'static str {
    match t {
        MessageType::Publish => "publish",
        MessageType::Subscribe => "subscribe",
        MessageType::Unsubscribe => "unsubscribe",
        MessageType::Disconnect => "disconnect",
        MessageType::System => "system",
        MessageType::Error => "error",
        MessageType::Data => "data",
    }
}

/// Builder for [`Message`]; messages are never mutated post-construction.
#[derive(Debug)]
pub struct MessageBuilder {
    msg_type: MessageType,
    direction: Direction,
    topic: Option<String>,
    qos: Qos,
    retain: bool,
    dup: bool,
    payload: Vec<u8>,
    properties: HashMap<String, Value>,
    pool: Option<String>,
    timestamp: Option<DateTime<Utc>>,
}

impl MessageBuilder {
    fn new(msg_type: MessageType, direction: Direction) -> Self {
        Self {
            msg_type,
            direction,
            topic: None,
            qos: Qos::AtMostOnce,
            retain: false,
            dup: false,
            payload: Vec::new(),
            properties: HashMap::new(),
            pool: None,
            timestamp: None,
        }
    }

    /// Sets the topic.
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Sets the QoS level.
    #[must_use]
    pub fn qos(mut self, qos: Qos) -> Self {
        self.qos = qos;
        self
    }

    /// Sets the RETAIN flag.
    #[must_use]
    pub fn retain(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    /// Sets the DUP flag.
    #[must_use]
    pub fn dup(mut self, dup: bool) -> Self {
        self.dup = dup;
        self
    }

    /// Sets the raw payload, attempting to decode it as JSON for the
    /// `payload_json` view (best-effort; non-JSON payloads simply have
    /// `payload_json() == None`).
    #[must_use]
    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Sets MQTT 5 user properties.
    #[must_use]
    pub fn properties(mut self, properties: HashMap<String, Value>) -> Self {
        self.properties = properties;
        self
    }

    /// Sets the logical pool name.
    #[must_use]
    pub fn pool(mut self, pool: impl Into<String>) -> Self {
        self.pool = Some(pool.into());
        self
    }

    /// Overrides the construction timestamp (primarily for tests).
    #[must_use]
    pub fn timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.timestamp = Some(ts);
        self
    }

    /// Finalizes the message.
    #[must_use]
    pub fn build(self) -> Message {
        let payload_json = serde_json::from_slice::<Value>(&self.payload).ok();
        Message {
            msg_type: self.msg_type,
            direction: self.direction,
            topic: self.topic,
            qos: self.qos,
            retain: self.retain,
            dup: self.dup,
            payload: self.payload,
            payload_json,
            properties: self.properties,
            pool: self.pool,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        }
    }
}

/// The field mapping extracted from a [`Message`] for filter/rule evaluation
/// (§3, §4.7).
///
/// `Context` is a flat object at the top level (`topic`, `payload`, `qos`,
/// …) whose `payload` entry may itself be an arbitrarily nested JSON value;
/// dotted/indexed field paths (`payload.temperature`, `payload.readings[0]`)
/// are resolved by [`crate::shell::filter`] by walking into it.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    fields: serde_json::Map<String, Value>,
}

impl Context {
    /// Builds a context directly from a pre-built field map (used in tests
    /// and by the rule engine's row projection).
    #[must_use]
    pub fn from_fields(fields: serde_json::Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Returns the top-level field map.
    #[must_use]
    pub fn fields(&self) -> &serde_json::Map<String, Value> {
        &self.fields
    }

    /// Resolves a dotted/indexed path (e.g. `payload.temperature`,
    /// `payload.readings[0]`) against this context.
    ///
    /// Missing paths resolve to [`Value::Null`] rather than an error -
    /// the filter/rule grammar treats unresolved fields as `null`.
    #[must_use]
    pub fn resolve(&self, path: &str) -> Value {
        let segments = parse_path(path);
        let Some((head, rest)) = segments.split_first() else {
            return Value::Null;
        };
        let mut current = match head {
            PathSegment::Key(k) => self.fields.get(k.as_str()),
            PathSegment::Index(_) => None,
        };
        for seg in rest {
            current = current.and_then(|v| match seg {
                PathSegment::Key(k) => v.get(k.as_str()),
                PathSegment::Index(i) => v.get(*i),
            });
        }
        current.cloned().unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone)]
enum PathSegment {
    Key(String),
    Index(usize),
}

fn parse_path(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    for dotted in path.split('.') {
        let mut rest = dotted;
        // Split "ident[0][1]" into "ident" followed by index segments.
        if let Some(bracket) = rest.find('[') {
            let (ident, tail) = rest.split_at(bracket);
            if !ident.is_empty() {
                segments.push(PathSegment::Key(ident.to_string()));
            }
            rest = tail;
            while let Some(stripped) = rest.strip_prefix('[') {
                if let Some(end) = stripped.find(']') {
                    if let Ok(idx) = stripped[..end].parse::<usize>() {
                        segments.push(PathSegment::Index(idx));
                    }
                    rest = &stripped[end + 1..];
                } else {
                    break;
                }
            }
        } else if !rest.is_empty() {
            segments.push(PathSegment::Key(rest.to_string()));
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let msg = Message::builder(MessageType::Publish, Direction::Incoming).build();
        assert_eq!(msg.msg_type(), MessageType::Publish);
        assert_eq!(msg.qos(), Qos::AtMostOnce);
        assert!(!msg.retain());
        assert!(msg.topic().is_none());
    }

    #[test]
    fn builder_decodes_json_payload() {
        let msg = Message::builder(MessageType::Publish, Direction::Incoming)
            .topic("sensors/r1/temp")
            .payload(br#"{"temperature":32}"#.to_vec())
            .build();
        assert_eq!(
            msg.payload_json().unwrap().get("temperature").unwrap(),
            32
        );
    }

    #[test]
    fn non_json_payload_has_no_json_view() {
        let msg = Message::builder(MessageType::Publish, Direction::Incoming)
            .payload(b"hi_mqtt".to_vec())
            .build();
        assert!(msg.payload_json().is_none());
    }

    #[test]
    fn context_resolves_top_level_fields() {
        let msg = Message::builder(MessageType::Publish, Direction::Incoming)
            .topic("a/b")
            .qos(Qos::ExactlyOnce)
            .build();
        let ctx = msg.context();
        assert_eq!(ctx.resolve("topic"), Value::String("a/b".into()));
        assert_eq!(ctx.resolve("qos"), Value::Number(2.into()));
    }

    #[test]
    fn context_resolves_nested_payload_path() {
        let msg = Message::builder(MessageType::Publish, Direction::Incoming)
            .payload(br#"{"temperature":32,"readings":[1,2,3]}"#.to_vec())
            .build();
        let ctx = msg.context();
        assert_eq!(ctx.resolve("payload.temperature"), Value::Number(32.into()));
        assert_eq!(ctx.resolve("payload.readings[1]"), Value::Number(2.into()));
        assert_eq!(ctx.resolve("payload.missing"), Value::Null);
    }

    #[test]
    fn qos_round_trip() {
        assert_eq!(Qos::try_from(0).unwrap(), Qos::AtMostOnce);
        assert_eq!(Qos::try_from(1).unwrap(), Qos::AtLeastOnce);
        assert_eq!(Qos::try_from(2).unwrap(), Qos::ExactlyOnce);
        assert!(Qos::try_from(3).is_err());
    }

    #[test]
    fn payload_preview_truncates() {
        let msg = Message::builder(MessageType::Publish, Direction::Incoming)
            .payload(vec![b'x'; 200])
            .build();
        assert_eq!(msg.payload_preview(100).chars().count(), 100);
    }
}
