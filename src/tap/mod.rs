// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The debug tap (C6, §4.6).
//!
//! A local Unix-domain-socket server that mirrors MQTT traffic as
//! newline-delimited JSON. Every accepted connection gets a welcome
//! line, then speaks the request/response protocol from §4.6/§6 over
//! [`tokio_util::codec::LinesCodec`]: `ping`, `subscribe`/`unsubscribe`
//! to start/stop the mirror stream, and `command` for the shell's
//! pluggable [`CommandHandler`].
//!
//! Mirrored messages are delivered through a bounded per-subscriber
//! channel; a subscriber that can't keep up is disconnected rather than
//! letting the producer (the dispatcher's receive loops, via the event
//! bus) block (§5 "drops the slow subscriber").

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::{UnixListener, UnixStream};
use tokio_util::codec::{Framed, LinesCodec};

use crate::event::{EventBus, RuntimeEvent};
use crate::message::{Direction, Message};

/// Welcome line sent to every new tap connection.
const WELCOME: &str = r#"{"type":"welcome","server":"mqtt_loom"}"#;

/// Inbound request frames the tap understands (§4.6, §6).
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum TapRequest {
    Ping,
    Subscribe,
    Unsubscribe,
    Command {
        command: String,
        #[serde(default)]
        arguments: Vec<Value>,
        #[serde(default)]
        options: serde_json::Map<String, Value>,
    },
}

/// Executes `command` requests arriving over the tap, on behalf of the
/// shell (C7-C11). The core crate ships [`NullCommandHandler`]; a host
/// application wires in its own implementation (§1: "framework glue…
/// out of scope").
#[allow(async_fn_in_trait)]
pub trait CommandHandler: Send + Sync {
    /// Executes a named command with positional `arguments` and keyword
    /// `options`, returning the JSON `output` value on success or an
    /// error message on failure.
    async fn handle(
        &self,
        command: &str,
        arguments: &[Value],
        options: &serde_json::Map<String, Value>,
    ) -> Result<Value, String>;
}

/// A [`CommandHandler`] that rejects every command; used when the tap is
/// run without a shell command surface wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCommandHandler;

impl CommandHandler for NullCommandHandler {
    async fn handle(
        &self,
        command: &str,
        _arguments: &[Value],
        _options: &serde_json::Map<String, Value>,
    ) -> Result<Value, String> {
        Err(format!("unknown command: {command}"))
    }
}

/// The debug tap's Unix-domain-socket server.
pub struct TapServer<H: CommandHandler> {
    socket_path: PathBuf,
    bus: EventBus,
    channel_buffer_size: usize,
    commands: H,
}

impl<H: CommandHandler + 'static> TapServer<H> {
    /// Builds a tap server bound to `socket_path` once [`TapServer::serve`]
    /// is called. Mirrors [`RuntimeEvent::OnPublish`]/[`RuntimeEvent::OnReceive`]
    /// events from `bus`; a subscriber more than `channel_buffer_size`
    /// messages behind is disconnected.
    #[must_use]
    pub fn new(
        socket_path: impl Into<PathBuf>,
        bus: EventBus,
        channel_buffer_size: usize,
        commands: H,
    ) -> Self {
        Self {
            socket_path: socket_path.into(),
            bus,
            channel_buffer_size,
            commands,
        }
    }

    /// Binds the Unix-domain socket (removing a stale socket file at
    /// `socket_path` first, matching standard Unix server hygiene) and
    /// serves connections until cancelled. Runs forever on success; only
    /// returns on a bind or accept failure.
    ///
    /// # Errors
    ///
    /// Returns [`std::io::Error`] if the socket cannot be bound.
    pub async fn serve(self: Arc<Self>) -> std::io::Result<()> {
        if Path::new(&self.socket_path).exists() {
            std::fs::remove_file(&self.socket_path)?;
        }
        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!(path = %self.socket_path.display(), "tap listening");
        loop {
            let (stream, _) = listener.accept().await?;
            let server = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(error) = server.handle_connection(stream).await {
                    tracing::debug!(%error, "tap connection closed");
                }
            });
        }
    }

    async fn handle_connection(&self, stream: UnixStream) -> std::io::Result<()> {
        let mut framed = Framed::new(stream, LinesCodec::new());
        framed
            .send(WELCOME.to_string())
            .await
            .map_err(std::io::Error::other)?;

        let mut mirror: Option<tokio::sync::mpsc::Receiver<String>> = None;

        loop {
            tokio::select! {
                biased;

                line = framed.next() => {
                    let Some(line) = line else { break };
                    let line = line.map_err(std::io::Error::other)?;
                    match serde_json::from_str::<TapRequest>(&line) {
                        Ok(TapRequest::Ping) => {
                            send_json(&mut framed, &serde_json::json!({"type": "pong"})).await?;
                        }
                        Ok(TapRequest::Subscribe) => {
                            mirror = Some(self.spawn_mirror());
                            send_json(&mut framed, &serde_json::json!({"ok": true})).await?;
                        }
                        Ok(TapRequest::Unsubscribe) => {
                            mirror = None;
                            send_json(&mut framed, &serde_json::json!({"ok": true})).await?;
                        }
                        Ok(TapRequest::Command { command, arguments, options }) => {
                            let response = match self.commands.handle(&command, &arguments, &options).await {
                                Ok(output) => serde_json::json!({"ok": true, "output": output}),
                                Err(error) => serde_json::json!({"ok": false, "error": error}),
                            };
                            send_json(&mut framed, &response).await?;
                        }
                        Err(error) => {
                            send_json(
                                &mut framed,
                                &serde_json::json!({"ok": false, "error": format!("frame error: {error}")}),
                            ).await?;
                        }
                    }
                }

                frame = recv_mirror(&mut mirror) => {
                    match frame {
                        Some(frame) => {
                            if framed.send(frame).await.is_err() {
                                break;
                            }
                        }
                        None if mirror.is_some() => {
                            // Subscriber fell behind channel_buffer_size and was dropped upstream.
                            break;
                        }
                        None => {}
                    }
                }
            }
        }
        Ok(())
    }

    fn spawn_mirror(&self) -> tokio::sync::mpsc::Receiver<String> {
        let (tx, rx) = tokio::sync::mpsc::channel(self.channel_buffer_size);
        let mut events = self.bus.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if let Some(frame) = tap_frame_for(&event) {
                            if tx.try_send(frame).is_err() {
                                // Either the channel is full (slow subscriber) or the
                                // receiving half was dropped; either way, stop mirroring.
                                break;
                            }
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        rx
    }
}

async fn recv_mirror(mirror: &mut Option<tokio::sync::mpsc::Receiver<String>>) -> Option<String> {
    match mirror {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn send_json(
    framed: &mut Framed<UnixStream, LinesCodec>,
    value: &Value,
) -> std::io::Result<()> {
    framed
        .send(value.to_string())
        .await
        .map_err(std::io::Error::other)
}

/// Wire shape for a mirrored message, per §4.6:
/// `{"type":"publish","source":"mqtt","timestamp":…,"payload":{…},"metadata":{…}}`.
#[derive(Debug, Serialize)]
struct TapFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    source: &'static str,
    timestamp: String,
    payload: TapPayload<'a>,
    metadata: TapMetadata,
}

#[derive(Debug, Serialize)]
struct TapPayload<'a> {
    topic: Option<&'a str>,
    message: Value,
    qos: u8,
}

#[derive(Debug, Serialize)]
struct TapMetadata {
    direction: &'static str,
    qos: u8,
    retain: bool,
    dup: bool,
}

fn tap_frame_for(event: &RuntimeEvent) -> Option<String> {
    let message = match event {
        RuntimeEvent::OnPublish(message) | RuntimeEvent::OnReceive(message) => message,
        _ => return None,
    };
    Some(render_tap_frame(message))
}

fn render_tap_frame(message: &Message) -> String {
    let frame = TapFrame {
        kind: "publish",
        source: "mqtt",
        timestamp: message.timestamp().to_rfc3339(),
        payload: TapPayload {
            topic: message.topic(),
            message: message
                .payload_json()
                .cloned()
                .unwrap_or_else(|| Value::String(String::from_utf8_lossy(message.payload()).into_owned())),
            qos: message.qos().as_u8(),
        },
        metadata: TapMetadata {
            direction: match message.direction() {
                Direction::Incoming => "incoming",
                Direction::Outgoing => "outgoing",
                Direction::Internal => "internal",
            },
            qos: message.qos().as_u8(),
            retain: message.retain(),
            dup: message.dup(),
        },
    };
    serde_json::to_string(&frame).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageType, Qos};

    #[test]
    fn ping_request_parses() {
        let req: TapRequest = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(req, TapRequest::Ping));
    }

    #[test]
    fn command_request_parses_with_defaults() {
        let req: TapRequest =
            serde_json::from_str(r#"{"type":"command","command":"pause"}"#).unwrap();
        match req {
            TapRequest::Command { command, arguments, options } => {
                assert_eq!(command, "pause");
                assert!(arguments.is_empty());
                assert!(options.is_empty());
            }
            _ => panic!("expected Command variant"),
        }
    }

    #[test]
    fn render_tap_frame_matches_wire_shape() {
        let message = Message::builder(MessageType::Publish, Direction::Incoming)
            .topic("sensors/r1/temp")
            .qos(Qos::AtLeastOnce)
            .payload(br#"{"temperature":32}"#.to_vec())
            .build();
        let line = render_tap_frame(&message);
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["type"], "publish");
        assert_eq!(value["source"], "mqtt");
        assert_eq!(value["payload"]["topic"], "sensors/r1/temp");
        assert_eq!(value["payload"]["message"]["temperature"], 32);
        assert_eq!(value["metadata"]["direction"], "incoming");
        assert_eq!(value["metadata"]["qos"], 1);
    }

    #[tokio::test]
    async fn null_command_handler_rejects_everything() {
        let handler = NullCommandHandler;
        let result = handler
            .handle("anything", &[], &serde_json::Map::new())
            .await;
        assert!(result.is_err());
    }
}
