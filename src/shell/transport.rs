// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shell transport: the client side of the debug tap (C7, §4.6).
//!
//! Connects to the tap's Unix-domain socket, drains the welcome line,
//! and offers `ping`/`subscribe`/`unsubscribe`/`command` plus a
//! `receive` that streams mirrored publish frames while subscribed.
//! Disconnection is detected the way §4.6 prescribes: the well-known
//! socket error codes `ECONNRESET`/`EPIPE`/`ENOTCONN` are reported as
//! [`TransportError`]; anything else (including a clean EOF) is treated
//! as "no more data right now" and surfaces as `receive` returning `None`.

use std::path::Path;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::UnixStream;
use tokio_util::codec::{Framed, LinesCodec};

use crate::error::TransportError;

/// Connects to a tap socket and speaks its JSON-line protocol.
pub struct ShellTransport {
    framed: Framed<UnixStream, LinesCodec>,
}

impl ShellTransport {
    /// Connects to the tap's Unix-domain socket at `socket_path`,
    /// reading and discarding its welcome line.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Io`] if the socket cannot be reached,
    /// or [`TransportError::NotConnected`] if the peer closed the
    /// connection before sending a welcome line.
    pub async fn connect(socket_path: impl AsRef<Path>) -> Result<Self, TransportError> {
        let stream = UnixStream::connect(socket_path).await?;
        let mut framed = Framed::new(stream, LinesCodec::new());
        match framed.next().await {
            Some(Ok(_welcome)) => Ok(Self { framed }),
            Some(Err(error)) => Err(TransportError::Frame(error.to_string())),
            None => Err(TransportError::NotConnected),
        }
    }

    /// Sends `{"type":"ping"}` and awaits the `{"type":"pong"}` reply.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] on a frame or I/O failure.
    pub async fn ping(&mut self) -> Result<(), TransportError> {
        self.send_request(&serde_json::json!({"type": "ping"})).await?;
        let response = self.recv_json().await?;
        if response.get("type").and_then(Value::as_str) == Some("pong") {
            Ok(())
        } else {
            Err(TransportError::Frame("expected pong".to_string()))
        }
    }

    /// Starts the mirror stream.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] on a frame, protocol, or I/O failure.
    pub async fn subscribe(&mut self) -> Result<(), TransportError> {
        self.send_request(&serde_json::json!({"type": "subscribe"})).await?;
        self.expect_ok().await
    }

    /// Stops the mirror stream.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] on a frame, protocol, or I/O failure.
    pub async fn unsubscribe(&mut self) -> Result<(), TransportError> {
        self.send_request(&serde_json::json!({"type": "unsubscribe"})).await?;
        self.expect_ok().await
    }

    /// Issues a named command with positional `arguments` and keyword
    /// `options`, returning the raw `{"ok", "output"?, "error"?}` reply.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] on a frame or I/O failure.
    pub async fn command(
        &mut self,
        name: &str,
        arguments: Vec<Value>,
        options: serde_json::Map<String, Value>,
    ) -> Result<Value, TransportError> {
        self.send_request(&serde_json::json!({
            "type": "command",
            "command": name,
            "arguments": arguments,
            "options": options,
        }))
        .await?;
        self.recv_json().await
    }

    /// Awaits the next mirrored message while subscribed.
    ///
    /// Per §4.6, a clean disconnect or non-fatal socket hiccup is
    /// reported as `Ok(None)` rather than an error - only the well-known
    /// reset codes surface as [`TransportError`].
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the peer reset the connection.
    pub async fn receive(&mut self) -> Result<Option<Value>, TransportError> {
        match self.framed.next().await {
            Some(Ok(line)) => serde_json::from_str(&line)
                .map(Some)
                .map_err(|error| TransportError::Frame(error.to_string())),
            Some(Err(error)) => match error {
                tokio_util::codec::LinesCodecError::Io(io_error) if is_disconnect_kind(&io_error) => {
                    Err(TransportError::Io(io_error))
                }
                _ => Ok(None),
            },
            None => Ok(None),
        }
    }

    async fn send_request(&mut self, request: &Value) -> Result<(), TransportError> {
        self.framed
            .send(request.to_string())
            .await
            .map_err(|error| TransportError::Frame(error.to_string()))
    }

    async fn recv_json(&mut self) -> Result<Value, TransportError> {
        match self.framed.next().await {
            Some(Ok(line)) => {
                serde_json::from_str(&line).map_err(|error| TransportError::Frame(error.to_string()))
            }
            Some(Err(error)) => Err(TransportError::Frame(error.to_string())),
            None => Err(TransportError::NotConnected),
        }
    }

    async fn expect_ok(&mut self) -> Result<(), TransportError> {
        let response = self.recv_json().await?;
        if response.get("ok").and_then(Value::as_bool) == Some(true) {
            Ok(())
        } else {
            Err(TransportError::Frame(format!("request rejected: {response}")))
        }
    }
}

fn is_disconnect_kind(io_error: &std::io::Error) -> bool {
    matches!(
        io_error.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::NotConnected
    )
}
