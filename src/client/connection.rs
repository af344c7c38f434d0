// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The background connection task.
//!
//! One task per client owns the socket and the error counter. It loops
//! dial → wait for `connection_opened` → replay subscriptions → stream,
//! backing off after every failure, until the client's cancellation token
//! fires. The token is raced against the dial, each backoff sleep and each
//! read, so a stop takes effect without waiting for the next frame.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;

use super::backoff::Backoff;
use super::config::ClientConfig;
use super::state::ConnectionState;
use crate::error::ProtocolError;
use crate::message::{self, Message};
use crate::protocol::Directive;
use crate::registry::DeviceRegistry;
use crate::types::DeviceId;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, WsMessage>;

/// Callback receiving observation and rapid wind messages.
pub(crate) type MessageHandler = Arc<dyn Fn(Message) + Send + Sync>;

/// Upper bound on sending the close frame.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// State shared between a client handle and its connection task.
#[derive(Debug)]
pub(crate) struct Shared {
    pub registry: DeviceRegistry,
    pub endpoint: RwLock<String>,
    pub state_tx: watch::Sender<ConnectionState>,
    pub cancel: CancellationToken,
}

/// Subscription change requested while the connection is streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    Subscribe(DeviceId),
    Unsubscribe(DeviceId),
}

impl Command {
    fn directives(self) -> [Directive; 2] {
        match self {
            Self::Subscribe(id) => Directive::subscribe(id),
            Self::Unsubscribe(id) => Directive::unsubscribe(id),
        }
    }
}

/// Why a connection ended.
enum Exit {
    Stopped,
    Failed(ProtocolError),
}

pub(crate) struct Connection {
    shared: Arc<Shared>,
    config: ClientConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    handler: MessageHandler,
    backoff: Backoff,
}

impl Connection {
    pub fn new(
        shared: Arc<Shared>,
        config: ClientConfig,
        commands: mpsc::UnboundedReceiver<Command>,
        handler: MessageHandler,
    ) -> Self {
        let backoff = Backoff::new(config.backoff.clone());
        Self {
            shared,
            config,
            commands,
            handler,
            backoff,
        }
    }

    /// Runs until the cancellation token fires.
    pub async fn run(mut self) {
        let cancel = self.shared.cancel.clone();

        while !cancel.is_cancelled() {
            if !self.wait_backoff(&cancel).await {
                break;
            }

            self.set_state(ConnectionState::Connecting);
            let ws = tokio::select! {
                () = cancel.cancelled() => break,
                result = self.connect() => match result {
                    Ok(ws) => ws,
                    Err(e) => {
                        self.backoff.record_failure();
                        tracing::warn!(
                            error = %e,
                            errors = self.backoff.errors(),
                            "Failed to connect to WeatherFlow"
                        );
                        continue;
                    }
                },
            };

            match self.stream(ws, &cancel).await {
                Exit::Stopped => break,
                Exit::Failed(e) => {
                    self.backoff.record_failure();
                    tracing::warn!(
                        error = %e,
                        errors = self.backoff.errors(),
                        "WeatherFlow connection lost"
                    );
                }
            }
        }

        self.set_state(ConnectionState::Stopped);
        tracing::info!("WeatherFlow connection task stopped");
    }

    /// Sleeps for the current backoff delay. Returns false if cancelled.
    async fn wait_backoff(&self, cancel: &CancellationToken) -> bool {
        let delay = self.backoff.delay();
        if delay.is_zero() {
            return true;
        }

        let errors = self.backoff.errors();
        self.set_state(ConnectionState::BackingOff { errors, delay });
        tracing::info!(errors, ?delay, "Backing off before reconnecting");

        tokio::select! {
            () = cancel.cancelled() => false,
            () = tokio::time::sleep(delay) => true,
        }
    }

    async fn connect(&self) -> Result<WsStream, ProtocolError> {
        let url = self.shared.endpoint.read().clone();
        tracing::info!(endpoint = %redact(&url), "Connecting to WeatherFlow");

        let timeout = self.config.connect_timeout;
        match tokio::time::timeout(timeout, connect_async(url.as_str())).await {
            Ok(Ok((ws, _response))) => Ok(ws),
            Ok(Err(tungstenite::Error::Url(e))) => Err(ProtocolError::InvalidAddress(e.to_string())),
            Ok(Err(e)) => Err(ProtocolError::ConnectionFailed(e.to_string())),
            Err(_) => Err(ProtocolError::Timeout(
                u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        }
    }

    async fn stream(&mut self, ws: WsStream, cancel: &CancellationToken) -> Exit {
        self.set_state(ConnectionState::Subscribing);
        tracing::info!("Connected to WeatherFlow, awaiting connection_opened");

        let (mut sink, mut stream) = ws.split();
        let idle_timeout = self.config.idle_timeout;
        let idle = tokio::time::sleep(idle_timeout);
        tokio::pin!(idle);
        let mut ready = false;

        let exit = loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    self.set_state(ConnectionState::Draining);
                    break Exit::Stopped;
                }
                () = &mut idle => {
                    break Exit::Failed(ProtocolError::IdleTimeout(idle_timeout.as_secs()));
                }
                Some(command) = self.commands.recv(), if ready => {
                    self.send_directives(&mut sink, command.directives()).await;
                }
                frame = stream.next() => {
                    idle.as_mut().reset(Instant::now() + idle_timeout);
                    match frame {
                        Some(Ok(WsMessage::Text(text))) => {
                            self.handle_text(text.as_bytes(), &mut sink, &mut ready).await;
                        }
                        // Answered by tungstenite itself.
                        Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => {}
                        Some(Ok(WsMessage::Binary(_))) => {
                            break Exit::Failed(ProtocolError::UnexpectedFrame("binary"));
                        }
                        Some(Ok(WsMessage::Frame(_))) => {
                            break Exit::Failed(ProtocolError::UnexpectedFrame("raw"));
                        }
                        Some(Ok(WsMessage::Close(_))) | None => {
                            break Exit::Failed(ProtocolError::ConnectionClosed);
                        }
                        Some(Err(e)) => break Exit::Failed(ProtocolError::WebSocket(e)),
                    }
                }
            }
        };

        let code = match &exit {
            Exit::Stopped => CloseCode::Normal,
            Exit::Failed(_) => CloseCode::Error,
        };
        close(&mut sink, code).await;
        exit
    }

    async fn handle_text(&mut self, payload: &[u8], sink: &mut WsSink, ready: &mut bool) {
        let message = match message::decode(payload) {
            Ok(message) => message,
            Err(e) => {
                self.backoff.record_failure();
                tracing::warn!(error = %e, "Skipping undecodable message");
                return;
            }
        };

        match message {
            Message::ConnectionOpened(_) => {
                tracing::debug!("Received connection_opened");
                // Streaming must be visible before the snapshot below so that
                // concurrent add/remove calls are either in it or queued.
                self.set_state(ConnectionState::Streaming);
                while self.commands.try_recv().is_ok() {}
                *ready = true;
                self.replay_subscriptions(sink).await;
            }
            Message::Ack(ack) => {
                tracing::debug!(id = %ack.id, "Received ack");
            }
            message @ (Message::Observation(_) | Message::RapidWind(_)) => {
                tracing::debug!(
                    kind = message.type_tag(),
                    device_id = ?message.device_id(),
                    "Dispatching message"
                );
                (self.handler)(message);
                self.backoff.record_success();
            }
        }
    }

    async fn replay_subscriptions(&mut self, sink: &mut WsSink) {
        let mut directives = Vec::new();
        self.shared
            .registry
            .for_each(|id| directives.extend(Directive::subscribe(id)));
        tracing::info!(count = directives.len() / 2, "Subscribing to devices");

        self.send_directives(sink, directives).await;
    }

    /// Sends each directive independently; failures are counted, not fatal.
    async fn send_directives(
        &mut self,
        sink: &mut WsSink,
        directives: impl IntoIterator<Item = Directive>,
    ) {
        for directive in directives {
            tracing::debug!(
                device_id = %directive.device_id,
                directive = %directive.kind,
                "Sending directive"
            );

            let sent = match directive.to_json() {
                Ok(json) => sink.send(WsMessage::text(json)).await.map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            if let Err(reason) = sent {
                let err = ProtocolError::SendFailed {
                    directive: directive.kind.as_str(),
                    reason,
                };
                self.backoff.record_failure();
                tracing::warn!(
                    error = %err,
                    device_id = %directive.device_id,
                    "Directive not sent"
                );
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        tracing::trace!(?state, "Connection state changed");
        self.shared.state_tx.send_replace(state);
    }
}

/// Sends a close frame, giving up after [`CLOSE_TIMEOUT`].
async fn close(sink: &mut WsSink, code: CloseCode) {
    let frame = CloseFrame {
        code,
        reason: "client closing connection".into(),
    };
    let closing = async {
        sink.send(WsMessage::Close(Some(frame))).await?;
        sink.close().await
    };

    match tokio::time::timeout(CLOSE_TIMEOUT, closing).await {
        Ok(Ok(())) => tracing::debug!(?code, "Closed WeatherFlow connection"),
        Ok(Err(e)) => tracing::debug!(error = %e, "Connection already closed"),
        Err(_) => tracing::debug!("Timed out closing connection"),
    }
}

/// Strips the query (which carries the API token) for logging.
fn redact(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}
