// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persistent client for the `WeatherFlow` real-time WebSocket feed.
//!
//! A [`Client`] keeps one connection alive in a background task, replays
//! device subscriptions whenever the server reports `connection_opened`,
//! and hands every decoded observation and rapid wind sample to the
//! handler given to [`Client::start`].
//!
//! # Examples
//!
//! ```no_run
//! use weatherflow_lib::{Client, DeviceId, Message};
//!
//! #[tokio::main]
//! async fn main() -> weatherflow_lib::Result<()> {
//!     let client = Client::builder().token("your-api-token").build()?;
//!     client.add_device(DeviceId::new(121_037));
//!
//!     client.start(|message| match message {
//!         Message::RapidWind(wind) => println!("wind {} m/s", wind.ob.wind_speed),
//!         Message::Observation(obs) => println!("{} observation(s)", obs.obs.len()),
//!         _ => {}
//!     })?;
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```

mod backoff;
mod config;
mod connection;
mod state;

pub use config::{
    BackoffPolicy, ClientConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_IDLE_TIMEOUT, WEATHERFLOW_URL,
    token_url,
};
pub use state::ConnectionState;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{ConfigError, Error, Result};
use crate::message::Message;
use crate::registry::DeviceRegistry;
use crate::types::DeviceId;

use connection::{Command, Connection, Shared};

/// Handle to a `WeatherFlow` connection.
///
/// `Client` is cheaply cloneable; clones share the same registry and
/// connection task. Dropping the last clone stops the task.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    shared: Arc<Shared>,
    config: ClientConfig,
    commands_tx: mpsc::UnboundedSender<Command>,
    /// Taken by the connection task on start.
    commands_rx: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

impl Client {
    /// Creates a new builder for configuring a client.
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Creates a client for the public feed with default settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEndpoint` if `token` is empty.
    pub fn new(token: impl Into<String>) -> std::result::Result<Self, ConfigError> {
        Self::builder().token(token).build()
    }

    fn from_config(config: ClientConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        let shared = Shared {
            registry: DeviceRegistry::new(),
            endpoint: RwLock::new(config.url.clone()),
            state_tx,
            cancel: CancellationToken::new(),
        };

        Self {
            inner: Arc::new(ClientInner {
                shared: Arc::new(shared),
                config,
                commands_tx,
                commands_rx: Mutex::new(Some(commands_rx)),
                task: Mutex::new(None),
            }),
        }
    }

    // =========================================================================
    // Devices
    // =========================================================================

    /// Subscribes to a device's observations and rapid wind samples.
    ///
    /// If the connection is streaming, the listen directives are sent
    /// immediately; otherwise the device is subscribed when the next
    /// connection becomes ready.
    ///
    /// Returns `true` if the device was not already registered.
    pub fn add_device(&self, id: DeviceId) -> bool {
        let added = self.inner.shared.registry.add(id);
        if added {
            tracing::debug!(device_id = %id, "Device added");
            self.notify(Command::Subscribe(id));
        }
        added
    }

    /// Unsubscribes from a device.
    ///
    /// Returns `true` if the device was registered.
    pub fn remove_device(&self, id: DeviceId) -> bool {
        let removed = self.inner.shared.registry.remove(id);
        if removed {
            tracing::debug!(device_id = %id, "Device removed");
            self.notify(Command::Unsubscribe(id));
        }
        removed
    }

    /// Returns the number of subscribed devices.
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.inner.shared.registry.count()
    }

    /// Returns whether a device is subscribed.
    #[must_use]
    pub fn contains_device(&self, id: DeviceId) -> bool {
        self.inner.shared.registry.contains(id)
    }

    /// Returns the subscribed devices in ascending order.
    #[must_use]
    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.inner.shared.registry.snapshot()
    }

    /// Forwards a subscription change to a ready connection.
    ///
    /// Not streaming means the change is picked up by the next replay.
    fn notify(&self, command: Command) {
        if self.inner.shared.state_tx.borrow().is_streaming() {
            // Ignore send errors - the task may have exited
            let _ = self.inner.commands_tx.send(command);
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Starts the background connection task.
    ///
    /// `handler` is called from the task for every observation and rapid
    /// wind message. It runs inline with the read loop and must not block.
    ///
    /// # Errors
    ///
    /// Returns `Error::AlreadyStarted` if the task was already started, or
    /// `Error::Stopped` if the client has been stopped.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        if self.inner.shared.cancel.is_cancelled() {
            return Err(Error::Stopped);
        }

        let mut task = self.inner.task.lock();
        let Some(commands) = self.inner.commands_rx.lock().take() else {
            return Err(Error::AlreadyStarted);
        };

        let connection = Connection::new(
            Arc::clone(&self.inner.shared),
            self.inner.config.clone(),
            commands,
            Arc::new(handler),
        );
        *task = Some(tokio::spawn(connection.run()));

        tracing::info!(devices = self.device_count(), "WeatherFlow client started");
        Ok(())
    }

    /// Requests the connection task to stop.
    ///
    /// The live connection, if any, is closed with a normal closure code.
    /// Calling `stop` more than once has no further effect.
    pub fn stop(&self) {
        if !self.inner.shared.cancel.is_cancelled() {
            tracing::info!("Stopping WeatherFlow client");
            self.inner.shared.cancel.cancel();
        }
    }

    /// Waits for the connection task to exit.
    ///
    /// Returns immediately if the task was never started or has already
    /// been joined.
    pub async fn join(&self) {
        let handle = self.inner.task.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            tracing::error!(error = %e, "WeatherFlow connection task failed");
        }
    }

    /// Stops the client and waits for the connection task to exit.
    pub async fn shutdown(&self) {
        self.stop();
        self.join().await;
    }

    /// Returns whether the connection task is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner
            .task
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    // =========================================================================
    // Endpoint and state
    // =========================================================================

    /// Overrides the endpoint URL; used from the next connection attempt.
    pub fn set_url(&self, url: impl Into<String>) {
        *self.inner.shared.endpoint.write() = url.into();
    }

    /// Returns the current endpoint URL.
    #[must_use]
    pub fn url(&self) -> String {
        self.inner.shared.endpoint.read().clone()
    }

    /// Returns the configuration the client was built with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.shared.state_tx.borrow().clone()
    }

    /// Subscribes to connection state changes.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.shared.state_tx.subscribe()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state())
            .field("devices", &self.device_count())
            .finish_non_exhaustive()
    }
}

/// Builder for creating a [`Client`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use weatherflow_lib::Client;
/// use weatherflow_lib::client::BackoffPolicy;
///
/// let client = Client::builder()
///     .url("ws://127.0.0.1:9000/ws")
///     .idle_timeout(Duration::from_secs(600))
///     .connect_timeout(Duration::from_secs(5))
///     .backoff(BackoffPolicy::new().with_max(Duration::from_secs(60)))
///     .build()
///     .unwrap();
/// assert_eq!(client.url(), "ws://127.0.0.1:9000/ws");
/// ```
#[derive(Debug, Default)]
pub struct ClientBuilder {
    token: Option<String>,
    url: Option<String>,
    config: ClientConfig,
}

impl ClientBuilder {
    /// Sets the API token; the endpoint becomes the public feed URL.
    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets an explicit endpoint URL, taking precedence over a token.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the idle timeout (default: 12 hours).
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Sets the handshake timeout (default: 10 seconds).
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Sets the reconnect backoff policy.
    #[must_use]
    pub fn backoff(mut self, policy: BackoffPolicy) -> Self {
        self.config.backoff = policy;
        self
    }

    /// Validates the configuration and creates the client.
    ///
    /// The client does not connect until [`Client::start`] is called.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Neither a non-empty URL nor a non-empty token is set
    /// - The backoff policy is invalid
    pub fn build(self) -> std::result::Result<Client, ConfigError> {
        let url = match (self.url, self.token) {
            (Some(url), _) if !url.is_empty() => url,
            (_, Some(token)) if !token.is_empty() => token_url(&token),
            _ => return Err(ConfigError::MissingEndpoint),
        };
        self.config.backoff.validate()?;

        install_crypto_provider();

        Ok(Client::from_config(ClientConfig { url, ..self.config }))
    }
}

/// Selects ring as the process-wide rustls provider unless one is set.
#[cfg(feature = "rustls")]
fn install_crypto_provider() {
    // Fails only if a provider is already installed
    let _ = rustls::crypto::ring::default_provider().install_default();
}

#[cfg(not(feature = "rustls"))]
fn install_crypto_provider() {}
