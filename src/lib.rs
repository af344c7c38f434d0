// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `WeatherFlow` Lib - A Rust client for the `WeatherFlow` real-time feed.
//!
//! This library keeps a persistent WebSocket connection to the `WeatherFlow`
//! (Tempest) data service and delivers decoded station observations and
//! rapid wind samples to a callback.
//!
//! # Supported Features
//!
//! - **Decoding**: `obs_st`, `rapid_wind`, `connection_opened` and `ack`
//!   messages, including the positional observation tuples
//! - **Subscriptions**: Add or remove devices at any time; subscriptions
//!   are replayed on every reconnect
//! - **Resilience**: Exponential backoff, handshake and idle timeouts
//! - **State**: Connection lifecycle published through a watch channel
//!
//! # Quick Start
//!
//! ```no_run
//! use weatherflow_lib::{Client, DeviceId, Message};
//!
//! #[tokio::main]
//! async fn main() -> weatherflow_lib::Result<()> {
//!     let client = Client::new("your-api-token")?;
//!     client.add_device(DeviceId::new(121_037));
//!
//!     client.start(|message| {
//!         if let Message::Observation(record) = message {
//!             if let Some(celsius) = record.latest().and_then(|obs| obs.air_temperature) {
//!                 println!("{celsius} °C");
//!             }
//!         }
//!     })?;
//!
//!     client.join().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Decoding Without a Connection
//!
//! ```
//! use weatherflow_lib::{Message, decode};
//!
//! let payload = br#"{"type":"rapid_wind","device_id":7,"serial_number":"ST-1",
//!     "hub_sn":"HB-1","ob":[1588948614,0.18,42]}"#;
//!
//! match decode(payload)? {
//!     Message::RapidWind(wind) => assert_eq!(wind.ob.wind_direction, 42),
//!     _ => unreachable!(),
//! }
//! # Ok::<(), weatherflow_lib::DecodeError>(())
//! ```
//!
//! ## Watching the Connection
//!
//! ```no_run
//! use weatherflow_lib::{Client, ConnectionState};
//!
//! # async fn run(client: Client) {
//! let mut states = client.subscribe_state();
//! while states.changed().await.is_ok() {
//!     if let ConnectionState::BackingOff { errors, delay } = *states.borrow() {
//!         eprintln!("{errors} error(s), retrying in {delay:?}");
//!     }
//! }
//! # }
//! ```

pub mod client;
pub mod error;
pub mod message;
pub mod protocol;
pub mod registry;
pub mod types;

pub use client::{BackoffPolicy, Client, ClientBuilder, ConnectionState};
pub use error::{ConfigError, DecodeError, Error, ProtocolError, Result};
pub use message::{Message, MessageType, decode};
pub use registry::DeviceRegistry;
pub use types::DeviceId;
