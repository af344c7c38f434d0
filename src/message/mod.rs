// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoding of inbound `WeatherFlow` WebSocket messages.
//!
//! Every inbound text frame is a JSON object discriminated by its `type`
//! field. This client understands four of them:
//!
//! - `obs_st` - Tempest observation ([`ObservationRecord`])
//! - `rapid_wind` - 3 second wind sample ([`RapidWindRecord`])
//! - `connection_opened` - server is ready for directives
//! - `ack` - a directive was accepted
//!
//! Anything else is rejected with [`DecodeError::UnsupportedType`].
//!
//! # Examples
//!
//! ```
//! use weatherflow_lib::message::{Message, decode};
//!
//! let frame = br#"{"type":"rapid_wind","device_id":121037,"serial_number":"ST-00026524",
//!                  "hub_sn":"HB-00039816","ob":[1681701864,4.29,298]}"#;
//!
//! match decode(frame).unwrap() {
//!     Message::RapidWind(wind) => assert_eq!(wind.ob.wind_direction, 298),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

mod control;
mod observation;
mod positional;
mod rapid_wind;

pub use control::{Ack, ConnectionOpened};
pub use observation::{Observation, ObservationRecord, ObservationStatus, ObservationSummary};
pub use rapid_wind::{RapidWindRecord, RapidWindSample};

use std::fmt;

use serde_json::Value;

use crate::error::DecodeError;
use crate::types::DeviceId;

/// The `type` discriminator of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// `obs_st`
    ObsSt,
    /// `rapid_wind`
    RapidWind,
    /// `connection_opened`
    ConnectionOpened,
    /// `ack`
    Ack,
    /// Any tag this client does not decode.
    Unknown(String),
}

impl MessageType {
    /// Maps a wire tag to its message type.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "obs_st" => Self::ObsSt,
            "rapid_wind" => Self::RapidWind,
            "connection_opened" => Self::ConnectionOpened,
            "ack" => Self::Ack,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Returns the wire tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::ObsSt => "obs_st",
            Self::RapidWind => "rapid_wind",
            Self::ConnectionOpened => "connection_opened",
            Self::Ack => "ack",
            Self::Unknown(tag) => tag,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Station observation.
    Observation(ObservationRecord),
    /// Rapid wind sample.
    RapidWind(RapidWindRecord),
    /// Server is ready for directives.
    ConnectionOpened(ConnectionOpened),
    /// Directive acknowledgement.
    Ack(Ack),
}

impl Message {
    /// Returns the message type.
    #[must_use]
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Observation(_) => MessageType::ObsSt,
            Self::RapidWind(_) => MessageType::RapidWind,
            Self::ConnectionOpened(_) => MessageType::ConnectionOpened,
            Self::Ack(_) => MessageType::Ack,
        }
    }

    /// Returns the wire tag of this message.
    #[must_use]
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Observation(_) => "obs_st",
            Self::RapidWind(_) => "rapid_wind",
            Self::ConnectionOpened(_) => "connection_opened",
            Self::Ack(_) => "ack",
        }
    }

    /// Returns the originating device, if the message has one.
    ///
    /// Control messages are not tied to a device.
    #[must_use]
    pub fn device_id(&self) -> Option<DeviceId> {
        match self {
            Self::Observation(obs) => Some(obs.device_id),
            Self::RapidWind(wind) => Some(wind.device_id),
            Self::ConnectionOpened(_) | Self::Ack(_) => None,
        }
    }
}

/// Decodes one text frame.
///
/// Decoding is pure: the same bytes always produce an equal result.
///
/// # Errors
///
/// Returns [`DecodeError`] if the payload is not JSON, lacks a string
/// `type`, names an unsupported type, or does not match the layout of its
/// type (including positional tuples of the wrong length or kind).
pub fn decode(payload: &[u8]) -> Result<Message, DecodeError> {
    let document: Value = serde_json::from_slice(payload)?;
    let message_type = document
        .get("type")
        .and_then(Value::as_str)
        .map(MessageType::from_tag)
        .ok_or(DecodeError::MissingType)?;

    match message_type {
        MessageType::ObsSt => ObservationRecord::from_document(document).map(Message::Observation),
        MessageType::RapidWind => RapidWindRecord::from_document(document).map(Message::RapidWind),
        MessageType::ConnectionOpened => {
            Ok(Message::ConnectionOpened(serde_json::from_value(document)?))
        }
        MessageType::Ack => Ok(Message::Ack(serde_json::from_value(document)?)),
        MessageType::Unknown(tag) => Err(DecodeError::UnsupportedType(tag)),
    }
}
