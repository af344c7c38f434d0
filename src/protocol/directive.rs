// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Listen directives.

use std::fmt;

use serde::Serialize;

use crate::types::DeviceId;

/// The kind of listen directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveKind {
    /// Start streaming `obs_st` for a device.
    ListenStart,
    /// Start streaming `rapid_wind` for a device.
    ListenRapidStart,
    /// Stop streaming `obs_st` for a device.
    ListenStop,
    /// Stop streaming `rapid_wind` for a device.
    ListenRapidStop,
}

impl DirectiveKind {
    /// Returns the wire tag.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ListenStart => "listen_start",
            Self::ListenRapidStart => "listen_rapid_start",
            Self::ListenStop => "listen_stop",
            Self::ListenRapidStop => "listen_rapid_stop",
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbound directive frame.
///
/// Serializes to `{"type":"listen_start","device_id":12345,"id":"listen_start_12345"}`.
/// The server echoes `id` in its `ack`.
///
/// # Examples
///
/// ```
/// use weatherflow_lib::DeviceId;
/// use weatherflow_lib::protocol::{Directive, DirectiveKind};
///
/// let [obs, rapid] = Directive::subscribe(DeviceId::new(12345));
/// assert_eq!(obs.kind, DirectiveKind::ListenStart);
/// assert_eq!(rapid.id, "listen_rapid_start_12345");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Directive {
    /// Directive kind, serialized as `type`.
    #[serde(rename = "type")]
    pub kind: DirectiveKind,
    /// Target device.
    pub device_id: DeviceId,
    /// Correlation id.
    pub id: String,
}

impl Directive {
    /// Creates a directive with the correlation id `<type>_<device_id>`.
    #[must_use]
    pub fn new(kind: DirectiveKind, device_id: DeviceId) -> Self {
        Self {
            kind,
            device_id,
            id: format!("{kind}_{device_id}"),
        }
    }

    /// The standard and rapid listen-start pair for a device.
    #[must_use]
    pub fn subscribe(device_id: DeviceId) -> [Self; 2] {
        [
            Self::new(DirectiveKind::ListenStart, device_id),
            Self::new(DirectiveKind::ListenRapidStart, device_id),
        ]
    }

    /// The standard and rapid listen-stop pair for a device.
    #[must_use]
    pub fn unsubscribe(device_id: DeviceId) -> [Self; 2] {
        [
            Self::new(DirectiveKind::ListenStop, device_id),
            Self::new(DirectiveKind::ListenRapidStop, device_id),
        ]
    }

    /// Serializes the directive to its JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if the directive cannot be encoded.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    #[test]
    fn listen_start_wire_format() {
        let directive = Directive::new(DirectiveKind::ListenStart, DeviceId::new(12345));
        let value: Value = serde_json::from_str(&directive.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "listen_start", "device_id": 12345, "id": "listen_start_12345"})
        );
    }

    #[test]
    fn subscribe_pair() {
        let [start, rapid] = Directive::subscribe(DeviceId::new(7));
        assert_eq!(start.kind, DirectiveKind::ListenStart);
        assert_eq!(rapid.kind, DirectiveKind::ListenRapidStart);
        assert_eq!(start.id, "listen_start_7");
        assert_eq!(rapid.id, "listen_rapid_start_7");
    }

    #[test]
    fn unsubscribe_pair() {
        let [stop, rapid] = Directive::unsubscribe(DeviceId::new(7));
        let value: Value = serde_json::from_str(&rapid.to_json().unwrap()).unwrap();
        assert_eq!(stop.kind.as_str(), "listen_stop");
        assert_eq!(value["type"], "listen_rapid_stop");
        assert_eq!(value["device_id"], 7);
    }
}
