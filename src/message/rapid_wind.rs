// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Rapid wind samples (`rapid_wind`), sent every few seconds.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::positional::{Slot, TupleReader};
use crate::error::DecodeError;
use crate::types::DeviceId;

static RAPID_WIND_SCHEMA: [Slot; 3] = [
    Slot::integer("time_epoch"),
    Slot::number("wind_speed"),
    Slot::integer("wind_direction"),
];

/// A rapid wind message.
#[derive(Debug, Clone, PartialEq)]
pub struct RapidWindRecord {
    /// The station that produced the sample.
    pub device_id: DeviceId,
    /// Serial number of the sensor, e.g. `ST-00026524`.
    pub serial_number: String,
    /// Serial number of the hub that relayed it.
    pub hub_sn: String,
    /// The sample itself.
    pub ob: RapidWindSample,
}

/// The `ob` triple of a rapid wind message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RapidWindSample {
    /// Epoch seconds (UTC).
    pub time_epoch: i64,
    /// Metres per second.
    pub wind_speed: f64,
    /// Degrees.
    pub wind_direction: i64,
}

impl RapidWindSample {
    pub(crate) fn from_tuple(value: &Value) -> Result<Self, DecodeError> {
        let mut r = TupleReader::new("ob", &RAPID_WIND_SCHEMA, value)?;
        Ok(Self {
            time_epoch: r.integer()?,
            wind_speed: r.number()?,
            wind_direction: r.integer()?,
        })
    }

    /// Returns the sample time, or `None` if the epoch is out of range.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.time_epoch, 0)
    }
}

#[derive(Deserialize)]
struct RapidWindWire {
    device_id: DeviceId,
    #[serde(default)]
    serial_number: String,
    #[serde(default)]
    hub_sn: String,
    ob: Value,
}

impl RapidWindRecord {
    pub(crate) fn from_document(document: Value) -> Result<Self, DecodeError> {
        let wire: RapidWindWire = serde_json::from_value(document)?;
        Ok(Self {
            device_id: wire.device_id,
            serial_number: wire.serial_number,
            hub_sn: wire.hub_sn,
            ob: RapidWindSample::from_tuple(&wire.ob)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_sample() {
        let sample = RapidWindSample::from_tuple(&json!([1_681_701_864, 4.29, 298])).unwrap();
        assert_eq!(sample.time_epoch, 1_681_701_864);
        assert!((sample.wind_speed - 4.29).abs() < f64::EPSILON);
        assert_eq!(sample.wind_direction, 298);
        assert_eq!(sample.timestamp().unwrap().timestamp(), 1_681_701_864);
    }

    #[test]
    fn calm_wind_is_zero_not_missing() {
        let sample = RapidWindSample::from_tuple(&json!([1_681_701_864, 0, 0])).unwrap();
        assert!(sample.wind_speed.abs() < f64::EPSILON);
    }

    #[test]
    fn null_speed_is_rejected() {
        let err = RapidWindSample::from_tuple(&json!([1_681_701_864, null, 298])).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidSlot {
                slot: "wind_speed",
                ..
            }
        ));
    }

    #[test]
    fn ob_must_be_array() {
        let doc = json!({"type": "rapid_wind", "device_id": 1, "ob": "1,2,3"});
        let err = RapidWindRecord::from_document(doc).unwrap_err();
        assert!(matches!(err, DecodeError::NotATuple { field: "ob" }));
    }
}
