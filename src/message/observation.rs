// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tempest station observations (`obs_st`).

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::positional::{Slot, TupleReader};
use crate::error::DecodeError;
use crate::types::DeviceId;

/// Wire order of the `obs` tuple. Reordering is a protocol break.
static OBS_ST_SCHEMA: [Slot; 22] = [
    Slot::integer("time_epoch"),
    Slot::number("wind_lull"),
    Slot::number("wind_avg"),
    Slot::number("wind_gust"),
    Slot::integer("wind_direction"),
    Slot::integer("wind_sample_interval"),
    Slot::nullable("station_pressure"),
    Slot::nullable("air_temperature"),
    Slot::nullable("relative_humidity"),
    Slot::integer("illuminance"),
    Slot::number("uv"),
    Slot::integer("solar_radiation"),
    Slot::number("rain_accumulated"),
    Slot::integer("precipitation_type"),
    Slot::integer("lightning_strike_avg_distance"),
    Slot::integer("lightning_strike_count"),
    Slot::number("battery"),
    Slot::integer("report_interval"),
    Slot::number("local_daily_rain_accumulation"),
    Slot::number("rain_accumulated_final"),
    Slot::number("local_daily_rain_accumulation_final"),
    Slot::integer("precipitation_analysis_type"),
];

/// A station observation message.
///
/// Carries the station status, a rolling summary and one or more
/// observation tuples (usually one; the first message after subscribing
/// may replay cached observations).
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRecord {
    /// The station that produced the observation.
    pub device_id: DeviceId,
    /// Where the server took the data from (e.g. `cache`, `mqtt`).
    pub source: String,
    /// Server status for this message.
    pub status: ObservationStatus,
    /// Derived values computed by the server.
    pub summary: ObservationSummary,
    /// Observations, oldest first.
    pub obs: Vec<Observation>,
}

/// Status block of an `obs_st` message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ObservationStatus {
    /// Zero on success.
    #[serde(default)]
    pub status_code: i64,
    /// Human readable status, e.g. `SUCCESS`.
    #[serde(default)]
    pub status_message: String,
}

/// Summary block of an `obs_st` message.
///
/// The server omits fields it has nothing to say about, so every value is
/// optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ObservationSummary {
    /// `rising`, `falling` or `steady`.
    pub pressure_trend: Option<String>,
    pub strike_count_1h: Option<i64>,
    pub strike_count_3h: Option<i64>,
    /// Precipitation over the last hour (mm).
    pub precip_total_1h: Option<f64>,
    /// Distance of the last strike (km).
    pub strike_last_dist: Option<i64>,
    pub strike_last_epoch: Option<i64>,
    pub precip_accum_local_yesterday: Option<f64>,
    pub precip_accum_local_yesterday_final: Option<f64>,
    pub precip_analysis_type_yesterday: Option<i64>,
    /// Per-five-minute rain flags for the last hour.
    pub raining_minutes: Option<Vec<i64>>,
    pub precip_minutes_local_day: Option<i64>,
    pub precip_minutes_local_yesterday: Option<i64>,
}

/// One positional observation from a Tempest station.
///
/// `station_pressure`, `air_temperature` and `relative_humidity` are `None`
/// when the sensor did not report, which is distinct from a reported zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Epoch seconds (UTC).
    pub time_epoch: i64,
    /// Minimum 3 second sample (m/s).
    pub wind_lull: f64,
    /// Average over the report interval (m/s).
    pub wind_avg: f64,
    /// Maximum 3 second sample (m/s).
    pub wind_gust: f64,
    /// Degrees.
    pub wind_direction: i64,
    /// Seconds.
    pub wind_sample_interval: i64,
    /// Millibar.
    pub station_pressure: Option<f64>,
    /// Degrees Celsius.
    pub air_temperature: Option<f64>,
    /// Percent.
    pub relative_humidity: Option<f64>,
    /// Lux.
    pub illuminance: i64,
    /// UV index.
    pub uv: f64,
    /// W/m².
    pub solar_radiation: i64,
    /// Rain over the previous minute (mm).
    pub rain_accumulated: f64,
    /// 0 none, 1 rain, 2 hail, 3 rain and hail.
    pub precipitation_type: i64,
    /// Kilometres.
    pub lightning_strike_avg_distance: i64,
    pub lightning_strike_count: i64,
    /// Volts.
    pub battery: f64,
    /// Minutes.
    pub report_interval: i64,
    pub local_daily_rain_accumulation: f64,
    pub rain_accumulated_final: f64,
    pub local_daily_rain_accumulation_final: f64,
    pub precipitation_analysis_type: i64,
}

impl Observation {
    /// Decodes one `obs` tuple.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` if the tuple does not have exactly 22 elements
    /// or an element does not match its slot.
    pub(crate) fn from_tuple(value: &Value) -> Result<Self, DecodeError> {
        let mut r = TupleReader::new("obs", &OBS_ST_SCHEMA, value)?;

        Ok(Self {
            time_epoch: r.integer()?,
            wind_lull: r.number()?,
            wind_avg: r.number()?,
            wind_gust: r.number()?,
            wind_direction: r.integer()?,
            wind_sample_interval: r.integer()?,
            station_pressure: r.nullable()?,
            air_temperature: r.nullable()?,
            relative_humidity: r.nullable()?,
            illuminance: r.integer()?,
            uv: r.number()?,
            solar_radiation: r.integer()?,
            rain_accumulated: r.number()?,
            precipitation_type: r.integer()?,
            lightning_strike_avg_distance: r.integer()?,
            lightning_strike_count: r.integer()?,
            battery: r.number()?,
            report_interval: r.integer()?,
            local_daily_rain_accumulation: r.number()?,
            rain_accumulated_final: r.number()?,
            local_daily_rain_accumulation_final: r.number()?,
            precipitation_analysis_type: r.integer()?,
        })
    }

    /// Returns the observation time, or `None` if the epoch is out of range.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.time_epoch, 0)
    }
}

#[derive(Deserialize)]
struct ObsStWire {
    device_id: DeviceId,
    #[serde(default)]
    source: String,
    #[serde(default)]
    status: ObservationStatus,
    #[serde(default)]
    summary: ObservationSummary,
    obs: Vec<Value>,
}

impl ObservationRecord {
    pub(crate) fn from_document(document: Value) -> Result<Self, DecodeError> {
        let wire: ObsStWire = serde_json::from_value(document)?;
        let obs = wire
            .obs
            .iter()
            .map(Observation::from_tuple)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            device_id: wire.device_id,
            source: wire.source,
            status: wire.status,
            summary: wire.summary,
            obs,
        })
    }

    /// Returns the most recent observation.
    #[must_use]
    pub fn latest(&self) -> Option<&Observation> {
        self.obs.last()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn tuple() -> Value {
        json!([
            1_681_701_838, 3.71, 4.31, 5.2, 298, 3, 722.8, null, null, 5, 0, 0, 0, 0, 0, 0, 2.45, 1,
            0, 0, 0, 0
        ])
    }

    #[test]
    fn decodes_full_tuple() {
        let obs = Observation::from_tuple(&tuple()).unwrap();

        assert_eq!(obs.time_epoch, 1_681_701_838);
        assert!((obs.wind_avg - 4.31).abs() < f64::EPSILON);
        assert_eq!(obs.wind_direction, 298);
        assert_eq!(obs.station_pressure, Some(722.8));
        assert_eq!(obs.air_temperature, None);
        assert_eq!(obs.relative_humidity, None);
        assert_eq!(obs.illuminance, 5);
        assert!((obs.battery - 2.45).abs() < f64::EPSILON);
        assert_eq!(obs.report_interval, 1);
    }

    #[test]
    fn fractional_uv_is_accepted() {
        let value = json!([
            1_681_767_864, 4.19, 4.24, 4.27, 285, 20, 722.7, null, null, 109_435, 6.19, 912, 0, 0,
            0, 0, 2.46, 1, 0, 0, 0, 0
        ]);
        let obs = Observation::from_tuple(&value).unwrap();
        assert!((obs.uv - 6.19).abs() < f64::EPSILON);
        assert_eq!(obs.solar_radiation, 912);
    }

    #[test]
    fn timestamp_converts_epoch() {
        let obs = Observation::from_tuple(&tuple()).unwrap();
        let ts = obs.timestamp().unwrap();
        assert_eq!(ts.timestamp(), 1_681_701_838);
    }

    #[test]
    fn summary_tolerates_missing_fields() {
        let summary: ObservationSummary =
            serde_json::from_value(json!({"pressure_trend": "steady"})).unwrap();
        assert_eq!(summary.pressure_trend.as_deref(), Some("steady"));
        assert_eq!(summary.strike_count_1h, None);
    }

    #[test]
    fn record_requires_device_id() {
        let doc = json!({"type": "obs_st", "obs": [tuple()]});
        assert!(matches!(
            ObservationRecord::from_document(doc),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn latest_returns_last_observation() {
        let mut second = tuple();
        second[0] = json!(1_681_701_898);
        let doc = json!({"type": "obs_st", "device_id": 1, "obs": [tuple(), second]});

        let record = ObservationRecord::from_document(doc).unwrap();
        assert_eq!(record.obs.len(), 2);
        assert_eq!(record.latest().unwrap().time_epoch, 1_681_701_898);
    }
}
