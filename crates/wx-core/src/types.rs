//! Core data types for station readings

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Timestamp type (Unix epoch seconds)
pub type Timestamp = i64;

/// Station identifier as sent by the station itself
pub type StationId = i32;

/// Combine a calendar date and a time of day (UTC) into epoch seconds
pub fn epoch_seconds(date: NaiveDate, time: NaiveTime) -> Timestamp {
    date.and_time(time).and_utc().timestamp()
}

/// Latest, possibly incomplete, reading of a single station.
///
/// Stations may spread one reading over several messages, so every
/// measurement is optional. A record only becomes persistable once all of
/// them are present, see [`StationRecord::to_complete`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRecord {
    pub station_id: StationId,

    /// Event time of the most recent update
    pub timestamp: Timestamp,

    /// Degrees Celsius
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Degrees Celsius
    #[serde(default)]
    pub dew_point: Option<f32>,
    /// Millibar at station level
    #[serde(default)]
    pub station_air_pressure: Option<f32>,
    /// Millibar at sea level
    #[serde(default)]
    pub sea_air_pressure: Option<f32>,
    /// Kilometres
    #[serde(default)]
    pub visibility: Option<f32>,
    /// Kilometres per hour
    #[serde(default)]
    pub wind_speed: Option<f32>,
    /// Centimetres
    #[serde(default)]
    pub precipitation: Option<f32>,
    /// Centimetres
    #[serde(default)]
    pub snow_height: Option<f32>,
    /// Percentage
    #[serde(default)]
    pub overcast: Option<f32>,
    /// Degrees
    #[serde(default)]
    pub wind_direction: Option<i16>,

    #[serde(default)]
    pub has_frozen: Option<bool>,
    #[serde(default)]
    pub has_rained: Option<bool>,
    #[serde(default)]
    pub has_snowed: Option<bool>,
    #[serde(default)]
    pub has_hailed: Option<bool>,
    #[serde(default)]
    pub has_thundered: Option<bool>,
    #[serde(default)]
    pub has_whirlwinded: Option<bool>,

    /// Set on every update, cleared once the scheduler has dispatched it
    #[serde(skip, default = "fresh")]
    pub is_new: bool,
}

fn fresh() -> bool {
    true
}

impl StationRecord {
    /// Empty reading for a station; every measurement absent
    pub fn new(station_id: StationId, timestamp: Timestamp) -> Self {
        Self {
            station_id,
            timestamp,
            temperature: None,
            dew_point: None,
            station_air_pressure: None,
            sea_air_pressure: None,
            visibility: None,
            wind_speed: None,
            precipitation: None,
            snow_height: None,
            overcast: None,
            wind_direction: None,
            has_frozen: None,
            has_rained: None,
            has_snowed: None,
            has_hailed: None,
            has_thundered: None,
            has_whirlwinded: None,
            is_new: true,
        }
    }

    /// Merge a newer partial reading into this one.
    ///
    /// The timestamp always follows `other`; measurements only where `other`
    /// carries a value. The record is marked new afterwards, even if nothing
    /// changed.
    pub fn merge_from(&mut self, other: &StationRecord) {
        self.timestamp = other.timestamp;

        self.temperature = other.temperature.or(self.temperature);
        self.dew_point = other.dew_point.or(self.dew_point);
        self.station_air_pressure = other.station_air_pressure.or(self.station_air_pressure);
        self.sea_air_pressure = other.sea_air_pressure.or(self.sea_air_pressure);
        self.visibility = other.visibility.or(self.visibility);
        self.wind_speed = other.wind_speed.or(self.wind_speed);
        self.precipitation = other.precipitation.or(self.precipitation);
        self.snow_height = other.snow_height.or(self.snow_height);
        self.overcast = other.overcast.or(self.overcast);
        self.wind_direction = other.wind_direction.or(self.wind_direction);

        self.has_frozen = other.has_frozen.or(self.has_frozen);
        self.has_rained = other.has_rained.or(self.has_rained);
        self.has_snowed = other.has_snowed.or(self.has_snowed);
        self.has_hailed = other.has_hailed.or(self.has_hailed);
        self.has_thundered = other.has_thundered.or(self.has_thundered);
        self.has_whirlwinded = other.has_whirlwinded.or(self.has_whirlwinded);

        self.is_new = true;
    }

    /// Whether every optional field is present
    pub fn is_complete(&self) -> bool {
        self.to_complete().is_some()
    }

    /// Persistable copy of this record, or `None` while any field is missing
    pub fn to_complete(&self) -> Option<CompleteReading> {
        Some(CompleteReading {
            station_id: self.station_id,
            timestamp: self.timestamp,
            temperature: self.temperature?,
            dew_point: self.dew_point?,
            station_air_pressure: self.station_air_pressure?,
            sea_air_pressure: self.sea_air_pressure?,
            visibility: self.visibility?,
            wind_speed: self.wind_speed?,
            precipitation: self.precipitation?,
            snow_height: self.snow_height?,
            overcast: self.overcast?,
            wind_direction: self.wind_direction?,
            flags: EventFlags {
                frozen: self.has_frozen?,
                rained: self.has_rained?,
                snowed: self.has_snowed?,
                hailed: self.has_hailed?,
                thundered: self.has_thundered?,
                whirlwinded: self.has_whirlwinded?,
            },
        })
    }
}

/// Weather events observed since the previous reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventFlags {
    pub frozen: bool,
    pub rained: bool,
    pub snowed: bool,
    pub hailed: bool,
    pub thundered: bool,
    pub whirlwinded: bool,
}

/// A station reading with every measurement present.
///
/// This is the only shape handed to persistence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompleteReading {
    pub station_id: StationId,
    pub timestamp: Timestamp,
    pub temperature: f32,
    pub dew_point: f32,
    pub station_air_pressure: f32,
    pub sea_air_pressure: f32,
    pub visibility: f32,
    pub wind_speed: f32,
    pub precipitation: f32,
    pub snow_height: f32,
    pub overcast: f32,
    pub wind_direction: i16,
    pub flags: EventFlags,
}
