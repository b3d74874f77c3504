//! Parser for `<WEATHERDATA>` documents sent by stations
//!
//! One `<MEASUREMENT>` element per reading, one tag per line:
//!
//! ```text
//! <WEATHERDATA>
//!     <MEASUREMENT>
//!         <STN>123456</STN>
//!         <DATE>2009-09-13</DATE>
//!         <TIME>15:59:46</TIME>
//!         <TEMP>-60.1</TEMP>
//!         ...
//!     </MEASUREMENT>
//! </WEATHERDATA>
//! ```
//!
//! Empty tags mean the station did not report that value.

use chrono::{NaiveDate, NaiveTime};
use std::str::FromStr;
use tracing::warn;
use wx_core::{epoch_seconds, StationId, StationRecord};

/// Closing line of one document
pub const DOCUMENT_END: &str = "</WEATHERDATA>";

/// Fields of one measurement while its lines are read
#[derive(Debug, Default)]
struct PendingMeasurement {
    station_id: Option<StationId>,
    date: Option<NaiveDate>,
    time: Option<NaiveTime>,
    record: Option<StationRecord>,
}

impl PendingMeasurement {
    fn record(&mut self) -> &mut StationRecord {
        self.record.get_or_insert_with(|| StationRecord::new(0, 0))
    }

    fn apply(&mut self, tag: &str, value: &str) {
        match tag {
            "STN" => self.station_id = parse_value(tag, value),
            "DATE" => self.date = parse_with(tag, value, |v| NaiveDate::parse_from_str(v, "%Y-%m-%d")),
            "TIME" => self.time = parse_with(tag, value, |v| NaiveTime::parse_from_str(v, "%H:%M:%S")),
            "TEMP" => self.record().temperature = parse_value(tag, value),
            "DEWP" => self.record().dew_point = parse_value(tag, value),
            "STP" => self.record().station_air_pressure = parse_value(tag, value),
            "SLP" => self.record().sea_air_pressure = parse_value(tag, value),
            "VISIB" => self.record().visibility = parse_value(tag, value),
            "WDSP" => self.record().wind_speed = parse_value(tag, value),
            "PRCP" => self.record().precipitation = parse_value(tag, value),
            "SNDP" => self.record().snow_height = parse_value(tag, value),
            "CLDC" => self.record().overcast = parse_value(tag, value),
            "WNDDIR" => self.record().wind_direction = parse_value(tag, value),
            "FRSHTT" => self.apply_events(value),
            _ => {}
        }
    }

    /// Six 0/1 characters: frozen, rained, snowed, hailed, thundered, whirlwind
    fn apply_events(&mut self, value: &str) {
        if value.is_empty() {
            return;
        }
        let flags: Vec<bool> = value.chars().map(|c| c != '0').collect();
        if flags.len() != 6 {
            warn!(value, "Ignoring malformed FRSHTT value");
            return;
        }

        let record = self.record();
        record.has_frozen = Some(flags[0]);
        record.has_rained = Some(flags[1]);
        record.has_snowed = Some(flags[2]);
        record.has_hailed = Some(flags[3]);
        record.has_thundered = Some(flags[4]);
        record.has_whirlwinded = Some(flags[5]);
    }

    fn finish(self) -> Option<StationRecord> {
        let (Some(station_id), Some(date), Some(time)) = (self.station_id, self.date, self.time)
        else {
            warn!(
                station = ?self.station_id,
                "Skipping measurement without station, date or time"
            );
            return None;
        };

        let mut record = self.record.unwrap_or_else(|| StationRecord::new(0, 0));
        record.station_id = station_id;
        record.timestamp = epoch_seconds(date, time);
        record.is_new = true;
        Some(record)
    }
}

fn parse_with<T, E, F>(tag: &str, value: &str, parse: F) -> Option<T>
where
    F: FnOnce(&str) -> Result<T, E>,
    E: std::fmt::Display,
{
    if value.is_empty() {
        return None;
    }
    match parse(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(tag, value, "Ignoring unparseable value: {}", e);
            None
        }
    }
}

fn parse_value<T>(tag: &str, value: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_with(tag, value, T::from_str)
}

/// Split `<TAG>value</TAG>` into its tag and trimmed value
fn split_element(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix('<')?;
    let (tag, rest) = rest.split_once('>')?;
    let (value, closing) = rest.split_once("</")?;
    if closing.strip_suffix('>')? != tag {
        return None;
    }
    Some((tag, value.trim()))
}

/// Parse every measurement of one document into station records
pub fn parse_weather_data(document: &str) -> Vec<StationRecord> {
    let mut records = Vec::new();
    let mut pending: Option<PendingMeasurement> = None;

    for line in document.lines().map(str::trim) {
        match line {
            "<MEASUREMENT>" => {
                pending = Some(PendingMeasurement::default());
            }
            "</MEASUREMENT>" => {
                if let Some(record) = pending.take().and_then(PendingMeasurement::finish) {
                    records.push(record);
                }
            }
            _ => {
                if let (Some(measurement), Some((tag, value))) =
                    (pending.as_mut(), split_element(line))
                {
                    measurement.apply(tag, value);
                }
            }
        }
    }

    records
}
