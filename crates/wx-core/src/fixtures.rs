//! Shared test records

use crate::{StationId, StationRecord, Timestamp};

/// A record with every measurement and flag present
pub fn complete_record(station_id: StationId, timestamp: Timestamp) -> StationRecord {
    StationRecord {
        temperature: Some(12.5),
        dew_point: Some(8.1),
        station_air_pressure: Some(1012.3),
        sea_air_pressure: Some(1015.0),
        visibility: Some(24.1),
        wind_speed: Some(14.4),
        precipitation: Some(0.2),
        snow_height: Some(0.0),
        overcast: Some(62.5),
        wind_direction: Some(270),
        has_frozen: Some(false),
        has_rained: Some(true),
        has_snowed: Some(false),
        has_hailed: Some(false),
        has_thundered: Some(true),
        has_whirlwinded: Some(false),
        ..StationRecord::new(station_id, timestamp)
    }
}
