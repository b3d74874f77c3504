//! Query operations on the measurement table

use crate::schema::{delete_statement, insert_statement, MAX_ROWS_PER_INSERT};
use crate::{DbClient, DbError, DbResult};
use sqlx::mysql::{MySqlArguments, MySql};
use sqlx::query::Query;
use tracing::{debug, instrument};
use wx_core::{CompleteReading, Persistence, PersistenceResult, Timestamp};

/// Bind one reading in `DATA_COLUMNS` order
fn bind_reading<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    reading: &CompleteReading,
) -> Query<'q, MySql, MySqlArguments> {
    query
        .bind(reading.station_id)
        .bind(reading.timestamp)
        .bind(reading.temperature)
        .bind(reading.dew_point)
        .bind(reading.station_air_pressure)
        .bind(reading.sea_air_pressure)
        .bind(reading.visibility)
        .bind(reading.wind_speed)
        .bind(reading.precipitation)
        .bind(reading.snow_height)
        .bind(reading.overcast)
        .bind(reading.wind_direction)
        .bind(reading.flags.frozen)
        .bind(reading.flags.rained)
        .bind(reading.flags.snowed)
        .bind(reading.flags.hailed)
        .bind(reading.flags.thundered)
        .bind(reading.flags.whirlwinded)
}

impl DbClient {
    /// Insert all readings with one multi-row statement
    #[instrument(skip(self, readings), fields(rows = readings.len()))]
    pub async fn insert_readings(&mut self, readings: &[CompleteReading]) -> DbResult<u64> {
        if readings.is_empty() {
            return Ok(0);
        }
        if readings.len() > MAX_ROWS_PER_INSERT {
            return Err(DbError::BatchTooLarge(readings.len()));
        }

        let sql = insert_statement(readings.len());
        let query = readings
            .iter()
            .fold(sqlx::query(&sql), |query, reading| bind_reading(query, reading));

        let result = query.execute(self.connection()).await?;

        debug!("Inserted {} readings", result.rows_affected());
        Ok(result.rows_affected())
    }

    /// Delete readings older than timestamp
    #[instrument(skip(self))]
    pub async fn delete_readings_before(&mut self, timestamp: Timestamp) -> DbResult<u64> {
        let sql = delete_statement();
        let result = sqlx::query(&sql)
            .bind(timestamp)
            .execute(self.connection())
            .await?;

        let deleted = result.rows_affected();
        debug!("Deleted {} readings before {}", deleted, timestamp);
        Ok(deleted)
    }
}

#[async_trait::async_trait]
impl Persistence for DbClient {
    async fn insert_batch(&mut self, rows: &[CompleteReading]) -> PersistenceResult<u64> {
        Ok(self.insert_readings(rows).await?)
    }

    async fn delete_older_than(&mut self, cutoff: Timestamp) -> PersistenceResult<u64> {
        Ok(self.delete_readings_before(cutoff).await?)
    }
}
