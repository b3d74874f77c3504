//! Layout of the measurement table
//!
//! IMPORTANT: the column order below is bound positionally by the batch
//! insert. Do not reorder without changing `queries::bind_reading`.

/// Table holding one row per persisted reading
pub const DATA_TABLE: &str = "data";

/// Columns in insert order
pub const DATA_COLUMNS: [&str; 18] = [
    "station_id",
    "date",
    "temperature",
    "dew_point",
    "station_air_pressure",
    "sea_air_pressure",
    "visibility",
    "wind_speed",
    "precipitation",
    "snow_height",
    "overcast",
    "wind_direction",
    "has_frozen",
    "has_rained",
    "has_snowed",
    "has_hailed",
    "has_thundered",
    "has_whirlwinded",
];

/// MySQL prepared statements accept at most this many placeholders
pub const MAX_PLACEHOLDERS: usize = u16::MAX as usize;

/// Largest number of rows one batch insert can carry
pub const MAX_ROWS_PER_INSERT: usize = MAX_PLACEHOLDERS / DATA_COLUMNS.len();

/// Build the multi-row INSERT text for `rows` readings
pub fn insert_statement(rows: usize) -> String {
    let placeholders = vec!["?"; DATA_COLUMNS.len()].join(",");
    let tuple = format!("({placeholders})");

    let mut sql = format!(
        "INSERT INTO {DATA_TABLE}({})VALUES",
        DATA_COLUMNS.join(",")
    );
    sql.reserve((tuple.len() + 1) * rows);
    for i in 0..rows {
        if i != 0 {
            sql.push(',');
        }
        sql.push_str(&tuple);
    }
    sql
}

/// Bulk delete of aged rows; binds the cutoff in epoch seconds
pub fn delete_statement() -> String {
    format!("DELETE FROM {DATA_TABLE} WHERE date < ?")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_rows_per_insert() {
        assert_eq!(MAX_ROWS_PER_INSERT, 3640);
        assert!(MAX_ROWS_PER_INSERT * DATA_COLUMNS.len() <= MAX_PLACEHOLDERS);
    }

    #[test]
    fn test_single_row_statement() {
        insta::assert_snapshot!(
            insert_statement(1),
            @"INSERT INTO data(station_id,date,temperature,dew_point,station_air_pressure,sea_air_pressure,visibility,wind_speed,precipitation,snow_height,overcast,wind_direction,has_frozen,has_rained,has_snowed,has_hailed,has_thundered,has_whirlwinded)VALUES(?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?)"
        );
    }

    #[test]
    fn test_statement_grows_with_chunk() {
        let sql = insert_statement(3);
        let placeholders = sql.matches('?').count();
        assert_eq!(placeholders, 3 * DATA_COLUMNS.len());
        assert_eq!(sql.matches("),(").count(), 2);
        assert!(sql.ends_with(")"));
    }

    #[test]
    fn test_delete_statement() {
        insta::assert_snapshot!(delete_statement(), @"DELETE FROM data WHERE date < ?");
    }
}
