use anyhow::{Context, Result};
use rusqlite::Connection;

use super::DB_SCHEMA_VERSION;
use aoilog::util::now_utc_string;

pub fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

pub fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS metadata (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS lot_data (
              lot_num INTEGER NOT NULL,
              machine TEXT NOT NULL,
              layout TEXT NOT NULL,
              layer TEXT NOT NULL,
              start_date TEXT,
              end_date TEXT,
              input_es INTEGER NOT NULL DEFAULT 0,
              reviewed_es INTEGER NOT NULL DEFAULT 0,
              good_es INTEGER NOT NULL DEFAULT 0,
              reject_es INTEGER NOT NULL DEFAULT 0,
              output_es INTEGER NOT NULL DEFAULT 0,
              substrate_cnt INTEGER NOT NULL DEFAULT 0,
              PRIMARY KEY (lot_num, machine, layer)
            );

            CREATE TABLE IF NOT EXISTS circuit_data (
              lot_num INTEGER NOT NULL,
              substrate_num INTEGER NOT NULL,
              circuit_num INTEGER NOT NULL,
              status TEXT NOT NULL,
              length REAL NOT NULL,
              breadth REAL NOT NULL,
              area REAL NOT NULL,
              did_stop INTEGER NOT NULL DEFAULT 0,
              layer TEXT NOT NULL,
              PRIMARY KEY (lot_num, substrate_num, circuit_num, layer)
            );

            CREATE INDEX IF NOT EXISTS idx_lot_data_start ON lot_data(start_date);
            CREATE INDEX IF NOT EXISTS idx_circuit_data_status ON circuit_data(status);
            ",
        )
        .context("failed to initialize lot schema")?;

    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('schema_checked_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now_utc_string()],
    )?;

    Ok(())
}

pub fn count_rows(connection: &Connection, sql: &str) -> Result<i64> {
    let count = connection
        .query_row(sql, [], |row| row.get(0))
        .with_context(|| format!("failed to count rows: {sql}"))?;
    Ok(count)
}
