use std::time::Duration;

use rusqlite::Connection;

use crate::util::now_utc_string;

pub const DB_SCHEMA_VERSION: &str = "0.1.0";

pub(super) fn configure_connection(
    connection: &Connection,
    busy_timeout: Duration,
) -> rusqlite::Result<()> {
    connection.pragma_update(None, "journal_mode", "WAL")?;
    connection.pragma_update(None, "synchronous", "NORMAL")?;
    connection.pragma_update(None, "foreign_keys", "ON")?;
    connection.busy_timeout(busy_timeout)?;
    Ok(())
}

pub(super) fn ensure_schema(connection: &Connection) -> rusqlite::Result<()> {
    connection.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS metadata (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS users (
          id TEXT PRIMARY KEY,
          email TEXT NOT NULL,
          name TEXT NOT NULL,
          role TEXT NOT NULL,
          capacity INTEGER CHECK (capacity IS NULL OR capacity >= 0),
          created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS reports (
          id TEXT PRIMARY KEY,
          status TEXT NOT NULL
            CHECK (status IN ('PENDING', 'VERIFIED', 'REJECTED', 'SCHEDULED', 'COMPLETED')),
          assigned_count INTEGER NOT NULL DEFAULT 0 CHECK (assigned_count >= 0),
          created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS assignments (
          id TEXT PRIMARY KEY,
          report_id TEXT NOT NULL,
          volunteer_id TEXT NOT NULL,
          status TEXT NOT NULL,
          created_at TEXT NOT NULL,
          UNIQUE (report_id, volunteer_id),
          FOREIGN KEY(report_id) REFERENCES reports(id),
          FOREIGN KEY(volunteer_id) REFERENCES users(id)
        );

        CREATE INDEX IF NOT EXISTS idx_users_role ON users(role);
        CREATE INDEX IF NOT EXISTS idx_reports_status_created ON reports(status, created_at);
        CREATE INDEX IF NOT EXISTS idx_assignments_volunteer ON assignments(volunteer_id);
        ",
    )?;

    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now_utc_string()],
    )?;

    Ok(())
}
