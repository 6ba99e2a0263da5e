use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use rusqlite::types::Type;
use rusqlite::{
    Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior, params, params_from_iter,
};
use serde::Serialize;
use tracing::{debug, warn};

use super::schema::{configure_connection, ensure_schema};
use super::{DurableStore, PersistSummary};
use crate::error::{EngineError, EngineResult, Stage};
use crate::model::{Assignment, Report, ReportStatus, VOLUNTEER_ROLE, Volunteer};
use crate::util::{assignment_id, now_utc_string};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub volunteers: i64,
    pub reports_by_status: BTreeMap<String, i64>,
    pub assignments: i64,
}

/// SQLite-backed [`DurableStore`]. One connection, guarded by a timed lock.
#[derive(Debug)]
pub struct SqliteStore {
    connection: Mutex<Connection>,
    io_timeout: Duration,
}

impl SqliteStore {
    pub fn open(path: &Path, io_timeout: Duration) -> EngineResult<Self> {
        Self::from_connection(Connection::open(path)?, io_timeout)
    }

    pub fn open_in_memory(io_timeout: Duration) -> EngineResult<Self> {
        Self::from_connection(Connection::open_in_memory()?, io_timeout)
    }

    fn from_connection(connection: Connection, io_timeout: Duration) -> EngineResult<Self> {
        configure_connection(&connection, io_timeout)?;
        ensure_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
            io_timeout,
        })
    }

    fn lock(&self, stage: Stage) -> EngineResult<MutexGuard<'_, Connection>> {
        self.connection
            .try_lock_for(self.io_timeout)
            .ok_or_else(|| self.timeout(stage))
    }

    fn timeout(&self, stage: Stage) -> EngineError {
        EngineError::Timeout {
            stage,
            timeout_ms: self.io_timeout.as_millis() as u64,
        }
    }

    /// Maps SQLite busy/locked errors onto the bounded-wait taxonomy.
    fn classify(&self, err: rusqlite::Error, stage: Stage) -> EngineError {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => self.timeout(stage),
            _ => EngineError::Store(err),
        }
    }

    pub fn upsert_user(&self, user: &Volunteer) -> EngineResult<()> {
        let connection = self.lock(Stage::Persist)?;
        connection
            .execute(
                "
                INSERT INTO users(id, email, name, role, capacity, created_at)
                VALUES(?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(id) DO UPDATE SET
                  email=excluded.email,
                  name=excluded.name,
                  role=excluded.role,
                  capacity=excluded.capacity
                ",
                params![
                    user.id,
                    user.email,
                    user.name,
                    user.role,
                    user.capacity,
                    now_utc_string()
                ],
            )
            .map_err(|err| self.classify(err, Stage::Persist))?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn delete_user(&self, user_id: &str) -> EngineResult<bool> {
        let connection = self.lock(Stage::Persist)?;
        let removed = connection
            .execute("DELETE FROM users WHERE id = ?1", [user_id])
            .map_err(|err| self.classify(err, Stage::Persist))?;
        Ok(removed > 0)
    }

    /// Inserts a report, or updates the status of an existing one.
    pub fn upsert_report(&self, report_id: &str, status: ReportStatus) -> EngineResult<()> {
        let connection = self.lock(Stage::Persist)?;
        connection
            .execute(
                "
                INSERT INTO reports(id, status, assigned_count, created_at)
                VALUES(?1, ?2, 0, ?3)
                ON CONFLICT(id) DO UPDATE SET status=excluded.status
                ",
                params![report_id, status.as_str(), now_utc_string()],
            )
            .map_err(|err| self.classify(err, Stage::Persist))?;
        Ok(())
    }

    /// Pending report ids, oldest first.
    pub fn list_pending_report_ids(&self) -> EngineResult<Vec<String>> {
        let connection = self.lock(Stage::Lookup)?;
        let mut statement = connection.prepare(
            "SELECT id FROM reports WHERE status = ?1 ORDER BY created_at ASC, id ASC",
        )?;
        let ids = statement
            .query_map([ReportStatus::Pending.as_str()], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    pub fn list_assignments(&self, report_id: &str) -> EngineResult<Vec<Assignment>> {
        let connection = self.lock(Stage::Lookup)?;
        let mut statement = connection.prepare(
            "
            SELECT id, report_id, volunteer_id, status, created_at
            FROM assignments
            WHERE report_id = ?1
            ORDER BY volunteer_id ASC
            ",
        )?;
        let rows = statement
            .query_map([report_id], |row| {
                Ok(Assignment {
                    id: row.get(0)?,
                    report_id: row.get(1)?,
                    volunteer_id: row.get(2)?,
                    status: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn counts(&self) -> EngineResult<StoreCounts> {
        let connection = self.lock(Stage::Lookup)?;
        let volunteers: i64 = connection.query_row(
            "SELECT COUNT(*) FROM users WHERE role = ?1",
            [VOLUNTEER_ROLE],
            |row| row.get(0),
        )?;
        let assignments: i64 =
            connection.query_row("SELECT COUNT(*) FROM assignments", [], |row| row.get(0))?;

        let mut reports_by_status: BTreeMap<String, i64> = BTreeMap::new();
        let mut statement =
            connection.prepare("SELECT status, COUNT(*) FROM reports GROUP BY status")?;
        let mut rows = statement.query([])?;
        while let Some(row) = rows.next()? {
            reports_by_status.insert(row.get(0)?, row.get(1)?);
        }

        Ok(StoreCounts {
            volunteers,
            reports_by_status,
            assignments,
        })
    }
}

fn report_from_row(row: &Row<'_>) -> rusqlite::Result<Report> {
    let status: String = row.get(1)?;
    let status = status
        .parse::<ReportStatus>()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, err.into()))?;
    Ok(Report {
        id: row.get(0)?,
        status,
        assigned_count: row.get(2)?,
    })
}

fn volunteer_from_row(row: &Row<'_>) -> rusqlite::Result<Volunteer> {
    Ok(Volunteer {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        role: row.get(3)?,
        capacity: row.get(4)?,
    })
}

impl DurableStore for SqliteStore {
    fn find_report(&self, report_id: &str) -> EngineResult<Option<Report>> {
        let connection = self.lock(Stage::Lookup)?;
        connection
            .query_row(
                "SELECT id, status, assigned_count FROM reports WHERE id = ?1",
                [report_id],
                report_from_row,
            )
            .optional()
            .map_err(|err| self.classify(err, Stage::Lookup))
    }

    fn assigned_volunteer_ids(&self, report_id: &str) -> EngineResult<Vec<String>> {
        let connection = self.lock(Stage::Lookup)?;
        let mut statement = connection.prepare(
            "SELECT volunteer_id FROM assignments WHERE report_id = ?1 ORDER BY volunteer_id",
        )?;
        let ids = statement
            .query_map([report_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()
            .map_err(|err| self.classify(err, Stage::Lookup))?;
        Ok(ids)
    }

    fn eligible_volunteer_ids(&self, candidate_ids: &[String]) -> EngineResult<HashSet<String>> {
        if candidate_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let placeholders = (0..candidate_ids.len())
            .map(|index| format!("?{}", index + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SELECT id FROM users WHERE role = ?1 AND id IN ({placeholders})");

        let connection = self.lock(Stage::Validate)?;
        let mut statement = connection.prepare(&sql)?;
        let values = std::iter::once(VOLUNTEER_ROLE).chain(candidate_ids.iter().map(String::as_str));
        let eligible = statement
            .query_map(params_from_iter(values), |row| row.get(0))?
            .collect::<rusqlite::Result<HashSet<String>>>()
            .map_err(|err| self.classify(err, Stage::Validate))?;
        Ok(eligible)
    }

    fn find_volunteer(&self, volunteer_id: &str) -> EngineResult<Option<Volunteer>> {
        let connection = self.lock(Stage::Lookup)?;
        connection
            .query_row(
                "SELECT id, email, name, role, capacity FROM users WHERE id = ?1",
                [volunteer_id],
                volunteer_from_row,
            )
            .optional()
            .map_err(|err| self.classify(err, Stage::Lookup))
    }

    fn list_eligible_volunteers(&self) -> EngineResult<Vec<Volunteer>> {
        let connection = self.lock(Stage::Reconcile)?;
        let mut statement = connection.prepare(
            "SELECT id, email, name, role, capacity FROM users WHERE role = ?1 ORDER BY id",
        )?;
        let volunteers = statement
            .query_map([VOLUNTEER_ROLE], volunteer_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|err| self.classify(err, Stage::Reconcile))?;
        Ok(volunteers)
    }

    fn insert_assignments(
        &self,
        report_id: &str,
        volunteer_ids: &[String],
        limit: u32,
    ) -> EngineResult<PersistSummary> {
        let mut connection = self.lock(Stage::Persist)?;
        let tx = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| self.classify(err, Stage::Persist))?;

        let mut summary = PersistSummary::default();
        {
            let mut current: u32 = tx.query_row(
                "SELECT COUNT(*) FROM assignments WHERE report_id = ?1",
                [report_id],
                |row| row.get(0),
            )?;
            let mut insert = tx.prepare(
                "
                INSERT OR IGNORE INTO assignments(id, report_id, volunteer_id, status, created_at)
                VALUES(?1, ?2, ?3, 'PENDING', ?4)
                ",
            )?;
            let created_at = now_utc_string();

            for volunteer_id in volunteer_ids {
                if current >= limit {
                    summary.over_limit.push(volunteer_id.clone());
                    continue;
                }

                let row_id = assignment_id(report_id, volunteer_id);
                match insert.execute(params![row_id, report_id, volunteer_id, created_at]) {
                    Ok(0) => summary.duplicates.push(volunteer_id.clone()),
                    Ok(_) => {
                        current += 1;
                        summary.inserted.push(volunteer_id.clone());
                    }
                    Err(err) if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => {
                        warn!(report_id, volunteer_id = %volunteer_id, error = %err, "assignment row rejected");
                        summary.rejected.push(volunteer_id.clone());
                    }
                    Err(err) => return Err(self.classify(err, Stage::Persist)),
                }
            }
            summary.total_rows = current;
        }

        tx.commit().map_err(|err| self.classify(err, Stage::Persist))?;
        debug!(
            report_id,
            inserted = summary.inserted.len(),
            duplicates = summary.duplicates.len(),
            rejected = summary.rejected.len(),
            over_limit = summary.over_limit.len(),
            "assignment rows persisted"
        );
        Ok(summary)
    }

    fn sync_assigned_count(&self, report_id: &str) -> EngineResult<u32> {
        let connection = self.lock(Stage::UpdateCount)?;
        let count: Option<u32> = connection
            .query_row(
                "
                UPDATE reports
                SET assigned_count = (SELECT COUNT(*) FROM assignments WHERE report_id = ?1)
                WHERE id = ?1
                RETURNING assigned_count
                ",
                [report_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| self.classify(err, Stage::UpdateCount))?;
        count.ok_or_else(|| EngineError::NotFound {
            entity: "report",
            id: report_id.to_string(),
        })
    }
}
