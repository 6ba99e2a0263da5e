//! Durable system of record for reports, assignments and volunteer accounts.

use std::collections::HashSet;

use crate::error::EngineResult;
use crate::model::{Report, Volunteer};

mod schema;
mod sqlite;

pub use schema::DB_SCHEMA_VERSION;
pub use sqlite::{SqliteStore, StoreCounts};

/// Per-row result of an assignment insert batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistSummary {
    /// Rows written by this call.
    pub inserted: Vec<String>,
    /// Ids whose (report, volunteer) row already existed.
    pub duplicates: Vec<String>,
    /// Ids refused by a database constraint, e.g. a missing volunteer row.
    pub rejected: Vec<String>,
    /// Ids skipped because the report already held `limit` rows.
    pub over_limit: Vec<String>,
    /// Assignment rows for the report after the call.
    pub total_rows: u32,
}

/// Operations the engine consumes from the durable store. Each call is
/// transactional on its own; no call spans another.
pub trait DurableStore: Send + Sync {
    fn find_report(&self, report_id: &str) -> EngineResult<Option<Report>>;

    fn assigned_volunteer_ids(&self, report_id: &str) -> EngineResult<Vec<String>>;

    /// Subset of `candidate_ids` that exist with the volunteer role.
    fn eligible_volunteer_ids(&self, candidate_ids: &[String]) -> EngineResult<HashSet<String>>;

    fn find_volunteer(&self, volunteer_id: &str) -> EngineResult<Option<Volunteer>>;

    fn list_eligible_volunteers(&self) -> EngineResult<Vec<Volunteer>>;

    /// Inserts PENDING assignment rows, skipping pairs already present and
    /// never letting the report's row count exceed `limit`.
    fn insert_assignments(
        &self,
        report_id: &str,
        volunteer_ids: &[String],
        limit: u32,
    ) -> EngineResult<PersistSummary>;

    /// Sets the report's `assigned_count` to its assignment row count as
    /// seen by the write itself, and returns that count.
    fn sync_assigned_count(&self, report_id: &str) -> EngineResult<u32>;
}
