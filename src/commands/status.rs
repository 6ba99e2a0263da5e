use anyhow::{Context, Result};
use tracing::info;
use verifier_assign::model::WorkloadEntry;
use verifier_assign::store::DB_SCHEMA_VERSION;

use super::context::EngineContext;
use crate::cli::StatusArgs;

pub fn run(args: StatusArgs) -> Result<()> {
    let context = EngineContext::open(&args.engine)?;

    let counts = context.store.counts().context("failed to count rows")?;
    info!(
        db_schema_version = DB_SCHEMA_VERSION,
        volunteers = counts.volunteers,
        assignments = counts.assignments,
        reports = ?counts.reports_by_status,
        "database status"
    );

    let entries = context
        .engine
        .registry()
        .snapshot()
        .context("failed to read ranking structure")?;
    let load = RankingLoad::from_entries(&entries);
    info!(
        volunteers = entries.len(),
        reserved = load.reserved,
        saturated = load.saturated,
        target_verifiers = context.engine.target_verifiers(),
        "ranking status"
    );

    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
struct RankingLoad {
    reserved: u64,
    saturated: usize,
}

impl RankingLoad {
    fn from_entries(entries: &[WorkloadEntry]) -> Self {
        Self {
            reserved: entries.iter().map(|entry| u64::from(entry.score)).sum(),
            saturated: entries
                .iter()
                .filter(|entry| entry.score >= entry.capacity)
                .count(),
        }
    }
}
