use std::fs;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;
use verifier_assign::ReportStatus;
use verifier_assign::model::Volunteer;

use super::context::{open_store, resolve_config};
use crate::cli::ImportArgs;

#[derive(Debug, Deserialize)]
struct Fixture {
    #[serde(default)]
    users: Vec<Volunteer>,
    #[serde(default)]
    reports: Vec<FixtureReport>,
}

#[derive(Debug, Deserialize)]
struct FixtureReport {
    id: String,
    #[serde(default = "pending")]
    status: ReportStatus,
}

fn pending() -> ReportStatus {
    ReportStatus::Pending
}

pub fn run(args: ImportArgs) -> Result<()> {
    let raw = fs::read(&args.fixture)
        .with_context(|| format!("failed to read {}", args.fixture.display()))?;
    let fixture: Fixture = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", args.fixture.display()))?;

    let config = resolve_config(&args.engine)?;
    let store = open_store(&args.engine, &config)?;

    for user in &fixture.users {
        store
            .upsert_user(user)
            .with_context(|| format!("failed to import user {}", user.id))?;
    }
    for report in &fixture.reports {
        store
            .upsert_report(&report.id, report.status)
            .with_context(|| format!("failed to import report {}", report.id))?;
    }

    info!(
        fixture = %args.fixture.display(),
        users = fixture.users.len(),
        reports = fixture.reports.len(),
        "import completed"
    );
    Ok(())
}
