use anyhow::{Context, Result};
use tracing::info;

use super::context::EngineContext;
use super::output::{write_json, write_lines};
use crate::cli::{DriftArgs, ResyncArgs};

pub fn resync(args: ResyncArgs) -> Result<()> {
    let context = EngineContext::open(&args.engine)?;
    let summary = context
        .engine
        .full_resync()
        .context("failed to resync ranking structure")?;
    context.save_ranking()?;

    info!(
        cleared = summary.cleared,
        registered = summary.registered.len(),
        "resync completed"
    );

    if args.json {
        write_json(&summary)
    } else {
        write_lines(&summary.registered)
    }
}

pub fn drift(args: DriftArgs) -> Result<()> {
    let context = EngineContext::open(&args.engine)?;
    let report = context
        .engine
        .drift_report()
        .context("failed to compute drift")?;

    info!(
        stale = report.stale.len(),
        unregistered = report.unregistered.len(),
        "drift check completed"
    );

    if args.json {
        write_json(&report)
    } else {
        write_lines(&report.stale)
    }
}
