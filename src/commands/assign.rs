use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{error, info};
use verifier_assign::AssignmentResult;

use super::context::EngineContext;
use super::output::{write_assignment_text, write_json};
use crate::cli::{AssignArgs, AssignPendingArgs};

#[derive(Debug, Serialize)]
struct PendingRunSummary {
    pending: usize,
    workers: usize,
    outcomes: BTreeMap<String, usize>,
    failed: Vec<FailedReport>,
    results: Vec<AssignmentResult>,
}

#[derive(Debug, Serialize)]
struct FailedReport {
    report_id: String,
    error: String,
}

pub fn run(args: AssignArgs) -> Result<()> {
    let context = EngineContext::open(&args.engine)?;
    let result = context
        .engine
        .assign_report_to_volunteers(&args.report_id)
        .with_context(|| format!("assignment failed for report {}", args.report_id))?;
    context.save_ranking()?;

    if args.json {
        write_json(&result)
    } else {
        write_assignment_text(std::slice::from_ref(&result))
    }
}

pub fn run_pending(args: AssignPendingArgs) -> Result<()> {
    let context = EngineContext::open(&args.engine)?;
    let pending = context
        .store
        .list_pending_report_ids()
        .context("failed to list pending reports")?;
    let workers = args.workers.clamp(1, pending.len().max(1));

    info!(pending = pending.len(), workers, "assigning pending reports");

    let next = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel::<(usize, Result<AssignmentResult, String>)>();

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let next = &next;
            let pending = &pending;
            let engine = &context.engine;
            scope.spawn(move || {
                loop {
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    let Some(report_id) = pending.get(index) else {
                        break;
                    };
                    let outcome = engine
                        .assign_report_to_volunteers(report_id)
                        .map_err(|err| err.to_string());
                    let _ = tx.send((index, outcome));
                }
            });
        }
    });
    drop(tx);

    let mut collected: Vec<(usize, Result<AssignmentResult, String>)> = rx.into_iter().collect();
    collected.sort_by_key(|(index, _)| *index);

    let mut outcomes = BTreeMap::new();
    let mut failed = Vec::new();
    let mut results = Vec::with_capacity(collected.len());
    for (index, outcome) in collected {
        match outcome {
            Ok(result) => {
                *outcomes.entry(result.outcome.to_string()).or_insert(0) += 1;
                results.push(result);
            }
            Err(err) => {
                error!(report_id = %pending[index], error = %err, "assignment failed");
                failed.push(FailedReport {
                    report_id: pending[index].clone(),
                    error: err,
                });
            }
        }
    }

    context.save_ranking()?;
    info!(
        pending = pending.len(),
        succeeded = results.len(),
        failed = failed.len(),
        "pending assignment completed"
    );

    if args.json {
        write_json(&PendingRunSummary {
            pending: pending.len(),
            workers,
            outcomes,
            failed,
            results,
        })
    } else {
        write_assignment_text(&results)
    }
}
