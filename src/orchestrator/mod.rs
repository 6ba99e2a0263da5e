//! Drives one report from lookup to notification.
//!
//! Steps run strictly in order: LOOKUP, CHECK_ELIGIBLE, SELECT, VALIDATE,
//! PERSIST, COMMIT_RESERVATION, counter update, NOTIFY. Expected business
//! outcomes come back as [`AssignmentOutcome`] values; `Err` is reserved for
//! faults that abort the attempt, and every attempt is safe to retry whole.
//!
//! The ranking structure and the durable store are never updated in one
//! transaction. Idempotent inserts plus periodic reconciliation keep them
//! close enough.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::model::{AssignmentOutcome, AssignmentResult, ReportStatus};
use crate::notify::NotificationPort;
use crate::registry::VolunteerRegistry;
use crate::selection::SelectionEngine;
use crate::store::{DurableStore, PersistSummary};


pub struct AssignmentOrchestrator {
    store: Arc<dyn DurableStore>,
    registry: Arc<VolunteerRegistry>,
    selection: SelectionEngine,
    notifier: Arc<dyn NotificationPort>,
    target_verifiers: u32,
    release_unpersisted: bool,
}

impl AssignmentOrchestrator {
    pub fn new(
        store: Arc<dyn DurableStore>,
        registry: Arc<VolunteerRegistry>,
        notifier: Arc<dyn NotificationPort>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            selection: SelectionEngine::new(Arc::clone(&registry)),
            store,
            registry,
            notifier,
            target_verifiers: config.target_verifiers,
            release_unpersisted: config.release_unpersisted_reservations,
        }
    }

    pub fn target_verifiers(&self) -> u32 {
        self.target_verifiers
    }

    pub fn assign_report(&self, report_id: &str) -> EngineResult<AssignmentResult> {
        info!(report_id, "starting assignment");

        let Some(report) = self.store.find_report(report_id)? else {
            let reason = EngineError::NotFound {
                entity: "report",
                id: report_id.to_string(),
            };
            warn!(report_id, "report not found");
            return Ok(AssignmentResult::new(report_id, AssignmentOutcome::ReportNotFound)
                .with_detail(reason.to_string()));
        };

        if report.status != ReportStatus::Pending {
            let reason = EngineError::InvalidState(format!("report is {}", report.status));
            info!(report_id, status = %report.status, "report no longer pending");
            return Ok(AssignmentResult::new(report_id, AssignmentOutcome::NotPending)
                .with_detail(reason.to_string()));
        }

        let existing = self.store.assigned_volunteer_ids(report_id)?;
        let existing_count = existing.len() as u32;
        if existing_count >= self.target_verifiers {
            if report.assigned_count != existing_count {
                warn!(
                    report_id,
                    recorded = report.assigned_count,
                    actual = existing_count,
                    "repairing stale assigned_count"
                );
                if let Err(err) = self.store.sync_assigned_count(report_id) {
                    warn!(report_id, error = %err, "assigned_count repair failed");
                }
            }
            info!(report_id, existing = existing_count, "report already assigned");
            return Ok(
                AssignmentResult::new(report_id, AssignmentOutcome::AlreadyAssigned)
                    .with_ids(existing),
            );
        }

        let needed = (self.target_verifiers - existing_count) as usize;
        let exclude: HashSet<String> = existing.into_iter().collect();
        let selected = match self.selection.select(needed, &exclude) {
            Ok(selected) => selected,
            Err(err) => return interrupted(report_id, err),
        };

        if selected.is_empty() {
            warn!(report_id, needed, "no volunteers available");
            return Ok(AssignmentResult::new(report_id, AssignmentOutcome::NoVolunteers)
                .with_detail(EngineError::NoCandidates.to_string()));
        }
        debug!(report_id, selected = ?selected, "selected candidates");

        let eligible = match self.store.eligible_volunteer_ids(&selected) {
            Ok(eligible) => eligible,
            Err(err) => return interrupted(report_id, err),
        };
        let (valid, drifted): (Vec<String>, Vec<String>) = selected
            .into_iter()
            .partition(|volunteer_id| eligible.contains(volunteer_id));

        if !drifted.is_empty() {
            warn!(
                report_id,
                drifted = ?drifted,
                "ranking structure references unknown or ineligible volunteers; resync required"
            );
        }
        if valid.is_empty() {
            let reason = EngineError::Drift(drifted.clone());
            error!(report_id, "none of the selected volunteers exist in the durable store");
            return Ok(AssignmentResult::new(report_id, AssignmentOutcome::NoVolunteers)
                .with_drift(drifted)
                .with_detail(format!("{}: {reason}", EngineError::NoCandidates)));
        }

        let summary = match self
            .store
            .insert_assignments(report_id, &valid, self.target_verifiers)
        {
            Ok(summary) => summary,
            Err(err) if err.is_timeout() => return interrupted(report_id, err),
            Err(err) => {
                error!(report_id, error = %err, "failed to persist assignments");
                return Err(EngineError::Persistence(err.to_string()));
            }
        };

        self.commit_reservations(report_id, &summary);

        let count_error = match self.store.sync_assigned_count(report_id) {
            Ok(count) => {
                debug!(report_id, assigned_count = count, "assigned_count updated");
                None
            }
            Err(err) => {
                error!(report_id, error = %err, "failed to update assigned_count");
                Some(err)
            }
        };

        for volunteer_id in &summary.inserted {
            if let Err(err) = self.notifier.notify_new_assignment(volunteer_id, report_id) {
                warn!(report_id, volunteer_id = %volunteer_id, error = %err, "notification failed");
            }
        }

        let result = self.finish(report_id, summary, drifted, count_error)?;
        info!(
            report_id,
            outcome = %result.outcome,
            assigned = result.assigned_ids.len(),
            "assignment finished"
        );
        Ok(result)
    }

    /// Reservations were taken at selection time. Persisted ids are recorded
    /// against the report; the rest stay reserved until reconciliation unless
    /// configured to release them here.
    fn commit_reservations(&self, report_id: &str, summary: &PersistSummary) {
        if let Err(err) = self.registry.record_assignment(report_id, &summary.inserted) {
            warn!(report_id, error = %err, "failed to record reservations in ranking");
        }

        let unpersisted: Vec<&String> = summary
            .rejected
            .iter()
            .chain(&summary.duplicates)
            .chain(&summary.over_limit)
            .collect();
        if unpersisted.is_empty() {
            return;
        }

        if !self.release_unpersisted {
            info!(
                report_id,
                unpersisted = ?unpersisted,
                "leaving unpersisted reservations for reconciliation"
            );
            return;
        }

        for volunteer_id in unpersisted {
            if let Err(err) = self.registry.release(volunteer_id) {
                warn!(report_id, volunteer_id = %volunteer_id, error = %err, "failed to release reservation");
            }
        }
    }

    fn finish(
        &self,
        report_id: &str,
        summary: PersistSummary,
        drifted: Vec<String>,
        count_error: Option<EngineError>,
    ) -> EngineResult<AssignmentResult> {
        if let Some(err) = count_error {
            return Ok(
                AssignmentResult::new(report_id, AssignmentOutcome::PartialFailure)
                    .with_ids(summary.inserted)
                    .with_drift(drifted)
                    .with_detail(format!("assigned_count not updated: {err}")),
            );
        }

        if !summary.rejected.is_empty() {
            return Ok(
                AssignmentResult::new(report_id, AssignmentOutcome::PartialFailure)
                    .with_detail(format!(
                        "{}: rejected {:?}",
                        EngineError::Persistence("constraint violation".to_string()),
                        summary.rejected
                    ))
                    .with_ids(summary.inserted)
                    .with_drift(drifted),
            );
        }

        if summary.inserted.is_empty() {
            if summary.total_rows >= self.target_verifiers {
                // A concurrent attempt filled the report first.
                let existing = self.store.assigned_volunteer_ids(report_id)?;
                return Ok(
                    AssignmentResult::new(report_id, AssignmentOutcome::AlreadyAssigned)
                        .with_ids(existing)
                        .with_drift(drifted),
                );
            }
            return Ok(
                AssignmentResult::new(report_id, AssignmentOutcome::PartialFailure)
                    .with_drift(drifted)
                    .with_detail("no assignment rows were written"),
            );
        }

        Ok(AssignmentResult::new(report_id, AssignmentOutcome::Assigned)
            .with_ids(summary.inserted)
            .with_drift(drifted))
    }
}

/// Bounded waits that expire mid-flight become a retryable `PartialFailure`;
/// other faults abort the attempt.
fn interrupted(report_id: &str, err: EngineError) -> EngineResult<AssignmentResult> {
    if err.is_timeout() {
        warn!(report_id, error = %err, "assignment interrupted by timeout");
        return Ok(
            AssignmentResult::new(report_id, AssignmentOutcome::PartialFailure)
                .with_detail(err.to_string()),
        );
    }
    Err(err)
}
