use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::EngineResult;
use crate::registry::VolunteerRegistry;
use crate::store::DurableStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResyncSummary {
    pub cleared: usize,
    pub registered: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    /// In the ranking structure but missing or ineligible in the store.
    pub stale: BTreeSet<String>,
    /// Eligible in the store but not tracked by the ranking structure.
    pub unregistered: BTreeSet<String>,
}

impl DriftReport {
    pub fn is_clean(&self) -> bool {
        self.stale.is_empty() && self.unregistered.is_empty()
    }
}

/// Rebuilds the ranking structure from durable truth.
pub struct ReconciliationService {
    store: Arc<dyn DurableStore>,
    registry: Arc<VolunteerRegistry>,
    default_capacity: u32,
}

impl ReconciliationService {
    pub fn new(
        store: Arc<dyn DurableStore>,
        registry: Arc<VolunteerRegistry>,
        default_capacity: u32,
    ) -> Self {
        Self {
            store,
            registry,
            default_capacity,
        }
    }

    /// Drops every ranking entry and re-registers each eligible volunteer at
    /// zero load. Outstanding reservations are forgotten; run it while
    /// assignment traffic is quiet.
    pub fn full_resync(&self) -> EngineResult<ResyncSummary> {
        let volunteers = self.store.list_eligible_volunteers()?;
        if volunteers.is_empty() {
            warn!("no eligible volunteers in the durable store");
        }

        let cleared = self.registry.clear_all()?;
        let mut registered = Vec::with_capacity(volunteers.len());
        for volunteer in volunteers {
            let capacity = volunteer.capacity.unwrap_or(self.default_capacity);
            self.registry.register(&volunteer.id, capacity)?;
            registered.push(volunteer.id);
        }

        info!(cleared, registered = registered.len(), "ranking structure resynced");
        Ok(ResyncSummary {
            cleared,
            registered,
        })
    }

    /// Ids the ranking structure tracks that the store does not back.
    pub fn detect_drift(&self) -> EngineResult<BTreeSet<String>> {
        let tracked = self.registry.volunteer_ids()?;
        let eligible = self.store.eligible_volunteer_ids(&tracked)?;
        Ok(tracked
            .into_iter()
            .filter(|id| !eligible.contains(id))
            .collect())
    }

    /// Drift in both directions.
    pub fn drift_report(&self) -> EngineResult<DriftReport> {
        let stale = self.detect_drift()?;
        let tracked: HashSet<String> = self.registry.volunteer_ids()?.into_iter().collect();
        let unregistered = self
            .store
            .list_eligible_volunteers()?
            .into_iter()
            .map(|volunteer| volunteer.id)
            .filter(|id| !tracked.contains(id))
            .collect();

        let report = DriftReport {
            stale,
            unregistered,
        };
        if !report.is_clean() {
            warn!(
                stale = ?report.stale,
                unregistered = ?report.unregistered,
                "ranking structure drift detected"
            );
        }
        Ok(report)
    }
}
