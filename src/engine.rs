use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::info;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::model::AssignmentResult;
use crate::notify::NotificationPort;
use crate::orchestrator::AssignmentOrchestrator;
use crate::reconcile::{DriftReport, ReconciliationService, ResyncSummary};
use crate::registry::VolunteerRegistry;
use crate::store::DurableStore;

/// The operations the surrounding application calls. Every collaborator is
/// injected, so tests and the CLI wire their own store and notifier.
pub struct AssignmentEngine {
    store: Arc<dyn DurableStore>,
    registry: Arc<VolunteerRegistry>,
    orchestrator: AssignmentOrchestrator,
    reconciliation: ReconciliationService,
    default_capacity: u32,
}

impl AssignmentEngine {
    pub fn new(
        store: Arc<dyn DurableStore>,
        notifier: Arc<dyn NotificationPort>,
        config: &EngineConfig,
    ) -> Self {
        let registry = Arc::new(VolunteerRegistry::new(config.io_timeout()));
        Self::with_registry(store, registry, notifier, config)
    }

    pub fn with_registry(
        store: Arc<dyn DurableStore>,
        registry: Arc<VolunteerRegistry>,
        notifier: Arc<dyn NotificationPort>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            orchestrator: AssignmentOrchestrator::new(
                Arc::clone(&store),
                Arc::clone(&registry),
                notifier,
                config,
            ),
            reconciliation: ReconciliationService::new(
                Arc::clone(&store),
                Arc::clone(&registry),
                config.default_capacity,
            ),
            store,
            registry,
            default_capacity: config.default_capacity,
        }
    }

    pub fn registry(&self) -> &Arc<VolunteerRegistry> {
        &self.registry
    }

    /// Onboarding hook. Only accounts that exist with the volunteer role may
    /// enter the ranking structure. Returns the capacity recorded.
    pub fn register_volunteer(&self, volunteer_id: &str, capacity: Option<u32>) -> EngineResult<u32> {
        let volunteer = self
            .store
            .find_volunteer(volunteer_id)?
            .ok_or_else(|| EngineError::NotFound {
                entity: "volunteer",
                id: volunteer_id.to_string(),
            })?;
        if !volunteer.is_eligible() {
            return Err(EngineError::InvalidState(format!(
                "user {volunteer_id} has role {}",
                volunteer.role
            )));
        }

        let capacity = capacity
            .or(volunteer.capacity)
            .unwrap_or(self.default_capacity);
        self.registry.register(volunteer_id, capacity)?;
        info!(volunteer_id, capacity, "volunteer registered");
        Ok(capacity)
    }

    pub fn deregister_volunteer(&self, volunteer_id: &str) -> EngineResult<bool> {
        let removed = self.registry.deregister(volunteer_id)?;
        info!(volunteer_id, removed, "volunteer deregistered");
        Ok(removed)
    }

    pub fn assign_report_to_volunteers(&self, report_id: &str) -> EngineResult<AssignmentResult> {
        self.orchestrator.assign_report(report_id)
    }

    pub fn full_resync(&self) -> EngineResult<ResyncSummary> {
        self.reconciliation.full_resync()
    }

    pub fn detect_drift(&self) -> EngineResult<BTreeSet<String>> {
        self.reconciliation.detect_drift()
    }

    pub fn drift_report(&self) -> EngineResult<DriftReport> {
        self.reconciliation.drift_report()
    }

    pub fn target_verifiers(&self) -> u32 {
        self.orchestrator.target_verifiers()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::model::{VOLUNTEER_ROLE, Volunteer};
    use crate::notify::LogNotifier;
    use crate::store::SqliteStore;

    fn engine() -> (Arc<SqliteStore>, AssignmentEngine) {
        let store = Arc::new(SqliteStore::open_in_memory(Duration::from_millis(500)).expect("store"));
        for (id, role, capacity) in [
            ("v-1", VOLUNTEER_ROLE, Some(7)),
            ("v-2", VOLUNTEER_ROLE, None),
            ("c-1", "citizen", None),
        ] {
            store
                .upsert_user(&Volunteer {
                    id: id.to_string(),
                    email: format!("{id}@example.org"),
                    name: id.to_string(),
                    role: role.to_string(),
                    capacity,
                })
                .expect("user");
        }
        let engine = AssignmentEngine::new(
            Arc::clone(&store) as Arc<dyn DurableStore>,
            Arc::new(LogNotifier),
            &EngineConfig::default(),
        );
        (store, engine)
    }

    #[test]
    fn register_volunteer_resolves_capacity() {
        let (_store, engine) = engine();

        assert_eq!(engine.register_volunteer("v-1", None).expect("register"), 7);
        assert_eq!(engine.register_volunteer("v-2", None).expect("register"), 100);
        assert_eq!(engine.register_volunteer("v-2", Some(4)).expect("register"), 4);
        assert_eq!(engine.registry().len().expect("len"), 2);
    }

    #[test]
    fn register_volunteer_rejects_unknown_and_ineligible_accounts() {
        let (_store, engine) = engine();

        let missing = engine
            .register_volunteer("ghost", None)
            .expect_err("unknown account");
        assert!(matches!(missing, EngineError::NotFound { entity: "volunteer", .. }));

        let citizen = engine
            .register_volunteer("c-1", None)
            .expect_err("wrong role");
        assert!(matches!(citizen, EngineError::InvalidState(_)));
        assert!(engine.registry().is_empty().expect("is_empty"));
    }

    #[test]
    fn deregister_leaves_durable_account_alone() {
        let (store, engine) = engine();
        engine.register_volunteer("v-1", None).expect("register");

        assert!(engine.deregister_volunteer("v-1").expect("deregister"));
        assert!(store.find_volunteer("v-1").expect("lookup").is_some());
        assert_eq!(engine.detect_drift().expect("drift"), BTreeSet::new());
    }
}
