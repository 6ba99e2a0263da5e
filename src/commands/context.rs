use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use verifier_assign::notify::{LogNotifier, NotificationPort, OutboxNotifier};
use verifier_assign::registry::VolunteerRegistry;
use verifier_assign::store::{DurableStore, SqliteStore};
use verifier_assign::util::ensure_directory;
use verifier_assign::{AssignmentEngine, EngineConfig, snapshot};

use crate::cli::EngineArgs;

/// Store, engine and ranking snapshot wired up for one CLI invocation.
pub(crate) struct EngineContext {
    pub(crate) store: Arc<SqliteStore>,
    pub(crate) engine: AssignmentEngine,
    ranking_path: PathBuf,
}

impl EngineContext {
    pub(crate) fn open(args: &EngineArgs) -> Result<Self> {
        let config = resolve_config(args)?;
        let store = open_store(args, &config)?;

        let notifier: Arc<dyn NotificationPort> = match &args.outbox_path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    ensure_directory(parent)?;
                }
                Arc::new(OutboxNotifier::new(path.clone()))
            }
            None => Arc::new(LogNotifier),
        };

        let ranking_path = args.ranking_path();
        let registry = Arc::new(VolunteerRegistry::new(config.io_timeout()));
        snapshot::load_into(&ranking_path, &registry)?;

        let engine = AssignmentEngine::with_registry(
            Arc::clone(&store) as Arc<dyn DurableStore>,
            registry,
            notifier,
            &config,
        );

        info!(
            db_path = %args.db_path().display(),
            ranking_path = %ranking_path.display(),
            target_verifiers = config.target_verifiers,
            io_timeout_ms = config.io_timeout_ms,
            "engine ready"
        );

        Ok(Self {
            store,
            engine,
            ranking_path,
        })
    }

    pub(crate) fn save_ranking(&self) -> Result<()> {
        snapshot::save_from(&self.ranking_path, self.engine.registry())
    }
}

pub(crate) fn resolve_config(args: &EngineArgs) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(target_verifiers) = args.target_verifiers {
        config.target_verifiers = target_verifiers;
    }
    if let Some(io_timeout_ms) = args.io_timeout_ms {
        config.io_timeout_ms = io_timeout_ms;
    }
    config.validate()?;
    Ok(config)
}

pub(crate) fn open_store(args: &EngineArgs, config: &EngineConfig) -> Result<Arc<SqliteStore>> {
    let db_path = args.db_path();
    if let Some(parent) = db_path.parent() {
        ensure_directory(parent)?;
    }
    let store = SqliteStore::open(&db_path, config.io_timeout())
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    Ok(Arc::new(store))
}
