//! JSON persistence for the ranking structure between CLI invocations.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::model::WorkloadEntry;
use crate::registry::VolunteerRegistry;
use crate::util::{now_utc_string, write_json_pretty};

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingSnapshot {
    pub manifest_version: u32,
    pub generated_at: String,
    pub volunteer_count: usize,
    pub entries: Vec<WorkloadEntry>,
}

/// Loads the snapshot into `registry`. A missing file leaves it empty.
pub fn load_into(path: &Path, registry: &VolunteerRegistry) -> Result<usize> {
    if !path.exists() {
        warn!(path = %path.display(), "ranking snapshot missing; starting empty");
        return Ok(0);
    }

    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let snapshot: RankingSnapshot = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    let count = snapshot.entries.len();
    registry
        .restore(snapshot.entries)
        .context("failed to restore ranking snapshot")?;

    info!(path = %path.display(), volunteers = count, "loaded ranking snapshot");
    Ok(count)
}

pub fn save_from(path: &Path, registry: &VolunteerRegistry) -> Result<()> {
    let entries = registry
        .snapshot()
        .context("failed to capture ranking snapshot")?;
    let snapshot = RankingSnapshot {
        manifest_version: SNAPSHOT_VERSION,
        generated_at: now_utc_string(),
        volunteer_count: entries.len(),
        entries,
    };
    write_json_pretty(path, &snapshot)?;
    info!(path = %path.display(), volunteers = snapshot.volunteer_count, "wrote ranking snapshot");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use super::*;

    #[test]
    fn save_then_load_preserves_scores() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("ranking.json");

        let registry = VolunteerRegistry::new(Duration::from_millis(200));
        registry.register("a", 5).expect("register");
        registry.register("b", 5).expect("register");
        registry
            .select_and_reserve(1, &HashSet::new())
            .expect("select");
        save_from(&path, &registry).expect("save");

        let restored = VolunteerRegistry::new(Duration::from_millis(200));
        assert_eq!(load_into(&path, &restored).expect("load"), 2);
        assert_eq!(restored.score("a").expect("score"), Some(1));
        assert_eq!(restored.score("b").expect("score"), Some(0));
    }

    #[test]
    fn missing_snapshot_loads_nothing() {
        let dir = tempfile::tempdir().expect("temp dir");
        let registry = VolunteerRegistry::new(Duration::from_millis(200));

        let loaded = load_into(&dir.path().join("absent.json"), &registry).expect("load");

        assert_eq!(loaded, 0);
        assert!(registry.is_empty().expect("is_empty"));
    }
}
