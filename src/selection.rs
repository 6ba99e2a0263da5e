use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::error::EngineResult;
use crate::registry::VolunteerRegistry;

/// Chooses the least-loaded volunteers for a report and reserves them.
#[derive(Debug, Clone)]
pub struct SelectionEngine {
    registry: Arc<VolunteerRegistry>,
}

impl SelectionEngine {
    pub fn new(registry: Arc<VolunteerRegistry>) -> Self {
        Self { registry }
    }

    /// Returns at most `needed` ids ordered by ascending score then id.
    ///
    /// Ranking and reservation happen in one atomic step: two concurrent calls
    /// never both pick a volunteer on the strength of the same score. A short
    /// or empty result is not an error.
    pub fn select(&self, needed: usize, exclude: &HashSet<String>) -> EngineResult<Vec<String>> {
        if needed == 0 {
            return Ok(Vec::new());
        }

        let selected = self.registry.select_and_reserve(needed, exclude)?;
        debug!(
            needed,
            excluded = exclude.len(),
            selected = selected.len(),
            "selection complete"
        );
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn engine_with(entries: &[(&str, u32)]) -> (SelectionEngine, Arc<VolunteerRegistry>) {
        let registry = Arc::new(VolunteerRegistry::new(Duration::from_millis(500)));
        for (id, _) in entries {
            registry.register(id, 100).expect("register");
        }
        // Bring each entry to its starting score through reservations.
        for (id, score) in entries {
            let others: HashSet<String> = entries
                .iter()
                .filter(|(other, _)| other != id)
                .map(|(other, _)| other.to_string())
                .collect();
            for _ in 0..*score {
                registry
                    .select_and_reserve(1, &others)
                    .expect("seed reservation");
            }
        }
        (SelectionEngine::new(Arc::clone(&registry)), registry)
    }

    #[test]
    fn picks_lowest_score_with_id_tie_break() {
        let (engine, registry) = engine_with(&[("C", 3), ("B", 0), ("A", 0)]);

        let selected = engine.select(1, &HashSet::new()).expect("select");

        assert_eq!(selected, vec!["A".to_string()]);
        assert_eq!(registry.score("A").expect("score"), Some(1));
        assert_eq!(registry.score("B").expect("score"), Some(0));
        assert_eq!(registry.score("C").expect("score"), Some(3));
    }

    #[test]
    fn never_returns_excluded_ids() {
        let (engine, _) = engine_with(&[("A", 0), ("B", 1), ("C", 2)]);
        let exclude: HashSet<String> = ["A".to_string(), "C".to_string()].into();

        let selected = engine.select(3, &exclude).expect("select");

        assert_eq!(selected, vec!["B".to_string()]);
    }

    #[test]
    fn short_pool_returns_partial_result() {
        let (engine, _) = engine_with(&[("A", 0), ("B", 0)]);

        let selected = engine.select(5, &HashSet::new()).expect("select");

        assert_eq!(selected, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn empty_registry_yields_empty_selection() {
        let (engine, _) = engine_with(&[]);
        assert!(engine.select(2, &HashSet::new()).expect("select").is_empty());
    }

    #[test]
    fn concurrent_selections_spread_load_evenly() {
        let ids = ["A", "B", "C", "D"];
        let (engine, registry) = engine_with(&ids.map(|id| (id, 0)));

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let engine = engine.clone();
                scope.spawn(move || {
                    for _ in 0..10 {
                        engine.select(1, &HashSet::new()).expect("select");
                    }
                });
            }
        });

        let scores: Vec<u32> = ids
            .iter()
            .map(|id| registry.score(id).expect("score").expect("tracked"))
            .collect();
        assert_eq!(scores.iter().sum::<u32>(), 80);
        assert!(
            scores.iter().all(|score| *score == 20),
            "uneven reservations: {scores:?}"
        );
    }
}
