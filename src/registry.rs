//! In-memory ranking structure of volunteer load.
//!
//! All state sits behind one `parking_lot::Mutex`. Every mutation, including
//! the select-and-reserve step used by [`crate::selection::SelectionEngine`],
//! completes inside a single lock acquisition, so readers observe each change
//! as soon as the call returns.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::{EngineError, EngineResult, Stage};
use crate::model::WorkloadEntry;

#[derive(Debug, Clone, Default)]
struct VolunteerMeta {
    capacity: u32,
    reports: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct RankingState {
    /// Ascending by score, ties broken by id.
    ranking: BTreeSet<(u32, String)>,
    scores: HashMap<String, u32>,
    meta: HashMap<String, VolunteerMeta>,
}

impl RankingState {
    fn remove(&mut self, volunteer_id: &str) -> bool {
        self.meta.remove(volunteer_id);
        match self.scores.remove(volunteer_id) {
            Some(score) => {
                self.ranking.remove(&(score, volunteer_id.to_string()));
                true
            }
            None => false,
        }
    }

    fn set_score(&mut self, volunteer_id: &str, score: u32) {
        if let Some(previous) = self.scores.insert(volunteer_id.to_string(), score) {
            self.ranking.remove(&(previous, volunteer_id.to_string()));
        }
        self.ranking.insert((score, volunteer_id.to_string()));
    }
}

#[derive(Debug)]
pub struct VolunteerRegistry {
    state: Mutex<RankingState>,
    lock_timeout: Duration,
}

impl VolunteerRegistry {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(RankingState::default()),
            lock_timeout,
        }
    }

    fn lock(&self, stage: Stage) -> EngineResult<MutexGuard<'_, RankingState>> {
        self.state
            .try_lock_for(self.lock_timeout)
            .ok_or(EngineError::Timeout {
                stage,
                timeout_ms: self.lock_timeout.as_millis() as u64,
            })
    }

    /// Inserts the volunteer or resets an existing entry to zero load.
    pub fn register(&self, volunteer_id: &str, capacity: u32) -> EngineResult<()> {
        let mut state = self.lock(Stage::Registry)?;
        state.set_score(volunteer_id, 0);
        state.meta.insert(
            volunteer_id.to_string(),
            VolunteerMeta {
                capacity,
                reports: BTreeSet::new(),
            },
        );
        debug!(volunteer_id, capacity, "registered volunteer in ranking");
        Ok(())
    }

    /// Returns whether the volunteer was tracked.
    pub fn deregister(&self, volunteer_id: &str) -> EngineResult<bool> {
        let removed = self.lock(Stage::Registry)?.remove(volunteer_id);
        debug!(volunteer_id, removed, "deregistered volunteer from ranking");
        Ok(removed)
    }

    /// Wipes every entry. Returns how many volunteers were dropped.
    pub fn clear_all(&self) -> EngineResult<usize> {
        let mut state = self.lock(Stage::Reconcile)?;
        let cleared = state.scores.len();
        *state = RankingState::default();
        Ok(cleared)
    }

    /// Picks up to `needed` lowest-score volunteers not in `exclude` and below
    /// capacity, and increments each pick's score, all under one lock.
    pub(crate) fn select_and_reserve(
        &self,
        needed: usize,
        exclude: &HashSet<String>,
    ) -> EngineResult<Vec<String>> {
        let mut state = self.lock(Stage::Select)?;

        let picked: Vec<(u32, String)> = state
            .ranking
            .iter()
            .filter(|(score, id)| {
                !exclude.contains(id)
                    && state
                        .meta
                        .get(id)
                        .is_some_and(|meta| *score < meta.capacity)
            })
            .take(needed)
            .cloned()
            .collect();

        let mut selected = Vec::with_capacity(picked.len());
        for (score, id) in picked {
            state.set_score(&id, score + 1);
            selected.push(id);
        }

        Ok(selected)
    }

    /// Gives back one unit of reservation. Returns whether the volunteer was
    /// tracked.
    pub fn release(&self, volunteer_id: &str) -> EngineResult<bool> {
        let mut state = self.lock(Stage::Persist)?;
        let Some(score) = state.scores.get(volunteer_id).copied() else {
            return Ok(false);
        };
        state.set_score(volunteer_id, score.saturating_sub(1));
        Ok(true)
    }

    /// Notes that `report_id` now holds a reservation on each volunteer.
    /// The set only grows until the volunteer is re-registered or resynced.
    pub fn record_assignment(&self, report_id: &str, volunteer_ids: &[String]) -> EngineResult<()> {
        let mut state = self.lock(Stage::Persist)?;
        for id in volunteer_ids {
            if let Some(meta) = state.meta.get_mut(id) {
                meta.reports.insert(report_id.to_string());
            }
        }
        Ok(())
    }

    pub fn score(&self, volunteer_id: &str) -> EngineResult<Option<u32>> {
        Ok(self.lock(Stage::Registry)?.scores.get(volunteer_id).copied())
    }

    pub fn volunteer_ids(&self) -> EngineResult<Vec<String>> {
        let state = self.lock(Stage::Reconcile)?;
        let mut ids: Vec<String> = state.scores.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    pub fn len(&self) -> EngineResult<usize> {
        Ok(self.lock(Stage::Registry)?.scores.len())
    }

    pub fn is_empty(&self) -> EngineResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Entries in ranking order.
    pub fn snapshot(&self) -> EngineResult<Vec<WorkloadEntry>> {
        let state = self.lock(Stage::Registry)?;
        Ok(state
            .ranking
            .iter()
            .map(|(score, id)| {
                let meta = state.meta.get(id).cloned().unwrap_or_default();
                WorkloadEntry {
                    volunteer_id: id.clone(),
                    score: *score,
                    capacity: meta.capacity,
                    reports: meta.reports.into_iter().collect(),
                }
            })
            .collect())
    }

    /// Replaces the whole state with `entries`.
    pub fn restore(&self, entries: Vec<WorkloadEntry>) -> EngineResult<()> {
        let mut fresh = RankingState::default();
        for entry in entries {
            fresh.set_score(&entry.volunteer_id, entry.score);
            fresh.meta.insert(
                entry.volunteer_id,
                VolunteerMeta {
                    capacity: entry.capacity,
                    reports: entry.reports.into_iter().collect(),
                },
            );
        }
        *self.lock(Stage::Registry)? = fresh;
        Ok(())
    }
}
