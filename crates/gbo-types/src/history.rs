//! Append-only run history.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::objective::ObjectiveDirection;

/// Where a history entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryPhase {
    /// Supplied already evaluated by the caller.
    Prior,
    /// Initial grid or random seed point.
    Seed,
    /// Chosen by maximizing the acquisition function.
    Search,
}

/// A single recorded evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Position in the history (0-indexed).
    pub index: usize,
    /// Optimization iteration (0 for prior and seed entries, 1.. afterwards).
    pub iteration: usize,
    pub phase: EntryPhase,
    pub point: Vec<f64>,
    pub value: f64,
    /// Acquisition score at selection time; `None` outside the search phase.
    pub acquisition: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aux: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OptimizationHistory {
    entries: Vec<HistoryEntry>,
}

impl OptimizationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, assigning its index.
    pub fn record(
        &mut self,
        phase: EntryPhase,
        iteration: usize,
        point: Vec<f64>,
        value: f64,
        acquisition: Option<f64>,
        aux: BTreeMap<String, f64>,
    ) -> &HistoryEntry {
        let index = self.entries.len();
        self.entries.push(HistoryEntry {
            index,
            iteration,
            phase,
            point,
            value,
            acquisition,
            aux,
        });
        &self.entries[index]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn count_phase(&self, phase: EntryPhase) -> usize {
        self.entries.iter().filter(|e| e.phase == phase).count()
    }

    /// Best entry under `direction`; the earliest entry wins ties.
    pub fn best(&self, direction: ObjectiveDirection) -> Option<&HistoryEntry> {
        let mut best: Option<&HistoryEntry> = None;
        for entry in &self.entries {
            let improves = match best {
                None => true,
                Some(current) => direction.is_better(entry.value, current.value),
            };
            if improves {
                best = Some(entry);
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_history() -> OptimizationHistory {
        let mut history = OptimizationHistory::new();
        history.record(EntryPhase::Seed, 0, vec![0.0], 1.5, None, BTreeMap::new());
        history.record(EntryPhase::Seed, 0, vec![0.5], 2.0, None, BTreeMap::new());
        history.record(EntryPhase::Search, 1, vec![0.7], 2.0, Some(0.3), BTreeMap::new());
        history.record(EntryPhase::Search, 2, vec![0.9], -1.0, Some(0.1), BTreeMap::new());
        history
    }

    #[test]
    fn record_assigns_sequential_indices() {
        let history = sample_history();
        let indices: Vec<usize> = history.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(history.count_phase(EntryPhase::Seed), 2);
        assert_eq!(history.last().unwrap().iteration, 2);
    }

    #[test]
    fn best_tracking_maximize_keeps_first_of_ties() {
        let history = sample_history();
        let best = history.best(ObjectiveDirection::Maximize).unwrap();
        assert_eq!(best.value, 2.0);
        assert_eq!(best.index, 1);
    }

    #[test]
    fn best_tracking_minimize() {
        let history = sample_history();
        let best = history.best(ObjectiveDirection::Minimize).unwrap();
        assert_eq!(best.value, -1.0);
        assert!(OptimizationHistory::new()
            .best(ObjectiveDirection::Minimize)
            .is_none());
    }

    #[test]
    fn history_serialization_roundtrip() {
        let history = sample_history();
        let json = serde_json::to_string(&history).unwrap();
        let back: OptimizationHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(history, back);
    }
}
